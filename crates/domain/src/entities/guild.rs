//! Guild entity - a player's resource-holding container of heroes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::resources::{ResourceBag, Shortfall};
use crate::balance::MAX_HEROES_PER_GUILD;
use crate::error::DomainError;
use crate::{FacilityId, GuildId, HeroId, PlayerId, WorldId};

/// Kinds of facility a guild can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityType {
    TrainingRoom,
    Workshop,
    Tavern,
    Library,
    Infirmary,
}

impl FacilityType {
    pub fn all() -> [FacilityType; 5] {
        [
            FacilityType::TrainingRoom,
            FacilityType::Workshop,
            FacilityType::Tavern,
            FacilityType::Library,
            FacilityType::Infirmary,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FacilityType::TrainingRoom => "training_room",
            FacilityType::Workshop => "workshop",
            FacilityType::Tavern => "tavern",
            FacilityType::Library => "library",
            FacilityType::Infirmary => "infirmary",
        }
    }

    /// Gold cost of building the first level.
    pub fn base_cost(&self) -> i64 {
        match self {
            FacilityType::TrainingRoom => 200,
            FacilityType::Workshop => 250,
            FacilityType::Tavern => 150,
            FacilityType::Library => 300,
            FacilityType::Infirmary => 200,
        }
    }

    /// Multiplier the facility grants per level, keyed by what it boosts.
    fn effect(&self) -> (&'static str, f64) {
        match self {
            FacilityType::TrainingRoom => ("combat_training", 0.1),
            FacilityType::Workshop => ("crafting_speed", 0.1),
            FacilityType::Tavern => ("mood_recovery", 0.15),
            FacilityType::Library => ("magic_study", 0.1),
            FacilityType::Infirmary => ("health_recovery", 0.2),
        }
    }
}

impl fmt::Display for FacilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FacilityType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FacilityType::all()
            .into_iter()
            .find(|f| f.as_str() == s.trim())
            .ok_or_else(|| DomainError::parse(format!("Unknown facility type: {}", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildFacility {
    pub id: FacilityId,
    #[serde(rename = "type")]
    pub facility_type: FacilityType,
    pub level: u32,
    pub effects: BTreeMap<String, f64>,
    /// Gold paid for the most recent level
    pub cost: i64,
    pub is_built: bool,
}

impl GuildFacility {
    fn effects_at(facility_type: FacilityType, level: u32) -> BTreeMap<String, f64> {
        let (key, per_level) = facility_type.effect();
        BTreeMap::from([(key.to_string(), 1.0 + per_level * level as f64)])
    }
}

/// Why a guild transaction was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuildError {
    #[error("Not enough {resource}: need {required}, have {available}")]
    InsufficientResource {
        resource: String,
        required: i64,
        available: i64,
    },
    #[error("Hero {0} already belongs to this guild")]
    DuplicateHero(HeroId),
    #[error("Guild is full ({max} heroes)")]
    GuildFull { max: usize },
}

impl From<Shortfall> for GuildError {
    fn from(s: Shortfall) -> Self {
        GuildError::InsufficientResource {
            resource: s.resource,
            required: s.required,
            available: s.available,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guild {
    pub id: GuildId,
    pub name: String,
    pub master_id: PlayerId,
    pub world_id: WorldId,
    pub level: u32,
    pub experience: i64,
    pub reputation: i64,
    pub resources: ResourceBag,
    #[serde(default)]
    pub facilities: Vec<GuildFacility>,
    #[serde(default)]
    pub hero_ids: Vec<HeroId>,
    #[serde(default)]
    pub policies: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

impl Guild {
    pub fn new(
        name: impl Into<String>,
        master_id: PlayerId,
        world_id: WorldId,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("Guild name cannot be empty"));
        }

        Ok(Self {
            id: GuildId::new(),
            name,
            master_id,
            world_id,
            level: 1,
            experience: 0,
            reputation: 0,
            resources: ResourceBag::starting(),
            facilities: Vec::new(),
            hero_ids: Vec::new(),
            policies: BTreeSet::new(),
            created_at: now,
        })
    }

    pub fn with_id(mut self, id: GuildId) -> Self {
        self.id = id;
        self
    }

    pub fn has_hero(&self, hero_id: HeroId) -> bool {
        self.hero_ids.contains(&hero_id)
    }

    /// Guildmates of `hero_id` (everyone else on the roster).
    pub fn members_except(&self, hero_id: HeroId) -> impl Iterator<Item = HeroId> + '_ {
        self.hero_ids.iter().copied().filter(move |id| *id != hero_id)
    }

    pub fn add_hero(&mut self, hero_id: HeroId) -> Result<(), GuildError> {
        if self.has_hero(hero_id) {
            return Err(GuildError::DuplicateHero(hero_id));
        }
        if self.hero_ids.len() >= MAX_HEROES_PER_GUILD {
            return Err(GuildError::GuildFull {
                max: MAX_HEROES_PER_GUILD,
            });
        }
        self.hero_ids.push(hero_id);
        Ok(())
    }

    pub fn facility(&self, facility_type: FacilityType) -> Option<&GuildFacility> {
        self.facilities
            .iter()
            .find(|f| f.facility_type == facility_type)
    }

    /// Gold needed to build (or upgrade to) the next level of a facility.
    pub fn next_facility_cost(&self, facility_type: FacilityType) -> i64 {
        let next_level = self.facility(facility_type).map_or(1, |f| f.level + 1);
        facility_type.base_cost() * i64::from(next_level)
    }

    /// Build a facility, or upgrade it one level, paying in gold.
    pub fn purchase_facility(
        &mut self,
        facility_type: FacilityType,
    ) -> Result<GuildFacility, GuildError> {
        let cost = self.next_facility_cost(facility_type);
        self.resources.debit("gold", cost)?;

        let facility = match self
            .facilities
            .iter_mut()
            .find(|f| f.facility_type == facility_type)
        {
            Some(existing) => {
                existing.level += 1;
                existing.cost = cost;
                existing.is_built = true;
                existing.effects = GuildFacility::effects_at(facility_type, existing.level);
                existing.clone()
            }
            None => {
                let built = GuildFacility {
                    id: FacilityId::new(),
                    facility_type,
                    level: 1,
                    effects: GuildFacility::effects_at(facility_type, 1),
                    cost,
                    is_built: true,
                };
                self.facilities.push(built.clone());
                built
            }
        };
        Ok(facility)
    }

    /// Returns true if the flag was newly set.
    pub fn set_policy(&mut self, policy: impl Into<String>) -> bool {
        self.policies.insert(policy.into())
    }

    /// Returns true if the flag was present.
    pub fn clear_policy(&mut self, policy: &str) -> bool {
        self.policies.remove(policy)
    }
}
