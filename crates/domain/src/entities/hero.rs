//! Hero entity - a guild-owned agent with stats, personality and a master relation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::balance::{STARTING_MAX_ENERGY, STARTING_MAX_HEALTH};
use crate::error::DomainError;
use crate::{GuildId, HeroId};

/// The fixed set of hero classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeroClass {
    Berserker,
    Ranger,
    Paladin,
    Sorcerer,
    Rogue,
    Cleric,
}

/// Per-class starting numbers and behavioural leanings.
#[derive(Debug, Clone, Copy)]
pub struct ClassProfile {
    pub combat: i32,
    pub magic: i32,
    pub crafting: i32,
    pub exploration: i32,
    pub preferred_actions: [&'static str; 2],
    pub tendencies: &'static [(Trait, i32)],
}

impl HeroClass {
    pub fn all() -> [HeroClass; 6] {
        [
            HeroClass::Berserker,
            HeroClass::Ranger,
            HeroClass::Paladin,
            HeroClass::Sorcerer,
            HeroClass::Rogue,
            HeroClass::Cleric,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            HeroClass::Berserker => "Berserker",
            HeroClass::Ranger => "Ranger",
            HeroClass::Paladin => "Paladin",
            HeroClass::Sorcerer => "Sorcerer",
            HeroClass::Rogue => "Rogue",
            HeroClass::Cleric => "Cleric",
        }
    }

    pub fn profile(&self) -> ClassProfile {
        match self {
            HeroClass::Berserker => ClassProfile {
                combat: 80,
                magic: 20,
                crafting: 30,
                exploration: 50,
                preferred_actions: ["train", "quest"],
                tendencies: &[(Trait::Courage, 80), (Trait::Patience, 20)],
            },
            HeroClass::Ranger => ClassProfile {
                combat: 60,
                magic: 40,
                crafting: 50,
                exploration: 80,
                preferred_actions: ["explore", "quest"],
                tendencies: &[(Trait::Curiosity, 80), (Trait::Patience, 70)],
            },
            HeroClass::Paladin => ClassProfile {
                combat: 70,
                magic: 60,
                crafting: 40,
                exploration: 40,
                preferred_actions: ["train", "socialize"],
                tendencies: &[(Trait::Loyalty, 90), (Trait::Empathy, 80)],
            },
            HeroClass::Sorcerer => ClassProfile {
                combat: 30,
                magic: 90,
                crafting: 60,
                exploration: 30,
                preferred_actions: ["train", "craft"],
                tendencies: &[(Trait::Curiosity, 70), (Trait::Patience, 90)],
            },
            HeroClass::Rogue => ClassProfile {
                combat: 50,
                magic: 30,
                crafting: 70,
                exploration: 70,
                preferred_actions: ["explore", "craft"],
                tendencies: &[(Trait::Greed, 70), (Trait::Curiosity, 60)],
            },
            HeroClass::Cleric => ClassProfile {
                combat: 40,
                magic: 80,
                crafting: 50,
                exploration: 40,
                preferred_actions: ["socialize", "rest"],
                tendencies: &[(Trait::Empathy, 90), (Trait::Loyalty, 70)],
            },
        }
    }
}

impl fmt::Display for HeroClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for HeroClass {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HeroClass::all()
            .into_iter()
            .find(|class| class.display_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::parse(format!("Unknown hero class: {}", s)))
    }
}

/// Names of the seven personality traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trait {
    Courage,
    Greed,
    Loyalty,
    Curiosity,
    Ambition,
    Patience,
    Empathy,
}

impl Trait {
    pub fn name(&self) -> &'static str {
        match self {
            Trait::Courage => "courage",
            Trait::Greed => "greed",
            Trait::Loyalty => "loyalty",
            Trait::Curiosity => "curiosity",
            Trait::Ambition => "ambition",
            Trait::Patience => "patience",
            Trait::Empathy => "empathy",
        }
    }
}

/// Personality vector, each trait in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalityTraits {
    /// Willingness to fight strong enemies
    pub courage: i32,
    /// Desire for loot over helping others
    pub greed: i32,
    /// Trust in and obedience to the master
    pub loyalty: i32,
    /// Exploration versus staying in safe areas
    pub curiosity: i32,
    /// Personal goals versus team objectives
    pub ambition: i32,
    /// Training thoroughly versus rushing in
    pub patience: i32,
    /// Helping wounded allies versus self-preservation
    pub empathy: i32,
}

impl Default for PersonalityTraits {
    fn default() -> Self {
        Self {
            courage: 50,
            greed: 50,
            loyalty: 50,
            curiosity: 50,
            ambition: 50,
            patience: 50,
            empathy: 50,
        }
    }
}

impl PersonalityTraits {
    /// Neutral personality nudged by the class tendencies.
    pub fn for_class(class: HeroClass) -> Self {
        let mut traits = Self::default();
        for (name, value) in class.profile().tendencies {
            *traits.get_mut(*name) = *value;
        }
        traits
    }

    pub fn get(&self, name: Trait) -> i32 {
        match name {
            Trait::Courage => self.courage,
            Trait::Greed => self.greed,
            Trait::Loyalty => self.loyalty,
            Trait::Curiosity => self.curiosity,
            Trait::Ambition => self.ambition,
            Trait::Patience => self.patience,
            Trait::Empathy => self.empathy,
        }
    }

    fn get_mut(&mut self, name: Trait) -> &mut i32 {
        match name {
            Trait::Courage => &mut self.courage,
            Trait::Greed => &mut self.greed,
            Trait::Loyalty => &mut self.loyalty,
            Trait::Curiosity => &mut self.curiosity,
            Trait::Ambition => &mut self.ambition,
            Trait::Patience => &mut self.patience,
            Trait::Empathy => &mut self.empathy,
        }
    }

    pub fn entries(&self) -> [(Trait, i32); 7] {
        [
            (Trait::Courage, self.courage),
            (Trait::Greed, self.greed),
            (Trait::Loyalty, self.loyalty),
            (Trait::Curiosity, self.curiosity),
            (Trait::Ambition, self.ambition),
            (Trait::Patience, self.patience),
            (Trait::Empathy, self.empathy),
        ]
    }
}

/// Numeric hero state. All values non-negative; pools never exceed their max.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroStats {
    pub level: u32,
    pub experience: i64,
    pub health: i32,
    pub max_health: i32,
    pub energy: i32,
    pub max_energy: i32,
    pub combat: i32,
    pub magic: i32,
    pub crafting: i32,
    pub exploration: i32,
}

impl HeroStats {
    /// Fresh level-1 stats for a class.
    pub fn for_class(class: HeroClass) -> Self {
        let profile = class.profile();
        Self {
            level: 1,
            experience: 0,
            health: STARTING_MAX_HEALTH,
            max_health: STARTING_MAX_HEALTH,
            energy: STARTING_MAX_ENERGY,
            max_energy: STARTING_MAX_ENERGY,
            combat: profile.combat,
            magic: profile.magic,
            crafting: profile.crafting,
            exploration: profile.exploration,
        }
    }
}

/// How the hero regards the guild master, each in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterRelation {
    /// Built through keeping promises
    pub trust: i32,
    /// Earned through successful leadership
    pub respect: i32,
    /// Effective, but reduces creativity
    pub fear: i32,
}

impl Default for MasterRelation {
    fn default() -> Self {
        Self {
            trust: 50,
            respect: 50,
            fear: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

/// A hero, owned by exactly one guild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hero {
    pub id: HeroId,
    pub guild_id: GuildId,
    pub name: String,
    pub class: HeroClass,
    pub personality: PersonalityTraits,
    pub stats: HeroStats,
    pub master_relation: MasterRelation,
    #[serde(default)]
    pub backstory: String,
    #[serde(default)]
    pub goals: Vec<String>,
    pub current_action: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub equipment: Vec<String>,
    /// Other hero id -> regard in [-100, 100]
    #[serde(default)]
    pub relationships: BTreeMap<HeroId, i32>,
    pub mood: i32,
    pub last_action_time: DateTime<Utc>,
    pub is_active: bool,
}

/// Label used while a hero is doing nothing in particular.
pub const IDLE_ACTION: &str = "idle";

impl Hero {
    /// Recruit a new level-1 hero into a guild.
    pub fn recruit(
        guild_id: GuildId,
        name: impl Into<String>,
        class: HeroClass,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("Hero name cannot be empty"));
        }

        Ok(Self {
            id: HeroId::new(),
            guild_id,
            name,
            class,
            personality: PersonalityTraits::for_class(class),
            stats: HeroStats::for_class(class),
            master_relation: MasterRelation::default(),
            backstory: String::new(),
            goals: Vec::new(),
            current_action: IDLE_ACTION.to_string(),
            position: Position::default(),
            equipment: Vec::new(),
            relationships: BTreeMap::new(),
            mood: 0,
            last_action_time: now,
            is_active: true,
        })
    }

    pub fn with_id(mut self, id: HeroId) -> Self {
        self.id = id;
        self
    }

    pub fn with_backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = backstory.into();
        self
    }

    pub fn with_goals(mut self, goals: Vec<String>) -> Self {
        self.goals = goals;
        self
    }

    pub fn with_stats(mut self, stats: HeroStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}
