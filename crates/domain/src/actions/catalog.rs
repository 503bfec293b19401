//! Action catalog - the single table of action costs, effects and preconditions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ResolutionError;
use crate::entities::Hero;

/// Name of an action, e.g. `"train"`.
///
/// Kinds are open strings so that requests naming an action the catalog does
/// not know can still be represented and rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionKind(String);

impl ActionKind {
    pub const TRAIN: &'static str = "train";
    pub const EXPLORE: &'static str = "explore";
    pub const REST: &'static str = "rest";
    pub const SOCIALIZE: &'static str = "socialize";
    pub const CRAFT: &'static str = "craft";
    pub const QUEST: &'static str = "quest";

    /// Normalises to trimmed lowercase.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ActionKind {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ActionKind {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A numeric hero attribute an action can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stat {
    Health,
    Energy,
    Combat,
    Magic,
    Crafting,
    Exploration,
    Experience,
    Mood,
}

/// Signed per-stat changes. Zero means untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatDeltas {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub health: i32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub energy: i32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub combat: i32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub magic: i32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub crafting: i32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub exploration: i32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub experience: i32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub mood: i32,
}

fn is_zero(v: &i32) -> bool {
    *v == 0
}

impl StatDeltas {
    pub fn get(&self, stat: Stat) -> i32 {
        match stat {
            Stat::Health => self.health,
            Stat::Energy => self.energy,
            Stat::Combat => self.combat,
            Stat::Magic => self.magic,
            Stat::Crafting => self.crafting,
            Stat::Exploration => self.exploration,
            Stat::Experience => self.experience,
            Stat::Mood => self.mood,
        }
    }

    pub fn set(&mut self, stat: Stat, value: i32) {
        let slot = match stat {
            Stat::Health => &mut self.health,
            Stat::Energy => &mut self.energy,
            Stat::Combat => &mut self.combat,
            Stat::Magic => &mut self.magic,
            Stat::Crafting => &mut self.crafting,
            Stat::Exploration => &mut self.exploration,
            Stat::Experience => &mut self.experience,
            Stat::Mood => &mut self.mood,
        };
        *slot = value;
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A precondition a hero must satisfy before an action starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    MinEnergy(i32),
    MinHealth(i32),
}

impl Requirement {
    pub fn check(&self, hero: &Hero) -> Result<(), ResolutionError> {
        let (resource, required, available) = match *self {
            Requirement::MinEnergy(min) => ("energy", min, hero.stats.energy),
            Requirement::MinHealth(min) => ("health", min, hero.stats.health),
        };
        if available < required {
            return Err(ResolutionError::InsufficientResource {
                resource: resource.to_string(),
                required: i64::from(required),
                available: i64::from(available),
            });
        }
        Ok(())
    }
}

/// Everything the resolution engine needs to know about one action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDescriptor {
    pub kind: ActionKind,
    /// Activity label stored as the hero's current action, e.g. "training"
    pub label: String,
    /// Completion phrase used in the outcome summary
    pub summary: String,
    pub duration_minutes: u32,
    pub deltas: StatDeltas,
    pub requirements: Vec<Requirement>,
    /// Relationship change applied towards each guildmate; `None` for non-social actions
    pub relationship_delta: Option<i32>,
    pub guild_costs: BTreeMap<String, i64>,
    pub guild_rewards: BTreeMap<String, i64>,
    pub reputation_reward: i64,
}

impl ActionDescriptor {
    pub fn new(kind: impl Into<ActionKind>, label: impl Into<String>, duration_minutes: u32) -> Self {
        Self {
            kind: kind.into(),
            label: label.into(),
            summary: String::new(),
            duration_minutes,
            deltas: StatDeltas::default(),
            requirements: Vec::new(),
            relationship_delta: None,
            guild_costs: BTreeMap::new(),
            guild_rewards: BTreeMap::new(),
            reputation_reward: 0,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Spend `cost` energy, requiring at least that much up front.
    pub fn with_energy_cost(mut self, cost: i32) -> Self {
        self.deltas.energy -= cost;
        self.requirements.push(Requirement::MinEnergy(cost));
        self
    }

    pub fn with_delta(mut self, stat: Stat, delta: i32) -> Self {
        self.deltas.set(stat, self.deltas.get(stat) + delta);
        self
    }

    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn with_relationship_delta(mut self, delta: i32) -> Self {
        self.relationship_delta = Some(delta);
        self
    }

    pub fn with_guild_cost(mut self, resource: impl Into<String>, amount: i64) -> Self {
        self.guild_costs.insert(resource.into(), amount);
        self
    }

    pub fn with_guild_reward(mut self, resource: impl Into<String>, amount: i64) -> Self {
        self.guild_rewards.insert(resource.into(), amount);
        self
    }

    pub fn with_reputation_reward(mut self, amount: i64) -> Self {
        self.reputation_reward = amount;
        self
    }

    /// Energy this action spends, or 0 if it restores energy.
    pub fn energy_cost(&self) -> i32 {
        (-self.deltas.energy).max(0)
    }
}

/// Lookup table of actions by kind.
#[derive(Debug, Clone, Default)]
pub struct ActionCatalog {
    entries: BTreeMap<ActionKind, ActionDescriptor>,
}

impl ActionCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The six base actions.
    pub fn standard() -> Self {
        Self::empty()
            .with_entry(
                ActionDescriptor::new(ActionKind::TRAIN, "training", 60)
                    .with_summary("completed a training session")
                    .with_energy_cost(20)
                    .with_delta(Stat::Combat, 1)
                    .with_delta(Stat::Experience, 10),
            )
            .with_entry(
                ActionDescriptor::new(ActionKind::EXPLORE, "exploration", 90)
                    .with_summary("explored new areas")
                    .with_energy_cost(30)
                    .with_delta(Stat::Exploration, 1)
                    .with_delta(Stat::Experience, 15),
            )
            .with_entry(
                ActionDescriptor::new(ActionKind::REST, "rest", 30)
                    .with_summary("restored energy and health")
                    .with_delta(Stat::Energy, 40)
                    .with_delta(Stat::Health, 20),
            )
            .with_entry(
                ActionDescriptor::new(ActionKind::SOCIALIZE, "socializing", 30)
                    .with_summary("socialized with guild members")
                    .with_energy_cost(10)
                    .with_delta(Stat::Mood, 10)
                    .with_relationship_delta(5),
            )
            .with_entry(
                ActionDescriptor::new(ActionKind::CRAFT, "crafting", 60)
                    .with_summary("finished a crafting project")
                    .with_energy_cost(25)
                    .with_delta(Stat::Crafting, 1)
                    .with_delta(Stat::Experience, 12),
            )
            .with_entry(
                ActionDescriptor::new(ActionKind::QUEST, "questing", 120)
                    .with_summary("returned from a quest")
                    .with_energy_cost(40)
                    .with_requirement(Requirement::MinHealth(15))
                    .with_delta(Stat::Health, -10)
                    .with_delta(Stat::Combat, 1)
                    .with_delta(Stat::Experience, 25)
                    .with_guild_reward("gold", 25)
                    .with_reputation_reward(1),
            )
    }

    /// Add or replace an entry.
    pub fn with_entry(mut self, descriptor: ActionDescriptor) -> Self {
        self.entries.insert(descriptor.kind.clone(), descriptor);
        self
    }

    pub fn get(&self, kind: &ActionKind) -> Option<&ActionDescriptor> {
        self.entries.get(kind)
    }

    pub fn contains(&self, kind: &ActionKind) -> bool {
        self.entries.contains_key(kind)
    }

    /// Known kinds in a stable (sorted) order.
    pub fn kinds(&self) -> Vec<ActionKind> {
        self.entries.keys().cloned().collect()
    }

    /// Kinds whose hero-side requirements `hero` currently meets.
    pub fn available_for(&self, hero: &Hero) -> Vec<ActionKind> {
        self.entries
            .values()
            .filter(|d| d.requirements.iter().all(|r| r.check(hero).is_ok()))
            .map(|d| d.kind.clone())
            .collect()
    }
}
