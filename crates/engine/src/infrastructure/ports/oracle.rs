//! Decision oracle port.
//!
//! The oracle suggests what a hero should do next and writes flavour text. It
//! never touches state: a chosen action is only ever fed back into the normal
//! resolution path. Both methods are infallible; implementations degrade to a
//! deterministic answer instead of returning errors.

use async_trait::async_trait;
use herotycoon_domain::{
    ActionKind, Hero, HeroClass, HeroStats, MasterRelation, PersonalityTraits, TimeOfDay,
};
use serde::Serialize;

/// What the oracle is told about a hero.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroView {
    pub name: String,
    pub class: HeroClass,
    pub personality: PersonalityTraits,
    pub stats: HeroStats,
    pub master_relation: MasterRelation,
    pub mood: i32,
    pub goals: Vec<String>,
    pub current_action: String,
}

impl From<&Hero> for HeroView {
    fn from(hero: &Hero) -> Self {
        Self {
            name: hero.name.clone(),
            class: hero.class,
            personality: hero.personality,
            stats: hero.stats,
            master_relation: hero.master_relation,
            mood: hero.mood,
            goals: hero.goals.clone(),
            current_action: hero.current_action.clone(),
        }
    }
}

/// Situational context rendered into the decision prompt as JSON.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<TimeOfDay>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub active_events: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub guild_policies: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub guildmates: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    Oracle,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeroDecision {
    pub action: ActionKind,
    pub reasoning: String,
    pub source: DecisionSource,
}

/// Thing to write about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescribeSubject {
    World { name: String, seed: String },
    Hero { name: String, class: HeroClass },
}

impl DescribeSubject {
    pub fn name(&self) -> &str {
        match self {
            DescribeSubject::World { name, .. } | DescribeSubject::Hero { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescribeKind {
    /// A world's history and atmosphere.
    Lore,
    /// A hero's past.
    Backstory,
}

impl DescribeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DescribeKind::Lore => "lore",
            DescribeKind::Backstory => "backstory",
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    /// Pick one of `available` for the hero. The answer is always a member of
    /// `available`, or `rest` when `available` is empty.
    async fn choose_action(
        &self,
        hero: &HeroView,
        available: &[ActionKind],
        context: &DecisionContext,
    ) -> HeroDecision;

    async fn describe(&self, subject: DescribeSubject, kind: DescribeKind) -> String;
}
