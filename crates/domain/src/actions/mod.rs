//! Hero actions: the catalog and the resolution engine.

mod catalog;
mod resolve;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entities::{Guild, Hero};
use crate::{GuildId, HeroId};

pub use catalog::{ActionCatalog, ActionDescriptor, ActionKind, Requirement, Stat, StatDeltas};
pub use resolve::resolve_action;

/// Broad class of a resolution failure, used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Business-rule rejection. Retrying with the same state will fail again.
    Precondition,
    /// The snapshot went stale. Safe to retry with a fresh read.
    Concurrency,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("Unknown action: {0}")]
    UnknownAction(ActionKind),

    #[error("Hero {0} is not active")]
    HeroInactive(HeroId),

    #[error("Not enough {resource}: need {required}, have {available}")]
    InsufficientResource {
        resource: String,
        required: i64,
        available: i64,
    },

    #[error("Hero {0} changed while the action was being resolved")]
    StaleSnapshot(HeroId),
}

impl ResolutionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ResolutionError::StaleSnapshot(_) => ErrorCategory::Concurrency,
            ResolutionError::UnknownAction(_)
            | ResolutionError::HeroInactive(_)
            | ResolutionError::InsufficientResource { .. } => ErrorCategory::Precondition,
        }
    }
}

/// What happened to the guild as a side effect of a hero action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildChanges {
    /// Signed change per resource (costs negative, rewards positive)
    pub resources: BTreeMap<String, i64>,
    pub reputation: i64,
    pub experience: i64,
}

impl GuildChanges {
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.reputation == 0 && self.experience == 0
    }
}

/// Record of one resolved action. Not persisted; used for responses and broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub hero_id: HeroId,
    pub guild_id: Option<GuildId>,
    pub action: ActionKind,
    pub label: String,
    pub duration_minutes: u32,
    /// Deltas actually applied after clamping
    pub stat_changes: StatDeltas,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationship_changes: BTreeMap<HeroId, i32>,
    #[serde(default)]
    pub guild_changes: GuildChanges,
    /// New level, if this action caused a level-up
    pub leveled_up: Option<u32>,
    pub summary: String,
    pub resolved_at: DateTime<Utc>,
}

/// New hero and guild state plus the outcome, ready to be committed together.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub hero: Hero,
    pub guild: Option<Guild>,
    pub outcome: ActionOutcome,
}
