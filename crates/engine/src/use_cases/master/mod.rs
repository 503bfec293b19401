//! Guild master commands.
//!
//! A command is dispatched to the hero or guild use case that owns the
//! transaction. Successes and business-rule refusals are both reported to the
//! guild room as `master:result`; bad input and infrastructure failures are
//! returned to the caller instead.

use std::sync::Arc;

use herotycoon_domain::{ErrorCategory, Guild, GuildId, HeroId};
use herotycoon_shared::MasterCommandKind;

use crate::use_cases::broadcast::EventBroadcaster;
use crate::use_cases::guild::{GuildOperationError, PurchaseFacility, SetGuildPolicy};
use crate::use_cases::hero::{HeroActionError, PerformHeroAction};
use crate::use_cases::validation::{require_key, require_parsed, ValidationError};

#[derive(Debug, Clone)]
pub struct MasterCommand {
    pub guild_id: GuildId,
    pub kind: MasterCommandKind,
    pub target: Option<String>,
    pub argument: Option<String>,
}

/// What was published to the guild room.
#[derive(Debug, Clone)]
pub struct MasterReport {
    pub guild_id: GuildId,
    pub command: MasterCommandKind,
    pub success: bool,
    pub message: String,
    pub guild: Option<Guild>,
}

#[derive(Debug, thiserror::Error)]
pub enum MasterCommandError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Hero(#[from] HeroActionError),
    #[error(transparent)]
    Guild(#[from] GuildOperationError),
}

impl MasterCommandError {
    /// A game rule said no; the command was well-formed.
    pub fn is_rejection(&self) -> bool {
        match self {
            MasterCommandError::Hero(HeroActionError::Resolution(e)) => {
                e.category() == ErrorCategory::Precondition
            }
            MasterCommandError::Guild(GuildOperationError::Rejected(_)) => true,
            _ => false,
        }
    }
}

pub struct RunMasterCommand {
    perform: Arc<PerformHeroAction>,
    purchase_facility: Arc<PurchaseFacility>,
    set_policy: Arc<SetGuildPolicy>,
    broadcaster: Arc<EventBroadcaster>,
}

impl RunMasterCommand {
    pub fn new(
        perform: Arc<PerformHeroAction>,
        purchase_facility: Arc<PurchaseFacility>,
        set_policy: Arc<SetGuildPolicy>,
        broadcaster: Arc<EventBroadcaster>,
    ) -> Self {
        Self {
            perform,
            purchase_facility,
            set_policy,
            broadcaster,
        }
    }

    pub async fn execute(&self, command: MasterCommand) -> Result<MasterReport, MasterCommandError> {
        let (success, message, guild) = match self.dispatch(&command).await {
            Ok((message, guild)) => (true, message, guild),
            Err(e) if e.is_rejection() => (false, e.to_string(), None),
            Err(e) => return Err(e),
        };

        tracing::info!(
            guild_id = %command.guild_id,
            command = ?command.kind,
            success,
            "Master command handled"
        );

        self.broadcaster
            .master_result(command.guild_id, command.kind, success, message.clone(), guild.clone())
            .await;

        Ok(MasterReport {
            guild_id: command.guild_id,
            command: command.kind,
            success,
            message,
            guild,
        })
    }

    async fn dispatch(
        &self,
        command: &MasterCommand,
    ) -> Result<(String, Option<Guild>), MasterCommandError> {
        let target = command.target.as_deref().unwrap_or_default();

        match command.kind {
            MasterCommandKind::AssignAction => {
                let hero_id: HeroId = require_parsed(target, "target")?;
                let action = require_key(command.argument.as_deref().unwrap_or_default(), "argument")?;
                let resolution = self
                    .perform
                    .execute(hero_id, &action, Some(command.guild_id))
                    .await?;
                Ok((resolution.outcome.summary, resolution.guild))
            }
            MasterCommandKind::BuildFacility => {
                let (guild, facility) = self
                    .purchase_facility
                    .execute(command.guild_id, target)
                    .await?;
                let message = format!(
                    "Built {} (level {}) for {} gold",
                    facility.facility_type.as_str(),
                    facility.level,
                    facility.cost
                );
                Ok((message, Some(guild)))
            }
            MasterCommandKind::SetPolicy | MasterCommandKind::ClearPolicy => {
                let enabled = command.kind == MasterCommandKind::SetPolicy;
                let policy = require_key(target, "target")?;
                let (guild, changed) = self
                    .set_policy
                    .execute(command.guild_id, &policy, enabled)
                    .await?;
                let message = match (enabled, changed) {
                    (true, true) => format!("Policy '{}' enabled", policy),
                    (true, false) => format!("Policy '{}' was already enabled", policy),
                    (false, true) => format!("Policy '{}' cleared", policy),
                    (false, false) => format!("Policy '{}' was not set", policy),
                };
                Ok((message, Some(guild)))
            }
        }
    }
}
