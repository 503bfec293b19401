//! Hero use cases.
//!
//! `PerformHeroAction` is the only path that mutates a hero. The oracle-driven
//! `DecideHeroAction` and the master's `assign_action` command both end up here.

use std::sync::Arc;

use herotycoon_domain::{
    resolve_action, validate_guild, validate_hero, ActionCatalog, ActionKind, GuildId, Hero, HeroId,
    Resolution, ResolutionError,
};

use crate::infrastructure::ports::{
    ClockPort, DecisionContext, DecisionOracle, GuildRepo, HeroDecision, HeroRepo, HeroView,
    RepoError, ResolutionCommit, ResolutionStore, WorldRepo,
};
use crate::use_cases::broadcast::EventBroadcaster;
use crate::use_cases::concurrency::{retry_on_conflict, ConflictAware, EntityLocks};
use crate::use_cases::validation::{require_intact, require_key, ValidationError};

/// Container for hero use cases.
pub struct HeroUseCases {
    pub perform: Arc<PerformHeroAction>,
    pub decide: Arc<DecideHeroAction>,
    pub get: Arc<GetHero>,
}

impl HeroUseCases {
    pub fn new(
        perform: Arc<PerformHeroAction>,
        decide: Arc<DecideHeroAction>,
        get: Arc<GetHero>,
    ) -> Self {
        Self {
            perform,
            decide,
            get,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HeroActionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Hero not found: {0}")]
    HeroNotFound(HeroId),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

impl ConflictAware for HeroActionError {
    fn is_conflict(&self) -> bool {
        matches!(self, HeroActionError::Repo(e) if e.is_conflict())
    }
}

// =============================================================================
// Perform Action
// =============================================================================

/// Read snapshot, resolve, commit hero and guild together, broadcast.
///
/// Serialised per hero id and per guild. A version conflict at commit (another
/// process wrote the hero or the guild) restarts from a fresh snapshot; once the
/// attempts run out the caller sees `StaleSnapshot`. A snapshot that breaks an
/// entity invariant is refused as corrupt before anything is resolved.
pub struct PerformHeroAction {
    heroes: Arc<dyn HeroRepo>,
    guilds: Arc<dyn GuildRepo>,
    store: Arc<dyn ResolutionStore>,
    catalog: Arc<ActionCatalog>,
    locks: Arc<EntityLocks>,
    broadcaster: Arc<EventBroadcaster>,
    clock: Arc<dyn ClockPort>,
    max_attempts: u32,
}

impl PerformHeroAction {
    pub fn new(
        heroes: Arc<dyn HeroRepo>,
        guilds: Arc<dyn GuildRepo>,
        store: Arc<dyn ResolutionStore>,
        catalog: Arc<ActionCatalog>,
        locks: Arc<EntityLocks>,
        broadcaster: Arc<EventBroadcaster>,
        clock: Arc<dyn ClockPort>,
        max_attempts: u32,
    ) -> Self {
        Self {
            heroes,
            guilds,
            store,
            catalog,
            locks,
            broadcaster,
            clock,
            max_attempts,
        }
    }

    /// Resolve `action` for a hero.
    ///
    /// `guild_id`, when given, must be the hero's own guild.
    pub async fn execute(
        &self,
        hero_id: HeroId,
        action: &str,
        guild_id: Option<GuildId>,
    ) -> Result<Resolution, HeroActionError> {
        let kind = ActionKind::new(require_key(action, "action")?);

        let resolution = {
            let _hero_guard = self.locks.heroes.lock(&hero_id).await;
            // Most actions also move the guild row, so guildmates take turns.
            // Lock order is always hero then guild.
            let home_guild = self
                .heroes
                .get(hero_id)
                .await?
                .ok_or(HeroActionError::HeroNotFound(hero_id))?
                .value
                .guild_id;
            let _guild_guard = self.locks.guilds.lock(&home_guild).await;
            retry_on_conflict(self.max_attempts, "perform_hero_action", || {
                self.attempt(hero_id, &kind, guild_id)
            })
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    tracing::warn!(hero_id = %hero_id, action = %kind, "Commit attempts exhausted");
                    HeroActionError::Resolution(ResolutionError::StaleSnapshot(hero_id))
                } else {
                    e
                }
            })?
        };

        tracing::info!(
            hero_id = %hero_id,
            action = %kind,
            leveled_up = ?resolution.outcome.leveled_up,
            "Hero action resolved"
        );

        self.broadcaster
            .hero_updated(&resolution.hero, &resolution.outcome)
            .await;
        Ok(resolution)
    }

    async fn attempt(
        &self,
        hero_id: HeroId,
        kind: &ActionKind,
        claimed_guild: Option<GuildId>,
    ) -> Result<Resolution, HeroActionError> {
        let hero = self
            .heroes
            .get(hero_id)
            .await?
            .ok_or(HeroActionError::HeroNotFound(hero_id))?;

        if let Some(claimed) = claimed_guild {
            if claimed != hero.value.guild_id {
                return Err(ValidationError::invalid(
                    "guildId",
                    format!("hero {} does not belong to guild {}", hero_id, claimed),
                )
                .into());
            }
        }

        require_intact("Hero", hero_id, validate_hero(&hero.value))?;
        let guild = self.guilds.get(hero.value.guild_id).await?;
        if let Some(guild) = &guild {
            require_intact("Guild", guild.value.id, validate_guild(&guild.value))?;
        }
        let resolution = resolve_action(
            &self.catalog,
            &hero.value,
            guild.as_ref().map(|g| &g.value),
            kind,
            self.clock.now(),
        )
        .inspect_err(|e| {
            tracing::debug!(hero_id = %hero_id, action = %kind, reason = %e, "Action rejected");
        })?;

        // Only write the guild row when the action touched it.
        let guild_write = match (&resolution.guild, guild) {
            (Some(next), Some(read)) if *next != read.value => Some((next.clone(), read.version)),
            _ => None,
        };

        self.store
            .commit_resolution(ResolutionCommit {
                hero: resolution.hero.clone(),
                hero_version: hero.version,
                guild: guild_write,
            })
            .await?;

        Ok(resolution)
    }
}

// =============================================================================
// Decide Action
// =============================================================================

#[derive(Debug, Clone)]
pub struct DecisionResult {
    pub decision: HeroDecision,
    pub resolution: Resolution,
}

/// Ask the oracle what the hero wants to do, then do it.
///
/// The oracle only picks from actions the hero can currently start, and its
/// answer goes through `PerformHeroAction` like any other request.
pub struct DecideHeroAction {
    heroes: Arc<dyn HeroRepo>,
    guilds: Arc<dyn GuildRepo>,
    worlds: Arc<dyn WorldRepo>,
    catalog: Arc<ActionCatalog>,
    oracle: Arc<dyn DecisionOracle>,
    perform: Arc<PerformHeroAction>,
}

impl DecideHeroAction {
    pub fn new(
        heroes: Arc<dyn HeroRepo>,
        guilds: Arc<dyn GuildRepo>,
        worlds: Arc<dyn WorldRepo>,
        catalog: Arc<ActionCatalog>,
        oracle: Arc<dyn DecisionOracle>,
        perform: Arc<PerformHeroAction>,
    ) -> Self {
        Self {
            heroes,
            guilds,
            worlds,
            catalog,
            oracle,
            perform,
        }
    }

    pub async fn execute(&self, hero_id: HeroId) -> Result<DecisionResult, HeroActionError> {
        let hero = self
            .heroes
            .get(hero_id)
            .await?
            .ok_or(HeroActionError::HeroNotFound(hero_id))?
            .value;

        let context = self.context_for(&hero).await?;
        let available = self.catalog.available_for(&hero);
        let decision = self
            .oracle
            .choose_action(&HeroView::from(&hero), &available, &context)
            .await;

        tracing::info!(
            hero_id = %hero_id,
            action = %decision.action,
            source = ?decision.source,
            "Hero decided on an action"
        );

        let resolution = self
            .perform
            .execute(hero_id, decision.action.as_str(), None)
            .await?;
        Ok(DecisionResult {
            decision,
            resolution,
        })
    }

    async fn context_for(&self, hero: &Hero) -> Result<DecisionContext, RepoError> {
        let Some(guild) = self.guilds.get(hero.guild_id).await?.map(|g| g.value) else {
            return Ok(DecisionContext::default());
        };

        let world = self.worlds.get(guild.world_id).await?.map(|w| w.value);
        let guildmates = self
            .heroes
            .list_for_guild(guild.id)
            .await?
            .into_iter()
            .filter(|h| h.id != hero.id)
            .map(|h| h.name)
            .collect();

        Ok(DecisionContext {
            time_of_day: world.as_ref().map(|w| w.time_of_day),
            active_events: world
                .as_ref()
                .map(|w| w.active_events().map(|e| e.name.clone()).collect())
                .unwrap_or_default(),
            guild_policies: guild.policies.iter().cloned().collect(),
            guildmates,
        })
    }
}

// =============================================================================
// Reads
// =============================================================================

pub struct GetHero {
    heroes: Arc<dyn HeroRepo>,
}

impl GetHero {
    pub fn new(heroes: Arc<dyn HeroRepo>) -> Self {
        Self { heroes }
    }

    pub async fn execute(&self, hero_id: HeroId) -> Result<Hero, HeroActionError> {
        self.heroes
            .get(hero_id)
            .await?
            .map(|row| row.value)
            .ok_or(HeroActionError::HeroNotFound(hero_id))
    }
}
