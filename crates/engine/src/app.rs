//! Application state and composition.

use std::sync::Arc;

use herotycoon_domain::ActionCatalog;

use crate::api::ConnectionManager;
use crate::infrastructure::{
    clock::{SeededRandom, SystemClock, SystemRandom},
    config::EngineConfig,
    gemini::GeminiClient,
    oracle::{FallbackOracle, PromptTemplates, RemoteOracle},
    persistence::{InMemoryStore, SqliteStore},
    ports::{
        ClockPort, DecisionOracle, GuildRepo, HeroRepo, LlmPort, RandomPort, RepoError,
        ResolutionStore, WorldRepo,
    },
    resilient_llm::{ResilientLlmClient, RetryPolicy},
};
use crate::use_cases::{
    self,
    guild::{
        CreateGuild, GetGuild, ListGuildHeroes, PurchaseFacility, RecruitHero, SetGuildPolicy,
    },
    hero::{DecideHeroAction, GetHero, PerformHeroAction},
    world::{AdvanceWorldTime, CreateWorld, DiscoverLocation, GetWorldState, SpawnWorldEvent},
    EntityLocks, EventBroadcaster, RunMasterCommand,
};

/// Main application state.
///
/// Passed to HTTP/WebSocket handlers via Axum state.
pub struct App {
    pub use_cases: UseCases,
    pub connections: Arc<ConnectionManager>,
}

/// Container for all use cases.
pub struct UseCases {
    pub heroes: use_cases::HeroUseCases,
    pub guilds: use_cases::GuildUseCases,
    pub worlds: use_cases::WorldUseCases,
    pub master: Arc<RunMasterCommand>,
}

/// Adapters the use cases are built from.
#[derive(Clone)]
pub struct Ports {
    pub heroes: Arc<dyn HeroRepo>,
    pub guilds: Arc<dyn GuildRepo>,
    pub worlds: Arc<dyn WorldRepo>,
    pub store: Arc<dyn ResolutionStore>,
    pub oracle: Arc<dyn DecisionOracle>,
    pub clock: Arc<dyn ClockPort>,
    pub random: Arc<dyn RandomPort>,
}

impl Ports {
    /// Pick adapters from configuration: SQLite when `DATABASE_URL` is set,
    /// the remote oracle when a Gemini key is set, a seeded RNG when
    /// `RNG_SEED` is set.
    pub async fn from_config(config: &EngineConfig) -> Result<Self, RepoError> {
        let clock: Arc<dyn ClockPort> = Arc::new(SystemClock);
        let random: Arc<dyn RandomPort> = match config.rng_seed {
            Some(seed) => {
                tracing::info!(seed, "Using seeded random source");
                Arc::new(SeededRandom::new(seed))
            }
            None => Arc::new(SystemRandom),
        };
        let oracle = build_oracle(config, random.clone());

        match config.database_url.as_deref() {
            Some(url) => {
                let store = Arc::new(SqliteStore::connect(url, clock.clone()).await?);
                tracing::info!("Using SQLite store");
                Ok(Self {
                    heroes: store.clone(),
                    guilds: store.clone(),
                    worlds: store.clone(),
                    store,
                    oracle,
                    clock,
                    random,
                })
            }
            None => {
                tracing::warn!("DATABASE_URL not set, state will not survive a restart");
                Ok(Self::in_memory(Arc::new(InMemoryStore::new()), oracle, clock, random))
            }
        }
    }

    pub fn in_memory(
        store: Arc<InMemoryStore>,
        oracle: Arc<dyn DecisionOracle>,
        clock: Arc<dyn ClockPort>,
        random: Arc<dyn RandomPort>,
    ) -> Self {
        Self {
            heroes: store.clone(),
            guilds: store.clone(),
            worlds: store.clone(),
            store,
            oracle,
            clock,
            random,
        }
    }
}

fn build_oracle(config: &EngineConfig, random: Arc<dyn RandomPort>) -> Arc<dyn DecisionOracle> {
    let fallback = FallbackOracle::new(random);
    let Some(gemini) = &config.gemini else {
        tracing::info!("GEMINI_API_KEY not set, heroes decide with the fallback oracle");
        return Arc::new(fallback);
    };

    let client: Arc<dyn LlmPort> = Arc::new(GeminiClient::new(
        &gemini.base_url,
        &gemini.model,
        &gemini.api_key,
    ));
    let llm: Arc<dyn LlmPort> = Arc::new(ResilientLlmClient::new(
        client,
        RetryPolicy::within(config.oracle_timeout).with_max_retries(config.llm_max_retries),
    ));
    let templates = PromptTemplates::new(
        config.prompt_hero_decision.clone(),
        config.prompt_describe.clone(),
    );
    tracing::info!(
        model = %gemini.model,
        timeout_ms = config.oracle_timeout.as_millis() as u64,
        "Decision oracle backed by Gemini"
    );
    Arc::new(RemoteOracle::new(llm, templates, config.oracle_timeout, fallback))
}

impl App {
    pub fn new(ports: Ports, config: &EngineConfig) -> Self {
        let max_attempts = config.commit_max_attempts;
        let connections = Arc::new(ConnectionManager::new());
        let broadcaster = Arc::new(EventBroadcaster::new(connections.clone()));
        let locks = Arc::new(EntityLocks::new());
        let catalog = Arc::new(ActionCatalog::standard());

        let perform = Arc::new(PerformHeroAction::new(
            ports.heroes.clone(),
            ports.guilds.clone(),
            ports.store.clone(),
            catalog.clone(),
            locks.clone(),
            broadcaster.clone(),
            ports.clock.clone(),
            max_attempts,
        ));
        let decide = Arc::new(DecideHeroAction::new(
            ports.heroes.clone(),
            ports.guilds.clone(),
            ports.worlds.clone(),
            catalog,
            ports.oracle.clone(),
            perform.clone(),
        ));
        let heroes = use_cases::HeroUseCases::new(
            perform.clone(),
            decide,
            Arc::new(GetHero::new(ports.heroes.clone())),
        );

        let purchase_facility = Arc::new(PurchaseFacility::new(
            ports.guilds.clone(),
            locks.clone(),
            max_attempts,
        ));
        let set_policy = Arc::new(SetGuildPolicy::new(
            ports.guilds.clone(),
            locks.clone(),
            max_attempts,
        ));
        let guilds = use_cases::GuildUseCases::new(
            Arc::new(CreateGuild::new(
                ports.guilds.clone(),
                ports.worlds.clone(),
                ports.clock.clone(),
            )),
            Arc::new(RecruitHero::new(
                ports.guilds.clone(),
                ports.store.clone(),
                ports.oracle.clone(),
                locks.clone(),
                ports.clock.clone(),
                max_attempts,
            )),
            purchase_facility.clone(),
            set_policy.clone(),
            Arc::new(GetGuild::new(ports.guilds.clone())),
            Arc::new(ListGuildHeroes::new(ports.guilds.clone(), ports.heroes.clone())),
        );

        let worlds = use_cases::WorldUseCases::new(
            Arc::new(CreateWorld::new(
                ports.worlds.clone(),
                ports.oracle.clone(),
                ports.clock.clone(),
                ports.random.clone(),
            )),
            Arc::new(GetWorldState::new(ports.worlds.clone())),
            Arc::new(AdvanceWorldTime::new(
                ports.worlds.clone(),
                locks.clone(),
                ports.clock.clone(),
                max_attempts,
            )),
            Arc::new(SpawnWorldEvent::new(
                ports.worlds.clone(),
                locks.clone(),
                ports.clock.clone(),
                ports.random.clone(),
                max_attempts,
            )),
            Arc::new(DiscoverLocation::new(ports.worlds.clone(), locks, max_attempts)),
        );

        let master = Arc::new(RunMasterCommand::new(
            perform,
            purchase_facility,
            set_policy,
            broadcaster,
        ));

        Self {
            use_cases: UseCases {
                heroes,
                guilds,
                worlds,
                master,
            },
            connections,
        }
    }
}
