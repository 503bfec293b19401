//! World use cases.
//!
//! World time and the event list only move through explicit ticks, one writer
//! per world id at a time.

use std::sync::Arc;

use herotycoon_domain::{
    validate_world, EventRoll, LocationId, PlayerId, TimeOfDay, World, WorldEvent, WorldEventType,
    WorldId,
};

use crate::infrastructure::ports::{
    ClockPort, DecisionOracle, DescribeKind, DescribeSubject, RandomPort, RepoError, WorldRepo,
};
use crate::use_cases::concurrency::{retry_on_conflict, ConflictAware, EntityLocks};
use crate::use_cases::validation::{
    require_intact, require_name, require_non_empty_if_present, ValidationError,
};

/// Container for world use cases.
pub struct WorldUseCases {
    pub create: Arc<CreateWorld>,
    pub get_state: Arc<GetWorldState>,
    pub advance_time: Arc<AdvanceWorldTime>,
    pub spawn_event: Arc<SpawnWorldEvent>,
    pub discover_location: Arc<DiscoverLocation>,
}

impl WorldUseCases {
    pub fn new(
        create: Arc<CreateWorld>,
        get_state: Arc<GetWorldState>,
        advance_time: Arc<AdvanceWorldTime>,
        spawn_event: Arc<SpawnWorldEvent>,
        discover_location: Arc<DiscoverLocation>,
    ) -> Self {
        Self {
            create,
            get_state,
            advance_time,
            spawn_event,
            discover_location,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorldTickError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("World not found: {0}")]
    WorldNotFound(WorldId),
    #[error("Location {location_id} not found in world {world_id}")]
    LocationNotFound {
        world_id: WorldId,
        location_id: LocationId,
    },
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

impl ConflictAware for WorldTickError {
    fn is_conflict(&self) -> bool {
        matches!(self, WorldTickError::Repo(e) if e.is_conflict())
    }
}

/// Load a world row or fail with `WorldNotFound`.
async fn load(
    worlds: &dyn WorldRepo,
    world_id: WorldId,
) -> Result<crate::infrastructure::ports::Versioned<World>, WorldTickError> {
    worlds
        .get(world_id)
        .await?
        .ok_or(WorldTickError::WorldNotFound(world_id))
}

/// Load a world a tick is about to rewrite. A corrupt row is refused.
async fn load_for_update(
    worlds: &dyn WorldRepo,
    world_id: WorldId,
) -> Result<crate::infrastructure::ports::Versioned<World>, WorldTickError> {
    let read = load(worlds, world_id).await?;
    require_intact("World", world_id, validate_world(&read.value))?;
    Ok(read)
}

// =============================================================================
// Create
// =============================================================================

/// Generate a world with the standard starting map and oracle-written lore.
pub struct CreateWorld {
    worlds: Arc<dyn WorldRepo>,
    oracle: Arc<dyn DecisionOracle>,
    clock: Arc<dyn ClockPort>,
    random: Arc<dyn RandomPort>,
}

impl CreateWorld {
    pub fn new(
        worlds: Arc<dyn WorldRepo>,
        oracle: Arc<dyn DecisionOracle>,
        clock: Arc<dyn ClockPort>,
        random: Arc<dyn RandomPort>,
    ) -> Self {
        Self {
            worlds,
            oracle,
            clock,
            random,
        }
    }

    pub async fn execute(
        &self,
        player_id: PlayerId,
        name: &str,
        seed: Option<String>,
    ) -> Result<World, WorldTickError> {
        let name = require_name(name, "name")?;
        require_non_empty_if_present(&seed, "seed")?;
        let seed = match seed {
            Some(seed) => seed.trim().to_string(),
            None => self.random.gen_uuid().simple().to_string(),
        };

        let lore = self
            .oracle
            .describe(
                DescribeSubject::World {
                    name: name.clone(),
                    seed: seed.clone(),
                },
                DescribeKind::Lore,
            )
            .await;

        let world = World::generate(player_id, name, seed, self.clock.now())
            .map_err(|e| ValidationError::invalid("name", e.to_string()))?
            .with_lore(lore);
        self.worlds.create(&world).await?;

        tracing::info!(world_id = %world.id, player_id = %player_id, seed = %world.seed, "World created");
        Ok(world)
    }
}

pub struct GetWorldState {
    worlds: Arc<dyn WorldRepo>,
}

impl GetWorldState {
    pub fn new(worlds: Arc<dyn WorldRepo>) -> Self {
        Self { worlds }
    }

    pub async fn execute(&self, world_id: WorldId) -> Result<World, WorldTickError> {
        Ok(load(self.worlds.as_ref(), world_id).await?.value)
    }
}

// =============================================================================
// Time
// =============================================================================

#[derive(Debug, Clone)]
pub struct TimeAdvance {
    pub world: World,
    pub time_of_day: TimeOfDay,
    pub expired_events: usize,
}

/// Step the time-of-day cycle once and end any events that have run out.
pub struct AdvanceWorldTime {
    worlds: Arc<dyn WorldRepo>,
    locks: Arc<EntityLocks>,
    clock: Arc<dyn ClockPort>,
    max_attempts: u32,
}

impl AdvanceWorldTime {
    pub fn new(
        worlds: Arc<dyn WorldRepo>,
        locks: Arc<EntityLocks>,
        clock: Arc<dyn ClockPort>,
        max_attempts: u32,
    ) -> Self {
        Self {
            worlds,
            locks,
            clock,
            max_attempts,
        }
    }

    pub async fn execute(&self, world_id: WorldId) -> Result<TimeAdvance, WorldTickError> {
        let _guard = self.locks.worlds.lock(&world_id).await;
        let advance = retry_on_conflict(self.max_attempts, "advance_world_time", || {
            self.attempt(world_id)
        })
        .await?;

        tracing::info!(
            world_id = %world_id,
            time_of_day = advance.time_of_day.as_str(),
            expired_events = advance.expired_events,
            "World time advanced"
        );
        Ok(advance)
    }

    async fn attempt(&self, world_id: WorldId) -> Result<TimeAdvance, WorldTickError> {
        let read = load_for_update(self.worlds.as_ref(), world_id).await?;
        let mut world = read.value;

        let time_of_day = world.advance_time();
        let expired_events = world.expire_events(self.clock.now());
        self.worlds.update(&world, read.version).await?;

        Ok(TimeAdvance {
            world,
            time_of_day,
            expired_events,
        })
    }
}

// =============================================================================
// Events
// =============================================================================

#[derive(Debug, Clone)]
pub struct SpawnOutcome {
    pub world: World,
    /// `None` when the roll missed or the world was at its event cap
    pub event: Option<WorldEvent>,
}

/// Roll for a random world event.
pub struct SpawnWorldEvent {
    worlds: Arc<dyn WorldRepo>,
    locks: Arc<EntityLocks>,
    clock: Arc<dyn ClockPort>,
    random: Arc<dyn RandomPort>,
    max_attempts: u32,
}

impl SpawnWorldEvent {
    pub fn new(
        worlds: Arc<dyn WorldRepo>,
        locks: Arc<EntityLocks>,
        clock: Arc<dyn ClockPort>,
        random: Arc<dyn RandomPort>,
        max_attempts: u32,
    ) -> Self {
        Self {
            worlds,
            locks,
            clock,
            random,
            max_attempts,
        }
    }

    /// The roll is drawn once per call; a retry after a conflict reuses it.
    fn roll(&self) -> EventRoll {
        let types = WorldEventType::all();
        let last = types.len() as i32 - 1;
        let index = self.random.gen_range(0, last).clamp(0, last) as usize;
        EventRoll {
            chance: self.random.gen_unit(),
            event_type: types[index],
        }
    }

    pub async fn execute(&self, world_id: WorldId) -> Result<SpawnOutcome, WorldTickError> {
        let roll = self.roll();

        let _guard = self.locks.worlds.lock(&world_id).await;
        let outcome = retry_on_conflict(self.max_attempts, "spawn_world_event", || {
            self.attempt(world_id, roll)
        })
        .await?;

        match &outcome.event {
            Some(event) => tracing::info!(
                world_id = %world_id,
                event = %event.name,
                active_events = outcome.world.active_event_count(),
                "World event spawned"
            ),
            None => tracing::debug!(world_id = %world_id, chance = roll.chance, "No world event this time"),
        }
        Ok(outcome)
    }

    async fn attempt(&self, world_id: WorldId, roll: EventRoll) -> Result<SpawnOutcome, WorldTickError> {
        let read = load_for_update(self.worlds.as_ref(), world_id).await?;
        let mut world = read.value;

        let event = world.spawn_event(roll, self.clock.now());
        if event.is_some() {
            self.worlds.update(&world, read.version).await?;
        }
        Ok(SpawnOutcome { world, event })
    }
}

// =============================================================================
// Locations
// =============================================================================

/// Mark a location discovered. Writes nothing if it already was.
pub struct DiscoverLocation {
    worlds: Arc<dyn WorldRepo>,
    locks: Arc<EntityLocks>,
    max_attempts: u32,
}

impl DiscoverLocation {
    pub fn new(worlds: Arc<dyn WorldRepo>, locks: Arc<EntityLocks>, max_attempts: u32) -> Self {
        Self {
            worlds,
            locks,
            max_attempts,
        }
    }

    /// Returns the world and whether the location was newly discovered.
    pub async fn execute(
        &self,
        world_id: WorldId,
        location_id: LocationId,
    ) -> Result<(World, bool), WorldTickError> {
        let _guard = self.locks.worlds.lock(&world_id).await;
        let (world, newly) = retry_on_conflict(self.max_attempts, "discover_location", || {
            self.attempt(world_id, location_id)
        })
        .await?;

        if newly {
            tracing::info!(world_id = %world_id, location_id = %location_id, "Location discovered");
        }
        Ok((world, newly))
    }

    async fn attempt(
        &self,
        world_id: WorldId,
        location_id: LocationId,
    ) -> Result<(World, bool), WorldTickError> {
        let read = load_for_update(self.worlds.as_ref(), world_id).await?;
        let mut world = read.value;

        let newly = world
            .discover_location(location_id)
            .map_err(|_| WorldTickError::LocationNotFound {
                world_id,
                location_id,
            })?;
        if newly {
            self.worlds.update(&world, read.version).await?;
        }
        Ok((world, newly))
    }
}
