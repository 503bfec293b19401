//! Hero Tycoon domain: entities, invariants, the action catalog and the
//! resolution engine. No I/O and no randomness; the engine crate supplies both.

pub mod actions;
pub mod balance;
pub mod entities;
pub mod error;
pub mod ids;
pub mod validation;

pub use actions::{
    resolve_action, ActionCatalog, ActionDescriptor, ActionKind, ActionOutcome, ErrorCategory,
    GuildChanges, Requirement, Resolution, ResolutionError, Stat, StatDeltas,
};
pub use entities::{
    Biome, ClassProfile, EventRoll, FacilityType, Guild, GuildError, GuildFacility, Hero,
    HeroClass, HeroStats, LocationType, MasterRelation, PersonalityTraits, Position, ResourceBag,
    Shortfall, TimeOfDay, Trait, Weather, World, WorldEvent, WorldEventType, WorldLocation,
    IDLE_ACTION,
};
pub use error::DomainError;
pub use ids::{FacilityId, GuildId, HeroId, LocationId, PlayerId, WorldEventId, WorldId};
pub use validation::{validate_guild, validate_hero, validate_world, InvariantViolation};
