//! Domain entities - Core business objects with identity

mod guild;
mod hero;
mod resources;
mod world;

pub use guild::{FacilityType, Guild, GuildError, GuildFacility};
pub use hero::{
    ClassProfile, Hero, HeroClass, HeroStats, MasterRelation, PersonalityTraits, Position, Trait,
    IDLE_ACTION,
};
pub use resources::{ResourceBag, Shortfall};
pub use world::{
    Biome, EventRoll, LocationType, TimeOfDay, Weather, World, WorldEvent, WorldEventType,
    WorldLocation,
};
