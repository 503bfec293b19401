//! Use cases - transaction boundaries.
//!
//! Each module owns the read-modify-write cycle for one entity type. Handlers
//! call these; nothing else writes to the stores.

pub mod broadcast;
pub mod concurrency;
pub mod guild;
pub mod hero;
pub mod master;
pub mod validation;
pub mod world;

// Re-export main types
pub use broadcast::EventBroadcaster;
pub use concurrency::EntityLocks;
pub use guild::GuildUseCases;
pub use hero::HeroUseCases;
pub use master::RunMasterCommand;
pub use world::WorldUseCases;
