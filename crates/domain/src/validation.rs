//! Invariant checks for persisted entities.
//!
//! Each validator reports the first violation it finds as a specific reason.
//! They are pure and never mutate their input.

use std::collections::HashSet;

use thiserror::Error;

use crate::balance::{
    MAX_ACTIVE_EVENTS, MAX_FEAR, MAX_HEROES_PER_GUILD, MAX_MOOD, MAX_RELATIONSHIP, MAX_RESPECT,
    MAX_TRAIT, MAX_TRUST, MIN_MOOD, MIN_RELATIONSHIP,
};
use crate::entities::{Guild, Hero, World};
use crate::{HeroId, LocationId};

/// Why an entity snapshot is not in a legal state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("Stat {stat} is negative ({value})")]
    NegativeStat { stat: &'static str, value: i64 },

    #[error("Health {health} exceeds max health {max}")]
    HealthExceedsMax { health: i32, max: i32 },

    #[error("Energy {energy} exceeds max energy {max}")]
    EnergyExceedsMax { energy: i32, max: i32 },

    #[error("Trait {name} out of range: {value}")]
    TraitOutOfRange { name: &'static str, value: i32 },

    #[error("Master relation {name} out of range: {value}")]
    RelationOutOfRange { name: &'static str, value: i32 },

    #[error("Mood out of range: {0}")]
    MoodOutOfRange(i32),

    #[error("Relationship with hero {other} out of range: {value}")]
    RelationshipOutOfRange { other: HeroId, value: i32 },

    #[error("Resource {resource} is negative ({value})")]
    NegativeResource { resource: String, value: i64 },

    #[error("Hero {0} listed more than once")]
    DuplicateHero(HeroId),

    #[error("Guild has {count} heroes (max {max})")]
    TooManyHeroes { count: usize, max: usize },

    #[error("World has {count} active events (max {max})")]
    TooManyActiveEvents { count: usize, max: usize },

    #[error("Location {location} difficulty {value} outside 1..=10")]
    DifficultyOutOfRange { location: LocationId, value: u8 },

    #[error("Event placed at unknown location {0}")]
    EventAtUnknownLocation(LocationId),
}

fn non_negative(stat: &'static str, value: i64) -> Result<(), InvariantViolation> {
    if value < 0 {
        return Err(InvariantViolation::NegativeStat { stat, value });
    }
    Ok(())
}

pub fn validate_hero(hero: &Hero) -> Result<(), InvariantViolation> {
    let s = &hero.stats;
    non_negative("experience", s.experience)?;
    for (stat, value) in [
        ("health", s.health),
        ("maxHealth", s.max_health),
        ("energy", s.energy),
        ("maxEnergy", s.max_energy),
        ("combat", s.combat),
        ("magic", s.magic),
        ("crafting", s.crafting),
        ("exploration", s.exploration),
    ] {
        non_negative(stat, i64::from(value))?;
    }
    if s.health > s.max_health {
        return Err(InvariantViolation::HealthExceedsMax {
            health: s.health,
            max: s.max_health,
        });
    }
    if s.energy > s.max_energy {
        return Err(InvariantViolation::EnergyExceedsMax {
            energy: s.energy,
            max: s.max_energy,
        });
    }

    for (name, value) in hero.personality.entries() {
        if !(0..=MAX_TRAIT).contains(&value) {
            return Err(InvariantViolation::TraitOutOfRange {
                name: name.name(),
                value,
            });
        }
    }

    let relation = &hero.master_relation;
    for (name, value, max) in [
        ("trust", relation.trust, MAX_TRUST),
        ("respect", relation.respect, MAX_RESPECT),
        ("fear", relation.fear, MAX_FEAR),
    ] {
        if !(0..=max).contains(&value) {
            return Err(InvariantViolation::RelationOutOfRange { name, value });
        }
    }

    if !(MIN_MOOD..=MAX_MOOD).contains(&hero.mood) {
        return Err(InvariantViolation::MoodOutOfRange(hero.mood));
    }

    for (other, value) in &hero.relationships {
        if !(MIN_RELATIONSHIP..=MAX_RELATIONSHIP).contains(value) {
            return Err(InvariantViolation::RelationshipOutOfRange {
                other: *other,
                value: *value,
            });
        }
    }
    Ok(())
}

pub fn validate_guild(guild: &Guild) -> Result<(), InvariantViolation> {
    for (resource, value) in guild.resources.iter() {
        if value < 0 {
            return Err(InvariantViolation::NegativeResource {
                resource: resource.to_string(),
                value,
            });
        }
    }

    let mut seen = HashSet::with_capacity(guild.hero_ids.len());
    for id in &guild.hero_ids {
        if !seen.insert(*id) {
            return Err(InvariantViolation::DuplicateHero(*id));
        }
    }
    if guild.hero_ids.len() > MAX_HEROES_PER_GUILD {
        return Err(InvariantViolation::TooManyHeroes {
            count: guild.hero_ids.len(),
            max: MAX_HEROES_PER_GUILD,
        });
    }

    non_negative("experience", guild.experience)?;
    non_negative("reputation", guild.reputation)?;
    Ok(())
}

pub fn validate_world(world: &World) -> Result<(), InvariantViolation> {
    for location in &world.locations {
        if !(1..=10).contains(&location.difficulty) {
            return Err(InvariantViolation::DifficultyOutOfRange {
                location: location.id,
                value: location.difficulty,
            });
        }
    }

    let active = world.active_event_count();
    if active > MAX_ACTIVE_EVENTS {
        return Err(InvariantViolation::TooManyActiveEvents {
            count: active,
            max: MAX_ACTIVE_EVENTS,
        });
    }

    for event in &world.events {
        if let Some(location_id) = event.location_id {
            if world.location(location_id).is_none() {
                return Err(InvariantViolation::EventAtUnknownLocation(location_id));
            }
        }
    }

    for (resource, value) in world.total_resources.iter() {
        if value < 0 {
            return Err(InvariantViolation::NegativeResource {
                resource: resource.to_string(),
                value,
            });
        }
    }
    Ok(())
}
