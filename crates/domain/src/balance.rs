//! Game balance constants.
//!
//! Per-action numbers live in the action catalog; these are the global knobs.

/// Maximum heroes a single guild may own.
pub const MAX_HEROES_PER_GUILD: usize = 20;

/// Maximum concurrently active events in a world.
pub const MAX_ACTIVE_EVENTS: usize = 3;

/// Probability (0..1) that a spawn request actually produces an event.
pub const EVENT_SPAWN_CHANCE: f64 = 0.1;

/// Default duration of a spawned world event, in hours.
pub const DEFAULT_EVENT_DURATION_HOURS: u32 = 24;

pub const MAX_TRUST: i32 = 100;
pub const MAX_RESPECT: i32 = 100;
pub const MAX_FEAR: i32 = 100;

/// Personality traits are percentages.
pub const MAX_TRAIT: i32 = 100;

/// Mood is signed: -100 (miserable) to 100 (elated).
pub const MIN_MOOD: i32 = -100;
pub const MAX_MOOD: i32 = 100;

/// Hero-to-hero relationship bounds.
pub const MIN_RELATIONSHIP: i32 = -100;
pub const MAX_RELATIONSHIP: i32 = 100;

pub const BASE_EXPERIENCE_GAIN: i64 = 10;
pub const LEVEL_UP_MULTIPLIER: f64 = 1.5;

/// Starting hero pools.
pub const STARTING_MAX_HEALTH: i32 = 100;
pub const STARTING_MAX_ENERGY: i32 = 100;

/// Resources every new guild and world starts with.
pub const STARTING_RESOURCES: [(&str, i64); 4] =
    [("gold", 1000), ("wood", 50), ("stone", 30), ("food", 100)];

/// Experience needed to leave `level`.
///
/// `BASE_EXPERIENCE_GAIN * LEVEL_UP_MULTIPLIER^level`, floored, never below 1.
pub fn level_up_threshold(level: u32) -> i64 {
    let exponent = i32::try_from(level).unwrap_or(i32::MAX);
    let raw = BASE_EXPERIENCE_GAIN as f64 * LEVEL_UP_MULTIPLIER.powi(exponent);
    if raw.is_finite() && raw < i64::MAX as f64 {
        (raw.floor() as i64).max(1)
    } else {
        i64::MAX
    }
}
