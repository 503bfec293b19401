//! World entity - locations, active events and the time-of-day cycle.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::resources::ResourceBag;
use crate::balance::{DEFAULT_EVENT_DURATION_HOURS, EVENT_SPAWN_CHANCE, MAX_ACTIVE_EVENTS};
use crate::error::DomainError;
use crate::{LocationId, PlayerId, WorldEventId, WorldId};

// =============================================================================
// Time of day
// =============================================================================

/// Time of day. Advances one step per tick and wraps from night to dawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Dawn,
    #[default]
    Morning,
    Noon,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Dawn => "dawn",
            TimeOfDay::Morning => "morning",
            TimeOfDay::Noon => "noon",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
            TimeOfDay::Night => "night",
        }
    }

    /// Returns the next time period in sequence.
    pub fn next(&self) -> TimeOfDay {
        match self {
            TimeOfDay::Dawn => TimeOfDay::Morning,
            TimeOfDay::Morning => TimeOfDay::Noon,
            TimeOfDay::Noon => TimeOfDay::Afternoon,
            TimeOfDay::Afternoon => TimeOfDay::Evening,
            TimeOfDay::Evening => TimeOfDay::Night,
            TimeOfDay::Night => TimeOfDay::Dawn,
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    #[default]
    Sunny,
    Cloudy,
    Rainy,
    Stormy,
}

// =============================================================================
// Locations
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Dungeon,
    Town,
    Wilderness,
    ResourceNode,
    GuildHall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Biome {
    Forest,
    Mountain,
    Desert,
    Swamp,
}

impl Biome {
    pub fn display_name(&self) -> &'static str {
        match self {
            Biome::Forest => "Forest",
            Biome::Mountain => "Mountain",
            Biome::Desert => "Desert",
            Biome::Swamp => "Swamp",
        }
    }

    pub fn resources(&self) -> [&'static str; 3] {
        match self {
            Biome::Forest => ["wood", "herbs", "berries"],
            Biome::Mountain => ["stone", "iron", "gems"],
            Biome::Desert => ["sand", "crystal", "cactus"],
            Biome::Swamp => ["moss", "poison", "bones"],
        }
    }

    pub fn monsters(&self) -> [&'static str; 3] {
        match self {
            Biome::Forest => ["wolf", "bear", "treant"],
            Biome::Mountain => ["dragon", "giant", "harpy"],
            Biome::Desert => ["scorpion", "mummy", "sphinx"],
            Biome::Swamp => ["troll", "witch", "basilisk"],
        }
    }

    pub fn difficulty_modifier(&self) -> f64 {
        match self {
            Biome::Forest => 1.0,
            Biome::Mountain => 1.5,
            Biome::Desert => 1.3,
            Biome::Swamp => 1.4,
        }
    }
}

/// A discoverable place. Immutable once generated, except for `is_discovered`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldLocation {
    pub id: LocationId,
    pub name: String,
    #[serde(rename = "type")]
    pub location_type: LocationType,
    pub biome: Biome,
    pub x: i32,
    pub y: i32,
    /// 1 (trivial) to 10 (deadly)
    pub difficulty: u8,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub monsters: Vec<String>,
    pub is_discovered: bool,
}

impl WorldLocation {
    pub fn new(
        name: impl Into<String>,
        location_type: LocationType,
        biome: Biome,
        (x, y): (i32, i32),
        difficulty: u8,
    ) -> Self {
        Self {
            id: LocationId::new(),
            name: name.into(),
            location_type,
            biome,
            x,
            y,
            difficulty: difficulty.clamp(1, 10),
            resources: biome.resources().iter().map(|s| s.to_string()).collect(),
            monsters: Vec::new(),
            is_discovered: false,
        }
    }

    pub fn with_monsters(mut self) -> Self {
        self.monsters = self.biome.monsters().iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn discovered(mut self) -> Self {
        self.is_discovered = true;
        self
    }
}

// =============================================================================
// Events
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldEventType {
    MonsterInvasion,
    Festival,
    NaturalDisaster,
    MerchantCaravan,
}

impl WorldEventType {
    pub fn all() -> [WorldEventType; 4] {
        [
            WorldEventType::MonsterInvasion,
            WorldEventType::Festival,
            WorldEventType::NaturalDisaster,
            WorldEventType::MerchantCaravan,
        ]
    }

    /// Human-readable form, e.g. "monster invasion".
    pub fn display_name(&self) -> &'static str {
        match self {
            WorldEventType::MonsterInvasion => "monster invasion",
            WorldEventType::Festival => "festival",
            WorldEventType::NaturalDisaster => "natural disaster",
            WorldEventType::MerchantCaravan => "merchant caravan",
        }
    }
}

impl FromStr for WorldEventType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "monster_invasion" => Ok(Self::MonsterInvasion),
            "festival" => Ok(Self::Festival),
            "natural_disaster" => Ok(Self::NaturalDisaster),
            "merchant_caravan" => Ok(Self::MerchantCaravan),
            other => Err(DomainError::parse(format!("Unknown world event type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldEvent {
    pub id: WorldEventId,
    #[serde(rename = "type")]
    pub event_type: WorldEventType,
    pub name: String,
    pub description: String,
    pub location_id: Option<LocationId>,
    pub start_time: DateTime<Utc>,
    pub duration_hours: u32,
    #[serde(default)]
    pub effects: BTreeMap<String, f64>,
    pub is_active: bool,
}

impl WorldEvent {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.start_time + Duration::hours(i64::from(self.duration_hours))
    }
}

/// Inputs for a spawn attempt. Randomness is rolled by the caller.
#[derive(Debug, Clone, Copy)]
pub struct EventRoll {
    /// Uniform roll in [0, 1); the event fires when below `EVENT_SPAWN_CHANCE`
    pub chance: f64,
    pub event_type: WorldEventType,
}

// =============================================================================
// World
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct World {
    pub id: WorldId,
    pub player_id: PlayerId,
    pub name: String,
    pub seed: String,
    #[serde(default)]
    pub lore: String,
    pub created_at: DateTime<Utc>,
    pub locations: Vec<WorldLocation>,
    #[serde(default)]
    pub events: Vec<WorldEvent>,
    pub total_resources: ResourceBag,
    pub time_of_day: TimeOfDay,
    #[serde(default)]
    pub weather: Weather,
}

impl World {
    /// Create a world with the standard starting map: a discovered village and
    /// one undiscovered site per biome.
    pub fn generate(
        player_id: PlayerId,
        name: impl Into<String>,
        seed: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("World name cannot be empty"));
        }

        let mut locations = vec![WorldLocation::new(
            "Starting Village",
            LocationType::Town,
            Biome::Forest,
            (500, 500),
            1,
        )
        .discovered()];

        let sites = [
            (Biome::Forest, LocationType::Wilderness, "Whispering Woods", (300, 420)),
            (Biome::Mountain, LocationType::ResourceNode, "Ironspine Quarry", (720, 180)),
            (Biome::Desert, LocationType::Dungeon, "Sunken Tomb", (860, 640)),
            (Biome::Swamp, LocationType::Dungeon, "Mirefen Hollow", (180, 800)),
        ];
        for (biome, location_type, site_name, coords) in sites {
            let base = if location_type == LocationType::Dungeon { 4.0 } else { 2.0 };
            let difficulty = (base * biome.difficulty_modifier()).round() as u8;
            locations.push(
                WorldLocation::new(site_name, location_type, biome, coords, difficulty)
                    .with_monsters(),
            );
        }

        Ok(Self {
            id: WorldId::new(),
            player_id,
            name,
            seed: seed.into(),
            lore: String::new(),
            created_at: now,
            locations,
            events: Vec::new(),
            total_resources: ResourceBag::starting(),
            time_of_day: TimeOfDay::Morning,
            weather: Weather::Sunny,
        })
    }

    pub fn with_id(mut self, id: WorldId) -> Self {
        self.id = id;
        self
    }

    pub fn with_lore(mut self, lore: impl Into<String>) -> Self {
        self.lore = lore.into();
        self
    }

    pub fn active_events(&self) -> impl Iterator<Item = &WorldEvent> {
        self.events.iter().filter(|e| e.is_active)
    }

    pub fn active_event_count(&self) -> usize {
        self.active_events().count()
    }

    pub fn discovered_locations(&self) -> impl Iterator<Item = &WorldLocation> {
        self.locations.iter().filter(|l| l.is_discovered)
    }

    pub fn location(&self, id: LocationId) -> Option<&WorldLocation> {
        self.locations.iter().find(|l| l.id == id)
    }

    /// Step to the next time of day and return it.
    pub fn advance_time(&mut self) -> TimeOfDay {
        self.time_of_day = self.time_of_day.next();
        self.time_of_day
    }

    /// Deactivate events whose duration has elapsed. Returns how many ended.
    pub fn expire_events(&mut self, now: DateTime<Utc>) -> usize {
        let mut ended = 0;
        for event in self.events.iter_mut().filter(|e| e.is_active) {
            if event.ends_at() <= now {
                event.is_active = false;
                ended += 1;
            }
        }
        ended
    }

    /// Try to spawn a random event.
    ///
    /// Nothing happens when the active list is at capacity, whatever the roll.
    pub fn spawn_event(&mut self, roll: EventRoll, now: DateTime<Utc>) -> Option<WorldEvent> {
        if self.active_event_count() >= MAX_ACTIVE_EVENTS {
            return None;
        }
        if !(roll.chance < EVENT_SPAWN_CHANCE) {
            return None;
        }

        let kind = roll.event_type.display_name();
        let event = WorldEvent {
            id: WorldEventId::new(),
            event_type: roll.event_type,
            name: format!("Random {}", kind),
            description: format!("A {} has occurred!", kind),
            location_id: self.locations.first().map(|l| l.id),
            start_time: now,
            duration_hours: DEFAULT_EVENT_DURATION_HOURS,
            effects: BTreeMap::from([("resource_gain".to_string(), 1.2)]),
            is_active: true,
        };
        self.events.push(event.clone());
        Some(event)
    }

    /// Mark a location discovered. Returns true if it was previously hidden.
    pub fn discover_location(&mut self, id: LocationId) -> Result<bool, DomainError> {
        let location = self
            .locations
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| DomainError::validation(format!("Unknown location: {}", id)))?;
        let newly = !location.is_discovered;
        location.is_discovered = true;
        Ok(newly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> World {
        World::generate(PlayerId::new(), "Test Realm", "test_seed_123", Utc::now()).unwrap()
    }

    fn hit() -> EventRoll {
        EventRoll {
            chance: 0.0,
            event_type: WorldEventType::Festival,
        }
    }

    #[test]
    fn time_cycles_through_all_six_periods() {
        let mut w = world();
        w.time_of_day = TimeOfDay::Dawn;
        let seen: Vec<TimeOfDay> = (0..6).map(|_| w.advance_time()).collect();
        assert_eq!(
            seen,
            vec![
                TimeOfDay::Morning,
                TimeOfDay::Noon,
                TimeOfDay::Afternoon,
                TimeOfDay::Evening,
                TimeOfDay::Night,
                TimeOfDay::Dawn,
            ]
        );
    }

    #[test]
    fn spawn_respects_the_roll() {
        let mut w = world();
        let miss = EventRoll {
            chance: 0.5,
            event_type: WorldEventType::Festival,
        };
        assert!(w.spawn_event(miss, Utc::now()).is_none());
        assert!(w.events.is_empty());

        let event = w.spawn_event(hit(), Utc::now()).unwrap();
        assert_eq!(event.name, "Random festival");
        assert_eq!(event.location_id, Some(w.locations[0].id));
        assert_eq!(w.active_event_count(), 1);
    }

    #[test]
    fn spawn_at_capacity_adds_nothing_regardless_of_roll() {
        let mut w = world();
        let now = Utc::now();
        for _ in 0..MAX_ACTIVE_EVENTS {
            assert!(w.spawn_event(hit(), now).is_some());
        }
        assert!(w.spawn_event(hit(), now).is_none());
        assert_eq!(w.events.len(), MAX_ACTIVE_EVENTS);
    }

    #[test]
    fn expired_events_free_capacity() {
        let mut w = world();
        let start = Utc::now();
        for _ in 0..MAX_ACTIVE_EVENTS {
            w.spawn_event(hit(), start);
        }
        let later = start + Duration::hours(25);
        assert_eq!(w.expire_events(later), MAX_ACTIVE_EVENTS);
        assert!(w.spawn_event(hit(), later).is_some());
    }

    #[test]
    fn discovering_flips_only_the_flag() {
        let mut w = world();
        let target = w.locations[2].clone();
        assert!(!target.is_discovered);
        assert!(w.discover_location(target.id).unwrap());
        assert!(!w.discover_location(target.id).unwrap());

        let after = w.location(target.id).unwrap();
        assert!(after.is_discovered);
        assert_eq!(after.name, target.name);
        assert_eq!(after.difficulty, target.difficulty);
    }

    #[test]
    fn generated_map_has_a_discovered_village() {
        let w = world();
        assert_eq!(w.locations.len(), 5);
        assert_eq!(w.discovered_locations().count(), 1);
        assert!(w.locations.iter().all(|l| (1..=10).contains(&l.difficulty)));
    }
}
