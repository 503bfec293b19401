//! Clock and random implementations.
//!
//! The event-spawn roll and the fallback oracle's choice are the only
//! consumers of randomness; everything else in the engine is deterministic.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use crate::infrastructure::ports::{ClockPort, RandomPort};

/// System clock - uses real time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockPort for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Thread-local entropy.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRandom;

impl RandomPort for SystemRandom {
    fn gen_range(&self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }

    fn gen_unit(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }

    fn gen_uuid(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Reproducible random source, selected with `RNG_SEED`.
///
/// Replaying the same request sequence against the same seed yields the same
/// event rolls and fallback choices.
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        // A poisoned lock still holds a usable generator.
        let mut guard = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

impl RandomPort for SeededRandom {
    fn gen_range(&self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        self.with_rng(|rng| rng.gen_range(min..=max))
    }

    fn gen_unit(&self) -> f64 {
        self.with_rng(|rng| rng.gen::<f64>())
    }

    fn gen_uuid(&self) -> Uuid {
        let bytes = self.with_rng(|rng| rng.gen::<[u8; 16]>());
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }
}

/// Fixed clock for testing.
#[cfg(test)]
pub struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl ClockPort for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Fixed random for testing: `gen_range` returns `index` clamped into range,
/// `gen_unit` returns `unit`.
#[cfg(test)]
pub struct FixedRandom {
    pub index: i32,
    pub unit: f64,
}

#[cfg(test)]
impl FixedRandom {
    pub fn new(index: i32, unit: f64) -> Self {
        Self { index, unit }
    }
}

#[cfg(test)]
impl RandomPort for FixedRandom {
    fn gen_range(&self, min: i32, max: i32) -> i32 {
        self.index.clamp(min, max.max(min))
    }

    fn gen_unit(&self) -> f64 {
        self.unit
    }

    fn gen_uuid(&self) -> Uuid {
        Uuid::nil()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_random_is_reproducible() {
        let a = SeededRandom::new(42);
        let b = SeededRandom::new(42);
        let seq_a: Vec<i32> = (0..20).map(|_| a.gen_range(0, 5)).collect();
        let seq_b: Vec<i32> = (0..20).map(|_| b.gen_range(0, 5)).collect();
        assert_eq!(seq_a, seq_b);
        assert!(seq_a.iter().all(|v| (0..=5).contains(v)));
    }

    #[test]
    fn unit_rolls_stay_in_half_open_interval() {
        let rng = SeededRandom::new(7);
        for _ in 0..1000 {
            let roll = rng.gen_unit();
            assert!((0.0..1.0).contains(&roll));
        }
    }

    #[test]
    fn degenerate_range_returns_min() {
        assert_eq!(SystemRandom.gen_range(3, 3), 3);
        assert_eq!(SeededRandom::new(1).gen_range(4, 2), 4);
    }
}
