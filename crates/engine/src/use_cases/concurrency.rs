//! Single-writer discipline shared by the use cases.
//!
//! Every read-modify-write cycle runs under the entity's keyed lock, and every
//! write carries the version it read. A version conflict (another process, or a
//! writer that bypassed the lock) restarts the cycle from a fresh read, up to
//! `max_attempts` times.

use std::future::Future;

use herotycoon_domain::{GuildId, HeroId, WorldId};

use crate::infrastructure::locks::KeyedLocks;
use crate::infrastructure::ports::RepoError;

/// One lock table per entity type.
#[derive(Default)]
pub struct EntityLocks {
    pub heroes: KeyedLocks<HeroId>,
    pub guilds: KeyedLocks<GuildId>,
    pub worlds: KeyedLocks<WorldId>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Errors that can report an optimistic version conflict.
pub trait ConflictAware {
    fn is_conflict(&self) -> bool;
}

impl ConflictAware for RepoError {
    fn is_conflict(&self) -> bool {
        RepoError::is_conflict(self)
    }
}

/// Run `attempt` until it succeeds, fails with something other than a
/// conflict, or `max_attempts` is used up. The last error is returned as-is.
pub async fn retry_on_conflict<T, E, F, Fut>(
    max_attempts: u32,
    what: &'static str,
    mut attempt: F,
) -> Result<T, E>
where
    E: ConflictAware + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = max_attempts.max(1);
    let mut tries = 1;
    loop {
        match attempt().await {
            Err(e) if e.is_conflict() && tries < max_attempts => {
                tracing::debug!(operation = what, attempt = tries, error = %e, "Version conflict, retrying");
                tries += 1;
            }
            result => return result,
        }
    }
}
