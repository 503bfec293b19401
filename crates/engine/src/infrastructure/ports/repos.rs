//! Repository port traits for row storage.
//!
//! Every row carries a version counter. Writers pass back the version they
//! read and the store refuses the write with `RepoError::Conflict` if the row
//! has moved on since.

use async_trait::async_trait;
use herotycoon_domain::{Guild, GuildId, Hero, HeroId, World, WorldId};

use super::error::RepoError;

/// A row together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

impl<T> Versioned<T> {
    pub fn new(value: T, version: u64) -> Self {
        Self { value, version }
    }
}

/// Hero and guild state produced by one resolution, with the versions they were read at.
#[derive(Debug, Clone)]
pub struct ResolutionCommit {
    pub hero: Hero,
    pub hero_version: u64,
    pub guild: Option<(Guild, u64)>,
}

/// Versions written by a successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitVersions {
    pub hero: u64,
    pub guild: Option<u64>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HeroRepo: Send + Sync {
    async fn get(&self, id: HeroId) -> Result<Option<Versioned<Hero>>, RepoError>;
    async fn list_for_guild(&self, guild_id: GuildId) -> Result<Vec<Hero>, RepoError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GuildRepo: Send + Sync {
    async fn get(&self, id: GuildId) -> Result<Option<Versioned<Guild>>, RepoError>;
    /// Insert a new row at version 1.
    async fn create(&self, guild: &Guild) -> Result<u64, RepoError>;
    /// Overwrite the row if it is still at `expected_version`; returns the new version.
    async fn update(&self, guild: &Guild, expected_version: u64) -> Result<u64, RepoError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorldRepo: Send + Sync {
    async fn get(&self, id: WorldId) -> Result<Option<Versioned<World>>, RepoError>;
    async fn create(&self, world: &World) -> Result<u64, RepoError>;
    async fn update(&self, world: &World, expected_version: u64) -> Result<u64, RepoError>;
}

/// Multi-row writes that must land together or not at all.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResolutionStore: Send + Sync {
    /// Write the hero (and guild) iff both are still at the versions they were read at.
    async fn commit_resolution(&self, commit: ResolutionCommit)
        -> Result<CommitVersions, RepoError>;

    /// Insert a new hero and update its guild's roster in one step.
    async fn commit_recruit(
        &self,
        hero: Hero,
        guild: Guild,
        guild_version: u64,
    ) -> Result<u64, RepoError>;
}
