//! In-memory row store.
//!
//! Rows live in `DashMap`s; every write goes through one async mutex so that a
//! version check and the write it guards can't interleave with another writer.

use async_trait::async_trait;
use dashmap::DashMap;
use herotycoon_domain::{Guild, GuildId, Hero, HeroId, World, WorldId};
use tokio::sync::Mutex;

use crate::infrastructure::ports::{
    CommitVersions, GuildRepo, HeroRepo, RepoError, ResolutionCommit, ResolutionStore, Versioned,
    WorldRepo,
};

#[derive(Default)]
pub struct InMemoryStore {
    heroes: DashMap<HeroId, Versioned<Hero>>,
    guilds: DashMap<GuildId, Versioned<Guild>>,
    worlds: DashMap<WorldId, Versioned<World>>,
    writer: Mutex<()>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a hero row directly, bypassing the recruit transaction.
    #[cfg(test)]
    pub fn put_hero(&self, hero: Hero) {
        self.heroes.insert(hero.id, Versioned::new(hero, 1));
    }

    #[cfg(test)]
    pub fn hero_version(&self, id: HeroId) -> Option<u64> {
        self.heroes.get(&id).map(|row| row.version)
    }
}

/// Check a row is still at `expected`.
fn check_version<K, T>(
    rows: &DashMap<K, Versioned<T>>,
    entity_type: &'static str,
    id: K,
    expected: u64,
) -> Result<(), RepoError>
where
    K: Eq + std::hash::Hash + std::fmt::Display + Copy,
{
    match rows.get(&id) {
        None => Err(RepoError::not_found(entity_type, id)),
        Some(row) if row.version != expected => Err(RepoError::conflict(entity_type, id)),
        Some(_) => Ok(()),
    }
}

#[async_trait]
impl HeroRepo for InMemoryStore {
    async fn get(&self, id: HeroId) -> Result<Option<Versioned<Hero>>, RepoError> {
        Ok(self.heroes.get(&id).map(|row| row.clone()))
    }

    async fn list_for_guild(&self, guild_id: GuildId) -> Result<Vec<Hero>, RepoError> {
        let mut heroes: Vec<Hero> = self
            .heroes
            .iter()
            .filter(|row| row.value.guild_id == guild_id)
            .map(|row| row.value.clone())
            .collect();
        heroes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(heroes)
    }
}

#[async_trait]
impl GuildRepo for InMemoryStore {
    async fn get(&self, id: GuildId) -> Result<Option<Versioned<Guild>>, RepoError> {
        Ok(self.guilds.get(&id).map(|row| row.clone()))
    }

    async fn create(&self, guild: &Guild) -> Result<u64, RepoError> {
        let _writer = self.writer.lock().await;
        if self.guilds.contains_key(&guild.id) {
            return Err(RepoError::conflict("Guild", guild.id));
        }
        self.guilds.insert(guild.id, Versioned::new(guild.clone(), 1));
        Ok(1)
    }

    async fn update(&self, guild: &Guild, expected_version: u64) -> Result<u64, RepoError> {
        let _writer = self.writer.lock().await;
        check_version(&self.guilds, "Guild", guild.id, expected_version)?;
        let version = expected_version + 1;
        self.guilds
            .insert(guild.id, Versioned::new(guild.clone(), version));
        Ok(version)
    }
}

#[async_trait]
impl WorldRepo for InMemoryStore {
    async fn get(&self, id: WorldId) -> Result<Option<Versioned<World>>, RepoError> {
        Ok(self.worlds.get(&id).map(|row| row.clone()))
    }

    async fn create(&self, world: &World) -> Result<u64, RepoError> {
        let _writer = self.writer.lock().await;
        if self.worlds.contains_key(&world.id) {
            return Err(RepoError::conflict("World", world.id));
        }
        self.worlds.insert(world.id, Versioned::new(world.clone(), 1));
        Ok(1)
    }

    async fn update(&self, world: &World, expected_version: u64) -> Result<u64, RepoError> {
        let _writer = self.writer.lock().await;
        check_version(&self.worlds, "World", world.id, expected_version)?;
        let version = expected_version + 1;
        self.worlds
            .insert(world.id, Versioned::new(world.clone(), version));
        Ok(version)
    }
}

#[async_trait]
impl ResolutionStore for InMemoryStore {
    async fn commit_resolution(
        &self,
        commit: ResolutionCommit,
    ) -> Result<CommitVersions, RepoError> {
        let _writer = self.writer.lock().await;

        // Check every row before touching any of them.
        check_version(&self.heroes, "Hero", commit.hero.id, commit.hero_version)?;
        if let Some((guild, version)) = &commit.guild {
            check_version(&self.guilds, "Guild", guild.id, *version)?;
        }

        let hero_version = commit.hero_version + 1;
        self.heroes
            .insert(commit.hero.id, Versioned::new(commit.hero, hero_version));

        let guild_version = commit.guild.map(|(guild, version)| {
            let next = version + 1;
            self.guilds.insert(guild.id, Versioned::new(guild, next));
            next
        });

        Ok(CommitVersions {
            hero: hero_version,
            guild: guild_version,
        })
    }

    async fn commit_recruit(
        &self,
        hero: Hero,
        guild: Guild,
        guild_version: u64,
    ) -> Result<u64, RepoError> {
        let _writer = self.writer.lock().await;

        check_version(&self.guilds, "Guild", guild.id, guild_version)?;
        if self.heroes.contains_key(&hero.id) {
            return Err(RepoError::conflict("Hero", hero.id));
        }

        self.heroes.insert(hero.id, Versioned::new(hero, 1));
        let next = guild_version + 1;
        self.guilds.insert(guild.id, Versioned::new(guild, next));
        Ok(next)
    }
}
