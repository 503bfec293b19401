//! SQLite row store.
//!
//! Each entity is one JSON document per row plus a version counter. Guarded
//! writes use `WHERE version = ?`; multi-row commits run in one transaction.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use herotycoon_domain::{Guild, GuildId, Hero, HeroId, World, WorldId};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::infrastructure::ports::{
    ClockPort, CommitVersions, GuildRepo, HeroRepo, RepoError, ResolutionCommit, ResolutionStore,
    Versioned, WorldRepo,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS heroes (
        id TEXT PRIMARY KEY,
        guild_id TEXT NOT NULL,
        data TEXT NOT NULL,
        version INTEGER NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS heroes_guild_id ON heroes (guild_id)",
    r#"
    CREATE TABLE IF NOT EXISTS guilds (
        id TEXT PRIMARY KEY,
        world_id TEXT NOT NULL,
        data TEXT NOT NULL,
        version INTEGER NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS worlds (
        id TEXT PRIMARY KEY,
        player_id TEXT NOT NULL,
        data TEXT NOT NULL,
        version INTEGER NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
];

/// Table name plus the one indexed foreign column each table carries.
#[derive(Clone, Copy)]
struct Table {
    name: &'static str,
    owner_column: &'static str,
    entity_type: &'static str,
}

const HEROES: Table = Table {
    name: "heroes",
    owner_column: "guild_id",
    entity_type: "Hero",
};
const GUILDS: Table = Table {
    name: "guilds",
    owner_column: "world_id",
    entity_type: "Guild",
};
const WORLDS: Table = Table {
    name: "worlds",
    owner_column: "player_id",
    entity_type: "World",
};

pub struct SqliteStore {
    pool: SqlitePool,
    clock: Arc<dyn ClockPort>,
}

impl SqliteStore {
    /// Connect to a `sqlite:` URL, creating the file and tables if needed.
    pub async fn connect(url: &str, clock: Arc<dyn ClockPort>) -> Result<Self, RepoError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| RepoError::database("connect", e))?
            .create_if_missing(true);

        // Every connection to `:memory:` would get its own empty database.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| RepoError::database("connect", e))?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| RepoError::database("migrate", e))?;
        }

        Ok(Self { pool, clock })
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        table: Table,
        id: String,
    ) -> Result<Option<Versioned<T>>, RepoError> {
        let row = sqlx::query(&format!(
            "SELECT data, version FROM {} WHERE id = ?",
            table.name
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::database("fetch", e))?;

        row.map(|row| {
            let data: String = row.get("data");
            let version: i64 = row.get("version");
            let value = serde_json::from_str(&data).map_err(RepoError::serialization)?;
            Ok(Versioned::new(value, version as u64))
        })
        .transpose()
    }

    async fn create_row<T: Serialize>(
        &self,
        table: Table,
        id: String,
        owner: String,
        value: &T,
    ) -> Result<u64, RepoError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| RepoError::database("acquire", e))?;
        insert(&mut conn, table, &id, &owner, value, &self.now()).await?;
        Ok(1)
    }

    async fn update_row<T: Serialize>(
        &self,
        table: Table,
        id: String,
        value: &T,
        expected_version: u64,
    ) -> Result<u64, RepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("begin", e))?;
        let version = guarded_update(&mut tx, table, &id, value, expected_version, &self.now()).await?;
        tx.commit()
            .await
            .map_err(|e| RepoError::database("commit", e))?;
        Ok(version)
    }

    fn now(&self) -> String {
        self.clock.now().to_rfc3339()
    }
}

async fn insert<T: Serialize>(
    conn: &mut SqliteConnection,
    table: Table,
    id: &str,
    owner: &str,
    value: &T,
    now: &str,
) -> Result<(), RepoError> {
    let data = serde_json::to_string(value).map_err(RepoError::serialization)?;
    let result = sqlx::query(&format!(
        "INSERT INTO {} (id, {}, data, version, updated_at) VALUES (?, ?, ?, 1, ?) \
         ON CONFLICT(id) DO NOTHING",
        table.name, table.owner_column
    ))
    .bind(id)
    .bind(owner)
    .bind(data)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(|e| RepoError::database("insert", e))?;

    if result.rows_affected() == 0 {
        return Err(RepoError::conflict(table.entity_type, id));
    }
    Ok(())
}

/// Overwrite a row iff it is still at `expected_version`; returns the new version.
async fn guarded_update<T: Serialize>(
    conn: &mut SqliteConnection,
    table: Table,
    id: &str,
    value: &T,
    expected_version: u64,
    now: &str,
) -> Result<u64, RepoError> {
    let data = serde_json::to_string(value).map_err(RepoError::serialization)?;
    let result = sqlx::query(&format!(
        "UPDATE {} SET data = ?, version = version + 1, updated_at = ? \
         WHERE id = ? AND version = ?",
        table.name
    ))
    .bind(data)
    .bind(now)
    .bind(id)
    .bind(expected_version as i64)
    .execute(&mut *conn)
    .await
    .map_err(|e| RepoError::database("update", e))?;

    if result.rows_affected() == 1 {
        return Ok(expected_version + 1);
    }

    // Tell a vanished row apart from a moved one.
    let exists = sqlx::query(&format!("SELECT 1 FROM {} WHERE id = ?", table.name))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| RepoError::database("update", e))?
        .is_some();
    if exists {
        Err(RepoError::conflict(table.entity_type, id))
    } else {
        Err(RepoError::not_found(table.entity_type, id))
    }
}

#[async_trait]
impl HeroRepo for SqliteStore {
    async fn get(&self, id: HeroId) -> Result<Option<Versioned<Hero>>, RepoError> {
        self.fetch(HEROES, id.to_string()).await
    }

    async fn list_for_guild(&self, guild_id: GuildId) -> Result<Vec<Hero>, RepoError> {
        let rows = sqlx::query("SELECT data FROM heroes WHERE guild_id = ?")
            .bind(guild_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("list_heroes", e))?;

        let mut heroes = rows
            .into_iter()
            .map(|row| {
                let data: String = row.get("data");
                serde_json::from_str::<Hero>(&data).map_err(RepoError::serialization)
            })
            .collect::<Result<Vec<_>, _>>()?;
        heroes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(heroes)
    }
}

#[async_trait]
impl GuildRepo for SqliteStore {
    async fn get(&self, id: GuildId) -> Result<Option<Versioned<Guild>>, RepoError> {
        self.fetch(GUILDS, id.to_string()).await
    }

    async fn create(&self, guild: &Guild) -> Result<u64, RepoError> {
        self.create_row(GUILDS, guild.id.to_string(), guild.world_id.to_string(), guild)
            .await
    }

    async fn update(&self, guild: &Guild, expected_version: u64) -> Result<u64, RepoError> {
        self.update_row(GUILDS, guild.id.to_string(), guild, expected_version)
            .await
    }
}

#[async_trait]
impl WorldRepo for SqliteStore {
    async fn get(&self, id: WorldId) -> Result<Option<Versioned<World>>, RepoError> {
        self.fetch(WORLDS, id.to_string()).await
    }

    async fn create(&self, world: &World) -> Result<u64, RepoError> {
        self.create_row(WORLDS, world.id.to_string(), world.player_id.to_string(), world)
            .await
    }

    async fn update(&self, world: &World, expected_version: u64) -> Result<u64, RepoError> {
        self.update_row(WORLDS, world.id.to_string(), world, expected_version)
            .await
    }
}

#[async_trait]
impl ResolutionStore for SqliteStore {
    async fn commit_resolution(
        &self,
        commit: ResolutionCommit,
    ) -> Result<CommitVersions, RepoError> {
        let now = self.now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("begin", e))?;

        // Any early return drops `tx`, which rolls back.
        let hero = guarded_update(
            &mut tx,
            HEROES,
            &commit.hero.id.to_string(),
            &commit.hero,
            commit.hero_version,
            &now,
        )
        .await?;

        let guild = match &commit.guild {
            Some((guild, version)) => Some(
                guarded_update(&mut tx, GUILDS, &guild.id.to_string(), guild, *version, &now)
                    .await?,
            ),
            None => None,
        };

        tx.commit()
            .await
            .map_err(|e| RepoError::database("commit", e))?;

        Ok(CommitVersions { hero, guild })
    }

    async fn commit_recruit(
        &self,
        hero: Hero,
        guild: Guild,
        guild_version: u64,
    ) -> Result<u64, RepoError> {
        let now = self.now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("begin", e))?;

        let version =
            guarded_update(&mut tx, GUILDS, &guild.id.to_string(), &guild, guild_version, &now)
                .await?;
        insert(
            &mut tx,
            HEROES,
            &hero.id.to_string(),
            &hero.guild_id.to_string(),
            &hero,
            &now,
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| RepoError::database("commit", e))?;
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use chrono::{TimeZone, Utc};
    use herotycoon_domain::{HeroClass, PlayerId};

    async fn open(dir: &tempfile::TempDir) -> SqliteStore {
        let path = dir.path().join("herotycoon.db");
        let clock: Arc<dyn ClockPort> =
            Arc::new(FixedClock(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
        SqliteStore::connect(&format!("sqlite:{}", path.display()), clock)
            .await
            .expect("open store")
    }

    async fn seeded(store: &SqliteStore) -> (Guild, Hero) {
        let mut guild =
            Guild::new("Iron Lions", PlayerId::new(), WorldId::new(), Utc::now()).unwrap();
        GuildRepo::create(store, &guild).await.unwrap();
        let hero = Hero::recruit(guild.id, "Ilsa", HeroClass::Ranger, Utc::now()).unwrap();
        guild.add_hero(hero.id).unwrap();
        let version = store
            .commit_recruit(hero.clone(), guild.clone(), 1)
            .await
            .unwrap();
        assert_eq!(version, 2);
        (guild, hero)
    }

    #[tokio::test]
    async fn rows_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (guild, hero) = {
            let store = open(&dir).await;
            seeded(&store).await
        };

        let store = open(&dir).await;
        let row = HeroRepo::get(&store, hero.id).await.unwrap().unwrap();
        assert_eq!(row.value, hero);
        assert_eq!(row.version, 1);

        let guild_row = GuildRepo::get(&store, guild.id).await.unwrap().unwrap();
        assert_eq!(guild_row.version, 2);
        assert_eq!(guild_row.value.hero_ids, vec![hero.id]);
    }

    #[tokio::test]
    async fn stale_guild_version_rolls_back_hero_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open(&dir).await;
        let (guild, hero) = seeded(&store).await;

        let mut changed = hero.clone();
        changed.mood = 25;
        let err = store
            .commit_resolution(ResolutionCommit {
                hero: changed,
                hero_version: 1,
                guild: Some((guild, 1)),
            })
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let row = HeroRepo::get(&store, hero.id).await.unwrap().unwrap();
        assert_eq!(row.version, 1);
        assert_eq!(row.value.mood, 0);
    }

    #[tokio::test]
    async fn pair_commit_bumps_versions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open(&dir).await;
        let (guild, hero) = seeded(&store).await;

        let versions = store
            .commit_resolution(ResolutionCommit {
                hero: hero.clone(),
                hero_version: 1,
                guild: Some((guild, 2)),
            })
            .await
            .unwrap();
        assert_eq!(versions.hero, 2);
        assert_eq!(versions.guild, Some(2 + 1));

        let heroes = store.list_for_guild(hero.guild_id).await.unwrap();
        assert_eq!(heroes.len(), 1);
    }

    #[tokio::test]
    async fn update_of_missing_row_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open(&dir).await;
        let world = World::generate(PlayerId::new(), "Realm", "seed", Utc::now()).unwrap();
        let err = WorldRepo::update(&store, &world, 1).await.unwrap_err();
        assert!(err.is_not_found());

        WorldRepo::create(&store, &world).await.unwrap();
        assert!(WorldRepo::create(&store, &world).await.unwrap_err().is_conflict());
        assert_eq!(WorldRepo::update(&store, &world, 1).await.unwrap(), 2);
        assert!(WorldRepo::update(&store, &world, 1).await.unwrap_err().is_conflict());
    }
}
