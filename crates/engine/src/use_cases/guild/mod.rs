//! Guild use cases.
//!
//! Guild resources only change through these transactions and through hero
//! action commits. Every write here runs under the guild's keyed lock.

use std::sync::Arc;

use herotycoon_domain::{
    DomainError, FacilityType, Guild, GuildError, GuildFacility, GuildId, Hero, HeroClass,
    PlayerId, WorldId,
};

use crate::infrastructure::ports::{
    ClockPort, DecisionOracle, DescribeKind, DescribeSubject, GuildRepo, HeroRepo, RepoError,
    ResolutionStore, WorldRepo,
};
use crate::use_cases::concurrency::{retry_on_conflict, ConflictAware, EntityLocks};
use crate::use_cases::validation::{require_key, require_name, require_parsed, ValidationError};

/// Container for guild use cases.
pub struct GuildUseCases {
    pub create: Arc<CreateGuild>,
    pub recruit: Arc<RecruitHero>,
    pub purchase_facility: Arc<PurchaseFacility>,
    pub set_policy: Arc<SetGuildPolicy>,
    pub get: Arc<GetGuild>,
    pub list_heroes: Arc<ListGuildHeroes>,
}

impl GuildUseCases {
    pub fn new(
        create: Arc<CreateGuild>,
        recruit: Arc<RecruitHero>,
        purchase_facility: Arc<PurchaseFacility>,
        set_policy: Arc<SetGuildPolicy>,
        get: Arc<GetGuild>,
        list_heroes: Arc<ListGuildHeroes>,
    ) -> Self {
        Self {
            create,
            recruit,
            purchase_facility,
            set_policy,
            get,
            list_heroes,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GuildOperationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Guild not found: {0}")]
    GuildNotFound(GuildId),
    #[error("World not found: {0}")]
    WorldNotFound(WorldId),
    /// A business rule refused the transaction.
    #[error(transparent)]
    Rejected(#[from] GuildError),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

impl ConflictAware for GuildOperationError {
    fn is_conflict(&self) -> bool {
        matches!(self, GuildOperationError::Repo(e) if e.is_conflict())
    }
}

/// Constructor failures are input problems; names are checked before we get here.
fn invalid(field_name: &'static str, e: DomainError) -> GuildOperationError {
    ValidationError::invalid(field_name, e.to_string()).into()
}

// =============================================================================
// Create
// =============================================================================

pub struct CreateGuild {
    guilds: Arc<dyn GuildRepo>,
    worlds: Arc<dyn WorldRepo>,
    clock: Arc<dyn ClockPort>,
}

impl CreateGuild {
    pub fn new(
        guilds: Arc<dyn GuildRepo>,
        worlds: Arc<dyn WorldRepo>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            guilds,
            worlds,
            clock,
        }
    }

    pub async fn execute(
        &self,
        master_id: PlayerId,
        world_id: WorldId,
        name: &str,
    ) -> Result<Guild, GuildOperationError> {
        let name = require_name(name, "name")?;
        if self.worlds.get(world_id).await?.is_none() {
            return Err(GuildOperationError::WorldNotFound(world_id));
        }

        let guild = Guild::new(name, master_id, world_id, self.clock.now())
            .map_err(|e| invalid("name", e))?;
        self.guilds.create(&guild).await?;

        tracing::info!(guild_id = %guild.id, world_id = %world_id, name = %guild.name, "Guild created");
        Ok(guild)
    }
}

// =============================================================================
// Recruit
// =============================================================================

/// Recruit a new hero: the hero row and the guild roster are written together.
pub struct RecruitHero {
    guilds: Arc<dyn GuildRepo>,
    store: Arc<dyn ResolutionStore>,
    oracle: Arc<dyn DecisionOracle>,
    locks: Arc<EntityLocks>,
    clock: Arc<dyn ClockPort>,
    max_attempts: u32,
}

impl RecruitHero {
    pub fn new(
        guilds: Arc<dyn GuildRepo>,
        store: Arc<dyn ResolutionStore>,
        oracle: Arc<dyn DecisionOracle>,
        locks: Arc<EntityLocks>,
        clock: Arc<dyn ClockPort>,
        max_attempts: u32,
    ) -> Self {
        Self {
            guilds,
            store,
            oracle,
            locks,
            clock,
            max_attempts,
        }
    }

    pub async fn execute(
        &self,
        guild_id: GuildId,
        name: &str,
        class: &str,
    ) -> Result<(Hero, Guild), GuildOperationError> {
        let name = require_name(name, "name")?;
        let class: HeroClass = require_parsed(class, "class")?;

        if self.guilds.get(guild_id).await?.is_none() {
            return Err(GuildOperationError::GuildNotFound(guild_id));
        }

        // Written before taking the lock; the oracle can be slow.
        let backstory = self
            .oracle
            .describe(
                DescribeSubject::Hero {
                    name: name.clone(),
                    class,
                },
                DescribeKind::Backstory,
            )
            .await;

        let _guard = self.locks.guilds.lock(&guild_id).await;
        let (hero, guild) = retry_on_conflict(self.max_attempts, "recruit_hero", || {
            self.attempt(guild_id, &name, class, &backstory)
        })
        .await?;

        tracing::info!(guild_id = %guild_id, hero_id = %hero.id, class = %class, "Hero recruited");
        Ok((hero, guild))
    }

    async fn attempt(
        &self,
        guild_id: GuildId,
        name: &str,
        class: HeroClass,
        backstory: &str,
    ) -> Result<(Hero, Guild), GuildOperationError> {
        let read = self
            .guilds
            .get(guild_id)
            .await?
            .ok_or(GuildOperationError::GuildNotFound(guild_id))?;
        let mut guild = read.value;

        let hero = Hero::recruit(guild_id, name, class, self.clock.now())
            .map_err(|e| invalid("name", e))?
            .with_backstory(backstory);
        guild.add_hero(hero.id)?;

        self.store
            .commit_recruit(hero.clone(), guild.clone(), read.version)
            .await?;
        Ok((hero, guild))
    }
}

// =============================================================================
// Facilities
// =============================================================================

/// Build a facility or upgrade it one level, paying gold.
pub struct PurchaseFacility {
    guilds: Arc<dyn GuildRepo>,
    locks: Arc<EntityLocks>,
    max_attempts: u32,
}

impl PurchaseFacility {
    pub fn new(guilds: Arc<dyn GuildRepo>, locks: Arc<EntityLocks>, max_attempts: u32) -> Self {
        Self {
            guilds,
            locks,
            max_attempts,
        }
    }

    pub async fn execute(
        &self,
        guild_id: GuildId,
        facility_type: &str,
    ) -> Result<(Guild, GuildFacility), GuildOperationError> {
        let facility_type: FacilityType = require_parsed(facility_type, "facilityType")?;

        let _guard = self.locks.guilds.lock(&guild_id).await;
        let (guild, facility) = retry_on_conflict(self.max_attempts, "purchase_facility", || {
            self.attempt(guild_id, facility_type)
        })
        .await?;

        tracing::info!(
            guild_id = %guild_id,
            facility = facility_type.as_str(),
            level = facility.level,
            cost = facility.cost,
            "Facility purchased"
        );
        Ok((guild, facility))
    }

    async fn attempt(
        &self,
        guild_id: GuildId,
        facility_type: FacilityType,
    ) -> Result<(Guild, GuildFacility), GuildOperationError> {
        let read = self
            .guilds
            .get(guild_id)
            .await?
            .ok_or(GuildOperationError::GuildNotFound(guild_id))?;
        let mut guild = read.value;

        let facility = guild.purchase_facility(facility_type)?;
        self.guilds.update(&guild, read.version).await?;
        Ok((guild, facility))
    }
}

// =============================================================================
// Policies
// =============================================================================

/// Set or clear a policy flag. Writes nothing when the flag is already in
/// the requested state.
pub struct SetGuildPolicy {
    guilds: Arc<dyn GuildRepo>,
    locks: Arc<EntityLocks>,
    max_attempts: u32,
}

impl SetGuildPolicy {
    pub fn new(guilds: Arc<dyn GuildRepo>, locks: Arc<EntityLocks>, max_attempts: u32) -> Self {
        Self {
            guilds,
            locks,
            max_attempts,
        }
    }

    /// Returns the guild and whether anything changed.
    pub async fn execute(
        &self,
        guild_id: GuildId,
        policy: &str,
        enabled: bool,
    ) -> Result<(Guild, bool), GuildOperationError> {
        let policy = require_key(policy, "policy")?;

        let _guard = self.locks.guilds.lock(&guild_id).await;
        let (guild, changed) = retry_on_conflict(self.max_attempts, "set_guild_policy", || {
            self.attempt(guild_id, &policy, enabled)
        })
        .await?;

        if changed {
            tracing::info!(guild_id = %guild_id, policy = %policy, enabled, "Guild policy changed");
        }
        Ok((guild, changed))
    }

    async fn attempt(
        &self,
        guild_id: GuildId,
        policy: &str,
        enabled: bool,
    ) -> Result<(Guild, bool), GuildOperationError> {
        let read = self
            .guilds
            .get(guild_id)
            .await?
            .ok_or(GuildOperationError::GuildNotFound(guild_id))?;
        let mut guild = read.value;

        let changed = if enabled {
            guild.set_policy(policy)
        } else {
            guild.clear_policy(policy)
        };
        if changed {
            self.guilds.update(&guild, read.version).await?;
        }
        Ok((guild, changed))
    }
}

// =============================================================================
// Reads
// =============================================================================

pub struct GetGuild {
    guilds: Arc<dyn GuildRepo>,
}

impl GetGuild {
    pub fn new(guilds: Arc<dyn GuildRepo>) -> Self {
        Self { guilds }
    }

    pub async fn execute(&self, guild_id: GuildId) -> Result<Guild, GuildOperationError> {
        self.guilds
            .get(guild_id)
            .await?
            .map(|row| row.value)
            .ok_or(GuildOperationError::GuildNotFound(guild_id))
    }
}

pub struct ListGuildHeroes {
    guilds: Arc<dyn GuildRepo>,
    heroes: Arc<dyn HeroRepo>,
}

impl ListGuildHeroes {
    pub fn new(guilds: Arc<dyn GuildRepo>, heroes: Arc<dyn HeroRepo>) -> Self {
        Self { guilds, heroes }
    }

    /// Heroes sorted by name.
    pub async fn execute(&self, guild_id: GuildId) -> Result<Vec<Hero>, GuildOperationError> {
        if self.guilds.get(guild_id).await?.is_none() {
            return Err(GuildOperationError::GuildNotFound(guild_id));
        }
        Ok(self.heroes.list_for_guild(guild_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::{FixedClock, FixedRandom};
    use crate::infrastructure::oracle::FallbackOracle;
    use crate::infrastructure::persistence::InMemoryStore;
    use crate::infrastructure::ports::{MockDecisionOracle, MockGuildRepo, Versioned};
    use chrono::Utc;
    use herotycoon_domain::balance::MAX_HEROES_PER_GUILD;
    use herotycoon_domain::World;

    struct Fixture {
        store: Arc<InMemoryStore>,
        locks: Arc<EntityLocks>,
        clock: Arc<FixedClock>,
        world: World,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let world = World::generate(PlayerId::new(), "Eldoria", "seed", Utc::now()).unwrap();
        WorldRepo::create(store.as_ref(), &world).await.unwrap();
        Fixture {
            store,
            locks: Arc::new(EntityLocks::new()),
            clock: Arc::new(FixedClock(Utc::now())),
            world,
        }
    }

    impl Fixture {
        fn create(&self) -> CreateGuild {
            CreateGuild::new(self.store.clone(), self.store.clone(), self.clock.clone())
        }

        fn recruit(&self) -> RecruitHero {
            RecruitHero::new(
                self.store.clone(),
                self.store.clone(),
                Arc::new(FallbackOracle::new(Arc::new(FixedRandom::new(0, 0.0)))),
                self.locks.clone(),
                self.clock.clone(),
                3,
            )
        }

        async fn guild(&self) -> Guild {
            self.create()
                .execute(PlayerId::new(), self.world.id, "Silver Hand")
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn create_requires_an_existing_world() {
        let f = fixture().await;
        let err = f
            .create()
            .execute(PlayerId::new(), WorldId::new(), "Silver Hand")
            .await
            .unwrap_err();
        assert!(matches!(err, GuildOperationError::WorldNotFound(_)));

        let err = f
            .create()
            .execute(PlayerId::new(), f.world.id, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, GuildOperationError::Validation(_)));
    }

    #[tokio::test]
    async fn created_guild_has_starting_resources() {
        let f = fixture().await;
        let guild = f.guild().await;
        assert_eq!(guild.name, "Silver Hand");
        assert_eq!(guild.resources.get("gold"), 1000);

        let stored = GetGuild::new(f.store.clone()).execute(guild.id).await.unwrap();
        assert_eq!(stored, guild);
    }

    #[tokio::test]
    async fn recruit_writes_hero_and_roster_together() {
        let f = fixture().await;
        let guild = f.guild().await;

        let (hero, updated) = f
            .recruit()
            .execute(guild.id, "Ilsa", "ranger")
            .await
            .unwrap();
        assert_eq!(hero.class, HeroClass::Ranger);
        assert!(hero.backstory.starts_with("Ilsa is a Ranger"));
        assert_eq!(updated.hero_ids, vec![hero.id]);

        let heroes = ListGuildHeroes::new(f.store.clone(), f.store.clone())
            .execute(guild.id)
            .await
            .unwrap();
        assert_eq!(heroes.len(), 1);
        assert_eq!(heroes[0].id, hero.id);
    }

    #[tokio::test]
    async fn recruit_rejects_unknown_class_without_calling_the_oracle() {
        let f = fixture().await;
        let guild = f.guild().await;

        let mut oracle = MockDecisionOracle::new();
        oracle.expect_describe().times(0);
        let recruit = RecruitHero::new(
            f.store.clone(),
            f.store.clone(),
            Arc::new(oracle),
            f.locks.clone(),
            f.clock.clone(),
            3,
        );

        let err = recruit.execute(guild.id, "Ilsa", "Bard").await.unwrap_err();
        assert!(matches!(
            err,
            GuildOperationError::Validation(ValidationError::Invalid { field_name: "class", .. })
        ));
    }

    #[tokio::test]
    async fn recruit_stops_at_the_roster_cap() {
        let f = fixture().await;
        let guild = f.guild().await;
        let recruit = f.recruit();

        for i in 0..MAX_HEROES_PER_GUILD {
            recruit
                .execute(guild.id, &format!("Hero {}", i), "paladin")
                .await
                .unwrap();
        }
        let err = recruit
            .execute(guild.id, "One Too Many", "paladin")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GuildOperationError::Rejected(GuildError::GuildFull { .. })
        ));
    }

    #[tokio::test]
    async fn facility_purchase_debits_gold() {
        let f = fixture().await;
        let guild = f.guild().await;
        let purchase = PurchaseFacility::new(f.store.clone(), f.locks.clone(), 3);

        let (updated, facility) = purchase.execute(guild.id, "tavern").await.unwrap();
        assert_eq!(facility.level, 1);
        assert_eq!(
            updated.resources.get("gold"),
            1000 - FacilityType::Tavern.base_cost()
        );

        let stored = GuildRepo::get(f.store.as_ref(), guild.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.value, updated);
    }

    #[tokio::test]
    async fn facility_purchase_without_gold_is_rejected() {
        let f = fixture().await;
        let mut guild = f.guild().await;
        guild.resources.debit("gold", 1000).unwrap();
        GuildRepo::update(f.store.as_ref(), &guild, 1).await.unwrap();

        let purchase = PurchaseFacility::new(f.store.clone(), f.locks.clone(), 3);
        let err = purchase.execute(guild.id, "tavern").await.unwrap_err();
        assert!(matches!(
            err,
            GuildOperationError::Rejected(GuildError::InsufficientResource { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_facility_type_is_a_validation_error() {
        let f = fixture().await;
        let guild = f.guild().await;
        let purchase = PurchaseFacility::new(f.store.clone(), f.locks.clone(), 3);
        let err = purchase.execute(guild.id, "moat").await.unwrap_err();
        assert!(matches!(err, GuildOperationError::Validation(_)));
    }

    #[tokio::test]
    async fn policy_toggle_only_writes_on_change() {
        let f = fixture().await;
        let guild = f.guild().await;
        let set_policy = SetGuildPolicy::new(f.store.clone(), f.locks.clone(), 3);

        let (updated, changed) = set_policy.execute(guild.id, "No_Quests", true).await.unwrap();
        assert!(changed);
        assert!(updated.policies.contains("no_quests"));

        let (_, changed) = set_policy.execute(guild.id, "no_quests", true).await.unwrap();
        assert!(!changed);
        let stored = GuildRepo::get(f.store.as_ref(), guild.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 2);

        let (updated, changed) = set_policy.execute(guild.id, "no_quests", false).await.unwrap();
        assert!(changed);
        assert!(updated.policies.is_empty());
    }

    #[tokio::test]
    async fn purchase_retries_after_a_conflict() {
        let guild = Guild::new("Silver Hand", PlayerId::new(), WorldId::new(), Utc::now()).unwrap();
        let guild_id = guild.id;

        let mut guilds = MockGuildRepo::new();
        guilds
            .expect_get()
            .times(2)
            .returning(move |_| Ok(Some(Versioned::new(guild.clone(), 5))));
        let mut seq = mockall::Sequence::new();
        guilds
            .expect_update()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _| Err(RepoError::conflict("Guild", guild_id)));
        guilds
            .expect_update()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, expected| Ok(expected + 1));

        let purchase = PurchaseFacility::new(Arc::new(guilds), Arc::new(EntityLocks::new()), 3);
        let (_, facility) = purchase.execute(guild_id, "workshop").await.unwrap();
        assert_eq!(facility.facility_type, FacilityType::Workshop);
    }
}
