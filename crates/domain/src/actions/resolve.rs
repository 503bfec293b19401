//! The resolution engine.
//!
//! Pure and synchronous: takes snapshots, returns new state. Persistence and
//! broadcast belong to the caller so that hero and guild can be committed together.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::{
    ActionCatalog, ActionDescriptor, ActionKind, ActionOutcome, GuildChanges, Resolution,
    ResolutionError, StatDeltas,
};
use crate::balance::{level_up_threshold, MAX_MOOD, MAX_RELATIONSHIP, MIN_MOOD, MIN_RELATIONSHIP};
use crate::entities::{Guild, Hero, HeroStats};
use crate::HeroId;

/// Apply `kind` to a hero (and optionally its guild).
///
/// Checks run in order and the first failure wins: the action must exist, the
/// hero must be active, then every requirement and guild cost must be covered.
/// All stat changes are clamped to their bounds. At most one level-up fires per
/// call; leftover experience carries over.
///
/// Without a guild snapshot, social effects and guild rewards are skipped and
/// any guild cost fails as `InsufficientResource`.
pub fn resolve_action(
    catalog: &ActionCatalog,
    hero: &Hero,
    guild: Option<&Guild>,
    kind: &ActionKind,
    now: DateTime<Utc>,
) -> Result<Resolution, ResolutionError> {
    let descriptor = catalog
        .get(kind)
        .ok_or_else(|| ResolutionError::UnknownAction(kind.clone()))?;

    if !hero.is_active {
        return Err(ResolutionError::HeroInactive(hero.id));
    }
    for requirement in &descriptor.requirements {
        requirement.check(hero)?;
    }
    for (resource, amount) in &descriptor.guild_costs {
        let available = guild.map_or(0, |g| g.resources.get(resource));
        if available < *amount {
            return Err(ResolutionError::InsufficientResource {
                resource: resource.clone(),
                required: *amount,
                available,
            });
        }
    }

    let mut next = hero.clone();
    let stat_changes = apply_deltas(&mut next, &descriptor.deltas);
    let leveled_up = if stat_changes.experience > 0 {
        level_up(&mut next.stats)
    } else {
        None
    };
    let relationship_changes = match (descriptor.relationship_delta, guild) {
        (Some(delta), Some(guild)) => adjust_relationships(&mut next, guild, delta),
        _ => BTreeMap::new(),
    };
    next.current_action = descriptor.label.clone();
    next.last_action_time = now;

    let mut guild_changes = GuildChanges::default();
    let next_guild = guild.map(|guild| {
        let mut updated = guild.clone();
        settle_guild(&mut updated, descriptor, &stat_changes, &mut guild_changes);
        updated
    });

    let outcome = ActionOutcome {
        hero_id: hero.id,
        guild_id: guild.map(|g| g.id),
        action: descriptor.kind.clone(),
        label: descriptor.label.clone(),
        duration_minutes: descriptor.duration_minutes,
        summary: summarize(&next, descriptor, leveled_up),
        stat_changes,
        relationship_changes,
        guild_changes,
        leveled_up,
        resolved_at: now,
    };

    Ok(Resolution {
        hero: next,
        guild: next_guild,
        outcome,
    })
}

/// Add `delta` to `value`, clamp into `[min, max]`, and return what actually changed.
fn shift(value: &mut i32, delta: i32, min: i32, max: i32) -> i32 {
    if delta == 0 {
        return 0;
    }
    let before = *value;
    let max = max.max(min);
    *value = before.saturating_add(delta).clamp(min, max);
    value.saturating_sub(before)
}

fn apply_deltas(hero: &mut Hero, deltas: &StatDeltas) -> StatDeltas {
    let stats = &mut hero.stats;
    let mut applied = StatDeltas::default();

    applied.health = shift(&mut stats.health, deltas.health, 0, stats.max_health);
    applied.energy = shift(&mut stats.energy, deltas.energy, 0, stats.max_energy);
    applied.combat = shift(&mut stats.combat, deltas.combat, 0, i32::MAX);
    applied.magic = shift(&mut stats.magic, deltas.magic, 0, i32::MAX);
    applied.crafting = shift(&mut stats.crafting, deltas.crafting, 0, i32::MAX);
    applied.exploration = shift(&mut stats.exploration, deltas.exploration, 0, i32::MAX);
    applied.mood = shift(&mut hero.mood, deltas.mood, MIN_MOOD, MAX_MOOD);

    if deltas.experience != 0 {
        let before = stats.experience;
        stats.experience = before.saturating_add(i64::from(deltas.experience)).max(0);
        applied.experience =
            i32::try_from(stats.experience - before).unwrap_or(deltas.experience);
    }
    applied
}

fn level_up(stats: &mut HeroStats) -> Option<u32> {
    let threshold = level_up_threshold(stats.level);
    if stats.experience < threshold {
        return None;
    }
    stats.level = stats.level.saturating_add(1);
    stats.experience -= threshold;
    Some(stats.level)
}

fn adjust_relationships(hero: &mut Hero, guild: &Guild, delta: i32) -> BTreeMap<HeroId, i32> {
    let mut changes = BTreeMap::new();
    for mate in guild.members_except(hero.id) {
        let regard = hero.relationships.entry(mate).or_insert(0);
        let applied = shift(regard, delta, MIN_RELATIONSHIP, MAX_RELATIONSHIP);
        if applied != 0 {
            changes.insert(mate, applied);
        }
    }
    changes
}

fn settle_guild(
    guild: &mut Guild,
    descriptor: &ActionDescriptor,
    stat_changes: &StatDeltas,
    changes: &mut GuildChanges,
) {
    for (resource, amount) in &descriptor.guild_costs {
        // Coverage was checked up front; a failed debit leaves the bag untouched.
        if *amount > 0 && guild.resources.debit(resource, *amount).is_ok() {
            *changes.resources.entry(resource.clone()).or_insert(0) -= amount;
        }
    }
    for (resource, amount) in &descriptor.guild_rewards {
        if *amount > 0 {
            guild.resources.credit(resource, *amount);
            *changes.resources.entry(resource.clone()).or_insert(0) += amount;
        }
    }
    if descriptor.reputation_reward != 0 {
        let before = guild.reputation;
        guild.reputation = before.saturating_add(descriptor.reputation_reward).max(0);
        changes.reputation = guild.reputation - before;
    }
    if stat_changes.experience > 0 {
        let gained = i64::from(stat_changes.experience);
        guild.experience = guild.experience.saturating_add(gained);
        changes.experience = gained;
    }
}

fn summarize(hero: &Hero, descriptor: &ActionDescriptor, leveled_up: Option<u32>) -> String {
    let mut summary = if descriptor.summary.is_empty() {
        format!("{} finished {}", hero.name, descriptor.label)
    } else {
        format!("{} {}", hero.name, descriptor.summary)
    };
    if let Some(level) = leveled_up {
        summary.push_str(&format!(" and reached level {}", level));
    }
    summary
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::actions::{ErrorCategory, Stat};
    use crate::entities::HeroClass;
    use crate::validation::validate_hero;
    use crate::{GuildId, PlayerId, WorldId};

    fn kind(name: &str) -> ActionKind {
        ActionKind::from(name)
    }

    fn guild_with_hero() -> (Guild, Hero) {
        let mut guild = Guild::new("Emberfall", PlayerId::new(), WorldId::new(), Utc::now()).unwrap();
        let hero = Hero::recruit(guild.id, "Kael", HeroClass::Ranger, Utc::now()).unwrap();
        guild.add_hero(hero.id).unwrap();
        (guild, hero)
    }

    #[test]
    fn train_without_enough_energy_is_rejected_and_hero_unchanged() {
        let (guild, mut hero) = guild_with_hero();
        hero.stats.energy = 15;
        let before = hero.clone();

        let err = resolve_action(
            &ActionCatalog::standard(),
            &hero,
            Some(&guild),
            &kind("train"),
            Utc::now(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            ResolutionError::InsufficientResource {
                resource: "energy".into(),
                required: 20,
                available: 15
            }
        );
        assert_eq!(err.category(), ErrorCategory::Precondition);
        assert_eq!(hero, before);
    }

    #[test]
    fn rest_clamps_energy_at_max() {
        let (guild, hero) = guild_with_hero();
        assert_eq!(hero.stats.energy, 100);

        let res = resolve_action(
            &ActionCatalog::standard(),
            &hero,
            Some(&guild),
            &kind("rest"),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(res.hero.stats.energy, 100);
        assert_eq!(res.outcome.stat_changes.energy, 0);
        assert_eq!(res.hero.current_action, "rest");
    }

    #[test]
    fn train_applies_catalog_deltas() {
        let (guild, hero) = guild_with_hero();
        let now = Utc::now();
        let res = resolve_action(&ActionCatalog::standard(), &hero, Some(&guild), &kind("train"), now)
            .unwrap();

        assert_eq!(res.hero.stats.energy, 80);
        assert_eq!(res.hero.stats.combat, hero.stats.combat + 1);
        assert_eq!(res.hero.stats.experience, 10);
        assert_eq!(res.hero.current_action, "training");
        assert_eq!(res.hero.last_action_time, now);
        assert_eq!(res.outcome.summary, "Kael completed a training session");
        assert_eq!(res.guild.unwrap().experience, 10);
    }

    #[test]
    fn unknown_action_is_checked_before_activity() {
        let (guild, mut hero) = guild_with_hero();
        hero.deactivate();
        let catalog = ActionCatalog::standard();

        let err = resolve_action(&catalog, &hero, Some(&guild), &kind("dance"), Utc::now()).unwrap_err();
        assert_eq!(err, ResolutionError::UnknownAction(kind("dance")));

        let err = resolve_action(&catalog, &hero, Some(&guild), &kind("rest"), Utc::now()).unwrap_err();
        assert_eq!(err, ResolutionError::HeroInactive(hero.id));
    }

    #[test]
    fn resolution_is_deterministic() {
        let (guild, hero) = guild_with_hero();
        let now = Utc::now();
        let catalog = ActionCatalog::standard();
        let a = resolve_action(&catalog, &hero, Some(&guild), &kind("quest"), now).unwrap();
        let b = resolve_action(&catalog, &hero, Some(&guild), &kind("quest"), now).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn only_one_level_up_per_action() {
        let (guild, hero) = guild_with_hero();
        let catalog = ActionCatalog::standard()
            .with_entry(ActionDescriptor::new("epiphany", "reflecting", 10).with_delta(Stat::Experience, 100));

        let res = resolve_action(&catalog, &hero, Some(&guild), &kind("epiphany"), Utc::now()).unwrap();
        // level 1 threshold is 15
        assert_eq!(res.hero.stats.level, 2);
        assert_eq!(res.hero.stats.experience, 85);
        assert_eq!(res.outcome.leveled_up, Some(2));
        assert!(res.outcome.summary.ends_with("and reached level 2"));
    }

    #[test]
    fn second_training_crosses_first_threshold() {
        let (guild, hero) = guild_with_hero();
        let catalog = ActionCatalog::standard();
        let first = resolve_action(&catalog, &hero, Some(&guild), &kind("train"), Utc::now()).unwrap();
        assert_eq!(first.outcome.leveled_up, None);
        let second =
            resolve_action(&catalog, &first.hero, first.guild.as_ref(), &kind("train"), Utc::now())
                .unwrap();
        assert_eq!(second.hero.stats.level, 2);
        assert_eq!(second.hero.stats.experience, 5);
    }

    #[test]
    fn socializing_improves_guildmate_relationships() {
        let (mut guild, hero) = guild_with_hero();
        let mate = HeroId::new();
        guild.add_hero(mate).unwrap();

        let res = resolve_action(
            &ActionCatalog::standard(),
            &hero,
            Some(&guild),
            &kind("socialize"),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(res.hero.relationships.get(&mate), Some(&5));
        assert!(!res.hero.relationships.contains_key(&hero.id));
        assert_eq!(res.outcome.relationship_changes.len(), 1);
        assert_eq!(res.hero.mood, 10);
    }

    #[test]
    fn socializing_without_guild_has_no_relationship_effect() {
        let (_, hero) = guild_with_hero();
        let res = resolve_action(
            &ActionCatalog::standard(),
            &hero,
            None,
            &kind("socialize"),
            Utc::now(),
        )
        .unwrap();

        assert!(res.hero.relationships.is_empty());
        assert!(res.guild.is_none());
        assert_eq!(res.hero.mood, 10);
        assert_eq!(res.hero.stats.energy, 90);
    }

    #[test]
    fn quest_rewards_the_guild() {
        let (guild, hero) = guild_with_hero();
        let res = resolve_action(&ActionCatalog::standard(), &hero, Some(&guild), &kind("quest"), Utc::now())
            .unwrap();
        let updated = res.guild.unwrap();
        assert_eq!(updated.resources.get("gold"), 1025);
        assert_eq!(updated.reputation, 1);
        assert_eq!(res.outcome.guild_changes.resources.get("gold"), Some(&25));
        assert_eq!(res.hero.stats.health, 90);
    }

    #[test]
    fn guild_costs_are_debited_or_refused() {
        let (guild, hero) = guild_with_hero();
        let catalog = ActionCatalog::standard().with_entry(
            ActionDescriptor::new("forge", "forging", 90)
                .with_energy_cost(10)
                .with_guild_cost("stone", 20),
        );

        let res = resolve_action(&catalog, &hero, Some(&guild), &kind("forge"), Utc::now()).unwrap();
        assert_eq!(res.guild.unwrap().resources.get("stone"), 10);
        assert_eq!(res.outcome.guild_changes.resources.get("stone"), Some(&-20));

        let err = resolve_action(&catalog, &hero, None, &kind("forge"), Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::InsufficientResource { ref resource, available: 0, .. } if resource == "stone"
        ));
    }

    #[test]
    fn corrupt_max_does_not_panic() {
        let (guild, mut hero) = guild_with_hero();
        hero.stats.max_health = -5;
        hero.stats.health = 0;
        let res = resolve_action(&ActionCatalog::standard(), &hero, Some(&guild), &kind("rest"), Utc::now())
            .unwrap();
        assert_eq!(res.hero.stats.health, 0);
    }

    #[test]
    fn random_action_sequences_stay_in_bounds() {
        let catalog = ActionCatalog::standard();
        let kinds = catalog.kinds();
        let mut rng = StdRng::seed_from_u64(0x4845_524f);

        for _ in 0..50 {
            let (mut guild, mut hero) = guild_with_hero();
            for _ in 0..3 {
                guild.add_hero(HeroId::new()).unwrap();
            }
            for _ in 0..200 {
                let pick = &kinds[rng.gen_range(0..kinds.len())];
                match resolve_action(&catalog, &hero, Some(&guild), pick, Utc::now()) {
                    Ok(res) => {
                        hero = res.hero;
                        guild = res.guild.unwrap();
                    }
                    Err(e) => assert_eq!(e.category(), ErrorCategory::Precondition),
                }
                assert_eq!(validate_hero(&hero), Ok(()));
                assert!(guild.resources.iter().all(|(_, v)| v >= 0));
            }
        }
    }
}
