//! Resource bag - named, non-negative quantities (gold, wood, ...).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::balance::STARTING_RESOURCES;

/// A shortfall found when debiting a bag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortfall {
    pub resource: String,
    pub required: i64,
    pub available: i64,
}

/// Mapping of resource name to quantity.
///
/// Quantities are signed on the wire so that corrupted rows can be detected by
/// validation, but every mutation keeps them non-negative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceBag(BTreeMap<String, i64>);

impl ResourceBag {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// The bag a new guild or world is seeded with.
    pub fn starting() -> Self {
        STARTING_RESOURCES
            .iter()
            .map(|(name, amount)| (name.to_string(), *amount))
            .collect()
    }

    pub fn get(&self, resource: &str) -> i64 {
        self.0.get(resource).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the first resource that cannot cover `amount`, if any.
    pub fn shortfall(&self, resource: &str, amount: i64) -> Option<Shortfall> {
        let available = self.get(resource);
        (available < amount).then(|| Shortfall {
            resource: resource.to_string(),
            required: amount,
            available,
        })
    }

    /// Add `amount` (saturating). Negative amounts are ignored.
    pub fn credit(&mut self, resource: &str, amount: i64) {
        if amount <= 0 {
            return;
        }
        let entry = self.0.entry(resource.to_string()).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Remove `amount`, or leave the bag untouched and report the shortfall.
    pub fn debit(&mut self, resource: &str, amount: i64) -> Result<(), Shortfall> {
        if amount <= 0 {
            return Ok(());
        }
        if let Some(shortfall) = self.shortfall(resource, amount) {
            return Err(shortfall);
        }
        let entry = self.0.entry(resource.to_string()).or_insert(0);
        *entry -= amount;
        Ok(())
    }
}

impl FromIterator<(String, i64)> for ResourceBag {
    fn from_iter<T: IntoIterator<Item = (String, i64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_bag_matches_balance_table() {
        let bag = ResourceBag::starting();
        assert_eq!(bag.get("gold"), 1000);
        assert_eq!(bag.get("food"), 100);
        assert_eq!(bag.get("mithril"), 0);
    }

    #[test]
    fn debit_beyond_balance_leaves_bag_untouched() {
        let mut bag = ResourceBag::starting();
        let err = bag.debit("stone", 31).unwrap_err();
        assert_eq!(err.required, 31);
        assert_eq!(err.available, 30);
        assert_eq!(bag.get("stone"), 30);
    }

    #[test]
    fn credit_creates_missing_entries() {
        let mut bag = ResourceBag::new();
        bag.credit("gems", 3);
        bag.credit("gems", -10);
        assert_eq!(bag.get("gems"), 3);
    }
}
