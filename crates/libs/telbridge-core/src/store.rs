use crate::value::{PropValue, PropertyBag};
use std::collections::HashMap;

/// Mirror of one remote object's property bag, with change detection.
///
/// All mutation happens from the remote-call domain, so the store
/// carries no lock of its own; serialization is the owning task's job.
#[derive(Debug, Default)]
pub struct PropertyStore {
    bag: PropertyBag,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self { bag: PropertyBag::new() }
    }

    /// Seed the cache from a bulk fetch.
    ///
    /// Invokes `on_change` once per key present, exactly as if each
    /// property had just changed — the consumer's derived view ends up
    /// correct even though it never saw individual transitions. Any
    /// previously cached state is discarded first.
    pub fn initialize<F>(&mut self, bag: PropertyBag, mut on_change: F)
    where
        F: FnMut(&str, &PropValue),
    {
        self.bag = bag;
        for (name, value) in &self.bag {
            on_change(name, value);
        }
    }

    /// Store `value` under `name` if it differs from the cached value.
    ///
    /// Returns true when the cache changed; the caller dispatches its
    /// change handler only on true, which keeps no-op updates silent.
    pub fn update(&mut self, name: &str, value: PropValue) -> bool {
        if self.bag.get(name) == Some(&value) {
            return false;
        }
        self.bag.insert(name.to_string(), value);
        true
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.bag.get(name)
    }

    pub fn bag(&self) -> &PropertyBag {
        &self.bag
    }

    pub fn clear(&mut self) {
        self.bag.clear();
    }
}

/// Path-keyed property bags for multi-entity domains (calls, data
/// contexts).
///
/// `upsert` merges rather than replaces: a local action (dialing, a
/// context setup) may attach provisional metadata to an entity before
/// the authoritative remote "added" bag arrives, and that metadata
/// must survive the merge.
#[derive(Debug, Default)]
pub struct EntityStore {
    bags: HashMap<String, PropertyBag>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self { bags: HashMap::new() }
    }

    /// Create the bag for `key` if absent, then merge `partial` into it.
    pub fn upsert(&mut self, key: &str, partial: PropertyBag) {
        let bag = self.bags.entry(key.to_string()).or_default();
        for (name, value) in partial {
            bag.insert(name, value);
        }
    }

    /// Per-entity change detection with the same idempotence rule as
    /// [`PropertyStore::update`]. An unknown key gets an empty bag
    /// first, since property churn can race the added event.
    pub fn update(&mut self, key: &str, name: &str, value: PropValue) -> bool {
        let bag = self.bags.entry(key.to_string()).or_default();
        if bag.get(name) == Some(&value) {
            return false;
        }
        bag.insert(name.to_string(), value);
        true
    }

    /// Drop the entity entirely. Nothing derived from `key` may
    /// outlive this call; the remote path can be reused for an
    /// unrelated entity.
    pub fn remove(&mut self, key: &str) -> Option<PropertyBag> {
        self.bags.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&PropertyBag> {
        self.bags.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.bags.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyBag)> {
        self.bags.iter().map(|(key, bag)| (key.as_str(), bag))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.bags.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bags.is_empty()
    }

    pub fn clear(&mut self) {
        self.bags.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::bag_from;

    #[test]
    fn update_detects_changes_and_skips_noops() {
        let mut store = PropertyStore::new();
        assert!(store.update("State", "incoming".into()));
        assert!(!store.update("State", "incoming".into()));
        assert!(store.update("State", "active".into()));
        assert_eq!(store.get("State").and_then(PropValue::as_str), Some("active"));
    }

    #[test]
    fn initialize_fires_once_per_key() {
        let mut store = PropertyStore::new();
        let mut seen = Vec::new();
        store.initialize(
            bag_from([("Online", true.into()), ("Powered", true.into())]),
            |name, _| seen.push(name.to_string()),
        );
        seen.sort();
        assert_eq!(seen, ["Online", "Powered"]);
        assert_eq!(store.bag().len(), 2);
    }

    #[test]
    fn initialize_empty_bag_fires_nothing() {
        let mut store = PropertyStore::new();
        let mut count = 0;
        store.initialize(PropertyBag::new(), |_, _| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn upsert_merges_instead_of_replacing() {
        let mut store = EntityStore::new();
        // Provisional metadata attached before the remote added event.
        store.upsert("/call1", bag_from([("Originated", true.into())]));
        store.upsert(
            "/call1",
            bag_from([("State", "dialing".into()), ("LineIdentification", "+15551234567".into())]),
        );

        let bag = store.get("/call1").expect("bag");
        assert_eq!(bag.get("Originated"), Some(&PropValue::Bool(true)));
        assert_eq!(bag.get("State").and_then(PropValue::as_str), Some("dialing"));
    }

    #[test]
    fn remove_drops_everything_for_the_key() {
        let mut store = EntityStore::new();
        store.upsert("/call1", bag_from([("State", "active".into())]));
        assert!(store.remove("/call1").is_some());
        assert!(store.remove("/call1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn entity_update_is_idempotent_per_value() {
        let mut store = EntityStore::new();
        assert!(store.update("/ctx1", "Active", true.into()));
        assert!(!store.update("/ctx1", "Active", true.into()));
        assert!(store.update("/ctx1", "Active", false.into()));
    }
}
