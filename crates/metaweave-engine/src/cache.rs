//! Memoizing store of computed metadata

use std::collections::HashMap;

use metaweave_ids::{ClassTag, Identifier, TypeKey};

use crate::MetadataValue;

/// What the cache knows about one identifier
#[derive(Debug, Clone)]
pub enum CacheLookup {
    /// Never computed (or removed)
    NotComputed,
    /// Computed before, stale since
    Invalidated,
    /// Up to date
    Valid(MetadataValue),
}

impl CacheLookup {
    pub fn is_valid(&self) -> bool {
        matches!(self, CacheLookup::Valid(_))
    }
}

/// Marks the cache state a computation started from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStamp {
    generation: u64,
    removals: u64,
}

/// Hit and miss counters plus current occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub valid: usize,
    pub invalidated: usize,
}

#[derive(Debug)]
struct Slot {
    value: Option<MetadataValue>,
    computed: bool,
    /// Bumped on every invalidation of this identifier
    generation: u64,
}

/// Identifier to last computed value.
///
/// Every invalidation stamps the identifier with a fresh generation. A
/// computation remembers the generations it started from and read, and its
/// result is only stored if none of them moved in the meantime, so a value
/// computed from inputs that went stale mid-flight is never marked valid.
#[derive(Debug, Default)]
pub struct MetadataCache {
    slots: HashMap<Identifier, Slot>,
    next_generation: u64,
    /// Bumped whenever slots are removed outright, which resets their generation
    removals: u64,
    hits: u64,
    misses: u64,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect an entry without touching the counters
    pub fn lookup(&self, id: &Identifier) -> CacheLookup {
        match self.slots.get(id) {
            Some(Slot { value: Some(value), .. }) => CacheLookup::Valid(value.clone()),
            Some(Slot { computed: true, .. }) => CacheLookup::Invalidated,
            _ => CacheLookup::NotComputed,
        }
    }

    /// Return a valid entry, counting the hit or miss
    pub fn get_valid(&mut self, id: &Identifier) -> Option<MetadataValue> {
        let value = self.slots.get(id).and_then(|slot| slot.value.clone());
        if value.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        value
    }

    /// Whether the cache holds any slot for `id`, valid or not
    pub fn tracks(&self, id: &Identifier) -> bool {
        self.slots.contains_key(id)
    }

    pub fn generation(&self, id: &Identifier) -> u64 {
        self.slots.get(id).map(|slot| slot.generation).unwrap_or(0)
    }

    pub fn stamp(&self, id: &Identifier) -> CacheStamp {
        CacheStamp {
            generation: self.generation(id),
            removals: self.removals,
        }
    }

    /// Mark an identifier stale, returning whether it held a valid value
    pub fn invalidate(&mut self, id: &Identifier) -> bool {
        self.next_generation += 1;
        let generation = self.next_generation;
        let slot = self.slots.entry(id.clone()).or_insert(Slot {
            value: None,
            computed: false,
            generation,
        });
        slot.generation = generation;
        slot.value.take().is_some()
    }

    /// Store a value unconditionally
    pub fn store(&mut self, id: &Identifier, value: MetadataValue) {
        let slot = self.slots.entry(id.clone()).or_insert(Slot {
            value: None,
            computed: false,
            generation: 0,
        });
        slot.value = Some(value);
        slot.computed = true;
    }

    /// Store a value only if neither `id` nor any of `reads` was invalidated since `stamp`.
    ///
    /// `reads` pairs each upstream identifier with the generation observed when it was read.
    pub fn store_if_current(
        &mut self,
        id: &Identifier,
        stamp: CacheStamp,
        reads: &[(Identifier, u64)],
        value: MetadataValue,
    ) -> bool {
        if self.removals != stamp.removals || self.generation(id) != stamp.generation {
            return false;
        }
        if reads
            .iter()
            .any(|(upstream, seen)| self.generation(upstream) != *seen)
        {
            return false;
        }
        self.store(id, value);
        true
    }

    /// Drop an entry entirely
    pub fn remove(&mut self, id: &Identifier) -> bool {
        let removed = self.slots.remove(id).is_some();
        if removed {
            self.removals += 1;
        }
        removed
    }

    /// Drop every entry keyed on a governing type, whatever its class
    pub fn remove_type(&mut self, key: &TypeKey) -> usize {
        self.remove_where(|id| id.key() == key)
    }

    /// Drop every entry of a class
    pub fn purge_class(&mut self, class: &ClassTag) -> usize {
        self.remove_where(|id| id.class_tag() == class)
    }

    pub fn contains_class(&self, class: &ClassTag) -> bool {
        self.slots.keys().any(|id| id.class_tag() == class)
    }

    /// Number of valid entries
    pub fn len(&self) -> usize {
        self.slots.values().filter(|slot| slot.value.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let valid = self.len();
        let invalidated = self
            .slots
            .values()
            .filter(|slot| slot.computed && slot.value.is_none())
            .count();
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            valid,
            invalidated,
        }
    }

    fn remove_where<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&Identifier) -> bool,
    {
        let before = self.slots.len();
        self.slots.retain(|id, _| !predicate(id));
        let removed = before - self.slots.len();
        if removed > 0 {
            self.removals += 1;
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(class: &str, ty: &str) -> Identifier {
        Identifier::new(ClassTag::new(class).unwrap(), TypeKey::main(ty).unwrap())
    }

    #[derive(Debug, serde::Serialize)]
    struct Dummy(u32);

    #[test]
    fn test_lifecycle_states() {
        let mut cache = MetadataCache::new();
        let ctrl = id("Controller", "Order");
        assert!(matches!(cache.lookup(&ctrl), CacheLookup::NotComputed));

        cache.store(&ctrl, MetadataValue::present(Dummy(1)));
        assert!(cache.lookup(&ctrl).is_valid());

        assert!(cache.invalidate(&ctrl));
        assert!(matches!(cache.lookup(&ctrl), CacheLookup::Invalidated));
        assert!(!cache.invalidate(&ctrl));

        assert!(cache.remove(&ctrl));
        assert!(matches!(cache.lookup(&ctrl), CacheLookup::NotComputed));
    }

    #[test]
    fn test_absent_is_cached_as_valid() {
        let mut cache = MetadataCache::new();
        let ctrl = id("Controller", "Order");
        cache.store(&ctrl, MetadataValue::Absent);
        assert!(matches!(
            cache.lookup(&ctrl),
            CacheLookup::Valid(MetadataValue::Absent)
        ));
    }

    #[test]
    fn test_store_refused_after_concurrent_invalidation() {
        let mut cache = MetadataCache::new();
        let svc = id("Service", "Order");
        let ctrl = id("Controller", "Order");

        let stamp = cache.stamp(&ctrl);
        let reads = vec![(svc.clone(), cache.generation(&svc))];
        cache.invalidate(&svc);

        assert!(!cache.store_if_current(&ctrl, stamp, &reads, MetadataValue::Absent));
        assert!(matches!(cache.lookup(&ctrl), CacheLookup::NotComputed));

        let stamp = cache.stamp(&ctrl);
        let reads = vec![(svc.clone(), cache.generation(&svc))];
        assert!(cache.store_if_current(&ctrl, stamp, &reads, MetadataValue::Absent));
    }

    #[test]
    fn test_store_refused_after_own_invalidation() {
        let mut cache = MetadataCache::new();
        let ctrl = id("Controller", "Order");
        let stamp = cache.stamp(&ctrl);
        cache.invalidate(&ctrl);
        assert!(!cache.store_if_current(&ctrl, stamp, &[], MetadataValue::Absent));
    }

    #[test]
    fn test_purge_class_and_remove_type() {
        let mut cache = MetadataCache::new();
        cache.store(&id("Controller", "Order"), MetadataValue::Absent);
        cache.store(&id("Controller", "Customer"), MetadataValue::Absent);
        cache.store(&id("Service", "Order"), MetadataValue::Absent);

        assert_eq!(cache.purge_class(&ClassTag::new("Controller").unwrap()), 2);
        assert!(!cache.contains_class(&ClassTag::new("Controller").unwrap()));
        assert_eq!(cache.remove_type(&TypeKey::main("Order").unwrap()), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stats_count_hits() {
        let mut cache = MetadataCache::new();
        let ctrl = id("Controller", "Order");
        assert!(cache.get_valid(&ctrl).is_none());
        cache.store(&ctrl, MetadataValue::Absent);
        assert!(cache.get_valid(&ctrl).is_some());
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.valid), (1, 1, 1));
    }
}
