//! Script cache.
//!
//! [`ScriptCache`] is a bounded LRU over compiled scripts, keyed by the
//! full compilation-relevant state: feature set, declared parameter
//! order, and source text. One mutex guards lookup and compile, so
//! concurrent callers never compile the same key twice.
//!
//! [`AuxCache`] holds per-script derived data behind weak references, so
//! it never pins a script the host has otherwise dropped.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use rill_ir::{Features, Script};
use rill_parse::ParseError;

/// Cache key: everything that changes what a source compiles to.
///
/// Identical text under different parameter orders is a different entry
/// because slot assignment differs.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceKey {
    features: Features,
    params: Box<[Arc<str>]>,
    text: Arc<str>,
}

impl SourceKey {
    pub fn new(text: &str, params: &[&str], features: Features) -> Self {
        SourceKey {
            features,
            params: params.iter().map(|p| Arc::from(*p)).collect(),
            text: Arc::from(text),
        }
    }
}

struct Entry {
    script: Arc<Script>,
    /// Logical access time; smallest is evicted first.
    stamp: u64,
}

struct Inner {
    map: FxHashMap<SourceKey, Entry>,
    clock: u64,
}

impl Inner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn evict_to(&mut self, capacity: usize) {
        while self.map.len() > capacity {
            let Some(victim) = self
                .map
                .iter()
                .min_by_key(|(_, e)| e.stamp)
                .map(|(k, _)| k.clone())
            else {
                return;
            };
            self.map.remove(&victim);
            tracing::debug!(size = self.map.len(), "script cache evict");
        }
    }
}

/// Bounded LRU cache of compiled scripts.
///
/// Capacity zero disables caching entirely: every lookup misses and
/// nothing is stored.
pub struct ScriptCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl ScriptCache {
    pub fn new(capacity: usize) -> Self {
        ScriptCache {
            capacity,
            inner: Mutex::new(Inner {
                map: FxHashMap::default(),
                clock: 0,
            }),
        }
    }

    /// Cached script for `key`, refreshing its access stamp.
    pub fn get(&self, key: &SourceKey) -> Option<Arc<Script>> {
        let mut inner = self.inner.lock();
        let stamp = inner.tick();
        match inner.map.get_mut(key) {
            Some(entry) => {
                entry.stamp = stamp;
                tracing::debug!("script cache hit");
                Some(Arc::clone(&entry.script))
            }
            None => {
                tracing::debug!("script cache miss");
                None
            }
        }
    }

    /// Insert `script` under `key`, evicting least-recently-used entries
    /// past capacity.
    pub fn put(&self, key: SourceKey, script: Arc<Script>) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        let stamp = inner.tick();
        inner.map.insert(key, Entry { script, stamp });
        inner.evict_to(self.capacity);
    }

    /// Atomic get-or-compute: at most one caller compiles a given key.
    ///
    /// Holding the lock across `compile` serializes compilation, which
    /// is the intended trade: a duplicate compile would waste more work
    /// than brief contention does.
    pub fn get_or_compile(
        &self,
        key: SourceKey,
        compile: impl FnOnce() -> Result<Script, ParseError>,
    ) -> Result<Arc<Script>, ParseError> {
        if self.capacity == 0 {
            return compile().map(Arc::new);
        }
        let mut inner = self.inner.lock();
        let stamp = inner.tick();
        if let Some(entry) = inner.map.get_mut(&key) {
            entry.stamp = stamp;
            tracing::debug!("script cache hit");
            return Ok(Arc::clone(&entry.script));
        }
        tracing::debug!("script cache miss");
        let script = Arc::new(compile()?);
        inner.map.insert(
            key,
            Entry {
                script: Arc::clone(&script),
                stamp,
            },
        );
        inner.evict_to(self.capacity);
        Ok(script)
    }

    pub fn size(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn clear(&self) {
        self.inner.lock().map.clear();
    }
}

/// Per-script auxiliary cache with weak keys.
///
/// Entries are keyed by script identity and hold a [`Weak`] back to the
/// script; dead entries are swept lazily on insert. Reclamation is
/// best-effort, a missed sweep is never a correctness bug.
pub struct AuxCache<V> {
    inner: Mutex<FxHashMap<usize, (Weak<Script>, V)>>,
}

impl<V: Clone> AuxCache<V> {
    pub fn new() -> Self {
        AuxCache {
            inner: Mutex::new(FxHashMap::default()),
        }
    }

    fn key(script: &Arc<Script>) -> usize {
        Arc::as_ptr(script) as usize
    }

    /// Value for `script`, if a live entry exists.
    ///
    /// An address can be reused after its script is dropped, so the
    /// stored weak must upgrade to this exact script for the entry to
    /// count.
    pub fn get(&self, script: &Arc<Script>) -> Option<V> {
        let inner = self.inner.lock();
        let (weak, value) = inner.get(&Self::key(script))?;
        let live = weak.upgrade()?;
        if Arc::ptr_eq(&live, script) {
            Some(value.clone())
        } else {
            None
        }
    }

    /// Cached value for `script`, computing and storing it on miss.
    pub fn get_or_insert_with(&self, script: &Arc<Script>, make: impl FnOnce() -> V) -> V {
        let mut inner = self.inner.lock();
        let key = Self::key(script);
        if let Some((weak, value)) = inner.get(&key) {
            if let Some(live) = weak.upgrade() {
                if Arc::ptr_eq(&live, script) {
                    return value.clone();
                }
            }
        }
        inner.retain(|_, (weak, _)| weak.strong_count() > 0);
        let value = make();
        inner.insert(key, (Arc::downgrade(script), value.clone()));
        value
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl<V: Clone> Default for AuxCache<V> {
    fn default() -> Self {
        AuxCache::new()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use rill_ir::Features;

    fn compile(src: &str, params: &[&str]) -> Script {
        match rill_parse::parse(src, params, Features::default()) {
            Ok(s) => s,
            Err(err) => panic!("parse failed: {err}"),
        }
    }

    fn key(src: &str) -> SourceKey {
        SourceKey::new(src, &[], Features::default())
    }

    #[test]
    fn hit_returns_the_same_script() {
        let cache = ScriptCache::new(4);
        let a = cache
            .get_or_compile(key("1 + 1"), || Ok(compile("1 + 1", &[])))
            .unwrap();
        let b = cache
            .get_or_compile(key("1 + 1"), || panic!("must not recompile"))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn parameter_order_is_part_of_the_key() {
        let cache = ScriptCache::new(4);
        let xy = SourceKey::new("x - y", &["x", "y"], Features::default());
        let yx = SourceKey::new("x - y", &["y", "x"], Features::default());
        assert_ne!(xy, yx);
        cache.put(xy, Arc::new(compile("x - y", &["x", "y"])));
        cache.put(yx, Arc::new(compile("x - y", &["y", "x"])));
        assert_eq!(cache.size(), 2);
    }

    #[test]
    fn features_are_part_of_the_key() {
        let a = SourceKey::new("1", &[], Features::default());
        let b = SourceKey::new("1", &[], Features::expression_only());
        assert_ne!(a, b);
    }

    #[test]
    fn eviction_drops_least_recently_used() {
        let cache = ScriptCache::new(2);
        cache.put(key("1"), Arc::new(compile("1", &[])));
        cache.put(key("2"), Arc::new(compile("2", &[])));
        // Touch "1" so "2" becomes the eviction victim.
        assert!(cache.get(&key("1")).is_some());
        cache.put(key("3"), Arc::new(compile("3", &[])));
        assert_eq!(cache.size(), 2);
        assert!(cache.get(&key("1")).is_some());
        assert!(cache.get(&key("2")).is_none());
        assert!(cache.get(&key("3")).is_some());
    }

    #[test]
    fn zero_capacity_disables_storage() {
        let cache = ScriptCache::new(0);
        let a = cache
            .get_or_compile(key("1"), || Ok(compile("1", &[])))
            .unwrap();
        let b = cache
            .get_or_compile(key("1"), || Ok(compile("1", &[])))
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = ScriptCache::new(4);
        cache.put(key("1"), Arc::new(compile("1", &[])));
        cache.clear();
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn aux_entries_do_not_pin_scripts() {
        let aux: AuxCache<u32> = AuxCache::new();
        let script = Arc::new(compile("1", &[]));
        assert_eq!(aux.get_or_insert_with(&script, || 7), 7);
        assert_eq!(aux.get(&script), Some(7));
        drop(script);
        // The next insert sweeps the dead entry.
        let other = Arc::new(compile("2", &[]));
        aux.get_or_insert_with(&other, || 9);
        assert_eq!(aux.len(), 1);
    }
}
