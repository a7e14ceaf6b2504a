//! Short-lived response cache in front of the engine views.
//!
//! Keys are `"<operation>:<normalized params>"`. Values are the serialized
//! JSON body, so a hit never touches the engine.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

const DEFAULT_MAX_ENTRIES: usize = 4096;

pub struct ResponseCache {
    ttl: Duration,
    max_entries: usize,
    entries: RwLock<HashMap<String, (Instant, Value)>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// A zero TTL turns the cache off.
    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        if !self.is_enabled() {
            return None;
        }
        let entries = self.entries.read();
        let (stored_at, value) = entries.get(key)?;
        if stored_at.elapsed() > self.ttl {
            return None;
        }
        debug!(key, "response cache hit");
        Some(value.clone())
    }

    pub fn insert(&self, key: String, value: Value) {
        if !self.is_enabled() {
            return;
        }
        let mut entries = self.entries.write();
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            let ttl = self.ttl;
            entries.retain(|_, (stored_at, _)| stored_at.elapsed() <= ttl);
            if entries.len() >= self.max_entries {
                // Still full of live entries: start over rather than grow.
                entries.clear();
            }
        }
        entries.insert(key, (Instant::now(), value));
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hit_within_ttl() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.insert("top:desc:0:10".to_string(), json!([1, 2]));
        assert_eq!(cache.get("top:desc:0:10"), Some(json!([1, 2])));
        assert_eq!(cache.get("top:asc:0:10"), None);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = ResponseCache::new(Duration::from_millis(1));
        cache.insert("k".to_string(), json!(1));
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_zero_ttl_disables() {
        let cache = ResponseCache::new(Duration::ZERO);
        cache.insert("k".to_string(), json!(1));
        assert!(cache.is_empty());
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_capacity_bound() {
        let cache = ResponseCache::with_capacity(Duration::from_secs(60), 2);
        cache.insert("a".to_string(), json!(1));
        cache.insert("b".to_string(), json!(2));
        cache.insert("c".to_string(), json!(3));
        assert!(cache.len() <= 2);
        assert_eq!(cache.get("c"), Some(json!(3)));
    }
}
