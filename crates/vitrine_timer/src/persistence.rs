//! Timer state in the key-value store
//!
//! Each timer owns two keys namespaced by its id: `@value-{id}` holds the
//! counter as a decimal integer and `@time-{id}` the Unix-epoch millisecond
//! at which it was saved.

use std::sync::Arc;
use vitrine_platform::KeyValueStorage;

/// Counter value and the wall time it was saved at
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PersistedSnapshot {
    pub value: i64,
    pub time_ms: i64,
}

/// Reads and writes one timer's keys
#[derive(Clone)]
pub struct TimerPersistence {
    storage: Arc<dyn KeyValueStorage>,
    value_key: String,
    time_key: String,
}

impl TimerPersistence {
    pub fn new(id: &str, storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            value_key: format!("@value-{id}"),
            time_key: format!("@time-{id}"),
        }
    }

    pub fn value_key(&self) -> &str {
        &self.value_key
    }

    pub fn time_key(&self) -> &str {
        &self.time_key
    }

    pub fn save_value(&self, value: i64) {
        self.storage.set(&self.value_key, &value.to_string());
    }

    pub fn save_time(&self, now_ms: i64) {
        self.storage.set(&self.time_key, &now_ms.to_string());
    }

    /// Saved snapshot, if both keys hold parseable numbers
    pub fn load(&self) -> Option<PersistedSnapshot> {
        let value = self.read(&self.value_key)?;
        let time_ms = self.read(&self.time_key)?;
        Some(PersistedSnapshot { value, time_ms })
    }

    pub fn load_time(&self) -> Option<i64> {
        self.read(&self.time_key)
    }

    pub fn clear(&self) {
        self.storage.delete(&self.value_key);
        self.storage.delete(&self.time_key);
    }

    fn read(&self, key: &str) -> Option<i64> {
        let raw = self.storage.get_string(key)?;
        match raw.trim().parse() {
            Ok(number) => Some(number),
            Err(err) => {
                tracing::warn!("Ignoring unparseable timer state {}={:?}: {}", key, raw, err);
                None
            }
        }
    }
}

impl std::fmt::Debug for TimerPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerPersistence")
            .field("value_key", &self.value_key)
            .field("time_key", &self.time_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrine_platform::MemoryStorage;

    #[test]
    fn test_keys_are_namespaced_by_id() {
        let storage = Arc::new(MemoryStorage::new());
        let persistence = TimerPersistence::new("sleep", storage.clone());
        assert_eq!(persistence.value_key(), "@value-sleep");
        assert_eq!(persistence.time_key(), "@time-sleep");

        persistence.save_value(0);
        persistence.save_time(1_700_000_000_000);
        assert_eq!(storage.get_string("@value-sleep").as_deref(), Some("0"));
        assert_eq!(
            persistence.load(),
            Some(PersistedSnapshot {
                value: 0,
                time_ms: 1_700_000_000_000
            })
        );

        persistence.clear();
        persistence.clear();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_partial_or_garbage_state_is_ignored() {
        let storage = Arc::new(MemoryStorage::new());
        let persistence = TimerPersistence::new("t", storage.clone());

        storage.set("@value-t", "12");
        assert_eq!(persistence.load(), None);

        storage.set("@time-t", "yesterday");
        assert_eq!(persistence.load(), None);
        assert_eq!(persistence.load_time(), None);

        storage.set("@time-t", "5000");
        assert_eq!(persistence.load().map(|s| s.value), Some(12));
    }
}
