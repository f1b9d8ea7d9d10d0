//! Advisory cache port.
//!
//! A cache may lose, expire or refuse entries at any time; callers must
//! behave identically with [`NoopCache`].

pub trait CachePort {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String) -> bool;
    /// Drop every entry whose key starts with `prefix`; returns the number removed.
    fn invalidate_prefix(&self, prefix: &str) -> usize;
}

/// Cache that stores nothing.
pub struct NoopCache;

impl CachePort for NoopCache {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: String) -> bool {
        false
    }

    fn invalidate_prefix(&self, _prefix: &str) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_never_hits() {
        let cache = NoopCache;
        assert!(!cache.set("k", "v".into()));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.invalidate_prefix("k"), 0);
    }
}
