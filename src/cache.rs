//! Explicit TTL cache for loaded sheet data.
//!
//! Bounds spreadsheet API calls to one fetch per TTL window. Writes must
//! call [`TtlCache::invalidate`] so the next read sees fresh data.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct TtlCache<T> {
    ttl: Duration,
    entry: Option<(Instant, T)>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    /// Return the cached value if it is still inside the TTL window,
    /// otherwise run `refresh` and cache its result. A failed refresh leaves
    /// the cache empty.
    pub fn get_or_refresh<E>(&mut self, refresh: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        if let Some((stamp, value)) = &self.entry {
            if stamp.elapsed() < self.ttl {
                return Ok(value.clone());
            }
        }
        self.entry = None;
        let value = refresh()?;
        self.entry = Some((Instant::now(), value.clone()));
        Ok(value)
    }

    /// Drop the cached value. The next read refreshes from the source.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// Non-expired cached value, without refreshing.
    pub fn peek(&self) -> Option<&T> {
        match &self.entry {
            Some((stamp, value)) if stamp.elapsed() < self.ttl => Some(value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serves_cached_value_inside_ttl() {
        let mut cache = TtlCache::new(Duration::from_secs(60));
        let mut calls = 0;
        for _ in 0..3 {
            let value: Result<i32, ()> = cache.get_or_refresh(|| {
                calls += 1;
                Ok(42)
            });
            assert_eq!(value, Ok(42));
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn zero_ttl_always_refreshes() {
        let mut cache = TtlCache::new(Duration::ZERO);
        let mut calls = 0;
        for _ in 0..3 {
            let _: Result<i32, ()> = cache.get_or_refresh(|| {
                calls += 1;
                Ok(calls)
            });
        }
        assert_eq!(calls, 3);
    }

    #[test]
    fn invalidate_forces_refresh() {
        let mut cache = TtlCache::new(Duration::from_secs(60));
        let _: Result<i32, ()> = cache.get_or_refresh(|| Ok(1));
        cache.invalidate();
        assert!(cache.peek().is_none());
        let value: Result<i32, ()> = cache.get_or_refresh(|| Ok(2));
        assert_eq!(value, Ok(2));
    }

    #[test]
    fn failed_refresh_leaves_cache_empty() {
        let mut cache: TtlCache<i32> = TtlCache::new(Duration::from_secs(60));
        let result: Result<i32, &str> = cache.get_or_refresh(|| Err("backend down"));
        assert!(result.is_err());
        assert!(cache.peek().is_none());
    }
}
