//! Name-keyed circuit breaker registry. Breakers are created lazily on
//! first use of a name and shared by every subsequent caller using that
//! same name — typically one breaker per bucket or per backend target.

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use dashmap::DashMap;
use std::sync::Arc;

pub struct CircuitBreakerManager {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerManager {
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// Returns the breaker registered under `name`, creating it with this
    /// manager's config if it doesn't exist yet.
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return Arc::clone(&existing);
        }
        Arc::clone(
            self.breakers
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(self.config)))
                .value(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_breaker_for_same_name() {
        let manager = CircuitBreakerManager::new(CircuitBreakerConfig::default());
        let a = manager.get("bucket-1");
        let b = manager.get("bucket-1");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn separate_names_get_separate_breakers() {
        let manager = CircuitBreakerManager::new(CircuitBreakerConfig::default());
        let a = manager.get("bucket-1");
        let b = manager.get("bucket-2");
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
