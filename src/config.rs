//! Configuration for scoring and searching.

use serde::{Deserialize, Serialize};

use crate::expression::DEFAULT_EXPRESSION_CACHE_CAPACITY;
use crate::query::DEFAULT_GLOBAL_STATE_CAPACITY;

/// Configuration of an [`IndexSearcher`](crate::search::IndexSearcher).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Maximum number of entries in the global state store.
    pub global_state_capacity: u64,

    /// Maximum number of compiled scoring functions kept.
    pub expression_cache_capacity: u64,

    /// Whether segments are scored in parallel.
    pub parallel: bool,

    /// Thread pool size for parallel execution.
    /// If None, uses the number of CPU cores.
    pub num_threads: Option<usize>,

    /// Number of hits returned when the caller does not say.
    pub default_top_k: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            global_state_capacity: DEFAULT_GLOBAL_STATE_CAPACITY,
            expression_cache_capacity: DEFAULT_EXPRESSION_CACHE_CAPACITY,
            parallel: true,
            num_threads: None,
            default_top_k: 10,
        }
    }
}

impl ScoringConfig {
    /// Set the global state capacity.
    pub fn with_global_state_capacity(mut self, capacity: u64) -> Self {
        self.global_state_capacity = capacity;
        self
    }

    /// Set the expression cache capacity.
    pub fn with_expression_cache_capacity(mut self, capacity: u64) -> Self {
        self.expression_cache_capacity = capacity;
        self
    }

    /// Set whether segments are scored in parallel.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the thread pool size.
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Set the default number of hits.
    pub fn with_default_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = top_k;
        self
    }

    /// Thread pool size, falling back to the number of CPU cores.
    pub fn thread_count(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScoringConfig::default();
        assert_eq!(config.global_state_capacity, 100_000);
        assert_eq!(config.expression_cache_capacity, 1024);
        assert!(config.parallel);
        assert!(config.thread_count() > 0);
        assert_eq!(config.default_top_k, 10);
    }

    #[test]
    fn test_builders() {
        let config = ScoringConfig::default()
            .with_global_state_capacity(10)
            .with_expression_cache_capacity(5)
            .with_parallel(false)
            .with_num_threads(3)
            .with_default_top_k(7);
        assert_eq!(config.global_state_capacity, 10);
        assert_eq!(config.expression_cache_capacity, 5);
        assert!(!config.parallel);
        assert_eq!(config.thread_count(), 3);
        assert_eq!(config.default_top_k, 7);
    }

    #[test]
    fn test_partial_json() {
        let config: ScoringConfig = serde_json::from_str(r#"{"parallel": false}"#).unwrap();
        assert!(!config.parallel);
        assert_eq!(config.global_state_capacity, DEFAULT_GLOBAL_STATE_CAPACITY);
    }
}
