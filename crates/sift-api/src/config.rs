//! Query execution settings.

use serde::{Deserialize, Serialize};
use sift_core::{Error, Result};

/// Settings applied by a [`QueryFactory`](crate::QueryFactory) to every query it runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Largest page a paged fetch returns; larger requests are clamped
    pub max_page_size: usize,
    /// Queries slower than this are logged at `warn`
    pub slow_query_threshold_ms: Option<u64>,
    /// Log each statement at `debug` before it runs
    pub log_statements: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_page_size: 1000,
            slow_query_threshold_ms: Some(500),
            log_statements: true,
        }
    }
}

impl QueryConfig {
    /// Set the page size limit
    pub fn with_max_page_size(mut self, size: usize) -> Self {
        self.max_page_size = size;
        self
    }

    /// Set the slow query threshold; `None` disables the warning
    pub fn with_slow_query_threshold_ms(mut self, threshold: Option<u64>) -> Self {
        self.slow_query_threshold_ms = threshold;
        self
    }

    /// Enable or disable statement logging
    pub fn with_log_statements(mut self, enabled: bool) -> Self {
        self.log_statements = enabled;
        self
    }

    /// Rejects settings no query could run under.
    pub fn validate(&self) -> Result<()> {
        if self.max_page_size == 0 {
            return Err(Error::Config("max_page_size must be at least 1".to_string()));
        }
        Ok(())
    }
}
