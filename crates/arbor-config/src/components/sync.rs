//! Replicated document settings

use serde::{Deserialize, Serialize};

/// Settings applied to every replicated tree document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    /// Compact tombstoned content. Disabling keeps full edit history at the
    /// cost of memory.
    pub gc_enabled: bool,
    /// Buffered frames per document broadcaster before a slow subscriber lags
    pub broadcast_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            gc_enabled: true,
            broadcast_capacity: 256,
        }
    }
}
