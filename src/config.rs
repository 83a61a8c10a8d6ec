use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration consumed by the download engine. Populated by whatever
/// front end drives the coordinator; the engine itself never persists it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory receiving both in-flight `.part` files and final parts.
    pub dest_dir: PathBuf,
    /// Maximum simultaneous transfers. Always at least 1.
    pub concurrency: usize,
    /// Run the archive extractor once every item is terminal.
    pub auto_extract: bool,
    /// Delete part files after a successful extraction.
    pub cleanup_after_extract: bool,
    /// Connect and per-read HTTP timeout in seconds. Never unbounded,
    /// but never a deadline on a whole transfer either.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dest_dir: PathBuf::from("downloads"),
            concurrency: 3,
            auto_extract: true,
            cleanup_after_extract: false,
            timeout_secs: 30,
            user_agent: concat!("EasyParts/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_finite() {
        let mut config = EngineConfig::default();
        config.timeout_secs = 0;
        assert_eq!(config.timeout(), Duration::from_secs(1));
    }
}
