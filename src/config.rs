//! Store connection parameters.
//!
//! Values are read once, at process start, by the host and handed to
//! [`crate::remote_store::RemoteStore::open`]. The adapter itself never
//! touches the environment.

use std::path::PathBuf;

use log::warn;

pub const ENV_DB_PATH: &str = "PROMPT_SHELF_DB_PATH";
pub const ENV_MAP_SIZE: &str = "PROMPT_SHELF_MAP_SIZE";
pub const ENV_MAX_READERS: &str = "PROMPT_SHELF_MAX_READERS";

pub const DEFAULT_MAP_SIZE: usize = 64 * 1024 * 1024;
pub const DEFAULT_MAX_READERS: u32 = 126;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding the LMDB environment. Created if missing.
    pub path: PathBuf,
    /// Maximum size of the memory map in bytes.
    pub map_size: usize,
    pub max_readers: u32,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            map_size: DEFAULT_MAP_SIZE,
            max_readers: DEFAULT_MAX_READERS,
        }
    }

    /// Builds the configuration from process environment variables.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// Returns `None` when the required path is absent or blank; the store
    /// then runs unconfigured. Malformed optional values fall back to their
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = match lookup(ENV_DB_PATH) {
            Some(p) if !p.trim().is_empty() => p.trim().to_string(),
            _ => {
                warn!("{ENV_DB_PATH} is not set; prompt store will run unconfigured");
                return None;
            }
        };

        let mut config = StoreConfig::new(path);

        if let Some(raw) = lookup(ENV_MAP_SIZE) {
            match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => config.map_size = size,
                _ => warn!("Ignoring invalid {ENV_MAP_SIZE} value: {raw}"),
            }
        }

        if let Some(raw) = lookup(ENV_MAX_READERS) {
            match raw.trim().parse::<u32>() {
                Ok(readers) if readers > 0 => config.max_readers = readers,
                _ => warn!("Ignoring invalid {ENV_MAX_READERS} value: {raw}"),
            }
        }

        Some(config)
    }
}
