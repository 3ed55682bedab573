//! View configuration.
//!
//! Every field has a documented default that callers may rely on; a config file only needs
//! the fields it changes:
//!
//! ```toml
//! height = 600
//! chunk_size = 200
//! mode = "infinite"
//! ```

use flowview::{ItemKey, WindowOptions};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, FetchMode, StoreOptions};

/// Configuration for a flow-log view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Viewport height in pixels. Default `400`.
    pub height: u32,
    /// Row height in pixels. Default `36`.
    pub item_size: u32,
    /// Rows rendered beyond each edge of the viewport. Default `5`.
    pub overscan: usize,
    /// Items per cached chunk. Default `100`.
    pub chunk_size: usize,
    /// Upper bound on cached chunks. Default `10`.
    pub max_cached_chunks: usize,
    /// Items per cooperative batch. Default `1000`.
    pub batch_size: usize,
    /// Trailing-edge delay for scroll-driven loads. Default `50`.
    pub debounce_ms: u64,
    /// Rows per page for the pagination manager. Default `50`.
    pub page_size: usize,
    /// Skeleton rows appended while more data may exist. Default `3`.
    pub loading_placeholders: usize,
    /// Default `discrete`.
    pub mode: FetchMode,
    /// Shown when a loaded dataset has no rows. Default `"No data"`.
    pub empty_message: String,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            height: 400,
            item_size: 36,
            overscan: 5,
            chunk_size: 100,
            max_cached_chunks: 10,
            batch_size: 1000,
            debounce_ms: 50,
            page_size: 50,
            loading_placeholders: 3,
            mode: FetchMode::Discrete,
            empty_message: "No data".to_string(),
        }
    }
}

impl ViewConfig {
    /// Parses and validates a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: ViewConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects non-positive sizes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let result = if self.item_size == 0 {
            Err(ConfigError::InvalidItemSize)
        } else if self.chunk_size == 0 {
            Err(ConfigError::InvalidChunkSize)
        } else if self.max_cached_chunks == 0 {
            Err(ConfigError::InvalidMaxCachedChunks)
        } else if self.page_size == 0 {
            Err(ConfigError::InvalidPageSize)
        } else {
            Ok(())
        };
        if let Err(_error) = &result {
            vwarn!(error = %_error, "invalid view config");
        }
        result
    }

    /// Window options for an initially empty list that grows as data arrives.
    pub fn window_options(&self) -> WindowOptions<ItemKey> {
        WindowOptions::new(0, self.item_size)
            .with_overscan(self.overscan)
            .with_loading_placeholders(self.loading_placeholders)
            .with_initial_viewport(self.height)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            chunk_size: self.chunk_size,
            max_cached_chunks: self.max_cached_chunks,
        }
    }
}
