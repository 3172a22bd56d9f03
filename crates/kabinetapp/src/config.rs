//! # Configuration
//!
//! Layered loading via [`confique`], resolved in priority order:
//!
//! 1. Environment variables (`KABINET_LOCALE`, `KABINET_PAGE_SIZE`, ...).
//! 2. A `kabinet.toml` file, when one is passed to [`KabinetConfig::load`].
//! 3. Compiled defaults.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `locale` | `en` | Preferred locale for localized labels |
//! | `page_size` | `20` | Default item page size (`0` disables paging) |
//! | `media_dir` | *(none)* | Media blob directory; unset disables media storage |

use std::path::Path;

use confique::Config;
use serde::{Deserialize, Serialize};

use crate::error::{KabinetError, Result};

/// Configuration for kabinet, stored in `kabinet.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct KabinetConfig {
    /// Preferred locale for localized names and labels.
    #[config(env = "KABINET_LOCALE", default = "en")]
    pub locale: String,

    /// Default page size for item listings. Zero disables pagination.
    #[config(env = "KABINET_PAGE_SIZE", default = 20)]
    pub page_size: usize,

    /// Directory for media blobs. When absent, media storage is disabled
    /// and covers keep their original references.
    #[config(env = "KABINET_MEDIA_DIR")]
    pub media_dir: Option<String>,
}

impl Default for KabinetConfig {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            page_size: 20,
            media_dir: None,
        }
    }
}

impl KabinetConfig {
    /// Load configuration, layering environment over an optional TOML file
    /// over defaults. A missing file is fine; a malformed one is not.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Self::builder().env();
        if let Some(file) = file {
            builder = builder.file(file);
        }
        builder
            .load()
            .map_err(|e| KabinetError::Validation(format!("invalid configuration: {e}")))
    }
}
