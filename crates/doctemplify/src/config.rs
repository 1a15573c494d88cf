/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Engine configuration.
//!
//! All fields have defaults, so an empty TOML file (or none at all) gives
//! the standard behavior.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DoctemplifyError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Placeholder name prefix that marks an image placeholder.
    pub image_marker: String,
    /// Image width used when the data entry has none.
    pub default_image_width: f64,
    /// Image height used when the data entry has none.
    pub default_image_height: f64,
    /// Font size used when a `font-size` value does not parse.
    pub default_font_size: f64,
    /// Whether placeholder replacement is case sensitive.
    pub match_case: bool,
    /// Extra attempts for read-only calls. Mutations are never retried.
    pub read_retries: u32,
    /// Bullet preset applied to list elements.
    pub list_bullet_preset: String,
    /// Fonts accepted in addition to the built-in list.
    pub extra_fonts: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            image_marker: "IMAGE_PLACEHOLDER".to_string(),
            default_image_width: 600.0,
            default_image_height: 400.0,
            default_font_size: 11.0,
            match_case: true,
            read_retries: 2,
            list_bullet_preset: "BULLET_DISC_CIRCLE_SQUARE".to_string(),
            extra_fonts: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| DoctemplifyError::Config {
            message: e.to_string(),
        })
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| DoctemplifyError::Config {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&content)
    }
}
