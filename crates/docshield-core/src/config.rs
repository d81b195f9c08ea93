// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Editor configuration, persisted as JSON.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DocShieldError, Result};
use crate::types::BlurParameters;

const CONFIG_DIR: &str = "docshield";
const CONFIG_FILE: &str = "config.json";

/// Persistent editor settings.
///
/// Unknown keys are ignored and missing keys keep their defaults, so older
/// config files continue to load after new settings are added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Brush diameter in pixels for freehand painting.
    pub brush_size: u32,
    /// Gaussian intensity applied to masked regions.
    pub blur_intensity: u32,
    /// Number of sequential blur passes.
    pub blur_iterations: u32,
    /// Render `committed | temp` while a stroke is in progress.
    pub show_preview: bool,
    /// Directory of the last opened document.
    pub last_directory: Option<PathBuf>,
    /// Directory holding the OCR detection/recognition models. `None` uses
    /// the OCR engine's default cache location.
    pub ocr_model_dir: Option<PathBuf>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            brush_size: 20,
            blur_intensity: 15,
            blur_iterations: 5,
            show_preview: true,
            last_directory: None,
            ocr_model_dir: None,
        }
    }
}

impl EditorConfig {
    /// Blur parameters described by this configuration.
    pub fn blur_parameters(&self) -> BlurParameters {
        BlurParameters::new(self.blur_intensity, self.blur_iterations)
    }

    /// Read a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Read a config file, falling back to defaults when it is missing or
    /// unreadable.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Ignoring unreadable config");
                Self::default()
            }
        }
    }

    /// Write the config as pretty-printed JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Reject settings no editor session could use.
    pub fn validate(&self) -> Result<()> {
        if self.brush_size == 0 {
            return Err(DocShieldError::Config("brush_size must be positive".into()));
        }
        Ok(())
    }

    /// Default config location: `$XDG_CONFIG_HOME/docshield/config.json`,
    /// falling back to `~/.config/docshield/config.json`.
    pub fn default_path() -> PathBuf {
        config_base().join(CONFIG_DIR).join(CONFIG_FILE)
    }
}

fn config_base() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".config");
    }
    // Last resort
    PathBuf::from(".")
}
