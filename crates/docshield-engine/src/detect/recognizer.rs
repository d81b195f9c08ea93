// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Word-level OCR backed by the `ocrs` crate, a pure-Rust engine running
// neural network models via `rten`.
//
// # Feature Gate
//
// Only compiled with the `ocr` feature:
//
// ```toml
// docshield-engine = { path = "crates/docshield-engine", features = ["ocr"] }
// ```
//
// # Model Setup
//
// Two model files are required:
//
// - **Detection model** (`text-detection.rten`): locates words.
// - **Recognition model** (`text-recognition.rten`): decodes characters.
//
// Running `ocrs-cli` once downloads both into `$XDG_CACHE_HOME/ocrs`
// (typically `~/.cache/ocrs`), which is where [`ModelPaths::default`] looks.

use std::path::{Path, PathBuf};

use docshield_core::error::{DocShieldError, Result};
use image::RgbImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams, TextItem};
use rten::Model;
use rten_imageproc::Rect;
use tracing::{debug, info, instrument};

use super::capability::{OcrCapability, OcrToken};

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// `$XDG_CACHE_HOME/ocrs`, falling back to `~/.cache/ocrs`.
fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// Locations of the detection and recognition models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub detection: PathBuf,
    pub recognition: PathBuf,
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl ModelPaths {
    /// Both models inside `dir` under their well-known filenames.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection: dir.join(DETECTION_MODEL_FILENAME),
            recognition: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    fn validate(&self) -> Result<()> {
        for path in [&self.detection, &self.recognition] {
            if !path.exists() {
                return Err(DocShieldError::Ocr(format!(
                    "model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// [`OcrCapability`] implemented with `ocrs`.
///
/// Model loading is the expensive step; build one recognizer per session.
pub struct OcrsRecognizer {
    engine: OcrEngine,
}

impl OcrsRecognizer {
    /// Load both models.
    ///
    /// `ocrs` and `rten` are extremely slow in debug builds; compile them in
    /// release mode for interactive use.
    #[instrument(skip_all, fields(
        detection = %paths.detection.display(),
        recognition = %paths.recognition.display(),
    ))]
    pub fn new(paths: &ModelPaths) -> Result<Self> {
        paths.validate()?;

        let load = |path: &Path| {
            Model::load_file(path).map_err(|err| {
                DocShieldError::Ocr(format!(
                    "failed to load model from {}: {}",
                    path.display(),
                    err
                ))
            })
        };

        info!("Loading OCR models");
        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(load(&paths.detection)?),
            recognition_model: Some(load(&paths.recognition)?),
            ..Default::default()
        })
        .map_err(|err| DocShieldError::Ocr(format!("failed to initialise OCR engine: {}", err)))?;

        info!("OCR engine initialised");
        Ok(Self { engine })
    }

    /// Load models from the default cache directory.
    pub fn with_defaults() -> Result<Self> {
        Self::new(&ModelPaths::default())
    }

    /// Load models from `dir`.
    pub fn from_model_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Self::new(&ModelPaths::from_dir(dir))
    }
}

impl OcrCapability for OcrsRecognizer {
    fn is_available(&self) -> bool {
        true
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn recognize(&self, image: &RgbImage) -> Result<Vec<OcrToken>> {
        let (width, height) = image.dimensions();
        let source = ImageSource::from_bytes(image.as_raw(), (width, height)).map_err(|err| {
            DocShieldError::Ocr(format!(
                "failed to create image source ({}x{}): {}",
                width, height, err
            ))
        })?;

        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| DocShieldError::Ocr(format!("OCR preprocessing failed: {}", err)))?;

        let word_rects = self
            .engine
            .detect_words(&input)
            .map_err(|err| DocShieldError::Ocr(format!("word detection failed: {}", err)))?;
        let line_rects = self.engine.find_text_lines(&input, &word_rects);
        let lines = self
            .engine
            .recognize_text(&input, &line_rects)
            .map_err(|err| DocShieldError::Ocr(format!("line recognition failed: {}", err)))?;

        let tokens: Vec<OcrToken> = lines
            .iter()
            .flatten()
            .flat_map(|line| line.words())
            .filter_map(|word| {
                let text = word.to_string();
                if text.trim().is_empty() {
                    return None;
                }
                Some(token_from_rect(text, word.bounding_rect()))
            })
            .collect();

        debug!(
            words = word_rects.len(),
            lines = line_rects.len(),
            tokens = tokens.len(),
            "OCR recognition complete"
        );
        Ok(tokens)
    }
}

/// Convert an `ocrs` bounding box to a token, clipping negative coordinates.
fn token_from_rect(text: String, rect: Rect<i32>) -> OcrToken {
    OcrToken {
        text,
        x: rect.left().max(0) as u32,
        y: rect.top().max(0) as u32,
        width: rect.width().max(0) as u32,
        height: rect.height().max(0) as u32,
    }
}
