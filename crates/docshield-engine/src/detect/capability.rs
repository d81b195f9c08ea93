// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR capability seam. The detector only ever talks to this trait; whether a
// real engine is behind it is decided once, when the processor is built.

use docshield_core::error::{DocShieldError, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// One recognised word with its bounding box in image pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrToken {
    pub text: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Text recognition as seen by the sensitive-region detector.
pub trait OcrCapability {
    /// Whether recognition can run at all. Queried once per processor.
    fn is_available(&self) -> bool;

    /// Recognise word-level tokens in `image`.
    fn recognize(&self, image: &RgbImage) -> Result<Vec<OcrToken>>;
}

/// Capability used when no OCR engine is installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOcr;

impl OcrCapability for NoOcr {
    fn is_available(&self) -> bool {
        false
    }

    fn recognize(&self, _image: &RgbImage) -> Result<Vec<OcrToken>> {
        Err(DocShieldError::CapabilityUnavailable("OCR"))
    }
}
