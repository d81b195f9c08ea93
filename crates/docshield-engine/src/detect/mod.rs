// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sensitive-region detection: OCR tokens classified against a fixed,
// ordered list of personal-data patterns.
//
// A token is tagged with the FIRST pattern that matches, in this order:
//
//   cpf, rg, email, phone, date (DD/MM/YYYY), cep, card
//
// Patterns overlap (an 11-digit CPF also satisfies the RG and card shapes,
// a CEP can appear inside a longer number), so the order is part of the
// contract and must not be rearranged.

pub mod capability;

#[cfg(feature = "ocr")]
pub mod recognizer;

use std::sync::LazyLock;

use docshield_core::{RegionKind, SensitiveRegion};
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::raster::RasterBuffer;

pub use capability::{NoOcr, OcrCapability, OcrToken};

#[cfg(feature = "ocr")]
pub use recognizer::OcrsRecognizer;

/// Padding added around every matched token, in pixels.
pub const REGION_PADDING: u32 = 5;

/// Classification patterns in precedence order. Matching is unanchored: a
/// pattern hits if it occurs anywhere in the token.
const PATTERNS: [(RegionKind, &str); 7] = [
    (RegionKind::Cpf, r"\d{3}\.?\d{3}\.?\d{3}-?\d{2}"),
    (RegionKind::Rg, r"\d{1,2}\.?\d{3}\.?\d{3}-?[\dX]"),
    (
        RegionKind::Email,
        r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}",
    ),
    (
        RegionKind::Phone,
        r"(?:\+\d{2})?\s*\(?\d{2}\)?\s*\d{4,5}-?\d{4}",
    ),
    (RegionKind::Date, r"\d{2}/\d{2}/\d{4}"),
    (RegionKind::Cep, r"\d{5}-?\d{3}"),
    (RegionKind::Card, r"\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}"),
];

static COMPILED: LazyLock<Vec<(RegionKind, Regex)>> = LazyLock::new(|| {
    PATTERNS
        .iter()
        .map(|(kind, pattern)| {
            let regex = Regex::new(pattern).expect("built-in pattern must compile");
            (*kind, regex)
        })
        .collect()
});

/// Finds personal data in an image via OCR.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensitiveRegionDetector;

impl SensitiveRegionDetector {
    pub fn new() -> Self {
        Self
    }

    /// First matching kind for `text`, or `None` for blank or innocuous text.
    pub fn classify(&self, text: &str) -> Option<RegionKind> {
        if text.trim().is_empty() {
            return None;
        }
        COMPILED
            .iter()
            .find(|(_, regex)| regex.is_match(text))
            .map(|(kind, _)| *kind)
    }

    /// Classify already-recognised tokens.
    pub fn classify_tokens(&self, tokens: &[OcrToken]) -> Vec<SensitiveRegion> {
        tokens
            .iter()
            .filter_map(|token| {
                let kind = self.classify(&token.text)?;
                debug!(%kind, x = token.x, y = token.y, "Sensitive token");
                Some(padded_region(token, kind))
            })
            .collect()
    }

    /// Run OCR over `raster` and return every flagged region.
    ///
    /// A failed recognition yields an empty list. Availability is the caller's
    /// concern; the session facade checks its cached flag before calling.
    #[instrument(skip_all, fields(width = raster.width(), height = raster.height()))]
    pub fn detect(&self, raster: &RasterBuffer, ocr: &dyn OcrCapability) -> Vec<SensitiveRegion> {
        if raster.is_empty() {
            return Vec::new();
        }

        let tokens = match ocr.recognize(raster.as_rgb()) {
            Ok(tokens) => tokens,
            Err(err) => {
                warn!(error = %err, "OCR failed; no regions detected");
                return Vec::new();
            }
        };

        let regions = self.classify_tokens(&tokens);
        info!(
            tokens = tokens.len(),
            regions = regions.len(),
            "Sensitive-region detection complete"
        );
        regions
    }
}

fn padded_region(token: &OcrToken, kind: RegionKind) -> SensitiveRegion {
    SensitiveRegion {
        x: token.x.saturating_sub(REGION_PADDING),
        y: token.y.saturating_sub(REGION_PADDING),
        width: token.width.saturating_add(2 * REGION_PADDING),
        height: token.height.saturating_add(2 * REGION_PADDING),
        kind,
    }
}
