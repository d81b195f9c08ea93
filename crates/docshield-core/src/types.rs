// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the DocShield redaction engine.

use serde::{Deserialize, Serialize};

/// Largest intensity honoured by the compositor; higher values are clamped.
pub const MAX_INTENSITY: u32 = 255;

/// Blur strength used when compositing the mask over the original image.
///
/// `intensity` controls the per-pass Gaussian kernel (`2 * intensity + 1`)
/// and `iterations` the number of sequential passes. Both are plain values
/// handed to every compositing call; the engine keeps no slider state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlurParameters {
    pub intensity: u32,
    pub iterations: u32,
}

impl BlurParameters {
    pub const fn new(intensity: u32, iterations: u32) -> Self {
        Self {
            intensity,
            iterations,
        }
    }

    /// Intensity clamped to `1..=MAX_INTENSITY`.
    pub fn effective_intensity(&self) -> u32 {
        self.intensity.clamp(1, MAX_INTENSITY)
    }

    /// Odd Gaussian kernel size for one blur pass.
    pub fn kernel_size(&self) -> u32 {
        self.effective_intensity().saturating_mul(2).saturating_add(1)
    }

    /// Padding added around the mask bounding box before blurring.
    pub fn roi_margin(&self) -> u32 {
        self.effective_intensity().saturating_mul(2).max(5)
    }
}

impl Default for BlurParameters {
    fn default() -> Self {
        Self::new(15, 5)
    }
}

/// Which mask bitmap a paint operation writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaskTarget {
    /// The persistent mask that defines what is blurred on save/export.
    Committed,
    /// Scratch space for one in-progress stroke.
    Temp,
}

/// Classification tag attached to a detected sensitive region.
///
/// Variant order is the classification order: a token is tagged with the
/// first kind whose pattern matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    /// Brazilian individual taxpayer number (`000.000.000-00`).
    Cpf,
    /// Brazilian identity card number.
    Rg,
    Email,
    Phone,
    /// Calendar date in `DD/MM/YYYY` form.
    Date,
    /// Brazilian postal code (`00000-000`).
    Cep,
    /// 16-digit grouped payment card number.
    Card,
}

impl RegionKind {
    /// All kinds in classification order.
    pub const ALL: [RegionKind; 7] = [
        Self::Cpf,
        Self::Rg,
        Self::Email,
        Self::Phone,
        Self::Date,
        Self::Cep,
        Self::Card,
    ];

    /// Short lowercase tag (e.g. `"cpf"`).
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Cpf => "cpf",
            Self::Rg => "rg",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Date => "date",
            Self::Cep => "cep",
            Self::Card => "card",
        }
    }
}

impl std::fmt::Display for RegionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Axis-aligned rectangle flagged as containing personal information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitiveRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub kind: RegionKind,
}

impl SensitiveRegion {
    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }
}

/// Page sizes used for PDF export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
    Letter,
}

impl PaperSize {
    /// Dimensions in millimetres (width, height), portrait.
    pub fn dimensions_mm(&self) -> (f32, f32) {
        match self {
            Self::A4 => (210.0, 297.0),
            Self::Letter => (215.9, 279.4),
        }
    }

    /// Export page for an image of the given size: landscape images go on
    /// Letter, portrait and square ones on A4.
    pub fn for_image(width: u32, height: u32) -> Self {
        if height > 0 && width as f64 / height as f64 > 1.0 {
            Self::Letter
        } else {
            Self::A4
        }
    }
}
