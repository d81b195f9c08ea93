// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for DocShield.

use thiserror::Error;

/// Top-level error type for all DocShield operations.
///
/// Degenerate geometry (zero-sized shapes, empty regions of interest) is
/// deliberately absent: those cases are no-ops, not failures.
#[derive(Debug, Error)]
pub enum DocShieldError {
    // -- Raster I/O --
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    // -- PDF --
    #[error("PDF layout failed: {0}")]
    PdfLayout(String),

    #[error("PDF import failed: {0}")]
    PdfImport(String),

    // -- OCR --
    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("capability not available: {0}")]
    CapabilityUnavailable(&'static str),

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocShieldError>;
