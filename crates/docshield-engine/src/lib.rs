// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docshield-engine: redaction engine for DocShield.
//
// Provides the raster buffer, the committed/temporary mask layer, the cached
// ROI blur compositor, OCR-driven sensitive-region detection, PDF page import
// and export, and the `ImageProcessor` session facade tying them together.

pub mod blur;
pub mod detect;
pub mod mask;
pub mod pdf;
pub mod processor;
pub mod raster;

// Re-export the primary structs so callers can use `docshield_engine::ImageProcessor` etc.
pub use blur::{BlurCompositor, Roi};
pub use detect::{NoOcr, OcrCapability, OcrToken, SensitiveRegionDetector};
pub use mask::MaskLayer;
pub use pdf::{PdfExporter, PdfPageImporter};
pub use processor::ImageProcessor;
pub use raster::RasterBuffer;

#[cfg(feature = "ocr")]
pub use detect::OcrsRecognizer;
