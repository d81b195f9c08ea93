// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: exporting redacted rasters and importing scanned pages.

pub mod export;
pub mod import;

pub use export::PdfExporter;
pub use import::PdfPageImporter;
