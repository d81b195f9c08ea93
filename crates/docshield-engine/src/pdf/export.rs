// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF export: place a redacted raster on a single page using `printpdf` 0.8.
//
// The page is US Letter for landscape images and A4 otherwise. The image is
// scaled to fit inside a 50 pt margin (up or down) and centred.

use std::path::Path;

use docshield_core::PaperSize;
use docshield_core::error::{DocShieldError, Result};
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use tracing::{debug, info, instrument, warn};

use crate::raster::RasterBuffer;

/// Page margin on every side, in points.
pub const PAGE_MARGIN_PT: f32 = 50.0;

/// At 72 dpi one image pixel maps to one point before scaling.
const PLACEMENT_DPI: f32 = 72.0;

pub const DOCUMENT_TITLE: &str = "Protected Document";
pub const DOCUMENT_AUTHOR: &str = "DocShield";
pub const DOCUMENT_SUBJECT: &str = "Document with sensitive information redacted";

/// Where an image lands on the page, in points from the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub scale: f32,
}

/// Fit a `width`×`height` pixel image inside the margins of a page measured
/// in points, preserving aspect ratio.
pub fn fit_image(width: u32, height: u32, page_w_pt: f32, page_h_pt: f32) -> Result<Placement> {
    if width == 0 || height == 0 {
        return Err(DocShieldError::PdfLayout(format!(
            "cannot place a {}x{} image",
            width, height
        )));
    }

    let usable_w = page_w_pt - 2.0 * PAGE_MARGIN_PT;
    let usable_h = page_h_pt - 2.0 * PAGE_MARGIN_PT;
    if usable_w <= 0.0 || usable_h <= 0.0 {
        return Err(DocShieldError::PdfLayout(format!(
            "page {}x{} pt leaves no room inside the margins",
            page_w_pt, page_h_pt
        )));
    }

    let scale = (usable_w / width as f32).min(usable_h / height as f32);
    let rendered_w = width as f32 * scale;
    let rendered_h = height as f32 * scale;

    Ok(Placement {
        x: (page_w_pt - rendered_w) / 2.0,
        y: (page_h_pt - rendered_h) / 2.0,
        width: rendered_w,
        height: rendered_h,
        scale,
    })
}

/// Builds the single-page redaction PDF.
#[derive(Debug, Clone)]
pub struct PdfExporter {
    title: String,
    author: String,
    subject: String,
}

impl Default for PdfExporter {
    fn default() -> Self {
        Self {
            title: DOCUMENT_TITLE.into(),
            author: DOCUMENT_AUTHOR.into(),
            subject: DOCUMENT_SUBJECT.into(),
        }
    }
}

impl PdfExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialise `raster` as a one-page PDF.
    #[instrument(skip_all, fields(width = raster.width(), height = raster.height()))]
    pub fn create_from_raster(&self, raster: &RasterBuffer) -> Result<Vec<u8>> {
        let (width, height) = raster.dimensions();
        let paper = PaperSize::for_image(width, height);
        let (w_mm, h_mm) = paper.dimensions_mm();
        let (page_w, page_h) = (Mm(w_mm), Mm(h_mm));

        let placement = fit_image(width, height, page_w.into_pt().0, page_h.into_pt().0)?;
        info!(?paper, scale = placement.scale, "Creating redacted PDF");

        let raw = RawImage {
            pixels: RawImageData::U8(raster.as_raw().to_vec()),
            width: width as usize,
            height: height as usize,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };

        let mut doc = PdfDocument::new(&self.title);
        doc.metadata.info.author = self.author.clone();
        doc.metadata.info.subject = self.subject.clone();
        let xobject_id = doc.add_image(&raw);

        let ops = vec![Op::UseXobject {
            id: xobject_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(placement.x)),
                translate_y: Some(Pt(placement.y)),
                scale_x: Some(placement.scale),
                scale_y: Some(placement.scale),
                dpi: Some(PLACEMENT_DPI),
                rotate: None,
            },
        }];
        doc.with_pages(vec![PdfPage::new(page_w, page_h, ops)]);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            warn!(count = warnings.len(), "printpdf reported warnings");
        }

        debug!(
            rendered_w_pt = placement.width,
            rendered_h_pt = placement.height,
            bytes = output.len(),
            "Image placed on page"
        );
        Ok(output)
    }

    /// Serialise `raster` and write it to `path`.
    pub fn write_to_file(&self, raster: &RasterBuffer, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.create_from_raster(raster)?;
        std::fs::write(path.as_ref(), &bytes)?;
        info!("Wrote PDF to {}", path.as_ref().display());
        Ok(())
    }
}
