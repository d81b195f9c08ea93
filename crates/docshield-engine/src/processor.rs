// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: one redaction session over one image.
//
// Owns the original raster, the mask layer, the blur compositor and the
// sensitive-region detector. Every mutating call takes `&mut self`; callers
// sharing a processor across threads must hold their own lock across each
// paint-then-render sequence.

use std::path::Path;

use docshield_core::error::{DocShieldError, Result};
use docshield_core::{BlurParameters, MaskTarget, SensitiveRegion};
use image::imageops::FilterType;
use tracing::{debug, error, info, instrument, warn};

use crate::blur::BlurCompositor;
use crate::detect::{NoOcr, OcrCapability, SensitiveRegionDetector};
use crate::mask::MaskLayer;
use crate::pdf::{PdfExporter, PdfPageImporter};
use crate::raster::RasterBuffer;

/// Parameters used for thumbnails, independent of the caller's sliders.
pub const THUMBNAIL_PARAMETERS: BlurParameters = BlurParameters::new(15, 5);

/// Redaction session facade.
pub struct ImageProcessor {
    original: Option<RasterBuffer>,
    current: Option<RasterBuffer>,
    mask: MaskLayer,
    compositor: BlurCompositor,
    detector: SensitiveRegionDetector,
    ocr: Box<dyn OcrCapability>,
    ocr_available: bool,
    sensitive_regions: Vec<SensitiveRegion>,
}

impl std::fmt::Debug for ImageProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageProcessor")
            .field("dimensions", &self.get_dimensions())
            .field("mask_generation", &self.mask.generation())
            .field("ocr_available", &self.ocr_available)
            .field("sensitive_regions", &self.sensitive_regions.len())
            .finish()
    }
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Processor with the default OCR backend.
    ///
    /// With the `ocr` feature this loads the `ocrs` models from the default
    /// cache directory; if they are missing, detection is disabled.
    pub fn new() -> Self {
        Self::with_ocr(default_ocr())
    }

    /// Processor using `ocr` for detection. Availability is checked once here.
    pub fn with_ocr(ocr: Box<dyn OcrCapability>) -> Self {
        let ocr_available = ocr.is_available();
        info!(ocr_available, "Image processor created");
        Self {
            original: None,
            current: None,
            mask: MaskLayer::default(),
            compositor: BlurCompositor::new(),
            detector: SensitiveRegionDetector::new(),
            ocr,
            ocr_available,
            sensitive_regions: Vec::new(),
        }
    }

    // -- Loading --------------------------------------------------------------

    /// Decode an image file and start a fresh session on it.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load_image(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let raster = RasterBuffer::load(path)?;
        self.install(raster);
        Ok(())
    }

    /// Start a fresh session on tightly packed pixels (1, 3 or 4 channels).
    pub fn load_from_array(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        channels: u8,
    ) -> Result<()> {
        let raster = RasterBuffer::from_raw(pixels, width, height, channels)?;
        self.install(raster);
        Ok(())
    }

    /// Start a fresh session on the embedded image of a PDF page (1-indexed).
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn load_pdf_page(&mut self, path: impl AsRef<Path>, page_number: u32) -> Result<()> {
        let importer = PdfPageImporter::open(path)?;
        let raster = RasterBuffer::from_dynamic(importer.page_image(page_number)?)?;
        self.install(raster);
        Ok(())
    }

    /// Replace the session state with `raster`.
    fn install(&mut self, raster: RasterBuffer) {
        let (width, height) = raster.dimensions();
        self.mask.resize(width, height);
        self.compositor.invalidate();
        self.sensitive_regions.clear();
        self.current = Some(raster.clone());
        self.original = Some(raster);
        info!(width, height, "Session started");
    }

    /// Drop all edits and detections, keeping the loaded image.
    pub fn reset(&mut self) {
        self.mask.clear();
        self.compositor.invalidate();
        self.sensitive_regions.clear();
        self.current = self.original.clone();
        debug!("Session reset");
    }

    // -- Painting -------------------------------------------------------------

    pub fn paint_circle(&mut self, x: i32, y: i32, brush_size: u32, target: MaskTarget) {
        self.mask.paint_circle(x, y, brush_size, target);
        self.after_paint(target);
    }

    pub fn paint_line(
        &mut self,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        thickness: u32,
        target: MaskTarget,
    ) {
        self.mask.paint_line(x1, y1, x2, y2, thickness, target);
        self.after_paint(target);
    }

    pub fn paint_rectangle(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, target: MaskTarget) {
        self.mask.paint_rectangle(x1, y1, x2, y2, target);
        self.after_paint(target);
    }

    pub fn paint_ellipse(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, target: MaskTarget) {
        self.mask.paint_ellipse(x1, y1, x2, y2, target);
        self.after_paint(target);
    }

    /// Fold the in-progress stroke into the committed mask.
    pub fn commit_temp_mask(&mut self) {
        self.mask.commit();
        self.compositor.invalidate();
    }

    /// Discard the in-progress stroke.
    pub fn clear_temp_mask(&mut self) {
        self.mask.clear_temp();
    }

    fn after_paint(&mut self, target: MaskTarget) {
        if target == MaskTarget::Committed {
            self.compositor.invalidate();
        }
    }

    // -- Rendering ------------------------------------------------------------

    /// The original blurred through the mask. Without an image this is the
    /// empty placeholder buffer.
    pub fn get_current_image(&mut self, params: BlurParameters, preview: bool) -> RasterBuffer {
        let Some(original) = self.original.as_ref() else {
            return RasterBuffer::placeholder();
        };
        let frame = self.compositor.composite(original, &self.mask, params, preview);
        if !preview {
            self.current = Some(frame.clone());
        }
        frame
    }

    /// Committed composite scaled down to fit within `width` x `height`.
    ///
    /// Images already inside the box are returned at their own size.
    pub fn create_thumbnail(&mut self, width: u32, height: u32) -> Option<RasterBuffer> {
        if width == 0 || height == 0 || !self.has_image() {
            return None;
        }
        let frame = self.get_current_image(THUMBNAIL_PARAMETERS, false);
        if frame.width() <= width && frame.height() <= height {
            return Some(frame);
        }
        let scaled = frame
            .to_dynamic()
            .resize(width, height, FilterType::Lanczos3);
        match RasterBuffer::from_dynamic(scaled) {
            Ok(thumbnail) => Some(thumbnail),
            Err(err) => {
                warn!(error = %err, "Thumbnail resize produced an empty image");
                None
            }
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Render with `params` and save to `path`; encoder chosen by extension.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn try_save_image(&mut self, path: impl AsRef<Path>, params: BlurParameters) -> Result<()> {
        if !self.has_image() {
            return Err(DocShieldError::Encode("no image loaded".into()));
        }
        self.get_current_image(params, false).save(path)
    }

    /// [`try_save_image`](Self::try_save_image), reporting failure as `false`.
    pub fn save_image(&mut self, path: impl AsRef<Path>, params: BlurParameters) -> bool {
        match self.try_save_image(path, params) {
            Ok(()) => true,
            Err(err) => {
                error!(error = %err, "Save failed");
                false
            }
        }
    }

    /// Render with `params` and write a single-page PDF to `path`.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn try_export_to_pdf(
        &mut self,
        path: impl AsRef<Path>,
        params: BlurParameters,
    ) -> Result<()> {
        if !self.has_image() {
            return Err(DocShieldError::PdfLayout("no image loaded".into()));
        }
        let frame = self.get_current_image(params, false);
        PdfExporter::new().write_to_file(&frame, path)
    }

    /// [`try_export_to_pdf`](Self::try_export_to_pdf), reporting failure as `false`.
    pub fn export_to_pdf(&mut self, path: impl AsRef<Path>, params: BlurParameters) -> bool {
        match self.try_export_to_pdf(path, params) {
            Ok(()) => true,
            Err(err) => {
                error!(error = %err, "PDF export failed");
                false
            }
        }
    }

    // -- Detection ------------------------------------------------------------

    /// Run OCR over the original and remember the flagged regions.
    pub fn detect_sensitive_info(&mut self) -> Vec<SensitiveRegion> {
        self.sensitive_regions = match self.original.as_ref() {
            Some(original) if self.ocr_available => {
                self.detector.detect(original, self.ocr.as_ref())
            }
            Some(_) => {
                debug!("OCR unavailable; skipping detection");
                Vec::new()
            }
            None => Vec::new(),
        };
        self.sensitive_regions.clone()
    }

    /// Paint every detected region into the committed mask.
    ///
    /// Compositing happens on the next render with `params`. Returns the
    /// number of regions painted.
    #[instrument(skip(self), fields(intensity = params.intensity, iterations = params.iterations))]
    pub fn apply_blur_to_sensitive_regions(&mut self, params: BlurParameters) -> usize {
        if self.sensitive_regions.is_empty() {
            return 0;
        }
        self.mask.paint_regions(&self.sensitive_regions);
        self.compositor.invalidate();
        info!(
            regions = self.sensitive_regions.len(),
            "Sensitive regions masked"
        );
        self.sensitive_regions.len()
    }

    // -- Accessors ------------------------------------------------------------

    /// `(width, height)` of the loaded image.
    pub fn get_dimensions(&self) -> Option<(u32, u32)> {
        self.original.as_ref().map(RasterBuffer::dimensions)
    }

    pub fn has_image(&self) -> bool {
        self.original.is_some()
    }

    pub fn is_ocr_available(&self) -> bool {
        self.ocr_available
    }

    /// Regions from the last detection.
    pub fn sensitive_regions(&self) -> &[SensitiveRegion] {
        &self.sensitive_regions
    }

    pub fn mask(&self) -> &MaskLayer {
        &self.mask
    }

    pub fn original(&self) -> Option<&RasterBuffer> {
        self.original.as_ref()
    }

    /// Last committed render, or the original before any render.
    pub fn current(&self) -> Option<&RasterBuffer> {
        self.current.as_ref()
    }

    /// True when a committed frame is memoised.
    pub fn is_cached(&self) -> bool {
        self.compositor.is_cached()
    }
}

#[cfg(feature = "ocr")]
fn default_ocr() -> Box<dyn OcrCapability> {
    match crate::detect::OcrsRecognizer::with_defaults() {
        Ok(recognizer) => Box::new(recognizer),
        Err(err) => {
            warn!(error = %err, "OCR models unavailable; detection disabled");
            Box::new(NoOcr)
        }
    }
}

#[cfg(not(feature = "ocr"))]
fn default_ocr() -> Box<dyn OcrCapability> {
    Box::new(NoOcr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::OcrToken;
    use docshield_core::RegionKind;
    use image::{Rgb, RgbImage};

    struct FixedTokens(Vec<OcrToken>);

    impl OcrCapability for FixedTokens {
        fn is_available(&self) -> bool {
            true
        }

        fn recognize(&self, _image: &RgbImage) -> Result<Vec<OcrToken>> {
            Ok(self.0.clone())
        }
    }

    const PARAMS: BlurParameters = BlurParameters::new(5, 1);

    fn processor_with(width: u32, height: u32) -> ImageProcessor {
        let mut processor = ImageProcessor::with_ocr(Box::new(NoOcr));
        let pixels = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8])
        });
        processor
            .load_from_array(pixels.as_raw(), width, height, 3)
            .unwrap();
        processor
    }

    fn white_processor() -> ImageProcessor {
        let mut processor = ImageProcessor::with_ocr(Box::new(NoOcr));
        processor
            .load_from_array(&[255; 100 * 100 * 3], 100, 100, 3)
            .unwrap();
        processor
    }

    fn cpf_processor() -> ImageProcessor {
        let mut processor = ImageProcessor::with_ocr(Box::new(FixedTokens(vec![OcrToken {
            text: "123.456.789-00".into(),
            x: 20,
            y: 30,
            width: 40,
            height: 10,
        }])));
        processor
            .load_from_array(&[128; 100 * 100 * 3], 100, 100, 3)
            .unwrap();
        processor
    }

    /// Rendering twice without edits yields identical frames from the cache.
    #[test]
    fn committed_render_is_idempotent() {
        let mut processor = processor_with(64, 48);
        processor.paint_rectangle(10, 10, 30, 30, MaskTarget::Committed);

        let first = processor.get_current_image(PARAMS, false);
        assert!(processor.is_cached());
        let second = processor.get_current_image(PARAMS, false);
        assert_eq!(first, second);
    }

    /// A committed paint after a render must change the next render.
    #[test]
    fn committed_paint_invalidates_cache() {
        let mut processor = processor_with(64, 48);
        processor.paint_rectangle(5, 5, 15, 15, MaskTarget::Committed);
        let before = processor.get_current_image(PARAMS, false);

        processor.paint_rectangle(40, 30, 55, 44, MaskTarget::Committed);
        assert!(!processor.is_cached());
        let after = processor.get_current_image(PARAMS, false);

        assert_ne!(before, after);
        assert_ne!(after.pixel(47, 37), processor.original().unwrap().pixel(47, 37));
    }

    #[test]
    fn empty_mask_returns_original() {
        let mut processor = processor_with(32, 32);
        let frame = processor.get_current_image(PARAMS, false);
        assert_eq!(&frame, processor.original().unwrap());
        assert_eq!(&processor.get_current_image(PARAMS, true), processor.original().unwrap());
    }

    /// Temp strokes show only in previews until committed.
    #[test]
    fn preview_versus_commit() {
        let mut processor = processor_with(64, 64);
        let original = processor.original().unwrap().clone();

        processor.paint_circle(32, 32, 20, MaskTarget::Temp);
        assert_ne!(processor.get_current_image(PARAMS, true), original);
        assert_eq!(processor.get_current_image(PARAMS, false), original);

        processor.clear_temp_mask();
        assert_eq!(processor.get_current_image(PARAMS, true), original);

        processor.paint_line(10, 10, 50, 50, 6, MaskTarget::Temp);
        processor.commit_temp_mask();
        let committed = processor.get_current_image(PARAMS, false);
        assert_ne!(committed, original);
        assert_eq!(processor.current(), Some(&committed));
    }

    #[test]
    fn reset_clears_edits_and_cache() {
        let mut processor = cpf_processor();
        processor.paint_ellipse(10, 10, 60, 40, MaskTarget::Committed);
        processor.paint_circle(70, 70, 10, MaskTarget::Temp);
        processor.detect_sensitive_info();
        processor.get_current_image(PARAMS, false);

        processor.reset();

        assert!(processor.mask().is_blank(true));
        assert!(!processor.is_cached());
        assert!(processor.sensitive_regions().is_empty());
        assert_eq!(
            &processor.get_current_image(PARAMS, false),
            processor.original().unwrap()
        );
    }

    /// 20x20 square at (40,40)-(60,60), intensity 5: nothing changes outside
    /// the square padded by 15 px.
    #[test]
    fn white_square_scenario() {
        let mut processor = white_processor();
        processor.paint_rectangle(40, 40, 60, 60, MaskTarget::Committed);

        let frame = processor.get_current_image(PARAMS, false);

        for y in 0..100 {
            for x in 0..100 {
                let inside = (25..=75).contains(&x) && (25..=75).contains(&y);
                if !inside {
                    assert_eq!(frame.pixel(x, y), Some([255, 255, 255]), "({x}, {y})");
                }
            }
        }
        assert_eq!(frame.pixel(50, 50), Some([255, 255, 255]));
    }

    #[test]
    fn cpf_detection_and_bulk_apply() {
        let mut processor = cpf_processor();
        assert!(processor.is_ocr_available());

        let regions = processor.detect_sensitive_info();
        assert_eq!(
            regions,
            vec![SensitiveRegion {
                x: 15,
                y: 25,
                width: 50,
                height: 20,
                kind: RegionKind::Cpf,
            }]
        );
        assert_eq!(processor.sensitive_regions(), regions.as_slice());

        let generation = processor.mask().generation();
        assert_eq!(processor.apply_blur_to_sensitive_regions(PARAMS), 1);
        assert!(processor.mask().generation() > generation);
        assert_eq!(processor.mask().committed().get_pixel(40, 35).0, [255]);
        assert!(processor.mask().temp().pixels().all(|p| p.0 == [0]));
    }

    #[test]
    fn detection_without_ocr_is_empty() {
        let mut processor = white_processor();
        assert!(!processor.is_ocr_available());
        assert!(processor.detect_sensitive_info().is_empty());
        assert_eq!(processor.apply_blur_to_sensitive_regions(PARAMS), 0);
    }

    #[test]
    fn new_load_replaces_session_state() {
        let mut processor = cpf_processor();
        processor.paint_rectangle(0, 0, 10, 10, MaskTarget::Committed);
        processor.detect_sensitive_info();

        processor.load_from_array(&[0; 30 * 20], 30, 20, 1).unwrap();

        assert_eq!(processor.get_dimensions(), Some((30, 20)));
        assert_eq!(processor.mask().dimensions(), (30, 20));
        assert!(processor.mask().is_blank(true));
        assert!(processor.sensitive_regions().is_empty());
    }

    #[test]
    fn failed_load_keeps_previous_image() {
        let mut processor = processor_with(16, 16);
        assert!(processor.load_from_array(&[0; 5], 16, 16, 3).is_err());
        assert!(processor.load_image("/nonexistent/scan.png").is_err());
        assert_eq!(processor.get_dimensions(), Some((16, 16)));
    }

    #[test]
    fn operations_without_an_image_are_no_ops() {
        let mut processor = ImageProcessor::with_ocr(Box::new(NoOcr));

        processor.paint_rectangle(0, 0, 10, 10, MaskTarget::Committed);
        processor.paint_circle(5, 5, 4, MaskTarget::Temp);
        processor.commit_temp_mask();

        assert!(processor.get_current_image(PARAMS, false).is_empty());
        assert!(processor.detect_sensitive_info().is_empty());
        assert_eq!(processor.get_dimensions(), None);
        assert!(processor.create_thumbnail(10, 10).is_none());
        assert!(!processor.save_image("/tmp/never-written.png", PARAMS));
    }

    #[test]
    fn thumbnail_fits_within_bounds() {
        let mut processor = processor_with(200, 100);
        processor.paint_rectangle(20, 20, 80, 60, MaskTarget::Committed);

        let thumbnail = processor.create_thumbnail(50, 50).unwrap();
        assert_eq!(thumbnail.dimensions(), (50, 25));
        assert!(processor.create_thumbnail(0, 50).is_none());
    }

    #[test]
    fn thumbnail_never_upscales() {
        let mut processor = processor_with(20, 10);

        let thumbnail = processor.create_thumbnail(100, 100).unwrap();
        assert_eq!(thumbnail.dimensions(), (20, 10));
        assert_eq!(
            processor.create_thumbnail(20, 10).unwrap().dimensions(),
            (20, 10)
        );
    }

    #[test]
    fn huge_intensity_composites_without_overflow() {
        let mut processor = processor_with(24, 24);
        let frame = processor.get_current_image(BlurParameters::new(u32::MAX, 1), false);
        assert_eq!(frame.dimensions(), (24, 24));
    }

    #[test]
    fn save_and_export_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut processor = processor_with(80, 40);
        processor.paint_rectangle(10, 10, 30, 30, MaskTarget::Committed);

        let png = dir.path().join("redacted.png");
        assert!(processor.save_image(&png, PARAMS));
        let saved = RasterBuffer::load(&png).unwrap();
        assert_eq!(saved, processor.get_current_image(PARAMS, false));

        let pdf = dir.path().join("redacted.pdf");
        assert!(processor.export_to_pdf(&pdf, PARAMS));
        assert_eq!(PdfPageImporter::open(&pdf).unwrap().page_count(), 1);
    }

    #[test]
    fn export_failures_keep_their_kind() {
        let dir = tempfile::tempdir().unwrap();
        let mut processor = processor_with(8, 8);

        assert!(matches!(
            processor.try_export_to_pdf(dir.path().join("missing/out.pdf"), PARAMS),
            Err(DocShieldError::Io(_))
        ));
        assert!(!processor.export_to_pdf(dir.path().join("missing/out.pdf"), PARAMS));

        let mut empty = ImageProcessor::with_ocr(Box::new(NoOcr));
        assert!(matches!(
            empty.try_export_to_pdf(dir.path().join("out.pdf"), PARAMS),
            Err(DocShieldError::PdfLayout(_))
        ));
    }

    #[test]
    fn save_with_unknown_extension_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut processor = processor_with(8, 8);
        assert!(!processor.save_image(dir.path().join("out.xyz"), PARAMS));
    }
}
