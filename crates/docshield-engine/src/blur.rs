// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Blur compositor: ROI-bounded iterative Gaussian blur blended through the
// mask, with a single-slot cache for the committed-mask result.
//
// ## Pipeline
//
// 1. Pick the effective mask (`committed`, or `committed | temp` for previews)
// 2. Empty mask: return the original untouched
// 3. Committed render with a matching cache slot: return the cached frame
// 4. Union bounding box of the mask's external contours, padded by
//    `max(5, 2 * intensity)` and clamped to the image
// 5. Crop that region from the original
// 6. `iterations` Gaussian passes over an `f32` copy, kernel `2 * intensity + 1`
// 7. Blend `original * (1 - m) + blurred * m` with `m = mask / 255`
// 8. Paste into a full-size copy of the original (and cache it)

use docshield_core::BlurParameters;
use image::{GrayImage, ImageBuffer, Rgb, Rgb32FImage, RgbImage};
use imageproc::contours::find_contours;
use imageproc::filter::separable_filter_equal;
use tracing::{debug, instrument, warn};

use crate::mask::MaskLayer;
use crate::raster::RasterBuffer;

/// Pixel-space rectangle with exclusive far edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl Roi {
    pub fn width(&self) -> u32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> u32 {
        self.y_max - self.y_min
    }

    /// Pad by `margin` on every side, clamped to a `width` x `height` image.
    pub fn expand(&self, margin: u32, width: u32, height: u32) -> Self {
        Self {
            x_min: self.x_min.saturating_sub(margin),
            y_min: self.y_min.saturating_sub(margin),
            x_max: self.x_max.saturating_add(margin).min(width),
            y_max: self.y_max.saturating_add(margin).min(height),
        }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x_min && x < self.x_max && y >= self.y_min && y < self.y_max
    }
}

// -- Cache --------------------------------------------------------------------

/// One memoised committed-mask frame.
#[derive(Debug, Clone)]
struct CacheEntry {
    params: BlurParameters,
    generation: u64,
    frame: RgbImage,
}

/// Single-slot memo of the last committed composite.
///
/// An entry is only served for the exact parameters and mask generation it
/// was computed from; storing a new entry evicts the old one.
#[derive(Debug, Clone, Default)]
pub struct BlurCache {
    entry: Option<CacheEntry>,
}

impl BlurCache {
    pub fn get(&self, params: BlurParameters, generation: u64) -> Option<&RgbImage> {
        self.entry
            .as_ref()
            .filter(|entry| entry.params == params && entry.generation == generation)
            .map(|entry| &entry.frame)
    }

    pub fn store(&mut self, params: BlurParameters, generation: u64, frame: RgbImage) {
        self.entry = Some(CacheEntry {
            params,
            generation,
            frame,
        });
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }
}

// -- Compositor ---------------------------------------------------------------

/// Renders the original image with masked regions blurred.
#[derive(Debug, Clone, Default)]
pub struct BlurCompositor {
    cache: BlurCache,
}

impl BlurCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the cached committed frame.
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    /// True when a committed frame is memoised.
    pub fn is_cached(&self) -> bool {
        !self.cache.is_empty()
    }

    /// Composite `original` through `mask`.
    ///
    /// `preview` includes the temporary mask and bypasses the cache in both
    /// directions. An empty `original` yields the placeholder buffer.
    #[instrument(skip(self, original, mask), fields(
        intensity = params.intensity,
        iterations = params.iterations,
        preview,
    ))]
    pub fn composite(
        &mut self,
        original: &RasterBuffer,
        mask: &MaskLayer,
        params: BlurParameters,
        preview: bool,
    ) -> RasterBuffer {
        if original.is_empty() {
            return RasterBuffer::placeholder();
        }
        if mask.dimensions() != original.dimensions() {
            warn!(
                mask = ?mask.dimensions(),
                image = ?original.dimensions(),
                "Mask does not match image; returning original"
            );
            return original.clone();
        }
        if mask.is_blank(preview) {
            return original.clone();
        }

        if !preview {
            if let Some(frame) = self.cache.get(params, mask.generation()) {
                debug!("Blur cache hit");
                return RasterBuffer::from_rgb(frame.clone());
            }
        }

        let effective = mask.effective(preview);
        let Some(bounds) = mask_bounds(&effective) else {
            warn!("Mask has coverage but no contours; returning original");
            return original.clone();
        };

        let (width, height) = original.dimensions();
        let roi = bounds.expand(params.roi_margin(), width, height);
        debug!(?bounds, ?roi, "Blurring region of interest");

        let frame = blur_region(original.as_rgb(), &effective, roi, params);

        if !preview {
            self.cache.store(params, mask.generation(), frame.clone());
        }
        RasterBuffer::from_rgb(frame)
    }
}

/// Union bounding box of the mask's external contours.
pub fn mask_bounds(mask: &GrayImage) -> Option<Roi> {
    let contours = find_contours::<i32>(mask);
    let mut points = contours
        .iter()
        .filter(|contour| contour.parent.is_none())
        .flat_map(|contour| contour.points.iter())
        .peekable();
    points.peek()?;

    let mut roi = Roi {
        x_min: u32::MAX,
        y_min: u32::MAX,
        x_max: 0,
        y_max: 0,
    };
    for point in points {
        let (x, y) = (point.x.max(0) as u32, point.y.max(0) as u32);
        roi.x_min = roi.x_min.min(x);
        roi.y_min = roi.y_min.min(y);
        roi.x_max = roi.x_max.max(x + 1);
        roi.y_max = roi.y_max.max(y + 1);
    }
    Some(roi)
}

/// Blur `roi` of `original` and blend it back through `mask`.
///
/// Passes run on an `f32` copy of the region so repeated blurs do not
/// accumulate rounding; values are rounded once, at the blend.
fn blur_region(
    original: &RgbImage,
    mask: &GrayImage,
    roi: Roi,
    params: BlurParameters,
) -> RgbImage {
    let mut plane: Rgb32FImage = ImageBuffer::from_fn(roi.width(), roi.height(), |rx, ry| {
        let Rgb([r, g, b]) = *original.get_pixel(roi.x_min + rx, roi.y_min + ry);
        Rgb([f32::from(r), f32::from(g), f32::from(b)])
    });
    let kernel = gaussian_kernel(params.kernel_size());
    for _ in 0..params.iterations {
        plane = separable_filter_equal(&plane, &kernel);
    }

    let mut frame = original.clone();
    for ry in 0..roi.height() {
        for rx in 0..roi.width() {
            let (x, y) = (roi.x_min + rx, roi.y_min + ry);
            let alpha = f32::from(mask.get_pixel(x, y).0[0]) / 255.0;
            if alpha == 0.0 {
                continue;
            }
            let source = original.get_pixel(x, y).0;
            let blurred = plane.get_pixel(rx, ry).0;
            let blend = |c: usize| -> u8 {
                let value = f32::from(source[c]) * (1.0 - alpha) + blurred[c] * alpha;
                value.round().clamp(0.0, 255.0) as u8
            };
            frame.put_pixel(x, y, Rgb([blend(0), blend(1), blend(2)]));
        }
    }
    frame
}

/// Normalised 1-D Gaussian of odd length `size`.
///
/// Sigma follows the usual derivation from kernel size,
/// `0.3 * ((size - 1) / 2 - 1) + 0.8`.
pub fn gaussian_kernel(size: u32) -> Vec<f32> {
    let size = size | 1;
    let radius = (size / 2) as f32;
    let sigma = 0.3 * (radius - 1.0) + 0.8;
    let denom = 2.0 * sigma * sigma;

    let mut kernel: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - radius;
            (-(d * d) / denom).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= sum;
    }
    kernel
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use docshield_core::MaskTarget;

    /// Vertical stripes, so any blur visibly changes pixel values.
    fn striped(width: u32, height: u32) -> RasterBuffer {
        RasterBuffer::from_rgb(RgbImage::from_fn(width, height, |x, _| {
            if (x / 2) % 2 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        }))
    }

    fn white(width: u32, height: u32) -> RasterBuffer {
        RasterBuffer::from_rgb(RgbImage::from_pixel(width, height, Rgb([255, 255, 255])))
    }

    #[test]
    fn kernel_is_normalised_and_symmetric() {
        for size in [3u32, 5, 11, 31] {
            let kernel = gaussian_kernel(size);
            assert_eq!(kernel.len(), size as usize);
            let sum: f32 = kernel.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "sum {sum} for size {size}");
            for i in 0..kernel.len() / 2 {
                assert!((kernel[i] - kernel[kernel.len() - 1 - i]).abs() < 1e-7);
            }
            assert!(kernel[kernel.len() / 2] >= kernel[0]);
        }
    }

    #[test]
    fn even_kernel_request_is_made_odd() {
        assert_eq!(gaussian_kernel(4).len(), 5);
    }

    #[test]
    fn bounds_cover_all_shapes() {
        let mut layer = MaskLayer::new(100, 100);
        layer.paint_rectangle(10, 20, 19, 29, MaskTarget::Committed);
        layer.paint_rectangle(60, 70, 64, 74, MaskTarget::Committed);

        let roi = mask_bounds(layer.committed()).unwrap();
        assert_eq!(
            roi,
            Roi {
                x_min: 10,
                y_min: 20,
                x_max: 65,
                y_max: 75
            }
        );
    }

    #[test]
    fn bounds_ignore_holes() {
        let mut layer = MaskLayer::new(50, 50);
        layer.paint_rectangle(5, 5, 40, 40, MaskTarget::Committed);
        let mut mask = layer.committed().clone();
        for y in 15..25 {
            for x in 15..25 {
                mask.put_pixel(x, y, image::Luma([0]));
            }
        }
        let roi = mask_bounds(&mask).unwrap();
        assert_eq!((roi.x_min, roi.y_min, roi.x_max, roi.y_max), (5, 5, 41, 41));
    }

    #[test]
    fn blank_mask_has_no_bounds() {
        assert!(mask_bounds(&GrayImage::new(10, 10)).is_none());
    }

    #[test]
    fn roi_expansion_clamps_to_image() {
        let roi = Roi {
            x_min: 3,
            y_min: 40,
            x_max: 10,
            y_max: 98,
        };
        let expanded = roi.expand(5, 100, 100);
        assert_eq!(
            expanded,
            Roi {
                x_min: 0,
                y_min: 35,
                x_max: 15,
                y_max: 100
            }
        );
    }

    #[test]
    fn empty_original_gives_placeholder() {
        let mut compositor = BlurCompositor::new();
        let out = compositor.composite(
            &RasterBuffer::placeholder(),
            &MaskLayer::default(),
            BlurParameters::default(),
            false,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn blank_mask_returns_original_without_caching() {
        let original = striped(40, 40);
        let mask = MaskLayer::new(40, 40);
        let mut compositor = BlurCompositor::new();

        let out = compositor.composite(&original, &mask, BlurParameters::new(3, 2), false);
        assert_eq!(out, original);
        assert!(!compositor.is_cached());
    }

    #[test]
    fn only_masked_pixels_change() {
        let original = striped(80, 60);
        let mut mask = MaskLayer::new(80, 60);
        mask.paint_rectangle(30, 20, 49, 39, MaskTarget::Committed);
        let mut compositor = BlurCompositor::new();

        let out = compositor.composite(&original, &mask, BlurParameters::new(2, 2), false);

        let mut changed = 0;
        for y in 0..60 {
            for x in 0..80 {
                let inside = (30..50).contains(&x) && (20..40).contains(&y);
                if !inside {
                    assert_eq!(out.pixel(x, y), original.pixel(x, y), "({x},{y})");
                } else if out.pixel(x, y) != original.pixel(x, y) {
                    changed += 1;
                }
            }
        }
        assert!(changed > 0);
    }

    #[test]
    fn committed_result_is_cached_and_identical() {
        let original = striped(50, 50);
        let mut mask = MaskLayer::new(50, 50);
        mask.paint_circle(25, 25, 12, MaskTarget::Committed);
        let mut compositor = BlurCompositor::new();
        let params = BlurParameters::new(3, 2);

        let first = compositor.composite(&original, &mask, params, false);
        assert!(compositor.is_cached());
        let second = compositor.composite(&original, &mask, params, false);
        assert_eq!(first, second);
    }

    #[test]
    fn cache_is_keyed_by_parameters() {
        let original = striped(50, 50);
        let mut mask = MaskLayer::new(50, 50);
        mask.paint_rectangle(10, 10, 40, 40, MaskTarget::Committed);
        let mut compositor = BlurCompositor::new();

        let soft = compositor.composite(&original, &mask, BlurParameters::new(1, 1), false);
        let strong = compositor.composite(&original, &mask, BlurParameters::new(6, 4), false);
        assert_ne!(soft, strong);
    }

    #[test]
    fn stale_generation_is_not_served() {
        let original = striped(50, 50);
        let mut mask = MaskLayer::new(50, 50);
        mask.paint_rectangle(5, 5, 15, 15, MaskTarget::Committed);
        let mut compositor = BlurCompositor::new();
        let params = BlurParameters::new(2, 1);

        let before = compositor.composite(&original, &mask, params, false);
        mask.paint_rectangle(30, 30, 45, 45, MaskTarget::Committed);
        let after = compositor.composite(&original, &mask, params, false);

        assert_ne!(before, after);
        assert_ne!(after.pixel(38, 38), original.pixel(38, 38));
    }

    #[test]
    fn preview_neither_reads_nor_writes_cache() {
        let original = striped(50, 50);
        let mut mask = MaskLayer::new(50, 50);
        mask.paint_rectangle(5, 5, 15, 15, MaskTarget::Committed);
        mask.paint_rectangle(30, 30, 45, 45, MaskTarget::Temp);
        let mut compositor = BlurCompositor::new();
        let params = BlurParameters::new(2, 1);

        let preview = compositor.composite(&original, &mask, params, true);
        assert!(!compositor.is_cached());
        assert_ne!(preview.pixel(38, 38), original.pixel(38, 38));

        let committed = compositor.composite(&original, &mask, params, false);
        assert_eq!(committed.pixel(38, 38), original.pixel(38, 38));
        assert!(compositor.is_cached());

        let preview_again = compositor.composite(&original, &mask, params, true);
        assert_eq!(preview_again, preview);
    }

    #[test]
    fn zero_iterations_leave_pixels_unchanged() {
        let original = striped(30, 30);
        let mut mask = MaskLayer::new(30, 30);
        mask.paint_rectangle(0, 0, 29, 29, MaskTarget::Committed);
        let mut compositor = BlurCompositor::new();

        let out = compositor.composite(&original, &mask, BlurParameters::new(4, 0), false);
        assert_eq!(out, original);
    }

    #[test]
    fn zero_intensity_still_blurs() {
        let original = striped(30, 30);
        let mut mask = MaskLayer::new(30, 30);
        mask.paint_rectangle(10, 10, 20, 20, MaskTarget::Committed);
        let mut compositor = BlurCompositor::new();

        let out = compositor.composite(&original, &mask, BlurParameters::new(0, 1), false);
        assert_ne!(out, original);
    }

    #[test]
    fn white_square_scenario() {
        let original = white(100, 100);
        let mut mask = MaskLayer::new(100, 100);
        mask.paint_rectangle(40, 40, 60, 60, MaskTarget::Committed);
        let mut compositor = BlurCompositor::new();
        let params = BlurParameters::new(5, 1);

        let out = compositor.composite(&original, &mask, params, false);

        let expanded = mask_bounds(mask.committed())
            .unwrap()
            .expand(params.roi_margin(), 100, 100);
        assert_eq!(
            (expanded.x_min, expanded.y_min, expanded.x_max, expanded.y_max),
            (30, 30, 71, 71)
        );
        for y in 0..100 {
            for x in 0..100 {
                let px = out.pixel(x, y).unwrap();
                if !expanded.contains(x, y) {
                    assert_eq!(px, [255, 255, 255], "({x},{y})");
                } else {
                    assert!(px.iter().all(|&c| c >= 250), "({x},{y}) = {px:?}");
                }
            }
        }
    }

    #[test]
    fn repeated_passes_keep_a_flat_patch_exact() {
        let original = RasterBuffer::from_rgb(RgbImage::from_pixel(40, 40, Rgb([137, 61, 200])));
        let mut mask = MaskLayer::new(40, 40);
        mask.paint_rectangle(5, 5, 34, 34, MaskTarget::Committed);
        let mut compositor = BlurCompositor::new();

        let out = compositor.composite(&original, &mask, BlurParameters::new(15, 20), false);
        assert_eq!(out, original);
    }

    #[test]
    fn mismatched_mask_returns_original() {
        let original = striped(20, 20);
        let mut mask = MaskLayer::new(10, 10);
        mask.paint_rectangle(0, 0, 9, 9, MaskTarget::Committed);
        let mut compositor = BlurCompositor::new();

        let out = compositor.composite(&original, &mask, BlurParameters::default(), false);
        assert_eq!(out, original);
    }

    #[test]
    fn cache_slot_holds_a_single_entry() {
        let mut cache = BlurCache::default();
        let frame = RgbImage::new(2, 2);
        cache.store(BlurParameters::new(1, 1), 3, frame.clone());
        cache.store(BlurParameters::new(2, 2), 3, frame);

        assert!(cache.get(BlurParameters::new(1, 1), 3).is_none());
        assert!(cache.get(BlurParameters::new(2, 2), 3).is_some());
        assert!(cache.get(BlurParameters::new(2, 2), 4).is_none());

        cache.clear();
        assert!(cache.is_empty());
    }
}
