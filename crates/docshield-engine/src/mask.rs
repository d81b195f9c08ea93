// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Mask layer: the committed and temporary blur masks plus the filled drawing
// primitives that paint into them. Both bitmaps hold only 0 or 255.

use std::borrow::Cow;

use docshield_core::{MaskTarget, SensitiveRegion};
use image::{GrayImage, Luma};
use imageproc::drawing::{
    BresenhamLineIter, draw_filled_circle_mut, draw_filled_ellipse_mut, draw_filled_rect_mut,
};
use imageproc::rect::Rect;
use tracing::{debug, instrument};

/// Mask value for "blur this pixel".
pub const MASK_ON: Luma<u8> = Luma([255]);

/// Committed and temporary masks for one image.
///
/// `generation` increases on every mutation of `committed`; compositing
/// results derived from an older generation are stale.
#[derive(Debug, Clone)]
pub struct MaskLayer {
    committed: GrayImage,
    temp: GrayImage,
    generation: u64,
}

impl MaskLayer {
    /// Blank masks sized for a `width` x `height` image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            committed: GrayImage::new(width, height),
            temp: GrayImage::new(width, height),
            generation: 0,
        }
    }

    /// Replace both masks with blank ones of a new size.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.committed = GrayImage::new(width, height);
        self.temp = GrayImage::new(width, height);
        self.generation += 1;
    }

    // -- Accessors ------------------------------------------------------------

    pub fn dimensions(&self) -> (u32, u32) {
        self.committed.dimensions()
    }

    pub fn committed(&self) -> &GrayImage {
        &self.committed
    }

    pub fn temp(&self) -> &GrayImage {
        &self.temp
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True when nothing would be blurred: the committed mask is empty and,
    /// for previews, so is the temporary one.
    pub fn is_blank(&self, preview: bool) -> bool {
        is_zero(&self.committed) && (!preview || is_zero(&self.temp))
    }

    /// The mask compositing should use: `committed`, or `committed | temp`
    /// for previews.
    pub fn effective(&self, preview: bool) -> Cow<'_, GrayImage> {
        if !preview || is_zero(&self.temp) {
            return Cow::Borrowed(&self.committed);
        }
        let mut combined = self.committed.clone();
        or_into(&mut combined, &self.temp);
        Cow::Owned(combined)
    }

    // -- Drawing primitives ---------------------------------------------------

    /// Filled disc of diameter `brush_size` centred on `(x, y)`.
    pub fn paint_circle(&mut self, x: i32, y: i32, brush_size: u32, target: MaskTarget) {
        if self.is_unsized() {
            return;
        }
        let radius = (brush_size / 2) as i32;
        draw_filled_circle_mut(self.bitmap_mut(target), (x, y), radius, MASK_ON);
        self.touch(target);
    }

    /// Stroke from `(x1, y1)` to `(x2, y2)`, `thickness` pixels wide with
    /// round caps.
    pub fn paint_line(
        &mut self,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        thickness: u32,
        target: MaskTarget,
    ) {
        if self.is_unsized() {
            return;
        }
        let radius = (thickness / 2) as i32;
        let bitmap = self.bitmap_mut(target);
        let start = (x1 as f32, y1 as f32);
        let end = (x2 as f32, y2 as f32);
        for (px, py) in BresenhamLineIter::new(start, end) {
            draw_filled_circle_mut(bitmap, (px, py), radius, MASK_ON);
        }
        self.touch(target);
    }

    /// Filled axis-aligned rectangle with inclusive corners, given in any
    /// order.
    pub fn paint_rectangle(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, target: MaskTarget) {
        let (left, right) = (x1.min(x2), x1.max(x2));
        let (top, bottom) = (y1.min(y2), y1.max(y2));
        let Some(rect) = self.clip(left, top, right, bottom) else {
            debug!(left, top, right, bottom, "Rectangle outside mask; ignored");
            return;
        };
        draw_filled_rect_mut(self.bitmap_mut(target), rect, MASK_ON);
        self.touch(target);
    }

    /// Filled ellipse inscribed in the box spanned by two corners.
    pub fn paint_ellipse(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, target: MaskTarget) {
        if self.is_unsized() {
            return;
        }
        let center = ((x1 + x2) / 2, (y1 + y2) / 2);
        let radius_x = (x2 - x1).abs() / 2;
        let radius_y = (y2 - y1).abs() / 2;
        if radius_x == 0 && radius_y == 0 {
            debug!(?center, "Degenerate ellipse; ignored");
            return;
        }
        if radius_x == 0 || radius_y == 0 {
            // Flat ellipse: the filled shape collapses to its axis segment.
            self.paint_rectangle(
                center.0 - radius_x,
                center.1 - radius_y,
                center.0 + radius_x,
                center.1 + radius_y,
                target,
            );
            return;
        }
        draw_filled_ellipse_mut(self.bitmap_mut(target), center, radius_x, radius_y, MASK_ON);
        self.touch(target);
    }

    /// Paint detected regions into the committed mask.
    #[instrument(skip_all, fields(regions = regions.len()))]
    pub fn paint_regions(&mut self, regions: &[SensitiveRegion]) {
        for region in regions {
            let right = region.right().min(i32::MAX as u32) as i32;
            let bottom = region.bottom().min(i32::MAX as u32) as i32;
            self.paint_rectangle(
                region.x.min(i32::MAX as u32) as i32,
                region.y.min(i32::MAX as u32) as i32,
                right,
                bottom,
                MaskTarget::Committed,
            );
        }
    }

    // -- Stroke lifecycle -----------------------------------------------------

    /// Merge the temporary mask into the committed one and clear it.
    pub fn commit(&mut self) {
        or_into(&mut self.committed, &self.temp);
        zero(&mut self.temp);
        self.generation += 1;
        debug!(generation = self.generation, "Temporary mask committed");
    }

    /// Discard the in-progress stroke.
    pub fn clear_temp(&mut self) {
        zero(&mut self.temp);
    }

    /// Blank both masks.
    pub fn clear(&mut self) {
        zero(&mut self.committed);
        zero(&mut self.temp);
        self.generation += 1;
    }

    // -- Internals ------------------------------------------------------------

    fn is_unsized(&self) -> bool {
        let (width, height) = self.dimensions();
        width == 0 || height == 0
    }

    fn bitmap_mut(&mut self, target: MaskTarget) -> &mut GrayImage {
        match target {
            MaskTarget::Committed => &mut self.committed,
            MaskTarget::Temp => &mut self.temp,
        }
    }

    fn touch(&mut self, target: MaskTarget) {
        if target == MaskTarget::Committed {
            self.generation += 1;
        }
    }

    /// Intersect an inclusive box with the bitmap.
    fn clip(&self, left: i32, top: i32, right: i32, bottom: i32) -> Option<Rect> {
        let (width, height) = self.dimensions();
        if width == 0 || height == 0 {
            return None;
        }
        let left = i64::from(left).max(0);
        let top = i64::from(top).max(0);
        let right = i64::from(right).min(i64::from(width) - 1);
        let bottom = i64::from(bottom).min(i64::from(height) - 1);
        if left > right || top > bottom {
            return None;
        }
        Some(
            Rect::at(left as i32, top as i32)
                .of_size((right - left + 1) as u32, (bottom - top + 1) as u32),
        )
    }
}

impl Default for MaskLayer {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

fn is_zero(mask: &GrayImage) -> bool {
    mask.as_raw().iter().all(|&value| value == 0)
}

fn zero(mask: &mut GrayImage) {
    mask.fill(0);
}

fn or_into(dst: &mut GrayImage, src: &GrayImage) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d |= *s;
    }
}
