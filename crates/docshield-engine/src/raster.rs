// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster buffer: owned RGB8 pixel storage with decode/encode at the edges.
// Every input (grayscale, RGBA, 16-bit) is normalised to three channels on
// the way in so the rest of the engine only ever sees RGB8.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use docshield_core::error::{DocShieldError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, GrayImage, ImageFormat, Rgb, RgbImage, RgbaImage};
use tracing::{debug, info, instrument};

/// JPEG quality used when saving redacted images.
pub const JPEG_QUALITY: u8 = 95;

/// Owned RGB8 image.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterBuffer {
    pixels: RgbImage,
}

impl RasterBuffer {
    // -- Construction ---------------------------------------------------------

    /// Decode an image file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let img = image::open(path.as_ref()).map_err(|err| {
            DocShieldError::Decode(format!("{}: {}", path.as_ref().display(), err))
        })?;
        let buffer = Self::from_dynamic(img)?;
        info!(
            width = buffer.width(),
            height = buffer.height(),
            "Image loaded"
        );
        Ok(buffer)
    }

    /// Decode an image from encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data)
            .map_err(|err| DocShieldError::Decode(err.to_string()))?;
        Self::from_dynamic(img)
    }

    /// Wrap an already-decoded image, converting it to RGB8.
    pub fn from_dynamic(image: DynamicImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(DocShieldError::Decode(format!(
                "image has zero size ({}x{})",
                image.width(),
                image.height()
            )));
        }
        Ok(Self {
            pixels: image.to_rgb8(),
        })
    }

    /// Build a buffer from tightly packed 8-bit pixels.
    ///
    /// `channels` is 1 (gray), 3 (RGB) or 4 (RGBA; alpha is dropped).
    pub fn from_raw(pixels: &[u8], width: u32, height: u32, channels: u8) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(DocShieldError::Decode(format!(
                "image has zero size ({}x{})",
                width, height
            )));
        }
        let expected = width as usize * height as usize * channels as usize;
        if pixels.len() != expected {
            return Err(DocShieldError::Decode(format!(
                "expected {} bytes for {}x{}x{}, got {}",
                expected,
                width,
                height,
                channels,
                pixels.len()
            )));
        }

        let dynamic = match channels {
            1 => GrayImage::from_raw(width, height, pixels.to_vec()).map(DynamicImage::ImageLuma8),
            3 => RgbImage::from_raw(width, height, pixels.to_vec()).map(DynamicImage::ImageRgb8),
            4 => RgbaImage::from_raw(width, height, pixels.to_vec()).map(DynamicImage::ImageRgba8),
            other => {
                return Err(DocShieldError::Decode(format!(
                    "unsupported channel count {}",
                    other
                )));
            }
        }
        .ok_or_else(|| DocShieldError::Decode("pixel buffer does not match dimensions".into()))?;

        debug!(width, height, channels, "Image built from raw pixels");
        Self::from_dynamic(dynamic)
    }

    /// Zero-sized buffer returned when no image is loaded.
    pub fn placeholder() -> Self {
        Self {
            pixels: RgbImage::new(0, 0),
        }
    }

    pub(crate) fn from_rgb(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// True for the placeholder buffer.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// RGB value at `(x, y)`, or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        self.pixels.get_pixel_checked(x, y).map(|Rgb(rgb)| *rgb)
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.pixels
    }

    /// Row-major packed RGB bytes.
    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub fn to_dynamic(&self) -> DynamicImage {
        DynamicImage::ImageRgb8(self.pixels.clone())
    }

    // -- Output ---------------------------------------------------------------

    /// Write the buffer to `path`, choosing the encoder from the extension.
    ///
    /// `.jpg`/`.jpeg` use JPEG quality 95, `.png` uses maximum compression,
    /// any other recognised extension uses that format's default encoder.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if self.is_empty() {
            return Err(DocShieldError::Encode("no image to save".into()));
        }

        let format = ImageFormat::from_path(path).map_err(|err| {
            DocShieldError::Encode(format!(
                "cannot choose an encoder for {}: {}",
                path.display(),
                err
            ))
        })?;

        let encode_err = |err: image::ImageError| {
            DocShieldError::Encode(format!("failed to save {}: {}", path.display(), err))
        };

        match format {
            ImageFormat::Jpeg => {
                let writer = BufWriter::new(File::create(path)?);
                let encoder = JpegEncoder::new_with_quality(writer, JPEG_QUALITY);
                self.pixels.write_with_encoder(encoder).map_err(encode_err)?;
            }
            ImageFormat::Png => {
                let writer = BufWriter::new(File::create(path)?);
                let encoder = PngEncoder::new_with_quality(
                    writer,
                    CompressionType::Best,
                    FilterType::Adaptive,
                );
                self.pixels.write_with_encoder(encoder).map_err(encode_err)?;
            }
            other => {
                self.pixels
                    .save_with_format(path, other)
                    .map_err(encode_err)?;
            }
        }

        info!(?format, "Image saved");
        Ok(())
    }
}
