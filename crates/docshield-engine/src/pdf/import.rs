// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF page import: pull the embedded raster out of a scanned page with
// `lopdf`, so a scanned PDF can be redacted like any other image.
//
// Only image XObjects are read. Vector content is not rasterised.

use std::path::Path;

use docshield_core::error::{DocShieldError, Result};
use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, instrument};

/// Reads embedded page images from an existing PDF.
pub struct PdfPageImporter {
    document: Document,
}

impl PdfPageImporter {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let document = Document::load(path_ref).map_err(|err| {
            DocShieldError::PdfImport(format!("failed to open {}: {}", path_ref.display(), err))
        })?;

        info!(pages = document.get_pages().len(), "PDF opened");
        Ok(Self { document })
    }

    /// Parse a PDF already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            DocShieldError::PdfImport(format!("failed to load PDF from memory: {}", err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");
        Ok(Self { document })
    }

    // -- Inspection -----------------------------------------------------------

    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    // -- Extraction -----------------------------------------------------------

    /// The largest embedded image on page `page_number` (1-indexed).
    #[instrument(skip(self))]
    pub fn page_image(&self, page_number: u32) -> Result<DynamicImage> {
        let pages = self.document.get_pages();
        let page_id: ObjectId = *pages.get(&page_number).ok_or_else(|| {
            DocShieldError::PdfImport(format!(
                "page {} out of range (document has {} pages)",
                page_number,
                pages.len()
            ))
        })?;

        let resources = self.page_resources(page_id)?;
        let xobjects = match resources.get(b"XObject") {
            Ok(object) => self.resolve(object)?.as_dict().map_err(|err| {
                DocShieldError::PdfImport(format!("malformed /XObject dictionary: {}", err))
            })?,
            Err(_) => return Err(no_image(page_number)),
        };

        let largest = xobjects
            .iter()
            .filter_map(|(_, object)| self.resolve(object).ok()?.as_stream().ok())
            .filter(|stream| is_image(stream))
            .max_by_key(|stream| {
                let width = dict_int(&stream.dict, b"Width").unwrap_or(0);
                let height = dict_int(&stream.dict, b"Height").unwrap_or(0);
                width * height
            })
            .ok_or_else(|| no_image(page_number))?;

        let image = decode_image_stream(largest)?;
        info!(
            page_number,
            width = image.width(),
            height = image.height(),
            "Page image extracted"
        );
        Ok(image)
    }

    // -- Helpers --------------------------------------------------------------

    fn resolve<'a>(&'a self, object: &'a Object) -> Result<&'a Object> {
        match object {
            Object::Reference(id) => self.document.get_object(*id).map_err(|err| {
                DocShieldError::PdfImport(format!("cannot resolve {:?}: {}", id, err))
            }),
            other => Ok(other),
        }
    }

    /// `/Resources` of a page, following `/Parent` for inherited resources.
    fn page_resources(&self, page_id: ObjectId) -> Result<&Dictionary> {
        let mut current = self.document.get_dictionary(page_id).map_err(|err| {
            DocShieldError::PdfImport(format!("cannot read page {:?}: {}", page_id, err))
        })?;

        loop {
            if let Ok(resources) = current.get(b"Resources") {
                return self.resolve(resources)?.as_dict().map_err(|err| {
                    DocShieldError::PdfImport(format!("malformed /Resources: {}", err))
                });
            }
            match current.get(b"Parent") {
                Ok(parent) => {
                    current = self.resolve(parent)?.as_dict().map_err(|err| {
                        DocShieldError::PdfImport(format!("malformed /Parent: {}", err))
                    })?;
                }
                Err(_) => {
                    return Err(DocShieldError::PdfImport(
                        "page has no /Resources".to_string(),
                    ));
                }
            }
        }
    }
}

fn no_image(page_number: u32) -> DocShieldError {
    DocShieldError::PdfImport(format!("page {} has no embedded image", page_number))
}

fn is_image(stream: &Stream) -> bool {
    matches!(
        stream.dict.get(b"Subtype").and_then(Object::as_name),
        Ok(name) if name == b"Image"
    )
}

fn dict_int(dict: &Dictionary, key: &[u8]) -> Option<i64> {
    dict.get(key).ok()?.as_i64().ok()
}

/// Names in `/Filter`, which may be a single name or an array.
fn filter_names(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

fn decode_image_stream(stream: &Stream) -> Result<DynamicImage> {
    let filters = filter_names(&stream.dict);

    if filters.iter().any(|f| f == b"DCTDecode") {
        return image::load_from_memory(&stream.content).map_err(|err| {
            DocShieldError::PdfImport(format!("failed to decode JPEG stream: {}", err))
        });
    }

    if let Some(other) = filters.iter().find(|f| f.as_slice() != b"FlateDecode") {
        return Err(DocShieldError::PdfImport(format!(
            "unsupported image filter {}",
            String::from_utf8_lossy(other)
        )));
    }

    let bits = dict_int(&stream.dict, b"BitsPerComponent").unwrap_or(8);
    if bits != 8 {
        return Err(DocShieldError::PdfImport(format!(
            "unsupported bit depth {}",
            bits
        )));
    }

    let (width, height) = match (
        dict_int(&stream.dict, b"Width"),
        dict_int(&stream.dict, b"Height"),
    ) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w as u32, h as u32),
        _ => {
            return Err(DocShieldError::PdfImport(
                "image stream is missing its dimensions".to_string(),
            ));
        }
    };

    let data = if filters.is_empty() {
        stream.content.clone()
    } else {
        stream.decompressed_content().map_err(|err| {
            DocShieldError::PdfImport(format!("failed to inflate image stream: {}", err))
        })?
    };

    let colour_space = stream.dict.get(b"ColorSpace").and_then(Object::as_name);
    let image = match colour_space {
        Ok(b"DeviceRGB") => RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8),
        Ok(b"DeviceGray") => GrayImage::from_raw(width, height, data).map(DynamicImage::ImageLuma8),
        _ => {
            return Err(DocShieldError::PdfImport(
                "unsupported image colour space".to_string(),
            ));
        }
    };

    image.ok_or_else(|| {
        DocShieldError::PdfImport(format!(
            "image stream is too short for {}x{}",
            width, height
        ))
    })
}
