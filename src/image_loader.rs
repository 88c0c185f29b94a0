//! # Image Loading
//!
//! Reads the pixels behind an `ImageView` and works out its natural size.
//! Sources are file paths (relative ones resolve against the document's
//! directory) or `data:image/...;base64,` URIs.
//!
//! JPEG bytes are kept as-is and embedded with DCTDecode. PNG is decoded to
//! RGB with a separate alpha channel for the PDF soft mask.

use std::io::Cursor;
use std::path::Path;

use crate::error::FolioError;

/// Pixels are mapped one-to-one onto points (72 dpi).
pub const PIXELS_PER_POINT: f64 = 1.0;

/// A loaded image, ready for PDF embedding.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub pixel_data: ImagePixelData,
    pub width_px: u32,
    pub height_px: u32,
}

impl LoadedImage {
    /// Natural (width, height) in points.
    pub fn intrinsic_size(&self) -> (f64, f64) {
        (
            self.width_px as f64 / PIXELS_PER_POINT,
            self.height_px as f64 / PIXELS_PER_POINT,
        )
    }
}

#[derive(Debug, Clone)]
pub enum ImagePixelData {
    /// Raw JPEG bytes.
    Jpeg {
        data: Vec<u8>,
        color_space: JpegColorSpace,
    },
    /// Decoded pixels.
    Decoded {
        /// width * height * 3 bytes
        rgb: Vec<u8>,
        /// width * height bytes; `None` when fully opaque.
        alpha: Option<Vec<u8>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegColorSpace {
    DeviceRGB,
    DeviceGray,
}

impl JpegColorSpace {
    pub fn pdf_name(&self) -> &'static str {
        match self {
            JpegColorSpace::DeviceRGB => "DeviceRGB",
            JpegColorSpace::DeviceGray => "DeviceGray",
        }
    }
}

/// Load the image named by `src`.
pub fn load_image(src: &str, base_dir: &Path) -> Result<LoadedImage, FolioError> {
    let raw_bytes = read_source_bytes(src, base_dir)?;
    decode_image_bytes(&raw_bytes)
}

fn read_source_bytes(src: &str, base_dir: &Path) -> Result<Vec<u8>, FolioError> {
    if let Some(rest) = src.strip_prefix("data:image/") {
        let (_, b64) = rest
            .split_once(',')
            .ok_or_else(|| FolioError::Image("data URI without a payload".to_string()))?;
        return base64_decode(b64);
    }

    let path = base_dir.join(src);
    std::fs::read(&path)
        .map_err(|e| FolioError::Image(format!("failed to read '{}': {}", path.display(), e)))
}

fn base64_decode(input: &str) -> Result<Vec<u8>, FolioError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(input.trim())
        .map_err(|e| FolioError::Image(format!("bad base64 payload: {}", e)))
}

fn decode_image_bytes(data: &[u8]) -> Result<LoadedImage, FolioError> {
    if is_jpeg(data) {
        decode_jpeg(data)
    } else if is_png(data) {
        decode_png(data)
    } else {
        Err(FolioError::Image(
            "unsupported image format (expected JPEG or PNG)".to_string(),
        ))
    }
}

fn is_jpeg(data: &[u8]) -> bool {
    data.starts_with(&[0xFF, 0xD8])
}

fn is_png(data: &[u8]) -> bool {
    data.starts_with(&[0x89, b'P', b'N', b'G'])
}

/// Only the header is read; the JPEG stream itself goes into the PDF.
fn decode_jpeg(data: &[u8]) -> Result<LoadedImage, FolioError> {
    let (width, height) = image::io::Reader::with_format(Cursor::new(data), image::ImageFormat::Jpeg)
        .into_dimensions()
        .map_err(|e| FolioError::Image(format!("unreadable JPEG header: {}", e)))?;

    Ok(LoadedImage {
        pixel_data: ImagePixelData::Jpeg {
            data: data.to_vec(),
            color_space: jpeg_color_space(data),
        },
        width_px: width,
        height_px: height,
    })
}

/// Walk the JPEG markers up to the first start-of-frame segment and read
/// its component count.
fn jpeg_color_space(data: &[u8]) -> JpegColorSpace {
    let mut i = 2;
    while i + 3 < data.len() && data[i] == 0xFF {
        let marker = data[i + 1];
        let is_sof = matches!(marker, 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF);
        if is_sof {
            return match data.get(i + 9) {
                Some(1) => JpegColorSpace::DeviceGray,
                _ => JpegColorSpace::DeviceRGB,
            };
        }
        let segment = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        i += 2 + segment;
    }
    JpegColorSpace::DeviceRGB
}

fn decode_png(data: &[u8]) -> Result<LoadedImage, FolioError> {
    let img = image::io::Reader::with_format(Cursor::new(data), image::ImageFormat::Png)
        .decode()
        .map_err(|e| FolioError::Image(format!("failed to decode PNG: {}", e)))?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let pixel_count = (width * height) as usize;
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::with_capacity(pixel_count);
    for pixel in rgba.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel[3]);
    }
    let opaque = alpha.iter().all(|&a| a == 255);

    Ok(LoadedImage {
        pixel_data: ImagePixelData::Decoded {
            rgb,
            alpha: if opaque { None } else { Some(alpha) },
        },
        width_px: width,
        height_px: height,
    })
}
