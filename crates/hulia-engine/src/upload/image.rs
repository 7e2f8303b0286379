use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::backend::TextureFormat;

/// Pixel layout of decoded image data.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PixelFormat {
    /// 4 channels, 8 bits each, R first.
    Rgba8Unorm,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Rgba8Unorm => 4,
        }
    }

    pub const fn texture_format(self) -> TextureFormat {
        match self {
            PixelFormat::Rgba8Unorm => TextureFormat::Rgba8Unorm,
        }
    }
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to decode image {}", display_path(.path))]
    Decode {
        path: Option<PathBuf>,
        #[source]
        source: image::ImageError,
    },

    #[error("image has zero extent ({width}x{height})")]
    Empty { width: u32, height: u32 },

    #[error("{width}x{height} RGBA8 image needs {expected} bytes, got {actual}")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map_or_else(|| "<memory>".to_string(), |p| p.display().to_string())
}

/// Decoded image ready for texture upload.
///
/// Whatever the source format, pixels are always converted to RGBA8.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ImageData {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
}

impl ImageData {
    /// Decodes the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        let path = path.as_ref();
        let decoded = image::open(path).map_err(|source| ImageError::Decode {
            path: Some(path.to_path_buf()),
            source,
        })?;
        let data = Self::from_dynamic(decoded)?;
        log::debug!(
            "decoded {} ({}x{}, {} bytes)",
            path.display(),
            data.width,
            data.height,
            data.pixels.len()
        );
        Ok(data)
    }

    /// Decodes an in-memory encoded image (PNG, JPEG, BMP, ...).
    pub fn from_memory(bytes: &[u8]) -> Result<Self, ImageError> {
        let decoded =
            image::load_from_memory(bytes).map_err(|source| ImageError::Decode { path: None, source })?;
        Self::from_dynamic(decoded)
    }

    /// Wraps already decoded RGBA8 pixels.
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::Empty { width, height });
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(ImageError::SizeMismatch {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format: PixelFormat::Rgba8Unorm,
            pixels,
        })
    }

    fn from_dynamic(decoded: image::DynamicImage) -> Result<Self, ImageError> {
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba8(width, height, rgba.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Bytes in one tightly packed row.
    pub fn row_bytes(&self) -> u32 {
        self.width * self.format.bytes_per_pixel()
    }
}
