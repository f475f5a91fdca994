use image::io::Reader as ImageReader;
use image::{ImageFormat, RgbImage};
use std::io::Cursor;

use crate::error::DecodeError;

/// An RGB pixel grid at the upload's native resolution.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pixels: RgbImage,
}

impl DecodedImage {
    /// Returns `None` for an empty grid.
    pub fn new(pixels: RgbImage) -> Option<Self> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return None;
        }
        Some(DecodedImage { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.pixels
    }
}

#[derive(Debug, Clone)]
pub struct ImageDecoder {
    max_dimension: u32,
}

impl ImageDecoder {
    pub fn new(max_dimension: u32) -> Self {
        ImageDecoder { max_dimension }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let format = image::guess_format(bytes).map_err(|_| DecodeError::Unrecognized)?;
        if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
            return Err(DecodeError::UnsupportedFormat(format));
        }

        let (width, height) = ImageReader::with_format(Cursor::new(bytes), format)
            .into_dimensions()
            .map_err(DecodeError::Corrupt)?;
        if width > self.max_dimension || height > self.max_dimension {
            return Err(DecodeError::TooLarge {
                width,
                height,
                max: self.max_dimension,
            });
        }

        let img = ImageReader::with_format(Cursor::new(bytes), format)
            .decode()
            .map_err(DecodeError::Corrupt)?;

        DecodedImage::new(img.to_rgb8()).ok_or(DecodeError::Unrecognized)
    }
}

impl Default for ImageDecoder {
    fn default() -> Self {
        ImageDecoder::new(8192)
    }
}
