//! Pixel sources the color sampler can read from.
//!
//! The pipeline needs a source's dimensions up front (to place seeds)
//! but only touches its pixels once, during color sampling.

use std::borrow::Cow;
use std::io::Cursor;

use image::{ImageFormat, RgbaImage};

use crate::types::{Dimensions, PipelineError};

/// Anything that can report its size and hand over RGBA pixel data.
pub trait PixelSource {
    /// Size of the image in pixels.
    fn dimensions(&self) -> Dimensions;

    /// Row-major RGBA pixels, four bytes per pixel.
    ///
    /// # Errors
    ///
    /// Returns an error if the pixels cannot be produced (for example an
    /// encoded image fails to decode).
    fn image_data(&self) -> Result<Cow<'_, RgbaImage>, PipelineError>;
}

impl PixelSource for RgbaImage {
    fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width(), self.height())
    }

    fn image_data(&self) -> Result<Cow<'_, RgbaImage>, PipelineError> {
        Ok(Cow::Borrowed(self))
    }
}

impl<T: PixelSource + ?Sized> PixelSource for &T {
    fn dimensions(&self) -> Dimensions {
        T::dimensions(*self)
    }

    fn image_data(&self) -> Result<Cow<'_, RgbaImage>, PipelineError> {
        T::image_data(*self)
    }
}

/// A raw RGBA byte buffer with explicit dimensions.
#[derive(Debug, Clone)]
pub struct RawPixels {
    image: RgbaImage,
}

impl RawPixels {
    /// Wrap a row-major RGBA buffer.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `data` is not exactly
    /// `width * height * 4` bytes long.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, PipelineError> {
        let len = data.len();
        let expected = u64::from(width) * u64::from(height) * 4;
        u64::try_from(len)
            .ok()
            .filter(|&n| n == expected)
            .and_then(|_| RgbaImage::from_raw(width, height, data))
            .map(|image| Self { image })
            .ok_or_else(|| {
                PipelineError::InvalidConfig(format!(
                    "raw pixel buffer of {len} bytes does not match {width}x{height} RGBA"
                ))
            })
    }
}

impl PixelSource for RawPixels {
    fn dimensions(&self) -> Dimensions {
        PixelSource::dimensions(&self.image)
    }

    fn image_data(&self) -> Result<Cow<'_, RgbaImage>, PipelineError> {
        Ok(Cow::Borrowed(&self.image))
    }
}

/// Encoded image bytes (PNG, JPEG, BMP, WebP) decoded on demand.
///
/// Only the header is read at construction; the full decode happens
/// when the pixels are requested.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    bytes: Vec<u8>,
    dimensions: Dimensions,
    format: ImageFormat,
}

impl EncodedImage {
    /// Read the image header from `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] if `bytes` is empty, or
    /// [`PipelineError::ImageDecode`] if the format is unrecognized or the
    /// header is corrupt.
    pub fn new(bytes: Vec<u8>) -> Result<Self, PipelineError> {
        if bytes.is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        let reader = image::ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(image::ImageError::from)?;
        let format = reader.format().unwrap_or(ImageFormat::Png);
        let (width, height) = reader.into_dimensions()?;
        Ok(Self {
            bytes,
            dimensions: Dimensions::new(width, height),
            format,
        })
    }

    /// The undecoded bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Container format sniffed from the leading bytes.
    #[must_use]
    pub const fn format(&self) -> ImageFormat {
        self.format
    }

    /// MIME type of the container format, e.g. `image/jpeg`.
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}

impl PixelSource for EncodedImage {
    fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    fn image_data(&self) -> Result<Cow<'_, RgbaImage>, PipelineError> {
        let img = image::load_from_memory(&self.bytes)?;
        Ok(Cow::Owned(img.to_rgba8()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode_png(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn rgba_image_is_its_own_source() {
        let img = RgbaImage::from_fn(3, 2, |x, y| image::Rgba([x as u8, y as u8, 0, 255]));
        assert_eq!(PixelSource::dimensions(&img), Dimensions::new(3, 2));
        let data = img.image_data().unwrap();
        assert_eq!(data.get_pixel(2, 1).0, [2, 1, 0, 255]);
    }

    #[test]
    fn raw_pixels_accepts_matching_buffer() {
        let raw = RawPixels::new(2, 2, vec![7; 16]).unwrap();
        assert_eq!(raw.dimensions(), Dimensions::new(2, 2));
        assert_eq!(raw.image_data().unwrap().get_pixel(1, 1).0, [7, 7, 7, 7]);
    }

    #[test]
    fn raw_pixels_rejects_short_buffer() {
        let result = RawPixels::new(2, 2, vec![0; 15]);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn raw_pixels_rejects_long_buffer() {
        let result = RawPixels::new(2, 2, vec![0; 17]);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn empty_bytes_return_empty_input() {
        assert!(matches!(
            EncodedImage::new(Vec::new()),
            Err(PipelineError::EmptyInput)
        ));
    }

    #[test]
    fn corrupt_bytes_return_image_decode_error() {
        let result = EncodedImage::new(vec![0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn encoded_png_reports_header_dimensions_and_decodes() {
        let img = RgbaImage::from_fn(17, 31, |_, _| image::Rgba([128, 64, 32, 255]));
        let encoded = EncodedImage::new(encode_png(&img)).unwrap();
        assert_eq!(encoded.dimensions(), Dimensions::new(17, 31));

        let decoded = encoded.image_data().unwrap();
        assert_eq!(decoded.dimensions(), (17, 31));
        assert_eq!(decoded.get_pixel(16, 30).0, [128, 64, 32, 255]);
    }

    #[test]
    fn encoded_png_reports_its_format() {
        let img = RgbaImage::from_fn(4, 4, |_, _| image::Rgba([0, 0, 0, 255]));
        let bytes = encode_png(&img);
        let encoded = EncodedImage::new(bytes.clone()).unwrap();
        assert_eq!(encoded.format(), ImageFormat::Png);
        assert_eq!(encoded.mime_type(), "image/png");
        assert_eq!(encoded.bytes(), bytes.as_slice());
    }
}
