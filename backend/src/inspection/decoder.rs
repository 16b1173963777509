use std::io::Cursor;

use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader, RgbImage};

use super::error::PipelineError;

/// Fully decoded RGB pixels plus the orientation recorded in the source metadata.
///
/// The orientation is not applied here; the normalizer does that before resizing.
#[derive(Debug, Clone)]
pub struct DecodedBitmap {
    pixels: RgbImage,
    orientation: Orientation,
}

impl DecodedBitmap {
    pub fn new(pixels: RgbImage, orientation: Orientation) -> Self {
        Self {
            pixels,
            orientation,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn into_parts(self) -> (RgbImage, Orientation) {
        (self.pixels, self.orientation)
    }
}

/// Parses raw bytes into a [`DecodedBitmap`].
///
/// Runs a structural pass first (format sniffing and header parsing, no pixel
/// data) and then a full decode. Both have to succeed.
pub fn decode(bytes: &[u8]) -> Result<DecodedBitmap, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::InvalidImage("empty image payload".into()));
    }

    verify_structure(bytes)?;

    let reader = guessed_reader(bytes)?;
    let mut decoder = reader
        .into_decoder()
        .map_err(|e| PipelineError::InvalidImage(format!("corrupted file: {}", e)))?;
    let orientation = decoder.orientation().unwrap_or_else(|e| {
        log::debug!("Ignoring unreadable orientation metadata: {}", e);
        Orientation::NoTransforms
    });
    let image = DynamicImage::from_decoder(decoder)
        .map_err(|e| PipelineError::InvalidImage(format!("corrupted file: {}", e)))?;

    let pixels = match image {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    };

    Ok(DecodedBitmap::new(pixels, orientation))
}

fn guessed_reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, PipelineError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PipelineError::InvalidImage(format!("unreadable image data: {}", e)))?;
    if reader.format().is_none() {
        return Err(PipelineError::InvalidImage("unsupported format".into()));
    }
    Ok(reader)
}

const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// The JPEG decoder pads missing scan data instead of failing, so a stream
/// cut short is only visible by its missing end-of-image marker.
fn has_jpeg_end_marker(bytes: &[u8]) -> bool {
    let end = bytes
        .iter()
        .rposition(|&b| b != 0x00 && !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    bytes[..end].ends_with(&JPEG_EOI)
}

fn verify_structure(bytes: &[u8]) -> Result<(), PipelineError> {
    let reader = guessed_reader(bytes)?;
    if reader.format() == Some(ImageFormat::Jpeg) && !has_jpeg_end_marker(bytes) {
        return Err(PipelineError::InvalidImage("corrupted file: truncated".into()));
    }

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| PipelineError::InvalidImage(format!("corrupted file: {}", e)))?;
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidImage(format!(
            "image has no pixels ({}x{})",
            width, height
        )));
    }
    Ok(())
}
