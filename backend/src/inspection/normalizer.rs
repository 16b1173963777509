use image::imageops::{self, FilterType};
use image::DynamicImage;
use ndarray::{Array4, ArrayView4};

use super::decoder::DecodedBitmap;
use super::error::PipelineError;

pub const INPUT_SIZE: u32 = 150;
pub const INPUT_SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3];

/// Single-image NHWC batch with values in `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor(Array4<f32>);

impl NormalizedTensor {
    /// Wraps an existing array, checking it has the classifier input shape.
    pub fn from_array(array: Array4<f32>) -> Result<Self, PipelineError> {
        if array.shape() != INPUT_SHAPE {
            return Err(PipelineError::ShapeMismatch {
                expected: INPUT_SHAPE,
                actual: array.shape().to_vec(),
            });
        }
        Ok(Self(array))
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.0.view()
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    /// Values in row-major order: batch, height, width, channel.
    #[cfg_attr(not(feature = "torch"), allow(dead_code))]
    pub fn to_vec(&self) -> Vec<f32> {
        self.0.iter().copied().collect()
    }
}

/// Orients, resizes and rescales a bitmap into the classifier input tensor.
pub fn normalize(bitmap: DecodedBitmap) -> Result<NormalizedTensor, PipelineError> {
    let (pixels, orientation) = bitmap.into_parts();

    let mut oriented = DynamicImage::ImageRgb8(pixels);
    oriented.apply_orientation(orientation);
    let oriented = oriented.into_rgb8();

    let resized = imageops::resize(&oriented, INPUT_SIZE, INPUT_SIZE, FilterType::Lanczos3);
    let (width, height) = resized.dimensions();

    let values: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|v| f32::from(v) / 255.0)
        .collect();

    let array = Array4::from_shape_vec((1, height as usize, width as usize, 3), values).map_err(
        |_| PipelineError::ShapeMismatch {
            expected: INPUT_SHAPE,
            actual: vec![1, height as usize, width as usize, 3],
        },
    )?;

    NormalizedTensor::from_array(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::metadata::Orientation;
    use image::{Rgb, RgbImage};

    fn bitmap(width: u32, height: u32) -> DecodedBitmap {
        let pixels = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 3 % 256) as u8, 128])
        });
        DecodedBitmap::new(pixels, Orientation::NoTransforms)
    }

    #[test]
    fn output_shape_is_fixed_for_any_source_geometry() {
        for (w, h) in [(1, 1), (150, 150), (640, 480), (37, 901), (3000, 20)] {
            let tensor = normalize(bitmap(w, h)).unwrap();
            assert_eq!(tensor.shape(), INPUT_SHAPE, "source {}x{}", w, h);
            assert!(tensor.view().iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn rescales_linearly_by_255() {
        let pixels = RgbImage::from_pixel(150, 150, Rgb([255, 0, 51]));
        let tensor = normalize(DecodedBitmap::new(pixels, Orientation::NoTransforms)).unwrap();
        let view = tensor.view();
        assert_eq!(view[[0, 10, 20, 0]], 1.0);
        assert_eq!(view[[0, 10, 20, 1]], 0.0);
        assert_eq!(view[[0, 10, 20, 2]], 51.0 / 255.0);
    }

    #[test]
    fn applies_orientation_before_resizing() {
        // Left half white, right half black; a 180° rotation swaps them.
        let pixels = RgbImage::from_fn(300, 150, |x, _| {
            if x < 150 { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) }
        });
        let upright = normalize(DecodedBitmap::new(pixels.clone(), Orientation::NoTransforms)).unwrap();
        let rotated = normalize(DecodedBitmap::new(pixels, Orientation::Rotate180)).unwrap();

        assert!(upright.view()[[0, 75, 5, 0]] > 0.9);
        assert!(rotated.view()[[0, 75, 5, 0]] < 0.1);
        assert!(rotated.view()[[0, 75, 144, 0]] > 0.9);
    }

    #[test]
    fn is_deterministic() {
        let a = normalize(bitmap(333, 211)).unwrap();
        let b = normalize(bitmap(333, 211)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_arrays_of_the_wrong_shape() {
        let err = NormalizedTensor::from_array(Array4::zeros((1, 150, 149, 3))).unwrap_err();
        match err {
            PipelineError::ShapeMismatch { expected, actual } => {
                assert_eq!(expected, INPUT_SHAPE);
                assert_eq!(actual, vec![1, 150, 149, 3]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
