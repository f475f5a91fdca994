use image::imageops::{self, FilterType};
use ndarray::{s, Array4, ArrayView4};
use std::ops::Range;

use crate::decode::DecodedImage;

pub const INPUT_SIZE: usize = 224;

// ImageNet statistics, must match whatever the served network was trained with.
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Normalized NCHW input with a batch of one.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessedTensor(Array4<f32>);

impl PreprocessedTensor {
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        self.0.dim()
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.0.view()
    }

    /// Replaces a spatial window with the normalized channel mean (zero) on every channel.
    pub fn occlude(&mut self, rows: Range<usize>, cols: Range<usize>) {
        self.0.slice_mut(s![.., .., rows, cols]).fill(0.0);
    }
}

#[derive(Debug, Clone)]
pub struct Preprocessor {
    size: usize,
    mean: [f32; 3],
    std: [f32; 3],
    filter: FilterType,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Preprocessor {
            size: INPUT_SIZE,
            mean: MEAN,
            std: STD,
            filter: FilterType::Triangle,
        }
    }
}

impl Preprocessor {
    pub fn run(&self, image: &DecodedImage) -> PreprocessedTensor {
        let side = self.size as u32;
        let resized = imageops::resize(image.as_rgb(), side, side, self.filter);

        let tensor = Array4::from_shape_fn((1, 3, self.size, self.size), |(_, c, y, x)| {
            let value = resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
            (value - self.mean[c]) / self.std[c]
        });

        PreprocessedTensor(tensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> DecodedImage {
        DecodedImage::new(RgbImage::from_pixel(width, height, Rgb(rgb))).unwrap()
    }

    #[test]
    fn shape_is_fixed_for_any_resolution() {
        let preprocessor = Preprocessor::default();
        for (w, h) in [(1, 1), (224, 224), (640, 480), (17, 900)] {
            let tensor = preprocessor.run(&solid(w, h, [10, 20, 30]));
            assert_eq!(tensor.shape(), (1, 3, INPUT_SIZE, INPUT_SIZE));
        }
    }

    #[test]
    fn applies_channel_standardization() {
        let tensor = Preprocessor::default().run(&solid(50, 50, [255, 0, 128]));
        let view = tensor.view();

        let expected_r = (1.0 - MEAN[0]) / STD[0];
        let expected_g = (0.0 - MEAN[1]) / STD[1];
        let expected_b = (128.0 / 255.0 - MEAN[2]) / STD[2];
        for (y, x) in [(0, 0), (111, 57), (223, 223)] {
            assert!((view[[0, 0, y, x]] - expected_r).abs() < 1e-5);
            assert!((view[[0, 1, y, x]] - expected_g).abs() < 1e-5);
            assert!((view[[0, 2, y, x]] - expected_b).abs() < 1e-5);
        }
    }

    #[test]
    fn is_deterministic() {
        let img = DecodedImage::new(RgbImage::from_fn(300, 123, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 3 % 256) as u8, ((x + y) % 256) as u8])
        }))
        .unwrap();
        let preprocessor = Preprocessor::default();
        assert_eq!(preprocessor.run(&img), preprocessor.run(&img));
    }

    #[test]
    fn occlusion_zeroes_only_the_window() {
        let mut tensor = Preprocessor::default().run(&solid(8, 8, [255, 255, 255]));
        tensor.occlude(0..28, 28..56);

        let view = tensor.view();
        for c in 0..3 {
            assert_eq!(view[[0, c, 0, 28]], 0.0);
            assert_eq!(view[[0, c, 27, 55]], 0.0);
            assert_ne!(view[[0, c, 28, 28]], 0.0);
            assert_ne!(view[[0, c, 0, 56]], 0.0);
        }
    }
}
