use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageBuffer, ImageOutputFormat, Luma};
use std::io::Cursor;
use std::sync::Arc;

use crate::classes::PredictionResult;
use crate::classifier::Classifier;
use crate::decode::DecodedImage;
use crate::error::InferenceError;
use crate::preprocess::{PreprocessedTensor, INPUT_SIZE};

pub const PENDING_MESSAGE: &str = "Grad-CAM not yet implemented — model pending";

/// Per-pixel saliency in `[0, 1]`, row-major, aligned with the source image.
#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    width: u32,
    height: u32,
    intensities: Vec<f32>,
}

impl Heatmap {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.intensities[(y * self.width + x) as usize]
    }

    #[cfg(test)]
    pub fn intensities(&self) -> &[f32] {
        &self.intensities
    }

    /// Encodes the heatmap as an 8-bit grayscale PNG data URL.
    pub fn to_png_data_url(&self) -> Result<String, InferenceError> {
        let gray = GrayImage::from_fn(self.width(), self.height(), |x, y| {
            Luma([(self.get(x, y) * 255.0).round() as u8])
        });

        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(gray)
            .write_to(&mut buf, ImageOutputFormat::Png)
            .map_err(|e| InferenceError::Run(format!("heatmap encoding failed: {}", e)))?;

        Ok(format!("data:image/png;base64,{}", STANDARD.encode(buf.into_inner())))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Explanation {
    Heatmap(Heatmap),
    Unavailable { message: &'static str },
}

/// Explains an already-computed prediction. `tensor` is the preprocessed form
/// of `image` that produced `prediction`.
pub trait Explainer: Send + Sync {
    fn name(&self) -> &'static str;

    fn explain(
        &self,
        image: &DecodedImage,
        tensor: &PreprocessedTensor,
        prediction: &PredictionResult,
    ) -> Result<Explanation, InferenceError>;
}

/// Default explainer while no trained network is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableExplainer;

impl Explainer for UnavailableExplainer {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn explain(
        &self,
        _image: &DecodedImage,
        _tensor: &PreprocessedTensor,
        _prediction: &PredictionResult,
    ) -> Result<Explanation, InferenceError> {
        Ok(Explanation::Unavailable {
            message: PENDING_MESSAGE,
        })
    }
}

/// Occlusion sensitivity: how much the class probability drops when each
/// cell of a coarse grid is blanked out.
pub struct OcclusionExplainer {
    classifier: Arc<dyn Classifier>,
    grid: usize,
}

impl OcclusionExplainer {
    pub fn new(classifier: Arc<dyn Classifier>, grid: usize) -> Self {
        OcclusionExplainer {
            classifier,
            grid: grid.clamp(1, INPUT_SIZE),
        }
    }

    fn cell_bounds(&self, cell: usize) -> std::ops::Range<usize> {
        (cell * INPUT_SIZE / self.grid)..((cell + 1) * INPUT_SIZE / self.grid)
    }
}

impl Explainer for OcclusionExplainer {
    fn name(&self) -> &'static str {
        "occlusion"
    }

    fn explain(
        &self,
        image: &DecodedImage,
        tensor: &PreprocessedTensor,
        prediction: &PredictionResult,
    ) -> Result<Explanation, InferenceError> {
        let class = prediction.predicted_class;
        let baseline = prediction.probabilities.get(class);

        let mut drops = vec![0f32; self.grid * self.grid];
        for row in 0..self.grid {
            for col in 0..self.grid {
                let mut occluded = tensor.clone();
                occluded.occlude(self.cell_bounds(row), self.cell_bounds(col));
                let p = self.classifier.classify(&occluded)?.probabilities.get(class);
                drops[row * self.grid + col] = (baseline - p).max(0.0) as f32;
            }
        }

        let peak = drops.iter().copied().fold(0f32, f32::max);
        if peak > 0.0 {
            drops.iter_mut().for_each(|d| *d /= peak);
        }

        let side = self.grid as u32;
        let coarse: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::from_raw(side, side, drops)
            .ok_or_else(|| InferenceError::Run("occlusion grid has the wrong size".into()))?;
        let (width, height) = (image.width(), image.height());
        let upsampled = imageops::resize(&coarse, width, height, FilterType::Triangle);

        Ok(Explanation::Heatmap(Heatmap {
            width,
            height,
            intensities: upsampled
                .into_raw()
                .into_iter()
                .map(|v| v.clamp(0.0, 1.0))
                .collect(),
        }))
    }
}

/// Pairs the explainer with the classifier picked at startup.
pub fn select(classifier: &Arc<dyn Classifier>, grid: usize) -> Arc<dyn Explainer> {
    if classifier.is_loaded() {
        Arc::new(OcclusionExplainer::new(Arc::clone(classifier), grid))
    } else {
        Arc::new(UnavailableExplainer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::ClassProbabilities;
    use crate::classifier::PlaceholderModel;
    use crate::preprocess::Preprocessor;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Confidence in melanoma tracks the mean activation of the top-left quadrant.
    #[derive(Default)]
    struct QuadrantModel {
        calls: AtomicUsize,
    }

    impl Classifier for QuadrantModel {
        fn name(&self) -> &'static str {
            "quadrant"
        }

        fn is_loaded(&self) -> bool {
            true
        }

        fn classify(
            &self,
            tensor: &PreprocessedTensor,
        ) -> Result<PredictionResult, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let view = tensor.view();
            let half = INPUT_SIZE / 2;
            let mut total = 0f32;
            for y in 0..half {
                for x in 0..half {
                    total += view[[0, 0, y, x]];
                }
            }
            let score = total / (half * half) as f32;

            let mut scores = [0f32; 8];
            scores[0] = score;
            Ok(ClassProbabilities::from_scores(&scores)
                .ok_or(InferenceError::OutputShape {
                    expected: 8,
                    actual: 8,
                })?
                .into())
        }
    }

    fn bright(width: u32, height: u32) -> DecodedImage {
        DecodedImage::new(RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))).unwrap()
    }

    fn explain_with(
        explainer: &dyn Explainer,
        model: &dyn Classifier,
        image: &DecodedImage,
    ) -> Explanation {
        let tensor = Preprocessor::default().run(image);
        let prediction = model.classify(&tensor).unwrap();
        explainer.explain(image, &tensor, &prediction).unwrap()
    }

    #[test]
    fn unavailable_returns_pending_message() {
        let explanation = explain_with(&UnavailableExplainer, &PlaceholderModel, &bright(4, 4));
        assert_eq!(
            explanation,
            Explanation::Unavailable {
                message: PENDING_MESSAGE
            }
        );
    }

    #[test]
    fn occlusion_heatmap_matches_source_and_range() {
        let model = Arc::new(QuadrantModel::default());
        let explainer = OcclusionExplainer::new(model.clone(), 4);
        let image = bright(97, 61);

        let Explanation::Heatmap(heatmap) = explain_with(&explainer, model.as_ref(), &image)
        else {
            panic!("expected a heatmap");
        };
        assert_eq!((heatmap.width(), heatmap.height()), (97, 61));
        assert_eq!(heatmap.intensities().len(), 97 * 61);
        assert!(heatmap.intensities().iter().all(|v| (0.0..=1.0).contains(v)));

        // Only the top-left quadrant matters to the model.
        assert!(heatmap.get(2, 2) > 0.9);
        assert!(heatmap.get(94, 58) < 0.1);
    }

    #[test]
    fn occlusion_reuses_the_pipeline_prediction() {
        let model = Arc::new(QuadrantModel::default());
        let explainer = OcclusionExplainer::new(model.clone(), 3);
        let image = bright(20, 20);
        let tensor = Preprocessor::default().run(&image);
        let prediction = model.classify(&tensor).unwrap();
        model.calls.store(0, Ordering::SeqCst);

        explainer.explain(&image, &tensor, &prediction).unwrap();

        // One pass per occluded cell, none for the unoccluded image.
        assert_eq!(model.calls.load(Ordering::SeqCst), 9);
    }

    #[test]
    fn occlusion_is_deterministic() {
        let model = Arc::new(QuadrantModel::default());
        let explainer = OcclusionExplainer::new(model.clone(), 3);
        let image = bright(40, 40);
        assert_eq!(
            explain_with(&explainer, model.as_ref(), &image),
            explain_with(&explainer, model.as_ref(), &image)
        );
    }

    #[test]
    fn png_data_url_round_trips_dimensions() {
        let heatmap = Heatmap {
            width: 5,
            height: 3,
            intensities: vec![0.5; 15],
        };
        let url = heatmap.to_png_data_url().unwrap();
        let encoded = url.strip_prefix("data:image/png;base64,").unwrap();

        let png = STANDARD.decode(encoded).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (5, 3));
    }

    #[test]
    fn selection_follows_classifier() {
        let placeholder: Arc<dyn Classifier> = Arc::new(PlaceholderModel);
        assert_eq!(select(&placeholder, 8).name(), "unavailable");

        let loaded: Arc<dyn Classifier> = Arc::new(QuadrantModel::default());
        assert_eq!(select(&loaded, 8).name(), "occlusion");
    }
}
