//! ONNX Runtime backed classifier

use crate::config::{ModelOutput, ModelSpec, Normalization, TensorLayout};
use crate::error::VisionError;
use crate::models::classifier::Classifier;
use crate::models::labels::load_labels;
use crate::prediction::ClassificationResult;
use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use parking_lot::Mutex;
use std::path::Path;
use tracing::{debug, info};

/// Fraction of the resized image kept by the centre crop
const CROP_PCT: f32 = 0.875;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];
/// Per-channel means in BGR order on the 0..255 scale
const CAFFE_MEAN_BGR: [f32; 3] = [103.939, 116.779, 123.68];

/// Classifier running an ONNX image-classification model
pub struct OnnxClassifier {
    session: Mutex<Session>,
    labels: Vec<String>,
    input_size: u32,
    layout: TensorLayout,
    normalization: Normalization,
    output: ModelOutput,
}

impl OnnxClassifier {
    /// Load a model and its labels. Blocking; call from a blocking thread.
    pub fn load(
        spec: &ModelSpec,
        model_path: &Path,
        labels_path: &Path,
        intra_threads: usize,
    ) -> Result<Self, VisionError> {
        let labels = load_labels(labels_path)?;

        let _ = ort::init().with_name("nameit").commit();

        let session = Session::builder()
            .map_err(|e| VisionError::Ort(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| VisionError::Ort(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(intra_threads)
            .map_err(|e| VisionError::Ort(format!("Failed to set intra threads: {}", e)))?
            .with_execution_providers([
                ort::execution_providers::CPUExecutionProvider::default().build(),
            ])
            .map_err(|e| VisionError::Ort(format!("Failed to register CPU execution provider: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| VisionError::Ort(format!("Failed to load {} model: {}", spec.kind, e)))?;

        info!("{} model loaded from {:?} ({} labels)", spec.kind, model_path, labels.len());

        Ok(Self {
            session: Mutex::new(session),
            labels,
            input_size: spec.input_size,
            layout: spec.layout,
            normalization: spec.normalization,
            output: spec.output,
        })
    }

    fn label(&self, index: usize) -> String {
        self.labels
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", index))
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, image: &DynamicImage) -> Result<Vec<ClassificationResult>, VisionError> {
        let input = preprocess(image, self.input_size, self.layout, self.normalization)?;
        let input_tensor = Value::from_array(input)
            .map_err(|e| VisionError::Ort(format!("Failed to create tensor value: {}", e)))?;

        let scores: Vec<f32> = {
            let mut session = self.session.lock();
            let input_name = first_input(session.inputs())?.name().to_string();

            let outputs = session
                .run(ort::inputs![input_name.as_str() => input_tensor])
                .map_err(|e| VisionError::Ort(format!("Inference failed: {}", e)))?;

            let output_value = outputs
                .values()
                .next()
                .ok_or_else(|| VisionError::Ort("Model produced no outputs".to_string()))?;

            let (_, data) = output_value
                .try_extract_tensor::<f32>()
                .map_err(|e| VisionError::Ort(format!("Failed to extract output tensor: {}", e)))?;

            data.to_vec()
        };

        debug!("Inference produced {} scores", scores.len());

        let probabilities = match self.output {
            ModelOutput::Logits => softmax(&scores),
            ModelOutput::Probabilities => scores,
        };

        Ok(probabilities
            .into_iter()
            .enumerate()
            .map(|(idx, confidence)| ClassificationResult::new(self.label(idx), confidence))
            .collect())
    }
}

/// The image input of a single-input classifier
fn first_input<T>(inputs: &[T]) -> Result<&T, VisionError> {
    inputs
        .first()
        .ok_or_else(|| VisionError::Ort("Model declares no inputs".to_string()))
}

/// Resize the shortest edge to `input_size / CROP_PCT`, centre crop to
/// `input_size` and build a normalized batch-of-one tensor.
pub fn preprocess(
    image: &DynamicImage,
    input_size: u32,
    layout: TensorLayout,
    normalization: Normalization,
) -> Result<Array4<f32>, VisionError> {
    let (w, h) = (image.width(), image.height());
    if w == 0 || h == 0 || input_size == 0 {
        return Err(VisionError::Processing("Invalid image dimensions".to_string()));
    }

    let resize_size = (input_size as f32 / CROP_PCT).ceil() as u32;
    let (new_w, new_h) = if w < h {
        (resize_size, ((h as f32 / w as f32) * resize_size as f32).round() as u32)
    } else {
        (((w as f32 / h as f32) * resize_size as f32).round() as u32, resize_size)
    };
    let resized = image.resize_exact(new_w, new_h, FilterType::Triangle);

    let crop_x = new_w.saturating_sub(input_size) / 2;
    let crop_y = new_h.saturating_sub(input_size) / 2;
    let rgb = resized.crop_imm(crop_x, crop_y, input_size, input_size).to_rgb8();

    let side = input_size as usize;
    let shape = match layout {
        TensorLayout::Nchw => (1, 3, side, side),
        TensorLayout::Nhwc => (1, side, side, 3),
    };
    let mut tensor = Array4::<f32>::zeros(shape);

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let values = normalize_pixel(pixel.0, normalization);
        let (x, y) = (x as usize, y as usize);
        for (c, value) in values.into_iter().enumerate() {
            match layout {
                TensorLayout::Nchw => tensor[[0, c, y, x]] = value,
                TensorLayout::Nhwc => tensor[[0, y, x, c]] = value,
            }
        }
    }

    Ok(tensor)
}

fn normalize_pixel(rgb: [u8; 3], normalization: Normalization) -> [f32; 3] {
    let [r, g, b] = rgb.map(f32::from);
    match normalization {
        Normalization::ImageNet => [
            (r / 255.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0],
            (g / 255.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1],
            (b / 255.0 - IMAGENET_MEAN[2]) / IMAGENET_STD[2],
        ],
        Normalization::Symmetric => [r / 127.5 - 1.0, g / 127.5 - 1.0, b / 127.5 - 1.0],
        Normalization::Caffe => [
            b - CAFFE_MEAN_BGR[0],
            g - CAFFE_MEAN_BGR[1],
            r - CAFFE_MEAN_BGR[2],
        ],
    }
}

pub(crate) fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp: Vec<f32> = scores.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exp.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        exp.into_iter().map(|x| x / sum).collect()
    } else {
        exp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    #[test]
    fn test_preprocess_shapes() {
        let image = solid(640, 480, [10, 20, 30]);

        let nchw = preprocess(&image, 224, TensorLayout::Nchw, Normalization::ImageNet).unwrap();
        assert_eq!(nchw.shape(), &[1, 3, 224, 224]);

        let nhwc = preprocess(&image, 224, TensorLayout::Nhwc, Normalization::ImageNet).unwrap();
        assert_eq!(nhwc.shape(), &[1, 224, 224, 3]);
    }

    #[test]
    fn test_first_input() {
        assert_eq!(*first_input(&["pixel_values", "mask"]).unwrap(), "pixel_values");
        let none: [&str; 0] = [];
        assert!(matches!(first_input(&none), Err(VisionError::Ort(_))));
    }

    #[test]
    fn test_preprocess_portrait_image() {
        let image = solid(300, 900, [0, 0, 0]);
        let tensor = preprocess(&image, 64, TensorLayout::Nchw, Normalization::Symmetric).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 64, 64]);
        assert!(tensor.iter().all(|v| (*v + 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_symmetric_normalization_range() {
        let white = preprocess(&solid(32, 32, [255, 255, 255]), 32, TensorLayout::Nhwc, Normalization::Symmetric).unwrap();
        assert!(white.iter().all(|v| (*v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_caffe_normalization_is_bgr() {
        let values = normalize_pixel([200, 100, 50], Normalization::Caffe);
        assert!((values[0] - (50.0 - 103.939)).abs() < 1e-4);
        assert!((values[1] - (100.0 - 116.779)).abs() < 1e-4);
        assert!((values[2] - (200.0 - 123.68)).abs() < 1e-4);
    }

    #[test]
    fn test_imagenet_channel_placement() {
        let tensor = preprocess(&solid(40, 40, [255, 0, 0]), 32, TensorLayout::Nchw, Normalization::ImageNet).unwrap();
        let red = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let green = (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        assert!((tensor[[0, 0, 5, 5]] - red).abs() < 1e-4);
        assert!((tensor[[0, 1, 5, 5]] - green).abs() < 1e-4);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }
}
