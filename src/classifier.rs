//! # Classifier Module
//!
//! Wraps the pretrained skin-lesion classification model. The model and its
//! label space are loaded once at startup into an immutable [`OnnxClassifier`]
//! that the intake handler shares across messages; tests substitute any other
//! [`ImageClassifier`] implementation.

use image::imageops::FilterType;
use image::RgbImage;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};
use tract_onnx::prelude::*;

use crate::config::ModelConfig;
use crate::errors::DiagnosisError;

// ViT image processor normalization
const IMAGE_MEAN: [f32; 3] = [0.5, 0.5, 0.5];
const IMAGE_STD: [f32; 3] = [0.5, 0.5, 0.5];

/// Top-1 prediction for a single image
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Diagnosis label from the model's label space
    pub label: String,
    /// Softmax probability of `label`, in `[0, 1]`
    pub probability: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, probability: f32) -> Self {
        Self {
            label: label.into(),
            probability,
        }
    }

    /// Confidence as a percentage in `[0, 100]`
    pub fn confidence_percent(&self) -> f64 {
        f64::from(self.probability) * 100.0
    }
}

/// Anything that turns an image on disk into exactly one `(label, probability)` pair
pub trait ImageClassifier: Send + Sync {
    fn classify(&self, image_path: &Path) -> Result<Prediction, DiagnosisError>;
}

/// Numerically stable softmax over raw logits
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|v| v / sum).collect()
}

/// Index and value of the largest element; the first one wins on ties
pub fn arg_max(values: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best
}

#[derive(Deserialize)]
struct HfModelConfig {
    id2label: BTreeMap<String, String>,
}

/// Parse a label list.
///
/// Accepts a HuggingFace `config.json` (the `id2label` object, ordered by
/// numeric id) or plain text with one label per line.
pub fn parse_labels(content: &str) -> Result<Vec<String>, DiagnosisError> {
    let trimmed = content.trim_start();
    let labels: Vec<String> = if trimmed.starts_with('{') {
        let config: HfModelConfig = serde_json::from_str(trimmed)
            .map_err(|e| DiagnosisError::ModelLoad(format!("Invalid label config: {e}")))?;
        let mut indexed = config
            .id2label
            .into_iter()
            .map(|(id, label)| {
                id.parse::<usize>()
                    .map(|id| (id, label))
                    .map_err(|_| DiagnosisError::ModelLoad(format!("Non-numeric label id: {id}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        indexed.sort_by_key(|(id, _)| *id);
        indexed.into_iter().map(|(_, label)| label).collect()
    } else {
        content
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect()
    };

    if labels.is_empty() {
        return Err(DiagnosisError::ModelLoad("Label list is empty".to_string()));
    }
    Ok(labels)
}

/// Resize and normalize an RGB image into a `1x3xHxW` tensor
pub fn preprocess(image: &RgbImage, size: u32) -> Tensor {
    let resized = image::imageops::resize(image, size, size, FilterType::Triangle);
    let side = size as usize;
    tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
        let value = resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
        (value - IMAGE_MEAN[c]) / IMAGE_STD[c]
    })
    .into()
}

/// Turn raw model logits into the most likely labelled prediction.
///
/// There must be exactly one logit per label.
pub fn predict(logits: &[f32], labels: &[String]) -> Result<Prediction, DiagnosisError> {
    if logits.len() != labels.len() {
        return Err(DiagnosisError::Inference(format!(
            "Model produced {} logits for {} labels",
            logits.len(),
            labels.len()
        )));
    }

    let probs = softmax(logits);
    let (idx, probability) =
        arg_max(&probs).ok_or_else(|| DiagnosisError::Inference("Empty model output".to_string()))?;

    Ok(Prediction::new(labels[idx].clone(), probability))
}

/// ONNX-backed classifier, loaded once and shared read-only
pub struct OnnxClassifier {
    model: TypedRunnableModel<TypedModel>,
    labels: Vec<String>,
    input_size: u32,
}

impl OnnxClassifier {
    /// Load the model and label space described by `config`
    pub fn load(config: &ModelConfig) -> Result<Self, DiagnosisError> {
        info!(
            model_path = %config.model_path.display(),
            labels_path = %config.labels_path.display(),
            "Loading classifier model"
        );

        let label_text = std::fs::read_to_string(&config.labels_path).map_err(|e| {
            DiagnosisError::ModelLoad(format!(
                "Failed to read labels '{}': {e}",
                config.labels_path.display()
            ))
        })?;
        let labels = parse_labels(&label_text)?;

        let side = config.input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(&config.model_path)
            .and_then(|m| m.with_input_fact(0, f32::fact([1, 3, side, side]).into()))
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| {
                DiagnosisError::ModelLoad(format!(
                    "Failed to load ONNX model '{}': {e}",
                    config.model_path.display()
                ))
            })?;

        info!(classes = labels.len(), "Classifier ready");

        Ok(Self {
            model,
            labels,
            input_size: config.input_size,
        })
    }
}

impl ImageClassifier for OnnxClassifier {
    fn classify(&self, image_path: &Path) -> Result<Prediction, DiagnosisError> {
        let image = image::open(image_path)
            .map_err(|e| DiagnosisError::ImageLoad(format!("{}: {e}", image_path.display())))?
            .to_rgb8();
        debug!(width = image.width(), height = image.height(), "Decoded lesion image");

        let input = preprocess(&image, self.input_size);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| DiagnosisError::Inference(format!("Failed to run model: {e}")))?;

        let output = outputs
            .first()
            .ok_or_else(|| DiagnosisError::Inference("Model produced no outputs".to_string()))?;
        let logits: Vec<f32> = output
            .to_array_view::<f32>()
            .map_err(|e| DiagnosisError::Inference(format!("Output is not f32: {e}")))?
            .iter()
            .copied()
            .collect();

        predict(&logits, &self.labels)
    }
}
