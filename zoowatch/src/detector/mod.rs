//! Object detection.
//!
//! A [`DetectionModel`] maps one decoded frame to the objects it sees. Models
//! are loaded once at startup; the target class is checked against the model's
//! label set at that point so a typo fails fast instead of silently never
//! alerting.

pub mod labels;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod yolo;

#[cfg(feature = "onnx")]
pub use onnx::{OnnxDetector, OnnxDetectorConfig};
pub use yolo::YoloParams;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frames::Frame;

/// Errors raised by detection models.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to load model {path}: {message}")]
    Load { path: PathBuf, message: String },

    #[error("failed to read labels from {path}: {source}")]
    Labels {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model has no class labels")]
    NoLabels,

    #[error("couldn't find class {target:?} among the model's {available} labels")]
    MissingLabel { target: String, available: usize },

    #[error("frame is {actual_width}x{actual_height}, expected packed RGB24 data of {expected_len} bytes")]
    InvalidFrame {
        actual_width: u32,
        actual_height: u32,
        expected_len: usize,
    },

    #[error("labels file has {labels} labels but the model outputs {classes} classes")]
    LabelCountMismatch { labels: usize, classes: usize },

    #[error("unexpected model output shape {0:?}")]
    OutputShape(Vec<usize>),

    #[error("inference failed: {0}")]
    Inference(String),
}

/// One object seen in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_label: String,
    /// Score in `[0, 1]`.
    pub confidence: f32,
}

impl Detection {
    pub fn new(class_label: impl Into<String>, confidence: f32) -> Self {
        Self {
            class_label: class_label.into(),
            confidence: if confidence.is_nan() {
                0.0
            } else {
                confidence.clamp(0.0, 1.0)
            },
        }
    }
}

/// A loaded detector.
///
/// Inference is synchronous; the monitor runs it inline between frame reads.
pub trait DetectionModel: Send {
    /// Every class label the model can emit.
    fn labels(&self) -> &[String];

    /// Run the model over one frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, ModelError>;
}

/// Find `target` in `labels`, ignoring ASCII case.
///
/// Returns the model's own spelling so later comparisons can be exact.
pub fn resolve_target_label(labels: &[String], target: &str) -> Result<String, ModelError> {
    if labels.is_empty() {
        return Err(ModelError::NoLabels);
    }

    let target = target.trim();
    labels
        .iter()
        .find(|label| label.eq_ignore_ascii_case(target))
        .cloned()
        .ok_or_else(|| ModelError::MissingLabel {
            target: target.to_string(),
            available: labels.len(),
        })
}
