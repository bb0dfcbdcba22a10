//! ONNX Runtime YOLO detector.

use std::path::{Path, PathBuf};

use image::RgbImage;
use image::imageops::{self, FilterType};
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Tensor;
use tracing::{debug, info};

use super::labels::{load_labels_file, parse_ultralytics_names};
use super::yolo::{YoloParams, check_output_classes, decode_output};
use super::{Detection, DetectionModel, ModelError};
use crate::frames::Frame;

/// Metadata key ultralytics uses for the class names.
const NAMES_METADATA_KEY: &str = "names";

#[derive(Debug, Clone)]
pub struct OnnxDetectorConfig {
    pub model_path: PathBuf,
    /// Labels file; when absent the model's embedded `names` metadata is used.
    pub labels_path: Option<PathBuf>,
    pub params: YoloParams,
    /// Intra-op thread count, `0` lets the runtime decide.
    pub intra_threads: usize,
}

/// YOLO detector backed by ONNX Runtime.
pub struct OnnxDetector {
    session: Session,
    labels: Vec<String>,
    params: YoloParams,
}

impl OnnxDetector {
    /// Load the model and its labels.
    pub fn load(config: &OnnxDetectorConfig) -> Result<Self, ModelError> {
        info!(path = %config.model_path.display(), "loading detection model");
        let path = config.model_path.as_path();

        let mut builder = Session::builder()
            .map_err(|e| load_error(path, e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| load_error(path, e))?;
        if config.intra_threads > 0 {
            builder = builder
                .with_intra_threads(config.intra_threads)
                .map_err(|e| load_error(path, e))?;
        }
        let session = builder
            .commit_from_file(path)
            .map_err(|e| load_error(path, e))?;

        let labels = match &config.labels_path {
            Some(path) => load_labels_file(path)?,
            None => Self::embedded_labels(&session, &config.model_path)?,
        };
        if labels.is_empty() {
            return Err(ModelError::NoLabels);
        }

        match session
            .outputs
            .first()
            .and_then(|output| output.output_type.tensor_shape())
        {
            Some(shape) => {
                let dims: Vec<i64> = shape.iter().copied().collect();
                check_output_classes(&dims, labels.len())?;
            }
            None => debug!("model output is not a tensor, skipping class count check"),
        }

        info!(classes = labels.len(), "detection model ready");
        Ok(Self {
            session,
            labels,
            params: config.params.clone(),
        })
    }

    fn embedded_labels(session: &Session, path: &Path) -> Result<Vec<String>, ModelError> {
        let raw = session
            .metadata()
            .and_then(|metadata| metadata.custom(NAMES_METADATA_KEY))
            .map_err(|e| ModelError::Load {
                path: path.to_path_buf(),
                message: format!("failed to read model metadata: {e}"),
            })?;

        Ok(raw
            .map(|names| parse_ultralytics_names(&names))
            .unwrap_or_default())
    }

    /// Convert a packed RGB24 frame into a normalised NCHW tensor buffer.
    fn preprocess(&self, frame: &Frame) -> Result<Vec<f32>, ModelError> {
        let size = self.params.input_size;
        let expected_len = frame.width as usize * frame.height as usize * 3;
        let invalid = || ModelError::InvalidFrame {
            actual_width: frame.width,
            actual_height: frame.height,
            expected_len,
        };

        if frame.data.len() != expected_len {
            return Err(invalid());
        }
        let image = RgbImage::from_raw(frame.width, frame.height, frame.data.to_vec())
            .ok_or_else(invalid)?;
        let image = if image.dimensions() == (size, size) {
            image
        } else {
            imageops::resize(&image, size, size, FilterType::Triangle)
        };

        let plane = (size * size) as usize;
        let mut input = vec![0.0f32; 3 * plane];
        for (i, pixel) in image.pixels().enumerate() {
            input[i] = f32::from(pixel[0]) / 255.0;
            input[plane + i] = f32::from(pixel[1]) / 255.0;
            input[2 * plane + i] = f32::from(pixel[2]) / 255.0;
        }
        Ok(input)
    }
}

fn load_error(path: &Path, err: impl std::fmt::Display) -> ModelError {
    ModelError::Load {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

impl DetectionModel for OnnxDetector {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, ModelError> {
        let size = self.params.input_size as usize;
        let input = self.preprocess(frame)?;

        let tensor = Tensor::from_array(([1usize, 3, size, size], input))
            .map_err(|e| ModelError::Inference(e.to_string()))?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Inference(e.to_string()))?;
        let shape: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();

        let detections = decode_output(&shape, data, &self.labels, &self.params)?;
        debug!(frame = frame.index, detections = detections.len(), "inference done");
        Ok(detections)
    }
}
