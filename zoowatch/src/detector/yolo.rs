//! YOLO output decoding.
//!
//! Ultralytics detection heads export a single tensor of shape
//! `[1, 4 + classes, anchors]`: per anchor a centre-format box followed by one
//! score per class. Some exporters transpose it to `[1, anchors, 4 + classes]`;
//! both layouts are accepted.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{Detection, ModelError};

/// Post-processing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YoloParams {
    /// Square model input edge in pixels.
    pub input_size: u32,
    /// Candidates scoring below this are dropped before NMS.
    pub score_floor: f32,
    /// Boxes of the same class overlapping more than this are suppressed.
    pub iou_threshold: f32,
    /// Cap on detections returned per frame.
    pub max_detections: usize,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            score_floor: 0.10,
            iou_threshold: 0.45,
            max_detections: 300,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    class: usize,
    score: f32,
    /// `x1, y1, x2, y2`
    bbox: [f32; 4],
}

/// Check a model's declared output dims against the label count.
///
/// One of the last two dims must be `4 + label_count`, unless the model
/// leaves them dynamic (`<= 0`).
pub fn check_output_classes(dims: &[i64], label_count: usize) -> Result<(), ModelError> {
    let [.., a, b] = dims else {
        return Err(ModelError::OutputShape(
            dims.iter().map(|d| (*d).max(0) as usize).collect(),
        ));
    };
    let attrs = (4 + label_count) as i64;
    if *a <= 0 || *b <= 0 || *a == attrs || *b == attrs {
        return Ok(());
    }
    Err(ModelError::LabelCountMismatch {
        labels: label_count,
        classes: ((*a).min(*b) as usize).saturating_sub(4),
    })
}

/// Decode a raw output tensor into detections.
pub fn decode_output(
    shape: &[usize],
    data: &[f32],
    labels: &[String],
    params: &YoloParams,
) -> Result<Vec<Detection>, ModelError> {
    let attrs = 4 + labels.len();
    let (rows, cols) = match shape {
        [1, rows, cols] => (*rows, *cols),
        [rows, cols] => (*rows, *cols),
        _ => return Err(ModelError::OutputShape(shape.to_vec())),
    };
    if rows.checked_mul(cols) != Some(data.len()) {
        return Err(ModelError::OutputShape(shape.to_vec()));
    }

    let (anchors, channel_major) = if rows == attrs {
        (cols, true)
    } else if cols == attrs {
        (rows, false)
    } else {
        return Err(ModelError::OutputShape(shape.to_vec()));
    };

    let at = |anchor: usize, attr: usize| -> f32 {
        if channel_major {
            data[attr * anchors + anchor]
        } else {
            data[anchor * attrs + attr]
        }
    };

    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let best = (0..labels.len())
            .map(|class| (class, at(anchor, 4 + class)))
            .filter(|(_, score)| score.is_finite())
            .max_by(|a, b| a.1.total_cmp(&b.1));

        let Some((class, score)) = best else { continue };
        if score < params.score_floor {
            continue;
        }

        let (cx, cy, w, h) = (at(anchor, 0), at(anchor, 1), at(anchor, 2), at(anchor, 3));
        if !(cx.is_finite() && cy.is_finite() && w.is_finite() && h.is_finite()) {
            continue;
        }
        candidates.push(Candidate {
            class,
            score,
            bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
        });
    }

    trace!(candidates = candidates.len(), "decoded yolo candidates");

    let kept = non_max_suppression(candidates, params.iou_threshold);
    Ok(kept
        .into_iter()
        .take(params.max_detections)
        .map(|c| Detection::new(labels[c.class].clone(), c.score))
        .collect())
}

/// Greedy per-class NMS. Output is sorted by descending score.
fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut keep: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let suppressed = keep
            .iter()
            .any(|k| k.class == candidate.class && iou(&k.bbox, &candidate.bbox) > iou_threshold);
        if !suppressed {
            keep.push(candidate);
        }
    }
    keep
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let ix1 = a[0].max(b[0]);
    let iy1 = a[1].max(b[1]);
    let ix2 = a[2].min(b[2]);
    let iy2 = a[3].min(b[3]);

    let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;

    if union <= 0.0 { 0.0 } else { inter / union }
}
