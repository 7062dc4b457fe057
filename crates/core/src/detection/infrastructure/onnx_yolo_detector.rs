/// YOLO face detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference and NMS post-processing.
/// Boxes are mapped back to the input frame's coordinates but not clamped.
use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

use super::onnx_session::{input_size, load_session, SharedSession};

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for face detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// How class scores are laid out in each output row, after the 4 box values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassFilter {
    /// Number of class score columns. Face models have one; anything after
    /// them (keypoints) is ignored.
    pub num_classes: usize,
    /// Only keep detections of this class. `None` takes the best class.
    pub target_class: Option<usize>,
}

impl Default for ClassFilter {
    fn default() -> Self {
        Self {
            num_classes: 1,
            target_class: None,
        }
    }
}

/// YOLO face detector backed by an ONNX Runtime session.
pub struct OnnxYoloDetector {
    session: SharedSession,
    confidence: f64,
    class_filter: ClassFilter,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Load a YOLO ONNX model and prepare for inference.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        Self::from_shared_session(load_session(model_path)?, confidence)
    }

    /// Wrap an already loaded session.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn from_shared_session(
        session: SharedSession,
        confidence: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let input_size = {
            let guard = session
                .lock()
                .map_err(|e| format!("Lock poisoned: {e}"))?;
            input_size(&guard).unwrap_or(DEFAULT_INPUT_SIZE)
        };
        Ok(Self {
            session,
            confidence,
            class_filter: ClassFilter::default(),
            input_size,
        })
    }

    pub fn with_class_filter(mut self, class_filter: ClassFilter) -> Self {
        self.class_filter = class_filter;
        self
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }

        // 1. Preprocess: letterbox + normalize → NCHW float32
        let (input_tensor, letterbox) = letterbox(frame, self.input_size);

        // 2. Inference
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let mut session = self
            .session
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        // 3. Parse + NMS
        let mut raw_dets = parse_detections(
            data,
            tensor.shape(),
            self.confidence,
            &self.class_filter,
            &letterbox,
        )?;
        let kept = nms(&mut raw_dets, NMS_IOU_THRESH);

        Ok(kept
            .iter()
            .map(|d| BoundingBox::from_corners(d.x1, d.y1, d.x2, d.y2))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Mapping between frame coordinates and the letterboxed model input.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Letterbox {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    fn to_frame(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.pad_x as f64) / self.scale,
            (y - self.pad_y as f64) / self.scale,
        )
    }
}

/// Letterbox-resize a frame to `target_size` × `target_size`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, Letterbox) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Padding is 114/255 gray, YOLO convention
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    // Nearest-neighbour resize
    for y in 0..new_h {
        let src_y = ((y as f64 / scale) as u32).min(frame.height() - 1);
        for x in 0..new_w {
            let src_x = ((x as f64 / scale) as u32).min(frame.width() - 1);
            let Some(px) = frame.pixel(src_x, src_y) else {
                continue;
            };
            let ty = (pad_y + y) as usize;
            let tx = (pad_x + x) as usize;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = px[c] as f32 / 255.0;
            }
        }
    }

    (
        tensor,
        Letterbox {
            scale,
            pad_x,
            pad_y,
        },
    )
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawDetection {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f64,
}

/// Decode a raw YOLO output tensor into frame-space detections above `confidence`.
///
/// The output is `[1, features, detections]` (YOLOv8 export default) or
/// `[1, detections, features]`; the smaller axis is taken as the feature axis.
/// Each row is `[cx, cy, w, h, class scores..., extras...]`.
fn parse_detections(
    data: &[f32],
    shape: &[usize],
    confidence: f64,
    filter: &ClassFilter,
    letterbox: &Letterbox,
) -> Result<Vec<RawDetection>, String> {
    if shape.len() != 3 {
        return Err(format!("Unexpected YOLO output shape: {shape:?}"));
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if data.len() < num_dets * num_feats {
        return Err(format!(
            "YOLO output holds {} values, shape {shape:?} needs {}",
            data.len(),
            num_dets * num_feats
        ));
    }
    let num_classes = filter.num_classes.max(1);
    if num_feats < 4 + num_classes {
        return Err(format!(
            "YOLO output has {num_feats} features per row, expected at least {}",
            4 + num_classes
        ));
    }
    if let Some(target) = filter.target_class {
        if target >= num_classes {
            return Err(format!(
                "class {target} out of range for a {num_classes}-class model"
            ));
        }
    }

    let value = |det: usize, feat: usize| -> f64 {
        if transposed {
            data[feat * num_dets + det] as f64
        } else {
            data[det * num_feats + feat] as f64
        }
    };

    let mut dets = Vec::new();
    for i in 0..num_dets {
        let score = match filter.target_class {
            Some(class) => value(i, 4 + class),
            None => (0..num_classes)
                .map(|c| value(i, 4 + c))
                .fold(f64::NEG_INFINITY, f64::max),
        };
        if score < confidence {
            continue;
        }

        let cx = value(i, 0);
        let cy = value(i, 1);
        let w = value(i, 2);
        let h = value(i, 3);

        let (x1, y1) = letterbox.to_frame(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_frame(cx + w / 2.0, cy + h / 2.0);
        dets.push(RawDetection {
            x1,
            y1,
            x2,
            y2,
            confidence: score,
        });
    }
    Ok(dets)
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(dets: &mut [RawDetection], iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<RawDetection> = Vec::new();
    for det in dets.iter() {
        let overlaps = keep.iter().any(|k| {
            bbox_iou(
                &[k.x1, k.y1, k.x2, k.y2],
                &[det.x1, det.y1, det.x2, det.y2],
            ) > iou_thresh
        });
        if !overlaps {
            keep.push(det.clone());
        }
    }
    keep
}

fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}
