//! YOLO object detector via ONNX Runtime.
//!
//! Runs an Ultralytics YOLOv8 export (`[1, 4 + classes, anchors]` output) with
//! letterbox preprocessing, confidence filtering and class-agnostic NMS.

use crate::types::BoundingBox;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (no magic numbers) ---
const YOLO_INPUT_SIZE: u32 = 640;
const YOLO_PAD_VALUE: u8 = 114;
const YOLO_BOX_FIELDS: usize = 4;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.7;
const DEFAULT_INTRA_THREADS: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — run `skinalyze fetch-models` or set SKINALYZE_MODEL_DIR")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Post-processing and runtime knobs shared by all detectors.
#[derive(Debug, Clone, Copy)]
pub struct DetectorOptions {
    /// Candidates scoring at or below this are dropped before NMS.
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub intra_threads: usize,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            intra_threads: DEFAULT_INTRA_THREADS,
        }
    }
}

/// Metadata for coordinate de-mapping after letterbox resize.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    new_w: u32,
    new_h: u32,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    /// Fit a `width` x `height` image inside a `size` x `size` square, centered.
    fn fit(width: u32, height: u32, size: u32) -> Self {
        let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
        let new_w = ((width as f32 * scale).round() as u32).clamp(1, size);
        let new_h = ((height as f32 * scale).round() as u32).clamp(1, size);
        Self {
            scale,
            new_w,
            new_h,
            pad_x: (size - new_w) / 2,
            pad_y: (size - new_h) / 2,
        }
    }

    /// Map a box from letterboxed space back into the source image, clipped to its bounds.
    fn unmap(&self, b: &BoundingBox, width: u32, height: u32) -> BoundingBox {
        let to_src_x = |v: f32| ((v - self.pad_x as f32) / self.scale).clamp(0.0, width as f32);
        let to_src_y = |v: f32| ((v - self.pad_y as f32) / self.scale).clamp(0.0, height as f32);

        let x1 = to_src_x(b.x);
        let y1 = to_src_y(b.y);
        let x2 = to_src_x(b.x + b.width);
        let y2 = to_src_y(b.y + b.height);

        BoundingBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: b.confidence,
            class_id: b.class_id,
        }
    }
}

/// Memory layout of the raw detection tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OutputLayout {
    /// Values per anchor: 4 box coordinates + one score per class.
    fields: usize,
    anchors: usize,
    /// `true` for `[1, fields, anchors]` (YOLOv8 default export).
    fields_first: bool,
}

impl OutputLayout {
    fn from_shape(shape: &[i64]) -> Result<Self, DetectorError> {
        let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        let (a, b) = match dims.as_slice() {
            [1, a, b] | [a, b] => (*a, *b),
            _ => {
                return Err(DetectorError::InferenceFailed(format!(
                    "unexpected YOLO output shape {shape:?}"
                )))
            }
        };

        // Anchors always outnumber per-anchor fields, whichever way round the export is.
        let (fields, anchors, fields_first) = if a <= b { (a, b, true) } else { (b, a, false) };
        if fields <= YOLO_BOX_FIELDS {
            return Err(DetectorError::InferenceFailed(format!(
                "YOLO output {shape:?} carries no class scores"
            )));
        }

        Ok(Self { fields, anchors, fields_first })
    }

    fn value(&self, data: &[f32], anchor: usize, field: usize) -> f32 {
        let idx = if self.fields_first {
            field * self.anchors + anchor
        } else {
            anchor * self.fields + field
        };
        data.get(idx).copied().unwrap_or(0.0)
    }
}

/// YOLO-based detector for a single skin condition.
pub struct YoloDetector {
    session: Session,
    options: DetectorOptions,
}

impl YoloDetector {
    /// Load a YOLO ONNX model from the given path.
    pub fn load(model_path: &Path, options: DetectorOptions) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(options.intra_threads)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded YOLO model"
        );

        Ok(Self { session, options })
    }

    /// Detect objects in an RGB image, returning boxes in source coordinates
    /// sorted by confidence.
    pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DetectorError::InferenceFailed("image has zero area".into()));
        }

        let options = self.options;
        let (input, letterbox) = preprocess(image);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("detection tensor: {e}")))?;
        let dims: Vec<i64> = shape.iter().copied().collect();
        let layout = OutputLayout::from_shape(&dims)?;

        let candidates = decode_output(data, layout, options.confidence_threshold);
        let candidate_count = candidates.len();
        let result: Vec<BoundingBox> = nms(candidates, options.iou_threshold)
            .iter()
            .map(|b| letterbox.unmap(b, width, height))
            .collect();

        tracing::debug!(
            candidates = candidate_count,
            kept = result.len(),
            "YOLO post-processing done"
        );

        Ok(result)
    }
}

/// Letterbox an RGB image into a NCHW float tensor scaled to [0, 1].
fn preprocess(image: &RgbImage) -> (Array4<f32>, Letterbox) {
    let size = YOLO_INPUT_SIZE as usize;
    let letterbox = Letterbox::fit(image.width(), image.height(), YOLO_INPUT_SIZE);
    let resized = imageops::resize(image, letterbox.new_w, letterbox.new_h, FilterType::Triangle);

    let pad = YOLO_PAD_VALUE as f32 / 255.0;
    let mut tensor = Array4::<f32>::from_elem((1, 3, size, size), pad);

    let ox = letterbox.pad_x as usize;
    let oy = letterbox.pad_y as usize;
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (tx, ty) = (ox + x as usize, oy + y as usize);
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = pixel[c] as f32 / 255.0;
        }
    }

    (tensor, letterbox)
}

/// Decode raw anchors into candidate boxes (letterboxed coordinates).
fn decode_output(data: &[f32], layout: OutputLayout, threshold: f32) -> Vec<BoundingBox> {
    let mut detections = Vec::new();

    for anchor in 0..layout.anchors {
        let (class_id, score) = (YOLO_BOX_FIELDS..layout.fields)
            .map(|field| (field - YOLO_BOX_FIELDS, layout.value(data, anchor, field)))
            .fold((0, f32::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });

        if score <= threshold {
            continue;
        }

        let cx = layout.value(data, anchor, 0);
        let cy = layout.value(data, anchor, 1);
        let w = layout.value(data, anchor, 2);
        let h = layout.value(data, anchor, 3);

        detections.push(BoundingBox {
            x: cx - w / 2.0,
            y: cy - h / 2.0,
            width: w,
            height: h,
            confidence: score,
            class_id,
        });
    }

    detections
}

/// Non-Maximum Suppression: keep the most confident of each overlapping group.
fn nms(mut detections: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<BoundingBox> = Vec::new();
    for candidate in detections {
        if keep.iter().all(|kept| kept.iou(&candidate) <= iou_threshold) {
            keep.push(candidate);
        }
    }

    keep
}
