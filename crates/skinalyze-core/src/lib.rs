//! skinalyze-core — Skin condition detection engine.
//!
//! Runs one YOLO object detector per condition (pigmentation, dark spots,
//! acne) via ONNX Runtime and reduces each to a presence signal.

pub mod conditions;
pub mod detector;
pub mod types;

pub use conditions::{decode_image, ConditionDetector, ConditionModel, ModelPaths};
pub use detector::{DetectorError, DetectorOptions, YoloDetector};
pub use types::{BoundingBox, Condition};
