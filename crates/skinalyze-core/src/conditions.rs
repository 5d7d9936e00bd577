//! Condition detector: three independent presence detectors over one image.

use crate::detector::{DetectorError, DetectorOptions, YoloDetector};
use crate::types::{BoundingBox, Condition};
use image::RgbImage;
use std::path::{Path, PathBuf};

/// A single-condition object detector.
///
/// Implementations may keep runtime state between calls (ONNX sessions do),
/// hence `&mut self`.
pub trait ConditionModel {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError>;
}

impl ConditionModel for YoloDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError> {
        YoloDetector::detect(self, image)
    }
}

/// Decode an uploaded image (any format the `image` crate knows) to RGB.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, DetectorError> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// On-disk locations of the three detector artifacts.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub pigmentation: PathBuf,
    pub dark_spots: PathBuf,
    pub acne: PathBuf,
}

impl ModelPaths {
    /// Standard artifact names (`pigmentation.onnx`, `darkspot.onnx`, `acne.onnx`) under `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        let path = |c: Condition| dir.join(format!("{}.onnx", c.artifact_name()));
        Self {
            pigmentation: path(Condition::Pigmentation),
            dark_spots: path(Condition::DarkSpots),
            acne: path(Condition::Acne),
        }
    }

    pub fn get(&self, condition: Condition) -> &Path {
        match condition {
            Condition::Pigmentation => &self.pigmentation,
            Condition::DarkSpots => &self.dark_spots,
            Condition::Acne => &self.acne,
        }
    }
}

/// Owns one loaded model per condition. Models are read-only after load and
/// reusable across sequential requests.
pub struct ConditionDetector<M = YoloDetector> {
    pigmentation: M,
    dark_spots: M,
    acne: M,
}

impl ConditionDetector<YoloDetector> {
    /// Load all three YOLO models. Fails if any artifact is missing or unloadable.
    pub fn load(paths: &ModelPaths, options: DetectorOptions) -> Result<Self, DetectorError> {
        let pigmentation = YoloDetector::load(&paths.pigmentation, options)?;
        let dark_spots = YoloDetector::load(&paths.dark_spots, options)?;
        let acne = YoloDetector::load(&paths.acne, options)?;
        tracing::info!("condition detectors loaded");
        Ok(Self::new(pigmentation, dark_spots, acne))
    }
}

impl<M: ConditionModel> ConditionDetector<M> {
    pub fn new(pigmentation: M, dark_spots: M, acne: M) -> Self {
        Self {
            pigmentation,
            dark_spots,
            acne,
        }
    }

    fn model_mut(&mut self, condition: Condition) -> &mut M {
        match condition {
            Condition::Pigmentation => &mut self.pigmentation,
            Condition::DarkSpots => &mut self.dark_spots,
            Condition::Acne => &mut self.acne,
        }
    }

    /// Run every detector and report the conditions with at least one detection,
    /// in canonical order. The first detector error aborts the whole analysis.
    pub fn analyze(&mut self, image: &RgbImage) -> Result<Vec<Condition>, DetectorError> {
        let mut detected = Vec::with_capacity(Condition::ALL.len());

        for condition in Condition::ALL {
            let boxes = self.model_mut(condition).detect(image)?;
            tracing::debug!(%condition, detections = boxes.len(), "detector finished");
            if !boxes.is_empty() {
                detected.push(condition);
            }
        }

        tracing::info!(
            width = image.width(),
            height = image.height(),
            conditions = ?detected,
            "analysis complete"
        );
        Ok(detected)
    }

    /// Decode raw upload bytes, then [`analyze`](Self::analyze).
    pub fn analyze_bytes(&mut self, bytes: &[u8]) -> Result<Vec<Condition>, DetectorError> {
        let image = decode_image(bytes)?;
        self.analyze(&image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Returns a fixed number of boxes and counts how often it ran.
    struct FakeModel {
        detections: usize,
        fail: bool,
        calls: usize,
    }

    impl FakeModel {
        fn finding(detections: usize) -> Self {
            Self { detections, fail: false, calls: 0 }
        }

        fn failing() -> Self {
            Self { detections: 0, fail: true, calls: 0 }
        }
    }

    impl ConditionModel for FakeModel {
        fn detect(&mut self, _image: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError> {
            self.calls += 1;
            if self.fail {
                return Err(DetectorError::InferenceFailed("corrupt model".into()));
            }
            Ok((0..self.detections)
                .map(|i| BoundingBox {
                    x: i as f32,
                    y: 0.0,
                    width: 1.0,
                    height: 1.0,
                    confidence: 0.3,
                    class_id: 0,
                })
                .collect())
        }
    }

    fn blank_image() -> RgbImage {
        RgbImage::from_pixel(8, 8, image::Rgb([200, 160, 140]))
    }

    #[test]
    fn test_no_detections_yields_no_conditions() {
        let mut detector = ConditionDetector::new(
            FakeModel::finding(0),
            FakeModel::finding(0),
            FakeModel::finding(0),
        );
        assert!(detector.analyze(&blank_image()).unwrap().is_empty());
    }

    #[test]
    fn test_all_conditions_in_canonical_order() {
        let mut detector = ConditionDetector::new(
            FakeModel::finding(1),
            FakeModel::finding(4),
            FakeModel::finding(2),
        );
        let conditions = detector.analyze(&blank_image()).unwrap();
        assert_eq!(
            conditions,
            vec![Condition::Pigmentation, Condition::DarkSpots, Condition::Acne]
        );
    }

    #[test]
    fn test_presence_ignores_detection_count() {
        let mut detector = ConditionDetector::new(
            FakeModel::finding(0),
            FakeModel::finding(0),
            FakeModel::finding(17),
        );
        assert_eq!(detector.analyze(&blank_image()).unwrap(), vec![Condition::Acne]);
    }

    #[test]
    fn test_every_detector_runs() {
        let mut detector = ConditionDetector::new(
            FakeModel::finding(0),
            FakeModel::finding(1),
            FakeModel::finding(0),
        );
        detector.analyze(&blank_image()).unwrap();
        detector.analyze(&blank_image()).unwrap();
        assert_eq!(detector.pigmentation.calls, 2);
        assert_eq!(detector.dark_spots.calls, 2);
        assert_eq!(detector.acne.calls, 2);
    }

    #[test]
    fn test_detector_error_propagates() {
        let mut detector = ConditionDetector::new(
            FakeModel::finding(1),
            FakeModel::failing(),
            FakeModel::finding(1),
        );
        let err = detector.analyze(&blank_image()).unwrap_err();
        assert!(matches!(err, DetectorError::InferenceFailed(_)));
    }

    #[test]
    fn test_analyze_bytes_rejects_non_image() {
        let mut detector = ConditionDetector::new(
            FakeModel::finding(1),
            FakeModel::finding(1),
            FakeModel::finding(1),
        );
        let err = detector.analyze_bytes(b"definitely not a jpeg").unwrap_err();
        assert!(matches!(err, DetectorError::Decode(_)));
        assert_eq!(detector.pigmentation.calls, 0);
    }

    #[test]
    fn test_decode_image_png_to_rgb() {
        let gray = image::GrayImage::from_pixel(12, 7, image::Luma([90]));
        let mut png = Vec::new();
        image::DynamicImage::ImageLuma8(gray)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let rgb = decode_image(&png).unwrap();
        assert_eq!(rgb.dimensions(), (12, 7));
        assert_eq!(rgb.get_pixel(3, 3).0, [90, 90, 90]);
    }

    #[test]
    fn test_model_paths_in_dir() {
        let paths = ModelPaths::in_dir(Path::new("/opt/models"));
        assert_eq!(paths.get(Condition::Pigmentation), Path::new("/opt/models/pigmentation.onnx"));
        assert_eq!(paths.get(Condition::DarkSpots), Path::new("/opt/models/darkspot.onnx"));
        assert_eq!(paths.get(Condition::Acne), Path::new("/opt/models/acne.onnx"));
    }
}
