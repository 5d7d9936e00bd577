use serde::{Deserialize, Serialize};
use std::fmt;

/// Bounding box for one object detection, in source-image pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Index of the best-scoring class in the model's label set.
    pub class_id: usize,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection-over-Union with another box, in [0, 1].
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let inter_area = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union_area = self.area() + other.area() - inter_area;

        if union_area > 0.0 {
            inter_area / union_area
        } else {
            0.0
        }
    }
}

/// A visible skin condition. The vocabulary is closed: one detector per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    Pigmentation,
    #[serde(rename = "Dark Spots")]
    DarkSpots,
    Acne,
}

impl Condition {
    /// Canonical reporting order.
    pub const ALL: [Condition; 3] = [Condition::Pigmentation, Condition::DarkSpots, Condition::Acne];

    /// Display label, as shown to users and sent between stages.
    pub fn label(self) -> &'static str {
        match self {
            Condition::Pigmentation => "Pigmentation",
            Condition::DarkSpots => "Dark Spots",
            Condition::Acne => "Acne",
        }
    }

    /// Parse a display label. Matching is exact; anything else is unknown.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }

    /// File stem of this condition's detector artifact (e.g. `darkspot.onnx`).
    pub fn artifact_name(self) -> &'static str {
        match self {
            Condition::Pigmentation => "pigmentation",
            Condition::DarkSpots => "darkspot",
            Condition::Acne => "acne",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesion(x: f32, y: f32, size: f32) -> BoundingBox {
        BoundingBox { x, y, width: size, height: size, confidence: 0.6, class_id: 0 }
    }

    #[test]
    fn test_same_lesion_reported_twice() {
        let pimple = lesion(212.0, 340.0, 18.0);
        assert!((pimple.iou(&pimple.clone()) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_lesions_on_separate_cheeks() {
        let left = lesion(140.0, 360.0, 24.0);
        let right = lesion(480.0, 355.0, 24.0);
        assert_eq!(left.iou(&right), 0.0);
        assert_eq!(right.iou(&left), 0.0);
    }

    #[test]
    fn test_adjacent_acne_boxes_overlap() {
        // Shifted by half a width: overlap 15x30 = 450, union 900 + 900 - 450 = 1350.
        let a = lesion(120.0, 80.0, 30.0);
        let b = lesion(135.0, 80.0, 30.0);
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
        assert!(a.iou(&b) <= 0.7, "should survive default NMS");
    }

    #[test]
    fn test_box_inside_larger_patch() {
        // A dark spot nested in a pigmentation patch: iou = inner area / outer area.
        let patch = lesion(100.0, 100.0, 40.0);
        let spot = lesion(110.0, 110.0, 10.0);
        assert!((patch.iou(&spot) - 100.0 / 1600.0).abs() < 1e-6);
    }

    #[test]
    fn test_area_ignores_negative_extent() {
        let inverted = BoundingBox { width: -5.0, ..lesion(0.0, 0.0, 10.0) };
        assert_eq!(inverted.area(), 0.0);
    }

    #[test]
    fn test_iou_degenerate_boxes() {
        let point = lesion(50.0, 50.0, 0.0);
        assert_eq!(point.iou(&point), 0.0);
    }

    #[test]
    fn test_condition_labels() {
        assert_eq!(Condition::Pigmentation.label(), "Pigmentation");
        assert_eq!(Condition::DarkSpots.to_string(), "Dark Spots");
        assert_eq!(Condition::from_label("Acne"), Some(Condition::Acne));
        assert_eq!(Condition::from_label("Dark Spots"), Some(Condition::DarkSpots));
    }

    #[test]
    fn test_condition_unknown_labels() {
        assert_eq!(Condition::from_label("Rosacea"), None);
        assert_eq!(Condition::from_label("acne"), None);
        assert_eq!(Condition::from_label(""), None);
    }

    #[test]
    fn test_condition_serializes_as_label() {
        assert_eq!(serde_json::to_string(&Condition::DarkSpots).unwrap(), "\"Dark Spots\"");
        let back: Condition = serde_json::from_str("\"Pigmentation\"").unwrap();
        assert_eq!(back, Condition::Pigmentation);
    }

    #[test]
    fn test_artifact_names() {
        let names: Vec<_> = Condition::ALL.iter().map(|c| c.artifact_name()).collect();
        assert_eq!(names, vec!["pigmentation", "darkspot", "acne"]);
    }
}
