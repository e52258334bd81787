/// Class id of "person" in the MobileNet-SSD (VOC) label map.
pub const PERSON_CLASS_ID: u32 = 15;

/// Confidence a person detection must strictly exceed by default.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

/// One detected region.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Bounding box in normalized 0..1 coordinates (top-left, bottom-right).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Scale to pixel coordinates for a `width` x `height` frame.
    pub fn to_pixels(&self, width: u32, height: u32) -> (i32, i32, i32, i32) {
        let w = width as f32;
        let h = height as f32;
        (
            (self.x1 * w) as i32,
            (self.y1 * h) as i32,
            (self.x2 * w) as i32,
            (self.y2 * h) as i32,
        )
    }
}

/// Reduces per-region detections to a single "person present" flag.
///
/// A frame counts as positive iff some detection has `class_id == person_class`
/// and `confidence > min_confidence`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PersonFilter {
    pub person_class: u32,
    pub min_confidence: f32,
}

impl PersonFilter {
    pub fn new(person_class: u32, min_confidence: f32) -> Self {
        Self {
            person_class,
            min_confidence,
        }
    }

    pub fn matches(&self, detection: &Detection) -> bool {
        detection.class_id == self.person_class && detection.confidence > self.min_confidence
    }

    /// Detections that count as a person, in detector order.
    pub fn matching<'a>(
        &'a self,
        detections: &'a [Detection],
    ) -> impl Iterator<Item = &'a Detection> + 'a {
        detections.iter().filter(move |d| self.matches(d))
    }

    pub fn person_detected(&self, detections: &[Detection]) -> bool {
        self.matching(detections).next().is_some()
    }
}

impl Default for PersonFilter {
    fn default() -> Self {
        Self::new(PERSON_CLASS_ID, DEFAULT_MIN_CONFIDENCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class_id: u32, confidence: f32) -> Detection {
        Detection {
            class_id,
            confidence,
            bbox: BoundingBox::new(0.1, 0.1, 0.5, 0.9),
        }
    }

    #[test]
    fn filter_requires_person_class_and_strict_threshold() {
        let filter = PersonFilter::default();
        assert!(!filter.person_detected(&[]));
        assert!(!filter.person_detected(&[det(PERSON_CLASS_ID, 0.5)]));
        assert!(!filter.person_detected(&[det(7, 0.99)]));
        assert!(filter.person_detected(&[det(7, 0.99), det(PERSON_CLASS_ID, 0.51)]));
    }

    #[test]
    fn filter_honours_custom_policy() {
        let filter = PersonFilter::new(1, 0.8);
        assert!(!filter.person_detected(&[det(1, 0.7)]));
        assert!(filter.person_detected(&[det(1, 0.81)]));
    }

    #[test]
    fn matching_keeps_only_people_above_threshold() {
        let filter = PersonFilter::default();
        let detections = [det(PERSON_CLASS_ID, 0.9), det(3, 0.9), det(PERSON_CLASS_ID, 0.2)];
        let matched: Vec<&Detection> = filter.matching(&detections).collect();
        assert_eq!(matched, vec![&detections[0]]);
    }

    #[test]
    fn bbox_scales_to_pixels() {
        let bbox = BoundingBox::new(0.25, 0.5, 0.75, 1.0);
        assert_eq!(bbox.to_pixels(640, 480), (160, 240, 480, 480));
    }
}
