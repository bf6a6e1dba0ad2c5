use std::ops::Range;

use image::RgbImage;

/// Points per face produced by the 68-point landmark model.
pub const LANDMARK_COUNT: usize = 68;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

impl DisplaySize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of(image: &RgbImage) -> Self {
        Self::new(image.width(), image.height())
    }
}

/// Face bounding box in pixels, with the detector score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub score: f32,
}

impl BoundingBox {
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = (self.x + self.width).min(other.x + other.width);
        let iy2 = (self.y + self.height).min(other.y + other.height);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.width * self.height + other.width * other.height - inter)
    }
}

/// Landmarks of one detected face. Built once per detection cycle, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Point>,
    bbox: BoundingBox,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point>, bbox: BoundingBox) -> Self {
        Self { points, bbox }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn point(&self, index: usize) -> Option<Point> {
        self.points.get(index).copied()
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points of `region`, or `None` if this set is too short to contain it.
    pub fn region(&self, region: Region) -> Option<&[Point]> {
        self.points.get(region.indices())
    }

    /// Map from the frame's native size to the rendered display size, per axis.
    pub fn rescale(&self, from: DisplaySize, to: DisplaySize) -> LandmarkSet {
        if from.width == 0 || from.height == 0 {
            return self.clone();
        }
        let sx = to.width as f32 / from.width as f32;
        let sy = to.height as f32 / from.height as f32;
        LandmarkSet {
            points: self
                .points
                .iter()
                .map(|p| Point::new(p.x * sx, p.y * sy))
                .collect(),
            bbox: BoundingBox {
                x: self.bbox.x * sx,
                y: self.bbox.y * sy,
                width: self.bbox.width * sx,
                height: self.bbox.height * sy,
                score: self.bbox.score,
            },
        }
    }
}

/// Named landmark index ranges of the 68-point layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    LeftEye,
    RightEye,
    Nose,
    Mouth,
}

impl Region {
    pub const ALL: [Region; 4] = [Region::LeftEye, Region::RightEye, Region::Nose, Region::Mouth];

    pub fn indices(self) -> Range<usize> {
        match self {
            Region::LeftEye => 36..42,
            Region::RightEye => 42..48,
            Region::Nose => 27..36,
            Region::Mouth => 48..60,
        }
    }
}

/// Symmetry guide: inner eye corner, nose tip, inner eye corner.
pub const EYE_NOSE_GUIDE: [usize; 3] = [39, 30, 42];
/// Symmetry guide: nose tip to upper lip centre.
pub const NOSE_LIP_GUIDE: [usize; 2] = [30, 51];

/// Face detection plus landmark extraction on one frame.
///
/// Results are in the frame's own pixel coordinates.
pub trait FaceLandmarker {
    fn detect(
        &mut self,
        frame: &RgbImage,
    ) -> Result<Vec<LandmarkSet>, Box<dyn std::error::Error + Send + Sync>>;
}

#[cfg(test)]
pub(crate) fn synthetic_face(offset: f32) -> LandmarkSet {
    let points = (0..LANDMARK_COUNT)
        .map(|i| Point::new(offset + i as f32, offset + (i % 10) as f32))
        .collect();
    LandmarkSet::new(
        points,
        BoundingBox {
            x: offset,
            y: offset,
            width: 80.0,
            height: 80.0,
            score: 0.9,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_table() {
        assert_eq!(Region::LeftEye.indices().len(), 6);
        assert_eq!(Region::RightEye.indices().len(), 6);
        assert_eq!(Region::Nose.indices().len(), 9);
        assert_eq!(Region::Mouth.indices().len(), 12);
        assert!(Region::ALL.iter().all(|r| r.indices().end <= LANDMARK_COUNT));
    }

    #[test]
    fn test_region_on_short_set_is_none() {
        let short = LandmarkSet::new(
            vec![Point::new(0.0, 0.0); 40],
            BoundingBox { x: 0.0, y: 0.0, width: 1.0, height: 1.0, score: 1.0 },
        );
        assert!(short.region(Region::LeftEye).is_none());
        assert!(short.region(Region::Mouth).is_none());
    }

    #[test]
    fn test_rescale_per_axis() {
        let face = LandmarkSet::new(
            vec![Point::new(320.0, 120.0)],
            BoundingBox { x: 100.0, y: 60.0, width: 200.0, height: 120.0, score: 0.8 },
        );
        let scaled = face.rescale(DisplaySize::new(640, 480), DisplaySize::new(1280, 720));

        assert_eq!(scaled.point(0), Some(Point::new(640.0, 180.0)));
        let bbox = scaled.bbox();
        assert_eq!((bbox.x, bbox.y, bbox.width, bbox.height), (200.0, 90.0, 400.0, 180.0));
        assert_eq!(scaled.len(), face.len());
    }

    #[test]
    fn test_iou() {
        let a = BoundingBox { x: 0.0, y: 0.0, width: 10.0, height: 10.0, score: 1.0 };
        let b = BoundingBox { x: 5.0, y: 0.0, width: 10.0, height: 10.0, score: 1.0 };
        let far = BoundingBox { x: 50.0, y: 50.0, width: 10.0, height: 10.0, score: 1.0 };
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
        assert_eq!(a.iou(&far), 0.0);
    }
}
