use image::imageops::{self, FilterType};
use image::RgbImage;
use ort::session::Session;
use ort::value::Tensor;

use crate::landmarks::{BoundingBox, FaceLandmarker, LandmarkSet, Point, LANDMARK_COUNT};
use crate::models::ModelAsset;

/// Detector input (UltraFace RFB-320 layout).
const DETECTOR_WIDTH: u32 = 320;
const DETECTOR_HEIGHT: u32 = 240;
/// Landmark net input (square crop).
const LANDMARK_SIZE: u32 = 112;
const NMS_IOU: f32 = 0.3;
/// Grow the detector box before cropping so the jaw line fits.
const CROP_SCALE: f32 = 1.2;

/// Two-stage face landmarker: box detector, then a 68-point regressor per face.
pub struct OnnxLandmarker {
    detector: Session,
    landmarker: Session,
    score_threshold: f32,
    max_faces: usize,
}

impl OnnxLandmarker {
    /// Build sessions from fetched assets: detector first, landmark net second.
    pub fn from_assets(
        assets: &[ModelAsset],
        score_threshold: f32,
        max_faces: usize,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let [detector, landmarker] = assets else {
            return Err(format!("Expected 2 models, got {}", assets.len()).into());
        };
        Ok(Self {
            detector: build_session(detector)?,
            landmarker: build_session(landmarker)?,
            score_threshold,
            max_faces: max_faces.max(1),
        })
    }

    fn detect_boxes(
        &mut self,
        frame: &RgbImage,
    ) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error + Send + Sync>> {
        let resized = imageops::resize(frame, DETECTOR_WIDTH, DETECTOR_HEIGHT, FilterType::Triangle);
        let input = to_nchw(&resized, |v| (v - 127.0) / 128.0)?;

        let outputs = self
            .detector
            .run(ort::inputs![input])
            .map_err(|e| format!("Face detector inference failed: {e}"))?;
        let values: Vec<_> = outputs.iter().map(|(_, v)| v).collect();
        if values.len() < 2 {
            return Err("Face detector must output scores and boxes".into());
        }
        let (_, scores) = values[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| format!("Reading detector scores: {e}"))?;
        let (_, boxes) = values[1]
            .try_extract_tensor::<f32>()
            .map_err(|e| format!("Reading detector boxes: {e}"))?;

        let candidates = decode_boxes(
            scores,
            boxes,
            self.score_threshold,
            frame.width() as f32,
            frame.height() as f32,
        );
        Ok(non_max_suppression(candidates, NMS_IOU, self.max_faces))
    }

    fn landmarks_for(
        &mut self,
        frame: &RgbImage,
        bbox: BoundingBox,
    ) -> Result<LandmarkSet, Box<dyn std::error::Error + Send + Sync>> {
        let (cx, cy, cw, ch) = crop_square(bbox, frame.width(), frame.height());
        let crop = imageops::crop_imm(frame, cx, cy, cw, ch).to_image();
        let resized = imageops::resize(&crop, LANDMARK_SIZE, LANDMARK_SIZE, FilterType::Triangle);
        let input = to_nchw(&resized, |v| v / 255.0)?;

        let outputs = self
            .landmarker
            .run(ort::inputs![input])
            .map_err(|e| format!("Landmark inference failed: {e}"))?;
        let (_, first) = outputs
            .iter()
            .next()
            .ok_or("Landmark net produced no outputs")?;
        let (_, data) = first
            .try_extract_tensor::<f32>()
            .map_err(|e| format!("Reading landmarks: {e}"))?;
        if data.len() < LANDMARK_COUNT * 2 {
            return Err(format!("Landmark output has {} values", data.len()).into());
        }

        let points = data[..LANDMARK_COUNT * 2]
            .chunks_exact(2)
            .map(|xy| Point::new(cx as f32 + xy[0] * cw as f32, cy as f32 + xy[1] * ch as f32))
            .collect();
        Ok(LandmarkSet::new(points, bbox))
    }
}

impl FaceLandmarker for OnnxLandmarker {
    fn detect(
        &mut self,
        frame: &RgbImage,
    ) -> Result<Vec<LandmarkSet>, Box<dyn std::error::Error + Send + Sync>> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(Vec::new());
        }
        let boxes = self.detect_boxes(frame)?;
        boxes
            .into_iter()
            .map(|bbox| self.landmarks_for(frame, bbox))
            .collect()
    }
}

fn build_session(asset: &ModelAsset) -> Result<Session, Box<dyn std::error::Error + Send + Sync>> {
    let session = Session::builder()
        .map_err(|e| format!("Creating ONNX session builder: {e}"))?
        .commit_from_memory(&asset.bytes)
        .map_err(|e| format!("Loading model {}: {e}", asset.uri))?;
    log::info!("Model session ready: {}", asset.uri);
    Ok(session)
}

/// Packed RGB to a `[1, 3, H, W]` float tensor.
fn to_nchw(
    image: &RgbImage,
    normalize: impl Fn(f32) -> f32,
) -> Result<ort::value::DynValue, Box<dyn std::error::Error + Send + Sync>> {
    let (w, h) = image.dimensions();
    let size = (w * h) as usize;
    let raw = image.as_raw();
    let mut data = vec![0f32; 3 * size];
    for idx in 0..size {
        data[idx] = normalize(raw[idx * 3] as f32);
        data[size + idx] = normalize(raw[idx * 3 + 1] as f32);
        data[2 * size + idx] = normalize(raw[idx * 3 + 2] as f32);
    }
    let shape = [1usize, 3, h as usize, w as usize];
    Ok(Tensor::from_array((shape, data.into_boxed_slice()))
        .map_err(|e| format!("Creating input tensor: {e}"))?
        .into_dyn())
}

/// Scores are `[N, 2]` (background, face); boxes are `[N, 4]` normalised corners.
fn decode_boxes(
    scores: &[f32],
    boxes: &[f32],
    threshold: f32,
    frame_w: f32,
    frame_h: f32,
) -> Vec<BoundingBox> {
    scores
        .chunks_exact(2)
        .zip(boxes.chunks_exact(4))
        .filter(|(s, _)| s[1] > threshold)
        .map(|(s, b)| {
            let x1 = b[0].clamp(0.0, 1.0) * frame_w;
            let y1 = b[1].clamp(0.0, 1.0) * frame_h;
            let x2 = b[2].clamp(0.0, 1.0) * frame_w;
            let y2 = b[3].clamp(0.0, 1.0) * frame_h;
            BoundingBox {
                x: x1,
                y: y1,
                width: (x2 - x1).max(0.0),
                height: (y2 - y1).max(0.0),
                score: s[1],
            }
        })
        .collect()
}

/// Greedy NMS, highest score first.
fn non_max_suppression(mut candidates: Vec<BoundingBox>, iou: f32, limit: usize) -> Vec<BoundingBox> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<BoundingBox> = Vec::new();
    for candidate in candidates {
        if kept.len() == limit {
            break;
        }
        if kept.iter().all(|k| k.iou(&candidate) <= iou) {
            kept.push(candidate);
        }
    }
    kept
}

/// Square crop around the box centre, clamped to the frame. Never empty.
fn crop_square(bbox: BoundingBox, frame_w: u32, frame_h: u32) -> (u32, u32, u32, u32) {
    let side = bbox.width.max(bbox.height) * CROP_SCALE;
    let cx = bbox.x + bbox.width / 2.0;
    let cy = bbox.y + bbox.height / 2.0;
    let x = (cx - side / 2.0).max(0.0) as u32;
    let y = (cy - side / 2.0).max(0.0) as u32;
    let x = x.min(frame_w.saturating_sub(1));
    let y = y.min(frame_h.saturating_sub(1));
    let w = (side as u32).clamp(1, frame_w - x);
    let h = (side as u32).clamp(1, frame_h - y);
    (x, y, w, h)
}
