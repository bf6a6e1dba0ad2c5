use crate::annotation::{annotate, DrawCommand, OverlaySurface};
use crate::landmarks::{DisplaySize, FaceLandmarker, LandmarkSet};
use crate::media::MediaSource;
use crate::models::ModelRuntime;

/// Where the per-frame loop currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    WaitingForReadiness,
    WaitingForVideoFrame,
    Detecting,
}

/// Result of one cycle; the caller schedules the next cycle whatever it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    NotReady,
    NoFrame,
    Rendered { faces: usize },
    Failed,
}

/// Capture -> detect -> annotate, one bounded step per display refresh.
#[derive(Debug)]
pub struct DetectionPipeline {
    state: PipelineState,
    frames: u64,
}

impl Default for DetectionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionPipeline {
    pub fn new() -> Self {
        Self {
            state: PipelineState::WaitingForReadiness,
            frames: 0,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn reset(&mut self) {
        self.state = PipelineState::WaitingForReadiness;
    }

    /// Run one cycle. `landmarker` is only consulted when the runtime is Ready.
    pub fn tick(
        &mut self,
        runtime: &ModelRuntime,
        landmarker: Option<&mut dyn FaceLandmarker>,
        media: &mut dyn MediaSource,
        overlay: &mut dyn OverlaySurface,
    ) -> TickOutcome {
        let landmarker = match landmarker {
            Some(l) if runtime.is_ready() => l,
            _ => {
                self.state = PipelineState::WaitingForReadiness;
                return TickOutcome::NotReady;
            }
        };
        if !media.frame_ready() {
            self.state = PipelineState::WaitingForVideoFrame;
            return TickOutcome::NoFrame;
        }
        // A frame that exists but doesn't decode yet (mid-write) is not a frame.
        let frame = match media.snapshot() {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("Frame not decodable yet: {e}");
                self.state = PipelineState::WaitingForVideoFrame;
                return TickOutcome::NoFrame;
            }
        };
        self.state = PipelineState::Detecting;
        let native = DisplaySize::of(&frame);
        let display = overlay.size().unwrap_or(native);

        let faces = match landmarker.detect(&frame) {
            Ok(faces) => faces,
            Err(e) => {
                log::warn!("Detection failed: {e}");
                if let Err(e) = overlay.paint(&[DrawCommand::Clear(display)]) {
                    log::warn!("Overlay paint failed: {e}");
                }
                return TickOutcome::Failed;
            }
        };

        let resized: Vec<LandmarkSet> = faces.iter().map(|f| f.rescale(native, display)).collect();
        if let Err(e) = overlay.paint(&annotate(&resized, display)) {
            log::warn!("Overlay paint failed: {e}");
            return TickOutcome::Failed;
        }
        self.frames += 1;
        log::debug!("Frame {}: {} face(s)", self.frames, resized.len());
        for face in &resized {
            let bbox = face.bbox();
            log::trace!(
                "Face score {:.2} at ({:.0}, {:.0}) {:.0}x{:.0}, {} points",
                bbox.score,
                bbox.x,
                bbox.y,
                bbox.width,
                bbox.height,
                face.len()
            );
        }
        TickOutcome::Rendered {
            faces: resized.len(),
        }
    }
}
