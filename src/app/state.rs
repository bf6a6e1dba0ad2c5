use std::time::Duration;

use tokio::task::JoinHandle;

use crate::annotation::{OverlaySurface, RasterOverlay};
use crate::config::{Config, Mode};
use crate::detection::DetectionPipeline;
use crate::health::HealthMonitor;
use crate::landmarks::{DisplaySize, FaceLandmarker};
use crate::media::{FrameFileSource, MediaSource};
use crate::models::ModelRuntime;
use crate::recognizer::{RawPrediction, RecognizerClient};
use crate::stabilizer::ResultStabilizer;

/// Events delivered to the loop thread, from controls and from background tasks.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    StartCapture,
    StopCapture,
    ToggleCapture,
    ClearTranscript,
    SwitchMode(Mode),
    Quit,
    PredictionReceived(RawPrediction),
    RecognitionFailed(String),
    HealthChecked(bool),
}

/// What the active mode is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppStatus {
    Idle,
    Annotating,
    Capturing,
}

/// Central application state. Lives on the loop thread inside Rc<RefCell<>>.
pub struct AppState {
    pub status: AppStatus,
    pub mode: Option<Mode>,
    pub config: Config,
    pub http: reqwest::Client,
    pub event_sender: async_channel::Sender<AppEvent>,
    pub media: Box<dyn MediaSource>,

    // Annotation
    pub runtime: ModelRuntime,
    pub landmarker: Option<Box<dyn FaceLandmarker>>,
    pub pipeline: DetectionPipeline,
    pub overlay: Box<dyn OverlaySurface>,
    pub frame_task: Option<JoinHandle<()>>,

    // Recognition
    pub recognizer: RecognizerClient,
    pub stabilizer: ResultStabilizer,
    pub health: HealthMonitor,
    pub sample_task: Option<JoinHandle<()>>,
    pub health_task: Option<JoinHandle<()>>,
    pub on_recognized: Box<dyn FnMut(&str)>,
}

impl AppState {
    pub fn new(
        config: Config,
        sender: async_channel::Sender<AppEvent>,
        on_recognized: Box<dyn FnMut(&str)>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let media = Box::new(FrameFileSource::new(config.camera.frame_path.clone()));
        let display = match (config.detection.display_width, config.detection.display_height) {
            (Some(w), Some(h)) => Some(DisplaySize::new(w, h)),
            _ => None,
        };
        let overlay = Box::new(RasterOverlay::new(
            display,
            config.detection.overlay_path.clone(),
        ));
        Self::with_parts(config, sender, media, overlay, on_recognized)
    }

    /// Assemble with explicit camera and overlay collaborators.
    pub fn with_parts(
        config: Config,
        sender: async_channel::Sender<AppEvent>,
        media: Box<dyn MediaSource>,
        overlay: Box<dyn OverlaySurface>,
        on_recognized: Box<dyn FnMut(&str)>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let rc = &config.recognizer;
        let recognizer = RecognizerClient::new(
            &rc.base_url,
            Duration::from_millis(rc.request_timeout_ms),
        )?;
        let stabilizer =
            ResultStabilizer::new(rc.transcript_len, rc.acceptance_threshold, &rc.none_label);
        let runtime = ModelRuntime::new(config.detection.model_uris.clone());

        Ok(Self {
            status: AppStatus::Idle,
            mode: None,
            http: reqwest::Client::new(),
            event_sender: sender,
            media,
            runtime,
            landmarker: None,
            pipeline: DetectionPipeline::new(),
            overlay,
            frame_task: None,
            recognizer,
            stabilizer,
            health: HealthMonitor::new(),
            sample_task: None,
            health_task: None,
            on_recognized,
            config,
        })
    }
}

/// Helper to update status and show the user-facing status line.
pub fn update_status(
    state: &std::rc::Rc<std::cell::RefCell<AppState>>,
    status: AppStatus,
    label_text: &str,
) {
    state.borrow_mut().status = status;
    show_status(label_text);
}

/// Status line on stderr; stdout carries only recognized text.
pub fn show_status(label_text: &str) {
    eprintln!("[status] {label_text}");
}
