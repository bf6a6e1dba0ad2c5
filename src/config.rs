use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Which perception loop is active. The two are mutually exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Live facial landmark overlay.
    Annotate,
    /// Periodic frame sampling against the remote recognizer.
    #[default]
    Recognize,
}

/// Where frames come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// File that an external capture process keeps overwriting with the latest frame.
    pub frame_path: PathBuf,
}

impl Default for CameraConfig {
    fn default() -> Self {
        let mut p = std::env::temp_dir();
        p.push("sign-practice");
        p.push("frame.jpg");
        Self { frame_path: p }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Face detector first, landmark net second.
    pub model_uris: Vec<String>,
    pub refresh_interval_ms: u64,
    pub score_threshold: f32,
    pub max_faces: usize,
    /// Rendered size of the host surface; the native frame size when unset.
    pub display_width: Option<u32>,
    pub display_height: Option<u32>,
    /// Overlay PNG written after every paint, if set.
    pub overlay_path: Option<PathBuf>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        let dir = models_dir();
        Self {
            model_uris: vec![
                dir.join("face_detector.onnx").display().to_string(),
                dir.join("face_landmark68.onnx").display().to_string(),
            ],
            refresh_interval_ms: 16,
            score_threshold: 0.5,
            max_faces: 1,
            display_width: None,
            display_height: None,
            overlay_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub base_url: String,
    pub sample_interval_ms: u64,
    pub health_interval_ms: u64,
    pub request_timeout_ms: u64,
    /// JPEG quality in percent (80 = 0.8).
    pub jpeg_quality: u8,
    /// Predictions at or below this confidence are ignored.
    pub acceptance_threshold: f32,
    /// Number of accepted labels kept in the transcript.
    pub transcript_len: usize,
    /// Label the recognizer uses for "no sign".
    pub none_label: String,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            sample_interval_ms: 1000,
            health_interval_ms: 5000,
            request_timeout_ms: 5000,
            jpeg_quality: 80,
            acceptance_threshold: 0.7,
            transcript_len: 3,
            none_label: "none".into(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mode: Mode,
    pub camera: CameraConfig,
    pub detection: DetectionConfig,
    pub recognizer: RecognizerConfig,
}

/// Directory for model storage: ~/.local/share/sign-practice/models/
fn models_dir() -> PathBuf {
    let mut p = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    p.push("sign-practice");
    p.push("models");
    p
}

impl Config {
    /// Directory: ~/.config/sign-practice/
    fn dir() -> PathBuf {
        let mut p = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push("sign-practice");
        p
    }

    pub fn default_path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from `path`, returning defaults if the file doesn't exist or is invalid.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("Invalid config at {}: {e}; using defaults", path.display());
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Persist to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }
}
