use std::io::Cursor;
use std::time::Duration;

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// One recognizer answer for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrediction {
    pub label: String,
    pub confidence: f32,
}

impl RawPrediction {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Recognizer request/response types
#[derive(Serialize)]
struct PredictRequest<'a> {
    image: &'a str,
}

#[derive(Deserialize)]
struct PredictResponse {
    prediction: Option<String>,
    confidence: Option<f32>,
    error: Option<String>,
}

impl PredictResponse {
    fn into_prediction(self) -> Result<RawPrediction, Box<dyn std::error::Error + Send + Sync>> {
        if let Some(err) = self.error {
            return Err(format!("Recognizer error: {err}").into());
        }
        match (self.prediction, self.confidence) {
            (Some(label), Some(confidence)) => Ok(RawPrediction { label, confidence }),
            _ => Err("Recognizer response missing prediction or confidence".into()),
        }
    }
}

/// HTTP client for the external sign recognizer. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RecognizerClient {
    http: reqwest::Client,
    base_url: String,
}

impl RecognizerClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST one base64 JPEG to `/predict`.
    pub async fn predict(
        &self,
        image_b64: &str,
    ) -> Result<RawPrediction, Box<dyn std::error::Error + Send + Sync>> {
        let url = format!("{}/predict", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&PredictRequest { image: image_b64 })
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(format!("Recognizer returned {status}: {text}").into());
        }

        let body: PredictResponse = resp.json().await?;
        body.into_prediction()
    }

    /// GET `/health`. Any failure counts as unreachable.
    pub async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.http.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                log::debug!("Health check failed: {e}");
                false
            }
        }
    }
}

/// Encode a frame as JPEG and return bare base64 (no data-URI prefix).
pub fn encode_frame(
    frame: &RgbImage,
    quality: u8,
) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let mut cursor = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut cursor, quality.clamp(1, 100));
    encoder
        .encode_image(frame)
        .map_err(|e| format!("JPEG encoding failed: {e}"))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(cursor.into_inner()))
}
