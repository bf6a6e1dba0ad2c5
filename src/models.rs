use futures_util::future::try_join_all;

/// Lifecycle of the detection models. Ready is all-or-nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelState {
    #[default]
    Unloaded,
    Loading,
    Ready,
    Failed,
}

/// Raw bytes of one model file, tagged with where it came from.
#[derive(Debug, Clone)]
pub struct ModelAsset {
    pub uri: String,
    pub bytes: Vec<u8>,
}

/// Owns `ModelState`. Loading itself happens off the state (see `load_assets`);
/// this only records the transitions.
#[derive(Debug)]
pub struct ModelRuntime {
    uris: Vec<String>,
    state: ModelState,
    last_error: Option<String>,
}

impl ModelRuntime {
    pub fn new(uris: Vec<String>) -> Self {
        Self {
            uris,
            state: ModelState::Unloaded,
            last_error: None,
        }
    }

    pub fn uris(&self) -> &[String] {
        &self.uris
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ModelState::Ready
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Unloaded -> Loading. Returns false (and does nothing) from any other state,
    /// so a failed load is never retried.
    pub fn begin_load(&mut self) -> bool {
        if self.state != ModelState::Unloaded {
            return false;
        }
        self.state = ModelState::Loading;
        true
    }

    /// Loading -> Ready or Failed.
    pub fn finish_load(&mut self, result: Result<(), String>) -> ModelState {
        if self.state != ModelState::Loading {
            log::warn!("Ignoring model load result while state={:?}", self.state);
            return self.state;
        }
        match result {
            Ok(()) => {
                self.state = ModelState::Ready;
                self.last_error = None;
            }
            Err(e) => {
                self.state = ModelState::Failed;
                self.last_error = Some(e);
            }
        }
        self.state
    }
}

/// Fetch every model concurrently. Fails as soon as any one fails.
pub async fn load_assets(
    http: &reqwest::Client,
    uris: &[String],
) -> Result<Vec<ModelAsset>, Box<dyn std::error::Error + Send + Sync>> {
    if uris.is_empty() {
        return Err("No model URIs configured".into());
    }
    try_join_all(uris.iter().map(|uri| fetch_asset(http, uri))).await
}

async fn fetch_asset(
    http: &reqwest::Client,
    uri: &str,
) -> Result<ModelAsset, Box<dyn std::error::Error + Send + Sync>> {
    let bytes = if uri.starts_with("http://") || uri.starts_with("https://") {
        let resp = http.get(uri).send().await?;
        if !resp.status().is_success() {
            return Err(format!("Fetching {uri} returned {}", resp.status()).into());
        }
        resp.bytes().await?.to_vec()
    } else {
        let path = uri.strip_prefix("file://").unwrap_or(uri);
        tokio::fs::read(path)
            .await
            .map_err(|e| format!("Reading model {path}: {e}"))?
    };
    log::info!("Fetched model {uri} ({} bytes)", bytes.len());
    Ok(ModelAsset {
        uri: uri.to_string(),
        bytes,
    })
}
