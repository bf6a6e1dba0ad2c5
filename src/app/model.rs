use std::cell::RefCell;
use std::rc::Rc;

use super::state::{show_status, AppState};
use crate::landmarks::FaceLandmarker;
use crate::models::{load_assets, ModelState};
use crate::onnx::OnnxLandmarker;

/// Start loading the detection models unless a load already ran.
pub fn ensure_models(state: &Rc<RefCell<AppState>>) {
    let (uris, http, threshold, max_faces) = {
        let mut s = state.borrow_mut();
        if !s.runtime.begin_load() {
            log::debug!("Model load skipped, state={:?}", s.runtime.state());
            if s.runtime.state() == ModelState::Failed {
                let reason = s.runtime.last_error().unwrap_or("load failed");
                show_status(&format!("Models not ready ({reason})"));
            }
            return;
        }
        (
            s.runtime.uris().to_vec(),
            s.http.clone(),
            s.config.detection.score_threshold,
            s.config.detection.max_faces,
        )
    };
    log::info!("Loading {} detection model(s)...", uris.len());
    show_status("Loading models...");

    // Sessions are built on the blocking pool; the result lands back on the loop thread.
    let state_clone = state.clone();
    tokio::task::spawn_local(async move {
        let result = match load_assets(&http, &uris).await {
            Ok(assets) => {
                let built = tokio::task::spawn_blocking(move || {
                    OnnxLandmarker::from_assets(&assets, threshold, max_faces)
                })
                .await;
                match built {
                    Ok(Ok(landmarker)) => Ok(Box::new(landmarker) as Box<dyn FaceLandmarker>),
                    Ok(Err(e)) => Err(format!("Failed to build model sessions: {e}")),
                    Err(e) => Err(format!("Model session build panicked: {e}")),
                }
            }
            Err(e) => Err(format!("Failed to load models: {e}")),
        };
        install_models(&state_clone, result);
    });
}

/// Record the outcome of a load on the runtime.
pub fn install_models(
    state: &Rc<RefCell<AppState>>,
    result: Result<Box<dyn FaceLandmarker>, String>,
) {
    let mut s = state.borrow_mut();
    match result {
        Ok(landmarker) => {
            s.landmarker = Some(landmarker);
            s.runtime.finish_load(Ok(()));
            log::info!("Detection models ready");
            show_status("Models ready");
        }
        Err(e) => {
            log::error!("{e}");
            s.landmarker = None;
            s.runtime.finish_load(Err(e));
            let reason = s.runtime.last_error().unwrap_or("load failed");
            show_status(&format!("Models not ready ({reason})"));
        }
    }
}
