use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use super::model::ensure_models;
use super::state::{update_status, AppState, AppStatus};
use crate::annotation::DrawCommand;
use crate::detection::TickOutcome;
use crate::landmarks::FaceLandmarker;

/// Enter annotation: load models, take the camera, start the frame loop.
pub fn start_annotation(state: &Rc<RefCell<AppState>>) {
    if state.borrow().frame_task.is_some() {
        log::debug!("Annotation already running");
        return;
    }
    ensure_models(state);

    let acquired = state.borrow_mut().media.acquire();
    if let Err(e) = acquired {
        log::error!("Camera access failed: {e}");
        update_status(state, AppStatus::Idle, &format!("Cannot access camera: {e}"));
        return;
    }

    let refresh = Duration::from_millis(state.borrow().config.detection.refresh_interval_ms.max(1));
    state.borrow_mut().pipeline.reset();

    // One cycle, then exactly one future cycle: work never piles up behind a slow frame.
    let state_clone = state.clone();
    let task = tokio::task::spawn_local(async move {
        loop {
            run_detection_cycle(&state_clone);
            tokio::time::sleep(refresh).await;
        }
    });
    state.borrow_mut().frame_task = Some(task);
    update_status(state, AppStatus::Annotating, "Annotating");
}

/// One bounded step of the detection loop.
pub fn run_detection_cycle(state: &Rc<RefCell<AppState>>) -> TickOutcome {
    let mut guard = state.borrow_mut();
    let s = &mut *guard;
    let landmarker = s
        .landmarker
        .as_mut()
        .map(|l| &mut **l as &mut dyn FaceLandmarker);
    s.pipeline
        .tick(&s.runtime, landmarker, s.media.as_mut(), s.overlay.as_mut())
}

/// Leave annotation: cancel the pending cycle, wipe the overlay, release the camera.
pub fn stop_annotation(state: &Rc<RefCell<AppState>>) {
    let mut s = state.borrow_mut();
    if let Some(task) = s.frame_task.take() {
        task.abort();
        let size = s.overlay.size();
        if let Some(size) = size {
            if let Err(e) = s.overlay.paint(&[DrawCommand::Clear(size)]) {
                log::warn!("Overlay clear failed: {e}");
            }
        }
        log::info!("Annotation stopped after {} frame(s)", s.pipeline.frames_rendered());
    }
    s.media.release();
    s.pipeline.reset();
    if s.status == AppStatus::Annotating {
        s.status = AppStatus::Idle;
    }
}
