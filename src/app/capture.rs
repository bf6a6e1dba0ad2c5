use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::pipeline::dispatch_recognition;
use super::state::{update_status, AppState, AppStatus};
use crate::recognizer::encode_frame;

/// Acquire the camera and start sampling frames for the recognizer.
pub fn start_capture(state: &Rc<RefCell<AppState>>) {
    if state.borrow().status == AppStatus::Capturing {
        log::debug!("Already capturing");
        return;
    }

    let acquired = state.borrow_mut().media.acquire();
    if let Err(e) = acquired {
        log::error!("Camera access failed: {e}");
        update_status(state, AppStatus::Idle, &format!("Cannot access camera: {e}"));
        return;
    }
    log::info!("Starting capture");

    let period = Duration::from_millis(state.borrow().config.recognizer.sample_interval_ms.max(1));
    let state_clone = state.clone();
    let task = tokio::task::spawn_local(async move {
        // First sample one period after start, like a plain interval timer.
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sample_frame(&state_clone);
        }
    });
    state.borrow_mut().sample_task = Some(task);
    update_status(state, AppStatus::Capturing, "Capturing...");
}

/// Snapshot, encode and dispatch one frame. Never waits on the request.
pub fn sample_frame(state: &Rc<RefCell<AppState>>) {
    let payload = {
        let mut s = state.borrow_mut();
        if s.status != AppStatus::Capturing {
            return;
        }
        if !s.media.frame_ready() {
            log::debug!("No frame yet, skipping sample");
            return;
        }
        let frame = match s.media.snapshot() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Frame capture failed: {e}");
                return;
            }
        };
        match encode_frame(&frame, s.config.recognizer.jpeg_quality) {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("Frame encoding failed: {e}");
                return;
            }
        }
    };
    dispatch_recognition(state, payload);
}

/// Cancel the sampler and release the camera. Safe to call at any time, repeatedly.
pub fn stop_capture(state: &Rc<RefCell<AppState>>) {
    let was_capturing = {
        let mut s = state.borrow_mut();
        if let Some(task) = s.sample_task.take() {
            task.abort();
        }
        s.media.release();
        s.status == AppStatus::Capturing
    };
    if was_capturing {
        log::info!("Stopping capture");
        update_status(state, AppStatus::Idle, "Idle");
    }
}
