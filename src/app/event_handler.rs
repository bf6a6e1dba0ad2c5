use std::cell::RefCell;
use std::rc::Rc;

use super::annotate::{start_annotation, stop_annotation};
use super::capture::{start_capture, stop_capture};
use super::pipeline::{start_health_monitor, stop_health_monitor};
use super::state::{show_status, AppEvent, AppState, AppStatus};
use crate::config::Mode;

/// Handle an app event. This is the core state machine.
pub fn handle_app_event(state: &Rc<RefCell<AppState>>, event: AppEvent) {
    match event {
        AppEvent::StartCapture => {
            if state.borrow().mode != Some(Mode::Recognize) {
                log::info!("Ignoring start outside recognize mode");
                return;
            }
            start_capture(state);
        }
        AppEvent::StopCapture => stop_capture(state),
        AppEvent::ToggleCapture => {
            let status = state.borrow().status;
            match status {
                AppStatus::Capturing => stop_capture(state),
                _ => handle_app_event(state, AppEvent::StartCapture),
            }
        }
        AppEvent::ClearTranscript => {
            let mut s = state.borrow_mut();
            if s.stabilizer.is_empty() {
                log::debug!("Transcript already empty");
                return;
            }
            s.stabilizer.clear();
            log::info!("Transcript cleared");
            show_status("Transcript cleared");
        }
        AppEvent::SwitchMode(mode) => enter_mode(state, mode),
        AppEvent::Quit => shutdown(state),
        AppEvent::PredictionReceived(prediction) => {
            // May land after capture stopped; accepting it then is harmless.
            let mut s = state.borrow_mut();
            log::debug!(
                "Prediction {} ({:.2})",
                prediction.label,
                prediction.confidence
            );
            if let Some(text) = s.stabilizer.offer(&prediction) {
                log::info!("Accepted sign: {}", prediction.label);
                (s.on_recognized)(&text);
            }
        }
        AppEvent::RecognitionFailed(err) => {
            log::warn!("Recognizer call failed: {err}");
        }
        AppEvent::HealthChecked(reachable) => {
            let changed = state.borrow_mut().health.record(reachable);
            if changed {
                log::info!("Recognizer reachable: {reachable}");
                show_status(if reachable {
                    "Recognizer connected"
                } else {
                    "Recognizer not connected"
                });
            }
        }
    }
}

/// Release whatever the active mode holds, then start `mode`.
pub fn enter_mode(state: &Rc<RefCell<AppState>>, mode: Mode) {
    if state.borrow().mode == Some(mode) && mode_running(state, mode) {
        log::debug!("Already in {mode:?} mode");
        return;
    }
    leave_mode(state);
    log::info!("Entering {mode:?} mode");
    state.borrow_mut().mode = Some(mode);
    match mode {
        Mode::Annotate => start_annotation(state),
        Mode::Recognize => {
            start_health_monitor(state);
            show_status("Ready: type `start` to begin capture");
        }
    }
}

/// Whether `mode`'s long-running task is alive. A failed entry leaves none behind.
fn mode_running(state: &Rc<RefCell<AppState>>, mode: Mode) -> bool {
    let s = state.borrow();
    match mode {
        Mode::Annotate => s.frame_task.is_some(),
        Mode::Recognize => s.health_task.is_some(),
    }
}

fn leave_mode(state: &Rc<RefCell<AppState>>) {
    let mode = state.borrow_mut().mode.take();
    match mode {
        Some(Mode::Annotate) => stop_annotation(state),
        Some(Mode::Recognize) => {
            stop_capture(state);
            stop_health_monitor(state);
        }
        None => {}
    }
}

/// Cancel every task and release the camera.
pub fn shutdown(state: &Rc<RefCell<AppState>>) {
    leave_mode(state);
    let mut s = state.borrow_mut();
    s.media.release();
    s.status = AppStatus::Idle;
    log::info!("Shut down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::RasterOverlay;
    use crate::config::Config;
    use crate::media::fake::FakeSource;
    use crate::recognizer::http_stub::{body, read_request, respond};
    use crate::recognizer::RawPrediction;
    use std::cell::Cell;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::task::LocalSet;

    struct Harness {
        state: Rc<RefCell<AppState>>,
        emitted: Rc<RefCell<Vec<String>>>,
        camera: Rc<RefCell<Vec<&'static str>>>,
        rx: async_channel::Receiver<AppEvent>,
    }

    fn harness(media: FakeSource) -> Harness {
        // Nothing listens here; recognizer and health calls fail fast.
        harness_with(media, "http://127.0.0.1:9")
    }

    fn harness_with(media: FakeSource, base_url: &str) -> Harness {
        let mut config = Config::default();
        config.recognizer.base_url = base_url.into();
        config.recognizer.sample_interval_ms = 20;
        config.detection.model_uris = vec!["/nonexistent/det.onnx".into(), "/nonexistent/lm.onnx".into()];

        let (tx, rx) = async_channel::unbounded();
        let emitted = Rc::new(RefCell::new(Vec::new()));
        let sink = emitted.clone();
        let camera = media.calls.clone();
        let state = AppState::with_parts(
            config,
            tx,
            Box::new(media),
            Box::new(RasterOverlay::new(None, None)),
            Box::new(move |text: &str| sink.borrow_mut().push(text.to_string())),
        )
        .unwrap();
        Harness {
            state: Rc::new(RefCell::new(state)),
            emitted,
            camera,
            rx,
        }
    }

    fn predict(h: &Harness, label: &str, confidence: f32) {
        handle_app_event(
            &h.state,
            AppEvent::PredictionReceived(RawPrediction::new(label, confidence)),
        );
    }

    #[test]
    fn test_held_sign_emits_once_then_switch_emits() {
        let h = harness(FakeSource::with_frame(8, 8));
        predict(&h, "toi", 0.9);
        predict(&h, "toi", 0.92);
        predict(&h, "toi", 0.95);
        predict(&h, "thich", 0.85);
        predict(&h, "none", 0.99);
        predict(&h, "mau hong", 0.4);

        assert_eq!(*h.emitted.borrow(), vec!["toi", "toi thich"]);
    }

    #[test]
    fn test_clear_empties_without_emitting() {
        let h = harness(FakeSource::with_frame(8, 8));
        predict(&h, "toi", 0.9);
        handle_app_event(&h.state, AppEvent::ClearTranscript);
        assert_eq!(h.state.borrow().stabilizer.text(), "");
        assert_eq!(h.emitted.borrow().len(), 1);

        predict(&h, "toi", 0.9);
        assert_eq!(*h.emitted.borrow(), vec!["toi", "toi"]);
    }

    #[test]
    fn test_start_outside_recognize_mode_is_ignored() {
        let h = harness(FakeSource::with_frame(8, 8));
        handle_app_event(&h.state, AppEvent::StartCapture);
        assert_eq!(h.state.borrow().status, AppStatus::Idle);
        assert!(h.state.borrow().sample_task.is_none());
    }

    #[test]
    fn test_health_updates_connectivity() {
        let h = harness(FakeSource::with_frame(8, 8));
        handle_app_event(&h.state, AppEvent::HealthChecked(true));
        assert!(h.state.borrow().health.state().is_reachable());
        handle_app_event(&h.state, AppEvent::HealthChecked(false));
        assert!(!h.state.borrow().health.state().is_reachable());
    }

    #[tokio::test]
    async fn test_capture_start_stop_and_late_response() {
        LocalSet::new()
            .run_until(async {
                let h = harness(FakeSource::with_frame(8, 8));
                enter_mode(&h.state, Mode::Recognize);
                assert!(h.state.borrow().health_task.is_some());

                handle_app_event(&h.state, AppEvent::StartCapture);
                handle_app_event(&h.state, AppEvent::StartCapture);
                assert_eq!(h.state.borrow().status, AppStatus::Capturing);
                assert!(h.state.borrow().media.is_acquired());

                // Let a few samples fire against the dead recognizer.
                tokio::time::sleep(Duration::from_millis(70)).await;

                handle_app_event(&h.state, AppEvent::StopCapture);
                handle_app_event(&h.state, AppEvent::StopCapture);
                assert_eq!(h.state.borrow().status, AppStatus::Idle);
                assert!(h.state.borrow().sample_task.is_none());
                assert!(!h.state.borrow().media.is_acquired());

                // A response that was in flight when capture stopped.
                predict(&h, "thich", 0.9);
                assert_eq!(*h.emitted.borrow(), vec!["thich"]);

                shutdown(&h.state);
                assert!(h.state.borrow().health_task.is_none());
            })
            .await;
    }

    #[tokio::test]
    async fn test_camera_denied_does_not_start_capture() {
        LocalSet::new()
            .run_until(async {
                let h = harness(FakeSource::denied());
                enter_mode(&h.state, Mode::Recognize);
                handle_app_event(&h.state, AppEvent::ToggleCapture);

                assert_eq!(h.state.borrow().status, AppStatus::Idle);
                assert!(h.state.borrow().sample_task.is_none());
            })
            .await;
    }

    #[tokio::test]
    async fn test_switching_modes_releases_camera_first() {
        LocalSet::new()
            .run_until(async {
                let h = harness(FakeSource::with_frame(8, 8));
                enter_mode(&h.state, Mode::Recognize);
                handle_app_event(&h.state, AppEvent::StartCapture);

                handle_app_event(&h.state, AppEvent::SwitchMode(Mode::Annotate));
                {
                    let s = h.state.borrow();
                    assert_eq!(s.mode, Some(Mode::Annotate));
                    assert_eq!(s.status, AppStatus::Annotating);
                    assert!(s.sample_task.is_none());
                    assert!(s.health_task.is_none());
                    assert!(s.frame_task.is_some());
                    assert!(s.media.is_acquired());
                }

                // Recognize's hold is dropped before Annotate takes the camera.
                assert_eq!(*h.camera.borrow(), vec!["acquire", "release", "acquire"]);

                handle_app_event(&h.state, AppEvent::Quit);
                let s = h.state.borrow();
                assert!(s.frame_task.is_none());
                assert!(!s.media.is_acquired());
                assert_eq!(h.camera.borrow().last(), Some(&"release"));
            })
            .await;
    }

    #[tokio::test]
    async fn test_missing_model_keeps_pipeline_waiting() {
        LocalSet::new()
            .run_until(async {
                let h = harness(FakeSource::with_frame(8, 8));
                enter_mode(&h.state, Mode::Annotate);

                // Let the load settle and a few frame cycles run.
                tokio::time::sleep(Duration::from_millis(200)).await;

                let s = h.state.borrow();
                assert_eq!(s.runtime.state(), crate::models::ModelState::Failed);
                assert!(s.runtime.last_error().unwrap().contains("Failed to load models"));
                assert!(s.landmarker.is_none());
                assert_eq!(
                    s.pipeline.state(),
                    crate::detection::PipelineState::WaitingForReadiness
                );
            })
            .await;
    }

    #[tokio::test]
    async fn test_reentering_annotate_retries_after_camera_failure() {
        LocalSet::new()
            .run_until(async {
                let mut media = FakeSource::with_frame(8, 8);
                media.denials = 1;
                let h = harness(media);

                enter_mode(&h.state, Mode::Annotate);
                assert!(h.state.borrow().frame_task.is_none());
                assert_eq!(h.state.borrow().status, AppStatus::Idle);

                handle_app_event(&h.state, AppEvent::SwitchMode(Mode::Annotate));
                {
                    let s = h.state.borrow();
                    assert!(s.frame_task.is_some());
                    assert!(s.media.is_acquired());
                    assert_eq!(s.status, AppStatus::Annotating);
                }
                assert_eq!(*h.camera.borrow(), vec!["denied", "release", "acquire"]);

                // Once running, asking again changes nothing.
                handle_app_event(&h.state, AppEvent::SwitchMode(Mode::Annotate));
                assert_eq!(h.camera.borrow().len(), 3);
                shutdown(&h.state);
            })
            .await;
    }

    #[tokio::test]
    async fn test_slow_recognizer_answers_land_after_stop() {
        LocalSet::new()
            .run_until(async {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                let addr = listener.local_addr().unwrap();
                let predicts = Rc::new(RefCell::new(Vec::<String>::new()));
                let answered = Rc::new(Cell::new(0usize));

                {
                    let predicts = predicts.clone();
                    let answered = answered.clone();
                    tokio::task::spawn_local(async move {
                        while let Ok((mut socket, _)) = listener.accept().await {
                            let predicts = predicts.clone();
                            let answered = answered.clone();
                            tokio::task::spawn_local(async move {
                                let request = read_request(&mut socket).await;
                                if request.starts_with("POST /predict") {
                                    predicts.borrow_mut().push(body(&request).to_string());
                                    tokio::time::sleep(Duration::from_millis(300)).await;
                                    answered.set(answered.get() + 1);
                                    respond(
                                        &mut socket,
                                        "200 OK",
                                        r#"{"prediction": "thich", "confidence": 0.9}"#,
                                    )
                                    .await;
                                } else {
                                    respond(&mut socket, "200 OK", r#"{"status": "healthy"}"#).await;
                                }
                            });
                        }
                    });
                }

                let h = harness_with(FakeSource::with_frame(8, 8), &format!("http://{addr}"));
                enter_mode(&h.state, Mode::Recognize);
                handle_app_event(&h.state, AppEvent::StartCapture);

                // Several 20 ms ticks fire while the first answer is still pending.
                tokio::time::sleep(Duration::from_millis(110)).await;
                assert!(predicts.borrow().len() >= 2, "sampler waited on a pending request");
                assert_eq!(answered.get(), 0);

                handle_app_event(&h.state, AppEvent::StopCapture);
                assert!(h.emitted.borrow().is_empty());
                // Let the last dispatched request reach the server.
                tokio::time::sleep(Duration::from_millis(50)).await;
                let sent = predicts.borrow().len();

                // Feed every event that arrives into the state machine, like the main loop.
                while let Ok(Ok(event)) =
                    tokio::time::timeout(Duration::from_millis(600), h.rx.recv()).await
                {
                    handle_app_event(&h.state, event);
                }

                assert_eq!(answered.get(), sent);
                assert_eq!(predicts.borrow().len(), sent);
                assert!(predicts
                    .borrow()
                    .iter()
                    .all(|b| b.starts_with(r#"{"image":"/9j/"#)));
                // Held sign: many answers, one emission.
                assert_eq!(*h.emitted.borrow(), vec!["thich"]);
                assert!(h.state.borrow().health.state().is_reachable());

                shutdown(&h.state);
            })
            .await;
    }
}
