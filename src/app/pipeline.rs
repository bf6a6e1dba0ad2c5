use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};

use super::state::{AppEvent, AppState};

/// Fire one recognizer request; the outcome comes back as an event.
pub fn dispatch_recognition(state: &Rc<RefCell<AppState>>, payload: String) {
    let s = state.borrow();
    let client = s.recognizer.clone();
    let sender = s.event_sender.clone();

    tokio::task::spawn_local(async move {
        let event = match client.predict(&payload).await {
            Ok(prediction) => AppEvent::PredictionReceived(prediction),
            Err(e) => AppEvent::RecognitionFailed(e.to_string()),
        };
        let _ = sender.send(event).await;
    });
}

/// Poll recognizer liveness now and then every health interval.
pub fn start_health_monitor(state: &Rc<RefCell<AppState>>) {
    if state.borrow().health_task.is_some() {
        return;
    }
    let (client, sender, period) = {
        let s = state.borrow();
        (
            s.recognizer.clone(),
            s.event_sender.clone(),
            Duration::from_millis(s.config.recognizer.health_interval_ms.max(1)),
        )
    };

    let task = tokio::task::spawn_local(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        while !sender.is_closed() {
            ticker.tick().await;
            // Each poll runs on its own so a hung check never delays the next one.
            let client = client.clone();
            let sender = sender.clone();
            tokio::task::spawn_local(async move {
                let reachable = client.health().await;
                let _ = sender.send(AppEvent::HealthChecked(reachable)).await;
            });
        }
    });
    state.borrow_mut().health_task = Some(task);
}

pub fn stop_health_monitor(state: &Rc<RefCell<AppState>>) {
    if let Some(task) = state.borrow_mut().health_task.take() {
        task.abort();
    }
}
