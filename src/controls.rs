use tokio::io::{AsyncBufReadExt, BufReader};

use crate::app::AppEvent;
use crate::config::Mode;

/// Map one control line to an event.
pub fn parse_command(line: &str) -> Option<AppEvent> {
    let mut words = line.split_whitespace();
    let event = match words.next()?.to_ascii_lowercase().as_str() {
        "start" => AppEvent::StartCapture,
        "stop" => AppEvent::StopCapture,
        "toggle" => AppEvent::ToggleCapture,
        "clear" => AppEvent::ClearTranscript,
        "quit" | "exit" => AppEvent::Quit,
        "mode" => match words.next()?.to_ascii_lowercase().as_str() {
            "annotate" => AppEvent::SwitchMode(Mode::Annotate),
            "recognize" => AppEvent::SwitchMode(Mode::Recognize),
            _ => return None,
        },
        _ => return None,
    };
    Some(event)
}

/// Read commands from stdin until EOF, which quits.
pub fn start_listener(sender: async_channel::Sender<AppEvent>) {
    tokio::task::spawn_local(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_command(&line) {
                        Some(event) => {
                            if sender.send(event).await.is_err() {
                                break;
                            }
                        }
                        None => log::warn!(
                            "Unknown command {line:?} (start, stop, toggle, clear, mode annotate|recognize, quit)"
                        ),
                    }
                }
                Ok(None) => {
                    let _ = sender.send(AppEvent::Quit).await;
                    break;
                }
                Err(e) => {
                    log::error!("Reading controls failed: {e}");
                    let _ = sender.send(AppEvent::Quit).await;
                    break;
                }
            }
        }
    });
}
