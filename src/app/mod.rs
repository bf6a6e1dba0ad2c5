mod annotate;
mod capture;
mod event_handler;
mod model;
mod pipeline;
mod state;

pub use event_handler::{enter_mode, handle_app_event};
pub use state::{AppEvent, AppState};
