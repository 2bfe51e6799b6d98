use axum::routing::{get, post};
use axum::Router;

use crate::core::state::AppState;

mod answers;
mod events;
mod helpers;
mod result;
mod start;
mod submit;
mod view;
mod visibility;


pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(start::start_session))
        .route("/:session_id", get(view::get_session))
        .route("/:session_id/events", get(events::session_events))
        .route("/:session_id/answers", post(answers::select_answer))
        .route("/:session_id/visibility", post(visibility::report_visibility))
        .route("/:session_id/submit", post(submit::submit_session))
        .route("/:session_id/result", get(result::get_result))
}
