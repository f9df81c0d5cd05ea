//! Route definitions for the `/scans` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::scans;
use crate::state::AppState;

/// Routes mounted at `/scans`.
///
/// ```text
/// GET    /        -> list       (?patient_id=)
/// GET    /{id}    -> get_by_id
/// DELETE /{id}    -> delete
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(scans::list))
        .route("/{id}", get(scans::get_by_id).delete(scans::delete))
}
