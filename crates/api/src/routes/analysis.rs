//! Route definition for the occlusion analysis upload.

use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;

use crate::handlers::analysis;
use crate::state::AppState;

/// Analysis routes, merged into the `/api` tree.
///
/// ```text
/// POST /analyze-occlusion    -> analyze_occlusion  (multipart: pre_op, during_op, patient_id?)
/// ```
///
/// `body_limit` replaces axum's default 2 MB cap on this route only.
pub fn router(body_limit: usize) -> Router<AppState> {
    Router::new().route(
        "/analyze-occlusion",
        post(analysis::analyze_occlusion).layer(DefaultBodyLimit::max(body_limit)),
    )
}
