pub mod analysis;
pub mod health;
pub mod scans;

use axum::Router;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /health                  service health
/// /analyze-occlusion       upload pre-op + during-op images (POST)
/// /scans                   list (?patient_id=)
/// /scans/{id}              get, delete
/// ```
pub fn api_routes(config: &ServerConfig) -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(analysis::router(config.upload_body_limit()))
        .nest("/scans", scans::router())
}
