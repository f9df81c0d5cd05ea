use std::sync::Arc;

use occlusmart_core::analysis::OcclusionAnalyzer;
use occlusmart_core::scan::ScanStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (all fields are behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (upload limits are read by handlers).
    pub config: Arc<ServerConfig>,
    /// Analysis collaborator invoked by `POST /api/analyze-occlusion`.
    pub analyzer: Arc<dyn OcclusionAnalyzer>,
    /// In-memory registry of completed scans.
    pub scans: Arc<ScanStore>,
}
