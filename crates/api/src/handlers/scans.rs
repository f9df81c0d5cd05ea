//! Handlers for the `/scans` resource.
//!
//! Scans are created by the analyze endpoint; these handlers only read and
//! delete them.

use axum::extract::{Path, Query, State};
use axum::Json;
use occlusmart_core::error::CoreError;
use occlusmart_core::scan::ScanRecord;
use occlusmart_core::types::ScanId;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::{DataResponse, StatusMessage};
use crate::state::AppState;

/// Query parameters for the scan listing endpoint.
#[derive(Debug, Deserialize)]
pub struct ScanListParams {
    pub patient_id: Option<String>,
}

/// GET /api/scans
///
/// List all scans, optionally filtered by `?patient_id=`. A blank
/// `patient_id` lists everything.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ScanListParams>,
) -> AppResult<Json<DataResponse<Vec<ScanRecord>>>> {
    let scans = state.scans.list(patient_filter(&params)).await;
    Ok(Json(DataResponse { data: scans }))
}

/// GET /api/scans/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<ScanRecord>>> {
    let id = parse_scan_id(&id)?;
    let scan = state
        .scans
        .get(id)
        .await
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Scan", id }))?;
    Ok(Json(DataResponse { data: scan }))
}

/// DELETE /api/scans/{id}
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<StatusMessage>> {
    let id = parse_scan_id(&id)?;
    if !state.scans.remove(id).await {
        return Err(AppError::Core(CoreError::NotFound { entity: "Scan", id }));
    }
    tracing::info!(scan_id = %id, "Scan deleted");
    Ok(Json(StatusMessage::success("Scan deleted")))
}

/// Stored patient ids are trimmed, so the filter is too.
fn patient_filter(params: &ScanListParams) -> Option<&str> {
    params
        .patient_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

fn parse_scan_id(raw: &str) -> AppResult<ScanId> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid scan id '{raw}'")))
}
