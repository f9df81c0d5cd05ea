//! Handler for `POST /api/analyze-occlusion`.
//!
//! Reads the two images (and an optional patient id) from a multipart form,
//! validates them, hands them to the configured analyzer and records the
//! resulting scan.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use occlusmart_core::analysis::AnalysisResult;
use occlusmart_core::error::CoreError;
use occlusmart_core::scan::ScanRecord;
use occlusmart_core::upload::{validate_image, ImageRole, UploadedImage};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Multipart text field carrying the optional patient identifier.
const PATIENT_ID_FIELD: &str = "patient_id";

/// Longest accepted patient identifier, in characters.
const MAX_PATIENT_ID_LEN: usize = 128;

/// Fields collected from the analyze form.
#[derive(Debug, Default)]
struct AnalyzeForm {
    pre_op: Option<UploadedImage>,
    during_op: Option<UploadedImage>,
    patient_id: Option<String>,
}

/// POST /api/analyze-occlusion
///
/// Accepts a multipart form with required `pre_op` and `during_op` file fields
/// (`pre_op_image` / `during_op_image` are accepted too) and an optional
/// `patient_id` text field.
pub async fn analyze_occlusion(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<AnalysisResult>> {
    let mut multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let form = read_form(&mut multipart).await?;

    let pre_op = form.pre_op.ok_or_else(|| missing_field(ImageRole::PreOp))?;
    let during_op = form.during_op.ok_or_else(|| missing_field(ImageRole::DuringOp))?;

    let limits = state.config.upload_limits();
    let pre_op = validate_image(pre_op, &limits)?;
    let during_op = validate_image(during_op, &limits)?;

    let scan_id = uuid::Uuid::new_v4();
    tracing::info!(
        %scan_id,
        analyzer = state.analyzer.name(),
        pre_op_bytes = pre_op.bytes.len(),
        during_op_bytes = during_op.bytes.len(),
        "Starting occlusion analysis",
    );

    let analysis = state.analyzer.analyze(&pre_op, &during_op).await?;
    let result = AnalysisResult::success(scan_id, analysis);

    state
        .scans
        .insert(ScanRecord {
            id: scan_id,
            patient_id: form.patient_id,
            created_at: chrono::Utc::now(),
            pre_op: pre_op.summary(),
            during_op: during_op.summary(),
            analysis_results: result.clone(),
        })
        .await;

    tracing::info!(
        %scan_id,
        occlusion_score = result.analysis.occlusion_score,
        alignment_score = result.analysis.alignment_score,
        "Occlusion analysis complete",
    );

    Ok(Json(result))
}

async fn read_form(multipart: &mut Multipart) -> AppResult<AnalyzeForm> {
    let mut form = AnalyzeForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();

        if let Some(role) = ImageRole::from_field_name(&name) {
            let filename = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await?;

            let slot = match role {
                ImageRole::PreOp => &mut form.pre_op,
                ImageRole::DuringOp => &mut form.during_op,
            };
            if slot.is_some() {
                return Err(AppError::BadRequest(format!("Duplicate '{role}' field")));
            }
            *slot = Some(UploadedImage {
                role,
                filename,
                content_type,
                bytes: bytes.to_vec(),
            });
        } else if name == PATIENT_ID_FIELD {
            let text = field.text().await?;
            form.patient_id = parse_patient_id(&text)?;
        }
        // Unknown fields are ignored.
    }

    Ok(form)
}

fn parse_patient_id(raw: &str) -> Result<Option<String>, CoreError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_PATIENT_ID_LEN {
        return Err(CoreError::Validation(format!(
            "patient_id must be at most {MAX_PATIENT_ID_LEN} characters"
        )));
    }
    Ok(Some(trimmed.to_string()))
}

fn missing_field(role: ImageRole) -> AppError {
    AppError::BadRequest(format!("Missing required '{role}' field"))
}
