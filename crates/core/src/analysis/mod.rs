//! Occlusion analysis: result types and the analyzer seam.
//!
//! The HTTP layer only ever talks to [`OcclusionAnalyzer`]. The shipped
//! implementation is [`BaselineComparisonAnalyzer`]; anything else (a model
//! server, a remote service) plugs in behind the same trait.

mod baseline;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::ScanId;
use crate::upload::ValidatedImage;

pub use baseline::{BaselineComparisonAnalyzer, BaselineSettings};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Output of a single analyzer run. Scores are in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcclusionAnalysis {
    pub occlusion_score: f64,
    pub alignment_score: f64,
    pub findings: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Success,
}

/// Response body of a completed analysis, also stored on the scan record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub status: AnalysisStatus,
    pub scan_id: ScanId,
    pub analysis: OcclusionAnalysis,
}

impl AnalysisResult {
    pub fn success(scan_id: ScanId, analysis: OcclusionAnalysis) -> Self {
        Self {
            status: AnalysisStatus::Success,
            scan_id,
            analysis,
        }
    }
}

// ---------------------------------------------------------------------------
// Analyzer trait
// ---------------------------------------------------------------------------

/// Compares a pre-op image against a during-op image.
///
/// Implementations report undecodable input as [`CoreError::UnsupportedImage`]
/// and every other failure as [`CoreError::Analysis`].
#[async_trait]
pub trait OcclusionAnalyzer: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    async fn analyze(
        &self,
        pre_op: &ValidatedImage,
        during_op: &ValidatedImage,
    ) -> Result<OcclusionAnalysis, CoreError>;
}

/// Round a score to two decimals.
pub(crate) fn round_score(value: f64) -> f64 {
    (value.clamp(0.0, 1.0) * 100.0).round() / 100.0
}
