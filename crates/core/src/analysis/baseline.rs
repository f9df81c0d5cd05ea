//! Baseline comparison analyzer.
//!
//! Decodes both images, reduces them to equal-sized grayscale thumbnails and
//! compares them pixel by pixel. Produces the scores and the canned
//! findings/recommendations derived from fixed thresholds.

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::{GrayImage, ImageError};

use super::{round_score, OcclusionAnalysis, OcclusionAnalyzer};
use crate::error::CoreError;
use crate::upload::ValidatedImage;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_THUMBNAIL_SIZE: u32 = 128;
pub const MIN_THUMBNAIL_SIZE: u32 = 8;
pub const MAX_THUMBNAIL_SIZE: u32 = 1024;

/// Absolute grayscale difference above which a pixel counts as changed.
pub const DEFAULT_CHANGE_THRESHOLD: u8 = 32;

/// Occlusion score at or above which overall occlusion is reported as good.
const GOOD_OCCLUSION: f64 = 0.80;
/// Occlusion score at or above which change is moderate rather than significant.
const MODERATE_OCCLUSION: f64 = 0.60;
/// Fraction of a quadrant that must change to be called out.
const LOCALIZED_CHANGE: f64 = 0.25;
/// Alignment score below which the captures are reported as misaligned.
const MIN_ALIGNMENT: f64 = 0.70;
/// Relative aspect-ratio difference tolerated between the two captures.
const ASPECT_TOLERANCE: f64 = 0.10;

const QUADRANTS: [&str; 4] = ["upper-left", "upper-right", "lower-left", "lower-right"];

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaselineSettings {
    /// Edge length of the square thumbnails that get compared.
    pub thumbnail_size: u32,
    /// See [`DEFAULT_CHANGE_THRESHOLD`].
    pub change_threshold: u8,
}

impl Default for BaselineSettings {
    fn default() -> Self {
        Self {
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            change_threshold: DEFAULT_CHANGE_THRESHOLD,
        }
    }
}

impl BaselineSettings {
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(MIN_THUMBNAIL_SIZE..=MAX_THUMBNAIL_SIZE).contains(&self.thumbnail_size) {
            return Err(CoreError::Validation(format!(
                "thumbnail_size must be between {MIN_THUMBNAIL_SIZE} and {MAX_THUMBNAIL_SIZE}, got {}",
                self.thumbnail_size
            )));
        }
        if self.change_threshold == 0 || self.change_threshold == u8::MAX {
            return Err(CoreError::Validation(format!(
                "change_threshold must be between 1 and 254, got {}",
                self.change_threshold
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct BaselineComparisonAnalyzer {
    settings: BaselineSettings,
}

impl BaselineComparisonAnalyzer {
    pub fn new(settings: BaselineSettings) -> Result<Self, CoreError> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> BaselineSettings {
        self.settings
    }
}

#[async_trait]
impl OcclusionAnalyzer for BaselineComparisonAnalyzer {
    fn name(&self) -> &'static str {
        "baseline-comparison"
    }

    async fn analyze(
        &self,
        pre_op: &ValidatedImage,
        during_op: &ValidatedImage,
    ) -> Result<OcclusionAnalysis, CoreError> {
        let settings = self.settings;
        let pre_op = pre_op.clone();
        let during_op = during_op.clone();

        // Decoding and resizing are CPU-bound.
        tokio::task::spawn_blocking(move || compare(settings, &pre_op, &during_op))
            .await
            .map_err(|e| CoreError::Internal(format!("comparison task failed: {e}")))?
    }
}

fn compare(
    settings: BaselineSettings,
    pre_op: &ValidatedImage,
    during_op: &ValidatedImage,
) -> Result<OcclusionAnalysis, CoreError> {
    let size = settings.thumbnail_size;
    let pre_thumb = thumbnail(pre_op, size)?;
    let during_thumb = thumbnail(during_op, size)?;

    let metrics = ComparisonMetrics::measure(&pre_thumb, &during_thumb, settings.change_threshold);
    let aspect_mismatch = aspect_ratios_differ(pre_op, during_op);

    tracing::debug!(
        changed_fraction = metrics.changed_fraction,
        correlation = metrics.correlation,
        aspect_mismatch,
        "Compared pre-op and during-op thumbnails",
    );

    Ok(interpret(&metrics, aspect_mismatch))
}

fn thumbnail(image: &ValidatedImage, size: u32) -> Result<GrayImage, CoreError> {
    let decoded = image::load_from_memory_with_format(&image.bytes, image.kind.as_format())
        .map_err(|e| match e {
            ImageError::Limits(_) => CoreError::PayloadTooLarge(format!(
                "'{}' ({}x{}) is too large to decode: {e}",
                image.role, image.width, image.height
            )),
            _ => CoreError::UnsupportedImage(format!("'{}' could not be decoded: {e}", image.role)),
        })?;
    Ok(imageops::resize(
        &decoded.to_luma8(),
        size,
        size,
        FilterType::Triangle,
    ))
}

fn aspect_ratios_differ(a: &ValidatedImage, b: &ValidatedImage) -> bool {
    let ratio_a = f64::from(a.width) / f64::from(a.height);
    let ratio_b = f64::from(b.width) / f64::from(b.height);
    ((ratio_a - ratio_b) / ratio_a).abs() > ASPECT_TOLERANCE
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Raw comparison figures for two equal-sized grayscale images.
#[derive(Debug, Clone, PartialEq)]
struct ComparisonMetrics {
    /// Pearson correlation of pixel intensities, in `[-1, 1]`.
    correlation: f64,
    /// Fraction of pixels whose difference exceeds the threshold.
    changed_fraction: f64,
    /// Changed fraction per quadrant, in [`QUADRANTS`] order.
    quadrant_changes: [f64; 4],
}

impl ComparisonMetrics {
    fn measure(a: &GrayImage, b: &GrayImage, threshold: u8) -> Self {
        debug_assert_eq!(a.dimensions(), b.dimensions());
        let (width, height) = a.dimensions();
        let total = f64::from(width) * f64::from(height);

        let mean = |img: &GrayImage| img.pixels().map(|p| f64::from(p.0[0])).sum::<f64>() / total;
        let mean_a = mean(a);
        let mean_b = mean(b);

        let mut covariance = 0.0;
        let mut var_a = 0.0;
        let mut var_b = 0.0;
        let mut changed = 0u64;
        let mut quadrant_changed = [0u64; 4];
        let mut quadrant_total = [0u64; 4];

        for (x, y, pa) in a.enumerate_pixels() {
            let va = pa.0[0];
            let vb = b.get_pixel(x, y).0[0];

            let da = f64::from(va) - mean_a;
            let db = f64::from(vb) - mean_b;
            covariance += da * db;
            var_a += da * da;
            var_b += db * db;

            let quadrant = usize::from(y >= height / 2) * 2 + usize::from(x >= width / 2);
            quadrant_total[quadrant] += 1;
            if va.abs_diff(vb) > threshold {
                changed += 1;
                quadrant_changed[quadrant] += 1;
            }
        }

        let correlation = match (var_a == 0.0, var_b == 0.0) {
            // Two flat images have no structure to misalign.
            (true, true) => 1.0,
            (true, false) | (false, true) => 0.0,
            (false, false) => (covariance / (var_a * var_b).sqrt()).clamp(-1.0, 1.0),
        };

        let mut quadrant_changes = [0.0; 4];
        for (i, slot) in quadrant_changes.iter_mut().enumerate() {
            if quadrant_total[i] > 0 {
                *slot = quadrant_changed[i] as f64 / quadrant_total[i] as f64;
            }
        }

        Self {
            correlation,
            changed_fraction: changed as f64 / total,
            quadrant_changes,
        }
    }

    fn most_changed_quadrant(&self) -> (&'static str, f64) {
        self.quadrant_changes
            .iter()
            .copied()
            .enumerate()
            .fold((QUADRANTS[0], 0.0), |best, (i, change)| {
                if change > best.1 {
                    (QUADRANTS[i], change)
                } else {
                    best
                }
            })
    }
}

// ---------------------------------------------------------------------------
// Interpretation
// ---------------------------------------------------------------------------

fn interpret(metrics: &ComparisonMetrics, aspect_mismatch: bool) -> OcclusionAnalysis {
    let occlusion_score = round_score(1.0 - metrics.changed_fraction);
    let alignment_score = round_score((metrics.correlation + 1.0) / 2.0);

    let mut findings = Vec::new();
    let mut recommendations = Vec::new();

    if occlusion_score >= GOOD_OCCLUSION {
        findings.push("Good overall occlusion".to_string());
    } else if occlusion_score >= MODERATE_OCCLUSION {
        findings.push("Moderate occlusal change between pre-op and during-op images".to_string());
        recommendations.push("Review contact points before finalizing the restoration".to_string());
    } else {
        findings.push("Significant occlusal change between pre-op and during-op images".to_string());
        recommendations.push("Re-check the bite and adjust the restoration before finishing".to_string());
    }

    let (quadrant, change) = metrics.most_changed_quadrant();
    if change > LOCALIZED_CHANGE {
        findings.push(format!(
            "Localized change in the {quadrant} region ({:.0}% of area)",
            change * 100.0
        ));
        recommendations.push(format!("Inspect the {quadrant} region for high spots"));
    }

    if alignment_score < MIN_ALIGNMENT {
        findings.push("Images are poorly aligned; framing differs between captures".to_string());
        recommendations
            .push("Retake the during-op image from the pre-op camera position".to_string());
    }

    if aspect_mismatch {
        findings.push("Pre-op and during-op images have different aspect ratios".to_string());
        recommendations.push("Capture both images at the same resolution".to_string());
    }

    if recommendations.is_empty() {
        recommendations.push("No adjustment needed; schedule routine follow-up".to_string());
    }

    OcclusionAnalysis {
        occlusion_score,
        alignment_score,
        findings,
        recommendations,
    }
}
