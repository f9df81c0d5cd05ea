use occlusmart_core::analysis::BaselineSettings;
use occlusmart_core::scan::DEFAULT_MAX_SCANS;
use occlusmart_core::upload::{UploadLimits, DEFAULT_MAX_IMAGE_BYTES, DEFAULT_MAX_IMAGE_PIXELS};

/// Room left in the request body for multipart boundaries and text fields.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    /// A single `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long in-flight requests get to finish after a shutdown signal
    /// (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Per-image upload limit in bytes (default: 20 MiB).
    pub max_image_bytes: usize,
    /// Per-image pixel limit, `width * height` (default: 40 million).
    pub max_image_pixels: u64,
    /// Scans kept in memory before the oldest is evicted (default: `10000`).
    pub max_stored_scans: usize,
    /// Tuning for the baseline comparison analyzer.
    pub analysis: BaselineSettings,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default     |
    /// |-----------------------------|-------------|
    /// | `HOST`                      | `0.0.0.0`   |
    /// | `PORT`                      | `8000`      |
    /// | `CORS_ORIGINS`              | `*`         |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`        |
    /// | `SHUTDOWN_TIMEOUT_SECS`     | `30`        |
    /// | `MAX_IMAGE_BYTES`           | `20971520`  |
    /// | `MAX_IMAGE_PIXELS`          | `40000000`  |
    /// | `MAX_STORED_SCANS`          | `10000`     |
    /// | `ANALYSIS_THUMBNAIL_SIZE`   | `128`       |
    /// | `ANALYSIS_CHANGE_THRESHOLD` | `32`        |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let max_image_bytes: usize = std::env::var("MAX_IMAGE_BYTES")
            .map(|v| v.parse().expect("MAX_IMAGE_BYTES must be a valid usize"))
            .unwrap_or(DEFAULT_MAX_IMAGE_BYTES);

        let max_image_pixels: u64 = std::env::var("MAX_IMAGE_PIXELS")
            .map(|v| v.parse().expect("MAX_IMAGE_PIXELS must be a valid u64"))
            .unwrap_or(DEFAULT_MAX_IMAGE_PIXELS);

        let max_stored_scans: usize = std::env::var("MAX_STORED_SCANS")
            .map(|v| v.parse().expect("MAX_STORED_SCANS must be a valid usize"))
            .unwrap_or(DEFAULT_MAX_SCANS);

        let defaults = BaselineSettings::default();
        let analysis = BaselineSettings {
            thumbnail_size: std::env::var("ANALYSIS_THUMBNAIL_SIZE")
                .map(|v| v.parse().expect("ANALYSIS_THUMBNAIL_SIZE must be a valid u32"))
                .unwrap_or(defaults.thumbnail_size),
            change_threshold: std::env::var("ANALYSIS_CHANGE_THRESHOLD")
                .map(|v| v.parse().expect("ANALYSIS_CHANGE_THRESHOLD must be a valid u8"))
                .unwrap_or(defaults.change_threshold),
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            max_image_bytes,
            max_image_pixels,
            max_stored_scans,
            analysis,
        }
    }

    /// Per-image limits passed to upload validation.
    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            max_bytes: self.max_image_bytes,
            max_pixels: self.max_image_pixels,
        }
    }

    /// Whole-request body limit for the upload route: two images plus form
    /// overhead.
    pub fn upload_body_limit(&self) -> usize {
        self.max_image_bytes
            .saturating_mul(2)
            .saturating_add(FORM_OVERHEAD_BYTES)
    }

    /// Whether `CORS_ORIGINS` allows any origin.
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}
