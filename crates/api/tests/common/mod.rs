#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use image::{GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use tower::ServiceExt;

use occlusmart_api::config::ServerConfig;
use occlusmart_api::router::build_app_router;
use occlusmart_api::state::AppState;
use occlusmart_core::analysis::{BaselineComparisonAnalyzer, BaselineSettings, OcclusionAnalyzer};
use occlusmart_core::scan::ScanStore;

pub const BOUNDARY: &str = "occlusmart-test-boundary";

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin, a 1 MiB / 4 megapixel
/// per-image limit and room for 100 scans.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        max_image_bytes: 1024 * 1024,
        max_image_pixels: 4_000_000,
        max_stored_scans: 100,
        analysis: BaselineSettings::default(),
    }
}

/// A test application plus handles on its shared state.
pub struct TestApp {
    pub router: Router,
    pub scans: Arc<ScanStore>,
}

/// Build the full application router with the baseline analyzer.
pub fn build_test_app() -> TestApp {
    build_test_app_with(test_config(), Arc::new(BaselineComparisonAnalyzer::default()))
}

/// Build the full application router with a custom config and analyzer.
pub fn build_test_app_with(config: ServerConfig, analyzer: Arc<dyn OcclusionAnalyzer>) -> TestApp {
    let scans = Arc::new(ScanStore::with_limit(config.max_stored_scans));
    let state = AppState {
        config: Arc::new(config.clone()),
        analyzer,
        scans: Arc::clone(&scans),
    };
    TestApp {
        router: build_app_router(state, &config),
        scans,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri).await
}

async fn send(app: Router, method: Method, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST a multipart form built from `parts` to `uri`.
pub async fn post_multipart(app: Router, uri: &str, parts: &[Part]) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Multipart construction
// ---------------------------------------------------------------------------

/// One multipart form part.
pub enum Part {
    File {
        name: &'static str,
        filename: &'static str,
        content_type: &'static str,
        bytes: Vec<u8>,
    },
    Text {
        name: &'static str,
        value: String,
    },
}

impl Part {
    pub fn png(name: &'static str, bytes: Vec<u8>) -> Self {
        Part::File {
            name,
            filename: "scan.png",
            content_type: "image/png",
            bytes,
        }
    }

    pub fn file(
        name: &'static str,
        filename: &'static str,
        content_type: &'static str,
        bytes: Vec<u8>,
    ) -> Self {
        Part::File {
            name,
            filename,
            content_type,
            bytes,
        }
    }

    pub fn text(name: &'static str, value: &str) -> Self {
        Part::Text {
            name,
            value: value.to_string(),
        }
    }
}

pub fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File {
                name,
                filename,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

// ---------------------------------------------------------------------------
// Test images
// ---------------------------------------------------------------------------

/// Encode a grayscale image produced by `pixel` as PNG bytes.
pub fn png(width: u32, height: u32, pixel: impl Fn(u32, u32) -> u8) -> Vec<u8> {
    let img = GrayImage::from_fn(width, height, |x, y| Luma([pixel(x, y)]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// A 64x64 diagonal gradient.
pub fn gradient_png() -> Vec<u8> {
    png(64, 64, |x, y| ((x + y) * 2) as u8)
}

/// Encode a 64x64 RGB gradient in `format`.
pub fn rgb_image(format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 128]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

/// Rewrite a PNG's IHDR to claim `width` x `height`, with a valid chunk CRC.
pub fn png_claiming(mut png: Vec<u8>, width: u32, height: u32) -> Vec<u8> {
    png[16..20].copy_from_slice(&width.to_be_bytes());
    png[20..24].copy_from_slice(&height.to_be_bytes());
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in &png[12..29] {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            crc = (crc >> 1) ^ (0xEDB8_8320 & (crc & 1).wrapping_neg());
        }
    }
    png[29..33].copy_from_slice(&(!crc).to_be_bytes());
    png
}
