//! Integration tests for `POST /api/analyze-occlusion`.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, gradient_png, png, png_claiming, post_multipart, rgb_image, Part};
use image::ImageFormat;
use occlusmart_core::analysis::{OcclusionAnalysis, OcclusionAnalyzer};
use occlusmart_core::error::CoreError;
use occlusmart_core::upload::ValidatedImage;
use tower::ServiceExt;

const ANALYZE: &str = "/api/analyze-occlusion";

/// Analyzer that always fails, for exercising the 500 path.
struct BrokenAnalyzer;

#[async_trait]
impl OcclusionAnalyzer for BrokenAnalyzer {
    fn name(&self) -> &'static str {
        "broken"
    }

    async fn analyze(
        &self,
        _pre_op: &ValidatedImage,
        _during_op: &ValidatedImage,
    ) -> Result<OcclusionAnalysis, CoreError> {
        Err(CoreError::Analysis("model weights missing at /opt/model.bin".into()))
    }
}

// ---------------------------------------------------------------------------
// Test: both images present returns a structured analysis result
// ---------------------------------------------------------------------------

#[tokio::test]
async fn analyze_returns_result_and_records_scan() {
    let app = common::build_test_app();
    let scans = Arc::clone(&app.scans);

    let response = post_multipart(
        app.router,
        ANALYZE,
        &[
            Part::png("pre_op", gradient_png()),
            Part::png("during_op", gradient_png()),
            Part::text("patient_id", "P-1001"),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "success");
    assert_eq!(json["analysis"]["occlusion_score"], 1.0);
    assert_eq!(json["analysis"]["alignment_score"], 1.0);
    assert!(!json["analysis"]["findings"].as_array().unwrap().is_empty());
    assert!(!json["analysis"]["recommendations"].as_array().unwrap().is_empty());

    let scan_id: uuid::Uuid = json["scan_id"].as_str().unwrap().parse().unwrap();
    let stored = scans.get(scan_id).await.expect("scan should be recorded");
    assert_eq!(stored.patient_id.as_deref(), Some("P-1001"));
    assert_eq!(stored.pre_op.width, 64);
    assert_eq!(stored.pre_op.sha256, stored.during_op.sha256);
}

// ---------------------------------------------------------------------------
// Test: legacy `*_image` field names are accepted
// ---------------------------------------------------------------------------

#[tokio::test]
async fn legacy_field_names_are_accepted() {
    let app = common::build_test_app();

    let response = post_multipart(
        app.router,
        ANALYZE,
        &[
            Part::png("pre_op_image", gradient_png()),
            Part::png("during_op_image", png(64, 64, |x, _| (x * 4) as u8)),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["analysis"]["occlusion_score"].is_number());
}

// ---------------------------------------------------------------------------
// Test: missing either image is a 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_during_op_returns_400() {
    let app = common::build_test_app();
    let scans = Arc::clone(&app.scans);

    let response =
        post_multipart(app.router, ANALYZE, &[Part::png("pre_op", gradient_png())]).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
    assert_eq!(json["error"], "Missing required 'during_op' field");
    assert_eq!(scans.count().await, 0);
}

#[tokio::test]
async fn missing_pre_op_returns_400() {
    let app = common::build_test_app();

    let response = post_multipart(
        app.router,
        ANALYZE,
        &[
            Part::png("during_op", gradient_png()),
            Part::text("notes", "ignored"),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Missing required 'pre_op' field");
}

#[tokio::test]
async fn duplicate_field_returns_400() {
    let app = common::build_test_app();

    let response = post_multipart(
        app.router,
        ANALYZE,
        &[
            Part::png("pre_op", gradient_png()),
            Part::png("pre_op_image", gradient_png()),
            Part::png("during_op", gradient_png()),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: non-multipart body is a JSON 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn json_body_returns_400() {
    let app = common::build_test_app();

    let request = Request::builder()
        .method(Method::POST)
        .uri(ANALYZE)
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
}

// ---------------------------------------------------------------------------
// Test: invalid image content
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_image_upload_returns_415() {
    let app = common::build_test_app();

    let response = post_multipart(
        app.router,
        ANALYZE,
        &[
            Part::png("pre_op", b"this is a text file".to_vec()),
            Part::png("during_op", gradient_png()),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNSUPPORTED_MEDIA_TYPE");
}

#[tokio::test]
async fn empty_upload_returns_400() {
    let app = common::build_test_app();

    let response = post_multipart(
        app.router,
        ANALYZE,
        &[
            Part::png("pre_op", gradient_png()),
            Part::png("during_op", Vec::new()),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Test: JPEG and WebP are accepted, GIF is not
// ---------------------------------------------------------------------------

#[tokio::test]
async fn jpeg_and_webp_uploads_are_analyzed() {
    let app = common::build_test_app();

    let response = post_multipart(
        app.router.clone(),
        ANALYZE,
        &[
            Part::file("pre_op", "pre.jpg", "image/jpeg", rgb_image(ImageFormat::Jpeg)),
            Part::file("during_op", "during.webp", "image/webp", rgb_image(ImageFormat::WebP)),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let scan_id = json["scan_id"].as_str().unwrap().to_string();

    let scan = body_json(common::get(app.router, &format!("/api/scans/{scan_id}")).await).await;
    assert_eq!(scan["data"]["pre_op"]["format"], "jpeg");
    assert_eq!(scan["data"]["during_op"]["format"], "webp");
    assert_eq!(scan["data"]["during_op"]["width"], 64);
}

#[tokio::test]
async fn gif_upload_returns_415() {
    let app = common::build_test_app();
    let gif: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\x00\x00\x00\xff\xff\xff\
        ,\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02D\x01\x00;";

    let response = post_multipart(
        app.router,
        ANALYZE,
        &[
            Part::file("pre_op", "pre.gif", "image/gif", gif.to_vec()),
            Part::png("during_op", gradient_png()),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNSUPPORTED_MEDIA_TYPE");
}

// ---------------------------------------------------------------------------
// Test: size limits
// ---------------------------------------------------------------------------

#[tokio::test]
async fn image_over_limit_returns_413() {
    let mut config = common::test_config();
    config.max_image_bytes = 128;
    let app = common::build_test_app_with(
        config,
        Arc::new(occlusmart_core::analysis::BaselineComparisonAnalyzer::default()),
    );

    // Noisy pixels keep the PNG well above 128 bytes while the whole body
    // stays under the route limit.
    let noisy = png(32, 32, |x, y| ((x * 37 + y * 91) ^ (x * y)) as u8);
    assert!(noisy.len() > 128);

    let response = post_multipart(
        app.router,
        ANALYZE,
        &[
            Part::png("pre_op", noisy),
            Part::png("during_op", png(2, 2, |_, _| 0)),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = body_json(response).await;
    assert_eq!(json["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn body_over_route_limit_returns_413() {
    let mut config = common::test_config();
    config.max_image_bytes = 1024;
    let app = common::build_test_app_with(
        config,
        Arc::new(occlusmart_core::analysis::BaselineComparisonAnalyzer::default()),
    );

    // Larger than two images plus form overhead.
    let huge = vec![0u8; 200 * 1024];
    let response = post_multipart(
        app.router,
        ANALYZE,
        &[
            Part::png("pre_op", huge),
            Part::png("during_op", gradient_png()),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = body_json(response).await;
    assert_eq!(json["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn image_over_pixel_limit_returns_413() {
    let app = common::build_test_app();

    // A tiny file whose header claims 60000x60000.
    let huge = png_claiming(png(8, 8, |x, y| (x + y) as u8), 60_000, 60_000);
    assert!(huge.len() < 1024);

    let response = post_multipart(
        app.router.clone(),
        ANALYZE,
        &[
            Part::png("pre_op", huge),
            Part::png("during_op", gradient_png()),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = body_json(response).await;
    assert_eq!(json["code"], "PAYLOAD_TOO_LARGE");
    assert_eq!(app.scans.count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: analyzer failure is a sanitized 500 and records nothing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn analyzer_failure_returns_sanitized_500() {
    let app = common::build_test_app_with(common::test_config(), Arc::new(BrokenAnalyzer));
    let scans = Arc::clone(&app.scans);

    let response = post_multipart(
        app.router,
        ANALYZE,
        &[
            Part::png("pre_op", gradient_png()),
            Part::png("during_op", gradient_png()),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], "ANALYSIS_FAILED");
    assert!(!json["error"].as_str().unwrap().contains("/opt/model.bin"));
    assert_eq!(scans.count().await, 0);
}
