//! Upload service tests through the router.

use std::time::Duration;

use axum::body::Body;
use axum::Router;
use http::{Request, StatusCode};
use http_body_util::BodyExt;
use image::Rgb;
use tower::ServiceExt;

use wsi_dzi::server::{create_router, AppState, RouterConfig};

use super::test_utils::{LevelLayout, SlideBuilder};

const BOUNDARY: &str = "wsi-dzi-test-boundary";

fn router(data_dir: &std::path::Path) -> Router {
    create_router(
        AppState::new(data_dir),
        RouterConfig::default().with_tracing(false),
    )
}

fn multipart_body(field: &str, filename: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn send_json(router: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let (status, body) = send(router, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let (status, json) = send_json(router(dir.path()), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["message"], "WSI Backend is running");
}

#[tokio::test]
async fn test_slides_empty_without_directory() {
    let dir = tempfile::tempdir().unwrap();
    let (status, json) = send_json(router(dir.path()), get("/slides")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["slides"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_upload_without_file() {
    let dir = tempfile::tempdir().unwrap();
    let body = multipart_body("other", "slide.svs", b"data");
    let (status, json) = send_json(router(dir.path()), upload_request(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No file uploaded");
}

#[tokio::test]
async fn test_upload_rejects_extension() {
    let dir = tempfile::tempdir().unwrap();
    let body = multipart_body("file", "notes.txt", b"data");
    let (status, json) = send_json(router(dir.path()), upload_request(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid file type. Allowed: .svs"));
    assert!(!dir.path().join("uploads").exists());
}

#[tokio::test]
async fn test_upload_bad_slide_is_cleaned_up() {
    let dir = tempfile::tempdir().unwrap();
    let body = multipart_body("file", "broken.svs", b"not a tiff at all");
    let (status, json) = send_json(router(dir.path()), upload_request(body)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Failed to process file");
    assert!(json["message"].as_str().unwrap().contains("not a TIFF"));

    let uploads = std::fs::read_dir(dir.path().join("uploads")).unwrap().count();
    assert_eq!(uploads, 0);
}

#[tokio::test]
async fn test_upload_converts_and_serves() {
    let dir = tempfile::tempdir().unwrap();
    let slide = SlideBuilder::generic().build();
    let size = slide.len() as u64;
    let body = multipart_body("file", "My Scan.tif", &slide);

    let (status, json) = send_json(router(dir.path()), upload_request(body)).await;
    assert_eq!(status, StatusCode::OK, "{}", json);
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "File uploaded and converted successfully");
    assert_eq!(json["filename"], "My Scan.tif");
    assert_eq!(json["size"], size);

    let dzi_url = json["dziUrl"].as_str().unwrap().to_string();
    assert!(dzi_url.starts_with("/slides/slide_"));
    assert!(dzi_url.ends_with(".dzi"));

    // Upload removed after conversion
    let uploads = std::fs::read_dir(dir.path().join("uploads")).unwrap().count();
    assert_eq!(uploads, 0);

    // Listed
    let (_, listing) = send_json(router(dir.path()), get("/slides")).await;
    let slides = listing["slides"].as_array().unwrap();
    assert_eq!(slides.len(), 1);
    assert_eq!(slides[0]["url"], dzi_url.as_str());
    assert!(slides[0]["name"].as_str().unwrap().ends_with(".dzi"));

    // Descriptor served
    let (status, body) = send(router(dir.path()), get(&dzi_url)).await;
    assert_eq!(status, StatusCode::OK);
    let xml = String::from_utf8(body).unwrap();
    assert!(xml.contains("Width=\"600\""));

    // Tile served
    let stem = dzi_url.trim_end_matches(".dzi");
    let (status, body) = send(router(dir.path()), get(&format!("{}_files/0/0_0.jpeg", stem))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[0..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn test_missing_static_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("public/slides")).unwrap();
    let (status, _) = send(router(dir.path()), get("/slides/none.dzi")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_over_limit() {
    let dir = tempfile::tempdir().unwrap();
    let router = create_router(
        AppState::new(dir.path()),
        RouterConfig::default()
            .with_tracing(false)
            .with_max_upload_size(64),
    );

    let body = multipart_body("file", "big.svs", &[0u8; 4096]);
    let (status, _) = send(router, upload_request(body)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_urls_use_request_host() {
    let dir = tempfile::tempdir().unwrap();
    let body = multipart_body("file", "scan.tif", &SlideBuilder::generic().build());
    let mut request = upload_request(body);
    request
        .headers_mut()
        .insert("host", "slides.example.org:3001".parse().unwrap());

    let (status, json) = send_json(router(dir.path()), request).await;
    assert_eq!(status, StatusCode::OK, "{}", json);
    let dzi_url = json["dziUrl"].as_str().unwrap();
    assert!(
        dzi_url.starts_with("http://slides.example.org:3001/slides/slide_"),
        "{}",
        dzi_url
    );

    let listing = Request::builder()
        .uri("/slides")
        .header("host", "slides.example.org:3001")
        .body(Body::empty())
        .unwrap();
    let (_, json) = send_json(router(dir.path()), listing).await;
    assert_eq!(json["slides"][0]["url"], dzi_url);
}

#[tokio::test]
async fn test_dropped_upload_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let color = Rgb([120, 60, 160]);
    let slide = SlideBuilder::new()
        .level(LevelLayout::new(4096, 4096, 256, color))
        .level(LevelLayout::new(1024, 1024, 256, color))
        .build();
    let body = multipart_body("file", "big.tif", &slide);

    let outcome = tokio::time::timeout(
        Duration::from_millis(300),
        send(router(dir.path()), upload_request(body)),
    )
    .await;

    let uploads_dir = dir.path().join("uploads");
    if uploads_dir.exists() {
        let left: Vec<_> = std::fs::read_dir(&uploads_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert!(left.is_empty(), "staged uploads left: {:?}", left);
    }

    let slides_dir = dir.path().join("public/slides");
    if outcome.is_err() && slides_dir.exists() {
        let left: Vec<_> = std::fs::read_dir(&slides_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert!(left.is_empty(), "partial output left: {:?}", left);
    }
}
