use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use kmz_processor::config::AppConfig;
use kmz_processor::{AppState, create_app};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "---------------------------123456789012345678901234567";

fn multipart_body(parts: &[(&str, &str, &[u8])]) -> String {
    let mut body = String::new();
    for (field, filename, content) in parts {
        body.push_str(&format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        ));
        body.push_str(std::str::from_utf8(content).unwrap());
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body
}

fn post_process(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/process")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// App wired to throwaway asset/work dirs with a sh stub standing in for the
/// transform program
fn test_app(assets: &Path, work: &Path, script: &str) -> Router {
    let default = AppConfig::default();
    std::fs::write(assets.join(&default.transform_script), script).unwrap();
    let config = AppConfig {
        assets_dir: assets.to_path_buf(),
        work_root: work.to_path_buf(),
        transform_interpreter: "sh".to_string(),
        ..default
    };
    create_app(AppState {
        config: Arc::new(config),
    })
}

fn seed_reference(assets: &Path) {
    std::fs::write(assets.join("DATABASE.kmz"), b"reference bytes").unwrap();
}

async fn detail_of(response: axum::response::Response) -> String {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    json["detail"].as_str().unwrap().to_string()
}

fn workspace_count(work: &Path) -> usize {
    std::fs::read_dir(work).unwrap().count()
}

#[tokio::test]
async fn test_health() {
    let assets = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let app = test_app(assets.path(), work.path(), "exit 0\n");

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn test_preflight_on_process_and_unknown_paths() {
    let assets = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let app = test_app(assets.path(), work.path(), "exit 0\n");

    for uri in ["/process", "/anything/else"] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri(uri)
                    .header("Origin", "https://example.github.io")
                    .header("Access-Control-Request-Method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT, "{uri}");
    }
}

#[tokio::test]
async fn test_missing_file_field_is_400_and_no_workspace() {
    let assets = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let app = test_app(assets.path(), work.path(), "exit 0\n");

    let body = multipart_body(&[("unrelated", "sample.kmz", b"PK")]);
    let response = app.oneshot(post_process(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let detail = detail_of(response).await;
    assert!(detail.contains("test_kmz"));
    assert!(detail.contains("file"));
    assert_eq!(workspace_count(work.path()), 0);
}

#[tokio::test]
async fn test_disallowed_extension_is_400() {
    let assets = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let app = test_app(assets.path(), work.path(), "exit 0\n");

    let body = multipart_body(&[("test_kmz", "notes.txt", b"hello")]);
    let response = app.oneshot(post_process(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(detail_of(response).await, "Upload a valid .kmz or .kml file.");
    assert_eq!(workspace_count(work.path()), 0);
}

#[tokio::test]
async fn test_successful_processing_returns_artifact() {
    let assets = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    seed_reference(assets.path());
    let app = test_app(
        assets.path(),
        work.path(),
        "cat 'Transmission Network.kmz' TEST.kmz > Exportado.kmz\n",
    );

    let body = multipart_body(&[("test_kmz", "sample.kmz", b"uploaded")]);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/process")
                .header("Origin", "https://example.github.io")
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/vnd.google-earth.kmz"
    );

    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"Exportado_"));
    assert!(disposition.ends_with(".kmz\""));
    let suffix = disposition
        .trim_start_matches("attachment; filename=\"Exportado_")
        .trim_end_matches(".kmz\"");
    assert_eq!(suffix.len(), 6);
    assert!(
        suffix
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
    );

    // Content-Disposition must be readable by cross-origin scripts
    let exposed = response.headers()[header::ACCESS_CONTROL_EXPOSE_HEADERS]
        .to_str()
        .unwrap()
        .to_lowercase();
    assert!(exposed.contains("content-disposition"));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"reference bytesuploaded");
    assert_eq!(workspace_count(work.path()), 0);
}

#[tokio::test]
async fn test_two_successes_get_distinct_download_names() {
    let assets = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    seed_reference(assets.path());
    let app = test_app(assets.path(), work.path(), "cp TEST.kmz Exportado.kmz\n");

    let mut names = Vec::new();
    for _ in 0..2 {
        let body = multipart_body(&[("test_kmz", "sample.kmz", b"x")]);
        let response = app.clone().oneshot(post_process(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        names.push(
            response.headers()[header::CONTENT_DISPOSITION]
                .to_str()
                .unwrap()
                .to_string(),
        );
    }
    assert_ne!(names[0], names[1]);
}

#[tokio::test]
async fn test_legacy_field_alias_accepted_and_priority_wins() {
    let assets = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    seed_reference(assets.path());
    let app = test_app(assets.path(), work.path(), "cp TEST.kmz Exportado.kmz\n");

    // legacy alias alone works
    let body = multipart_body(&[("file", "legacy.kml", b"legacy payload")]);
    let response = app.clone().oneshot(post_process(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // when both are supplied, the primary field wins even if it arrives last
    let body = multipart_body(&[
        ("file", "legacy.kmz", b"from legacy"),
        ("test_kmz", "primary.kmz", b"from primary"),
    ]);
    let response = app.clone().oneshot(post_process(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let returned = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&returned[..], b"from primary");
}

#[tokio::test]
async fn test_missing_reference_dataset_is_500_listing_candidates() {
    let assets = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    std::fs::write(assets.path().join("README.txt"), b"not a dataset").unwrap();
    let app = test_app(assets.path(), work.path(), "exit 0\n");

    let body = multipart_body(&[("test_kmz", "sample.kmz", b"PK")]);
    let response = app.oneshot(post_process(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let detail = detail_of(response).await;
    for candidate in ["DATABASE.kmz", "Database.kmz", "Transmission Network.kmz"] {
        assert!(detail.contains(candidate), "missing {candidate} in {detail}");
    }
    assert!(detail.contains("README.txt"));
    assert_eq!(workspace_count(work.path()), 0);
}

#[tokio::test]
async fn test_transform_failure_surfaces_diagnostics() {
    let assets = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    seed_reference(assets.path());
    let app = test_app(
        assets.path(),
        work.path(),
        "echo 'invalid geometry at node 42' >&2\nexit 1\n",
    );

    let body = multipart_body(&[("test_kmz", "sample.kmz", b"PK")]);
    let response = app.oneshot(post_process(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let detail = detail_of(response).await;
    assert!(detail.contains("invalid geometry at node 42"));
    assert_eq!(workspace_count(work.path()), 0);
}

#[tokio::test]
async fn test_zero_exit_without_artifact_is_500() {
    let assets = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    seed_reference(assets.path());
    let app = test_app(assets.path(), work.path(), "exit 0\n");

    let body = multipart_body(&[("test_kmz", "sample.kmz", b"PK")]);
    let response = app.oneshot(post_process(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(detail_of(response).await.contains("Exportado.kmz"));
    assert_eq!(workspace_count(work.path()), 0);
}

#[tokio::test]
async fn test_concurrent_uploads_stay_isolated() {
    let assets = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    seed_reference(assets.path());
    // a brief sleep widens the window in which requests overlap
    let app = test_app(
        assets.path(),
        work.path(),
        "sleep 0.1\ncp TEST.kmz Exportado.kmz\n",
    );

    let mut handles = Vec::new();
    for i in 0..6 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let payload = format!("payload-{i}");
            let body = multipart_body(&[("test_kmz", "sample.kmz", payload.as_bytes())]);
            let response = app.oneshot(post_process(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let returned = response.into_body().collect().await.unwrap().to_bytes();
            (payload, returned)
        }));
    }
    for handle in handles {
        let (sent, received) = handle.await.unwrap();
        assert_eq!(sent.as_bytes(), &received[..]);
    }
    assert_eq!(workspace_count(work.path()), 0);
}
