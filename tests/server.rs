#![cfg(feature = "server")]
//! Router tests for the upload service, driven with `oneshot`.

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use common::*;
use serde_json::Value;
use std::path::PathBuf;
use tariff_extract::server::{create_router, AppState};
use tariff_extract::ExtractionConfig;
use tower::ServiceExt;

const BOUNDARY: &str = "X-TARIFF-BOUNDARY";

fn router(ocr: ScriptedOcr, reply: &str, output_dir: Option<PathBuf>) -> Router {
    let ex = extractor(
        ExtractionConfig::default(),
        ocr.pages.len(),
        ocr,
        ScriptedBackend::replying(reply),
    );
    create_router(AppState::new(ex, output_dir), 1024 * 1024)
}

fn multipart(field: &str, file_name: &str, data: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
Content-Type: application/pdf\r\n\
\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload_pdf")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header("content-length", body.len())
        .body(Body::from(body))
        .expect("Failed to build request")
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.expect("Request failed");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 1_000_000)
        .await
        .expect("Failed to read body");
    let value = serde_json::from_slice(&bytes).expect("Response JSON parse failed");
    (status, value)
}

#[tokio::test]
async fn upload_returns_extracted_json_and_saves_it() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(
        ScriptedOcr::texts(&[PAGE_1, PAGE_2]),
        INNER_JSON,
        Some(dir.path().to_path_buf()),
    );

    let (status, body) = send(app, multipart("file", "Chennai-CFS.pdf", PDF_BYTES)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Processing complete");
    assert_eq!(body["json_data"]["Import"][0]["job_description"], "Handling Charge");

    let saved: Value =
        serde_json::from_slice(&std::fs::read(dir.path().join("Chennai-CFS.pdf.json")).unwrap())
            .unwrap();
    assert_eq!(saved, body["json_data"]);
}

#[tokio::test]
async fn prose_wrapped_reply_still_succeeds() {
    let reply = format!("Sure! Here you go:\n```json\n{INNER_JSON}\n```");
    let app = router(ScriptedOcr::texts(&[PAGE_1]), &reply, None);

    let (status, body) = send(app, multipart("file", "t.pdf", PDF_BYTES)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["json_data"]["Export"][0]["20ft_charges"], 3000);
}

#[tokio::test]
async fn missing_file_field_is_bad_request() {
    let app = router(ScriptedOcr::texts(&[PAGE_1]), INNER_JSON, None);

    let (status, body) = send(app, multipart("document", "t.pdf", PDF_BYTES)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "missing_file");
}

#[tokio::test]
async fn non_pdf_upload_is_bad_request() {
    let app = router(ScriptedOcr::texts(&[PAGE_1]), INNER_JSON, None);

    let (status, body) = send(app, multipart("file", "notes.pdf", b"hello, not a pdf")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "not_a_pdf");
}

#[tokio::test]
async fn blank_document_is_unprocessable() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(
        ScriptedOcr::texts(&["", "   "]),
        INNER_JSON,
        Some(dir.path().to_path_buf()),
    );

    let (status, body) = send(app, multipart("file", "blank.pdf", PDF_BYTES)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "empty_text");
    assert!(!dir.path().join("blank.pdf.json").exists());
}

#[tokio::test]
async fn unparseable_reply_is_server_error() {
    let app = router(
        ScriptedOcr::texts(&[PAGE_1]),
        "I'm sorry, the document does not contain tariff data.",
        None,
    );

    let (status, body) = send(app, multipart("file", "t.pdf", PDF_BYTES)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "parse_failed");
    assert!(body["error"].as_str().unwrap().contains("JSON"));
}

#[tokio::test]
async fn upload_path_components_are_stripped_from_saved_name() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(
        ScriptedOcr::texts(&[PAGE_1]),
        INNER_JSON,
        Some(dir.path().to_path_buf()),
    );

    let (status, _) = send(app, multipart("file", "../../etc/cfs.pdf", PDF_BYTES)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(dir.path().join("cfs.pdf.json").exists());
}

#[tokio::test]
async fn health_reports_version() {
    let app = router(ScriptedOcr::texts(&[]), INNER_JSON, None);
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn oversized_upload_gets_json_413() {
    let ex = extractor(
        ExtractionConfig::default(),
        1,
        ScriptedOcr::texts(&[PAGE_1]),
        ScriptedBackend::replying(INNER_JSON),
    );
    let app = create_router(AppState::new(ex, None), 1024);

    let mut big = PDF_BYTES.to_vec();
    big.resize(8 * 1024, b' ');
    let (status, body) = send(app, multipart("file", "big.pdf", &big)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["kind"], "upload_too_large");
    assert!(body["error"].is_string());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_uploads_with_one_name_all_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(
        ScriptedOcr::texts(&[PAGE_1, PAGE_2]),
        INNER_JSON,
        Some(dir.path().to_path_buf()),
    );

    let requests: Vec<_> = (0..32)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move {
                send(app, multipart("file", "Chennai-CFS.pdf", PDF_BYTES)).await
            })
        })
        .collect();

    for request in requests {
        let (status, body) = request.await.unwrap();
        assert_eq!(status, StatusCode::OK, "body: {body}");
    }

    let saved: Value =
        serde_json::from_slice(&std::fs::read(dir.path().join("Chennai-CFS.pdf.json")).unwrap())
            .unwrap();
    assert_eq!(saved["Import"][0]["job_description"], "Handling Charge");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}
