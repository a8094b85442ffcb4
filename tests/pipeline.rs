//! End-to-end runs of the extraction pipeline over in-process fakes.

mod common;

use common::*;
use std::sync::Arc;
use tariff_extract::{
    EmptyResultPolicy, ExtractionConfig, ParseMode, StageFailure, TariffError, TariffExtractor,
};

fn write_pdf(dir: &tempfile::TempDir, name: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, PDF_BYTES).unwrap();
    path.to_string_lossy().into_owned()
}

#[tokio::test]
async fn clean_reply_yields_result_and_records() {
    init_tracing();
    let backend = ScriptedBackend::replying(INNER_JSON);
    let ex = extractor(
        ExtractionConfig::default(),
        2,
        ScriptedOcr::texts(&[PAGE_1, PAGE_2]),
        Arc::clone(&backend),
    );

    let output = ex.extract_bytes(PDF_BYTES, Some("Chennai-CFS.pdf")).await.unwrap();

    assert!(output.failure.is_none());
    assert_eq!(output.stats.page_count, 2);
    assert_eq!(output.stats.parse_mode, Some(ParseMode::Strict));
    assert_eq!(output.stats.input_tokens, 1200);
    assert_eq!(output.stats.output_tokens, 340);
    assert_eq!(output.text, format!("{PAGE_1}\n{PAGE_2}").trim());
    assert_eq!(output.stats.text_chars, output.text.chars().count());

    let records = output.result.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].category.as_deref(), Some("Import"));
    assert_eq!(records[0].job_description, "Handling Charge");
    assert_eq!(records[1].category.as_deref(), Some("Export"));

    let prompt = backend.last_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.ends_with(&format!("Data:\n{}", output.text)));
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn prose_wrapped_reply_is_recovered() {
    let reply = format!("Here is the data:\n{INNER_JSON}\nLet me know if you need more.");
    let ex = extractor(
        ExtractionConfig::default(),
        1,
        ScriptedOcr::texts(&[PAGE_1]),
        ScriptedBackend::replying(&reply),
    );

    let recovered = ex.extract_bytes(PDF_BYTES, None).await.unwrap();
    assert!(recovered.failure.is_none());
    assert_eq!(recovered.stats.parse_mode, Some(ParseMode::Recovered));

    let expected: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(INNER_JSON).unwrap();
    assert_eq!(recovered.result.as_map(), &expected);
}

#[tokio::test]
async fn blank_pages_skip_the_model_and_write_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(&dir, "blank.pdf");
    let out_path = dir.path().join("blank.json");

    let backend = ScriptedBackend::replying(INNER_JSON);
    let ex = extractor(
        ExtractionConfig::default(),
        2,
        ScriptedOcr::texts(&["  \n", "\t"]),
        Arc::clone(&backend),
    );

    let (output, written) = ex.extract_to_file(&input, &out_path).await.unwrap();
    assert_eq!(output.failure, Some(StageFailure::EmptyText));
    assert!(output.result.is_empty());
    assert!(!written);
    assert!(!out_path.exists());
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn write_empty_policy_writes_empty_object() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(&dir, "blank.pdf");
    let out_path = dir.path().join("blank.json");

    let config = ExtractionConfig::builder()
        .empty_result(EmptyResultPolicy::WriteEmpty)
        .build()
        .unwrap();
    let ex = extractor(
        config,
        1,
        ScriptedOcr::texts(&[""]),
        ScriptedBackend::replying(INNER_JSON),
    );

    let (_, written) = ex.extract_to_file(&input, &out_path).await.unwrap();
    assert!(written);
    assert_eq!(std::fs::read_to_string(&out_path).unwrap(), "{}\n");
}

#[tokio::test]
async fn reply_without_json_degrades_to_empty() {
    let ex = extractor(
        ExtractionConfig::default(),
        1,
        ScriptedOcr::texts(&[PAGE_1]),
        ScriptedBackend::replying("Sorry, I could not find any tariffs in this text."),
    );

    let output = ex.extract_bytes(PDF_BYTES, None).await.unwrap();
    assert!(output.result.is_empty());
    assert!(matches!(output.failure, Some(StageFailure::ParseFailed { .. })));
    assert_eq!(output.text, PAGE_1.trim());
    assert_eq!(output.stats.parse_mode, None);
}

#[tokio::test]
async fn ocr_error_on_one_page_drops_all_text() {
    let backend = ScriptedBackend::replying(INNER_JSON);
    let ocr = ScriptedOcr {
        pages: vec![
            Ok(PAGE_1.to_string()),
            Err("Tesseract couldn't load any languages!".to_string()),
        ],
    };
    let ex = extractor(ExtractionConfig::default(), 2, ocr, Arc::clone(&backend));

    let output = ex.extract_bytes(PDF_BYTES, None).await.unwrap();
    assert_eq!(output.text, "");
    assert!(output.result.is_empty());
    match output.failure {
        Some(StageFailure::OcrFailed { page, .. }) => assert_eq!(page, 2),
        other => panic!("unexpected failure: {other:?}"),
    }
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn service_error_keeps_the_text() {
    let ex = extractor(
        ExtractionConfig::default(),
        1,
        ScriptedOcr::texts(&[PAGE_1]),
        ScriptedBackend::failing("401 Unauthorized"),
    );

    let output = ex.extract_bytes(PDF_BYTES, None).await.unwrap();
    assert_eq!(
        output.failure,
        Some(StageFailure::ServiceFailed {
            detail: "401 Unauthorized".into()
        })
    );
    assert_eq!(output.text, PAGE_1.trim());
    assert!(output.into_result().is_err());
}

#[tokio::test]
async fn non_pdf_upload_is_rejected_before_rendering() {
    let backend = ScriptedBackend::replying(INNER_JSON);
    let ex = extractor(
        ExtractionConfig::default(),
        1,
        ScriptedOcr::texts(&[PAGE_1]),
        Arc::clone(&backend),
    );

    let err = ex.extract_bytes(b"PK\x03\x04zip", Some("tariff.pdf")).await.unwrap_err();
    assert!(matches!(err, TariffError::NotAPdf { .. }));
    assert!(err.is_client_error());
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn missing_local_file_is_an_error() {
    let ex = extractor(
        ExtractionConfig::default(),
        1,
        ScriptedOcr::texts(&[PAGE_1]),
        ScriptedBackend::replying(INNER_JSON),
    );
    let err = ex.extract("/no/such/dir/tariff.pdf").await.unwrap_err();
    assert!(matches!(err, TariffError::FileNotFound { .. }));
}

#[tokio::test]
async fn render_failure_propagates_and_reports_progress() {
    let progress = Arc::new(RecordingProgress::default());
    let ex = TariffExtractor::new(
        ExtractionConfig::default(),
        Arc::new(FakeRasterizer {
            pages: Err("xref table broken".into()),
        }),
        Arc::new(ScriptedOcr::texts(&[])),
        ScriptedBackend::replying(INNER_JSON),
    )
    .with_progress(progress.clone());

    let err = ex.extract_bytes(PDF_BYTES, None).await.unwrap_err();
    assert!(matches!(err, TariffError::CorruptPdf { .. }));
    assert_eq!(
        *progress.events.lock().unwrap(),
        vec!["start Render", "done Render false"]
    );
}

#[tokio::test]
async fn progress_reports_every_stage_in_order() {
    let progress = Arc::new(RecordingProgress::default());
    let ex = extractor(
        ExtractionConfig::default(),
        2,
        ScriptedOcr::texts(&[PAGE_1, PAGE_2]),
        ScriptedBackend::replying(INNER_JSON),
    )
    .with_progress(progress.clone());

    ex.extract_bytes(PDF_BYTES, None).await.unwrap();
    assert_eq!(
        *progress.events.lock().unwrap(),
        vec![
            "start Render",
            "done Render true",
            "pages 2",
            "start Ocr",
            "done Ocr true",
            "start Request",
            "done Request true",
            "start Parse",
            "done Parse true",
        ]
    );
}

#[tokio::test]
async fn saved_file_matches_returned_result() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(&dir, "Chennai-CFS.pdf");
    let out_path = dir.path().join("Chennai-CFS.json");

    let ex = extractor(
        ExtractionConfig::default(),
        2,
        ScriptedOcr::texts(&[PAGE_1, PAGE_2]),
        ScriptedBackend::replying(INNER_JSON),
    );
    let (output, written) = ex.extract_to_file(&input, &out_path).await.unwrap();
    assert!(written);

    let saved: tariff_extract::ExtractionResult =
        serde_json::from_slice(&std::fs::read(&out_path).unwrap()).unwrap();
    assert_eq!(saved, output.result);
}
