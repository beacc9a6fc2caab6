//! End-to-end tests against the live extraction service.
//!
//! These tests render real contract PDFs with pdfium and make live Gemini
//! calls. They are gated behind the `E2E_ENABLED` environment variable so
//! they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 GEMINI_API_KEY=... KKS_E2E_PDF=/path/to/kks.pdf \
//!     cargo test --test e2e -- --nocapture

use kks_rekap::{
    resolve_document, ContractType, CsvAggregator, ItemStatus, PdfiumRasterizer, QueueConfig,
    QueueOrchestrator, Rasterizer, RunOutcome,
};
use std::path::PathBuf;

/// Skip unless E2E_ENABLED is set and the sample PDF exists.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let Ok(path) = std::env::var("KKS_E2E_PDF") else {
            println!("SKIP: set KKS_E2E_PDF to a sample contract PDF");
            return;
        };
        let p = PathBuf::from(path);
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn config() -> QueueConfig {
    let mut builder = QueueConfig::builder();
    if let Ok(dir) = std::env::var("PDFIUM_LIB_PATH") {
        builder = builder.pdfium_lib_path(dir);
    }
    builder.build().expect("valid config")
}

#[tokio::test]
async fn e2e_rasterize_sample() {
    let path = e2e_skip_unless_ready!();
    let config = config();
    let doc = resolve_document(path.to_str().unwrap(), 30).await.unwrap();

    let pages = PdfiumRasterizer::new(&config)
        .rasterize(&doc)
        .await
        .expect("rasterize");

    assert!(!pages.is_empty());
    assert!(pages.len() <= config.max_pages);
    for (i, page) in pages.iter().enumerate() {
        assert_eq!(page.page_num, i + 1);
        assert_eq!(page.mime_type, "image/jpeg");
        assert!(page.data.len() > 1000, "page {} looks empty", page.page_num);
    }
}

#[tokio::test]
async fn e2e_extract_and_export() {
    let path = e2e_skip_unless_ready!();
    let Ok(key) = std::env::var("GEMINI_API_KEY") else {
        println!("SKIP: GEMINI_API_KEY not set");
        return;
    };

    let queue = QueueOrchestrator::from_config(&config()).unwrap();
    let doc = resolve_document(path.to_str().unwrap(), 30).await.unwrap();
    queue.enqueue(vec![doc]);

    let outcome = queue.start(&key).await.unwrap();
    println!("{outcome:?}");
    assert!(matches!(outcome, RunOutcome::Completed(_)));

    let items = queue.items();
    assert_eq!(items[0].status, ItemStatus::Done, "error: {:?}", items[0].error);

    let record = &queue.results()[0].extracted_data;
    println!("{}", serde_json::to_string_pretty(record).unwrap());
    assert_ne!(record.contract_type, ContractType::Unknown);
    assert!(!record.pihak1.is_empty());
    assert!(!record.pihak2.is_empty());

    let dir = tempfile::tempdir().unwrap();
    let out = queue.export(&CsvAggregator::new(), dir.path()).unwrap();
    let text = std::fs::read_to_string(out).unwrap();
    assert_eq!(text.lines().count(), 2);
}
