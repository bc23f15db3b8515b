//! SQLite output store

mod common;

use cohort::store::OutputStore;
use cohort::CohortError;
use common::setup_sqlite_store;

#[tokio::test]
async fn test_read_missing_thread() {
    let (_temp, store) = setup_sqlite_store().await;
    assert!(store.read("404").await.unwrap().is_none());
}

#[tokio::test]
async fn test_updates_require_existing_record() {
    let (_temp, store) = setup_sqlite_store().await;

    let err = store.update_content("1", "text").await.unwrap_err();
    assert!(matches!(err, CohortError::NotFound(_)));

    let err = store.update_chart("1", "data:image/svg+xml;base64,AA==").await.unwrap_err();
    assert!(matches!(err, CohortError::NotFound(_)));
}

#[tokio::test]
async fn test_record_lifecycle() {
    let (_temp, store) = setup_sqlite_store().await;

    store.ensure("12345").await.unwrap();
    let empty = store.read("12345").await.unwrap().unwrap();
    assert_eq!(empty.content, "");
    assert!(empty.chart.is_none());

    let written = store.upsert_content("12345", "# Report").await.unwrap();
    assert_eq!(written.content, "# Report");
    assert_eq!(written.created_at, empty.created_at);

    store.update_content("12345", "# Report\n\nRevised").await.unwrap();
    let charted = store
        .update_chart("12345", "data:image/svg+xml;base64,PHN2Zy8+")
        .await
        .unwrap();
    assert_eq!(charted.content, "# Report\n\nRevised");
    assert_eq!(charted.chart.as_deref(), Some("data:image/svg+xml;base64,PHN2Zy8+"));
    assert!(charted.updated_at >= charted.created_at);
}

#[tokio::test]
async fn test_ensure_keeps_existing_content() {
    let (_temp, store) = setup_sqlite_store().await;

    store.upsert_content("7", "kept").await.unwrap();
    store.ensure("7").await.unwrap();
    assert_eq!(store.read("7").await.unwrap().unwrap().content, "kept");
}

#[tokio::test]
async fn test_threads_are_isolated() {
    let (_temp, store) = setup_sqlite_store().await;

    store.upsert_content("a", "alpha").await.unwrap();
    store.upsert_content("b", "beta").await.unwrap();
    store.update_content("a", "alpha 2").await.unwrap();

    assert_eq!(store.read("a").await.unwrap().unwrap().content, "alpha 2");
    assert_eq!(store.read("b").await.unwrap().unwrap().content, "beta");
}
