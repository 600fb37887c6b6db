use std::fs;

use camino::Utf8PathBuf;
use serde_json::json;

use ecopulse::domain::{RawFetchResult, ScrapeResult, ScrapedPage};
use ecopulse::raw_store::RawStore;

fn fetch_doc(source: &str) -> RawFetchResult {
    RawFetchResult {
        source: source.to_string(),
        url: "http://example.invalid".to_string(),
        params: vec![("format".to_string(), "json".to_string())],
        status: Some(200),
        ok: true,
        error: None,
        duration_ms: 42,
        payload_json: Some(json!({"hello": "world"})),
        payload_text: Some("{\"hello\":\"world\"}".to_string()),
        fetched_at_utc: "2024-01-01T00:00:00+00:00".to_string(),
    }
}

#[test]
fn appends_are_cumulative_and_never_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().join("raw")).unwrap();
    let store = RawStore::new(root.clone());

    store.log_fetches(&[fetch_doc("a"), fetch_doc("b")]).unwrap();
    let first = fs::read_to_string(root.join("raw_fetches.jsonl").as_std_path()).unwrap();
    assert_eq!(first.lines().count(), 2);

    store.log_fetches(&[fetch_doc("c")]).unwrap();
    let second = fs::read_to_string(root.join("raw_fetches.jsonl").as_std_path()).unwrap();
    assert_eq!(second.lines().count(), 3);
    assert!(
        second.starts_with(&first),
        "existing documents must remain untouched"
    );

    let doc: RawFetchResult = serde_json::from_str(second.lines().next().unwrap()).unwrap();
    assert_eq!(doc.source, "a");
}

#[test]
fn scrapes_land_in_their_own_collection() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().join("raw")).unwrap();
    let store = RawStore::new(root.clone());

    store
        .log_scrapes(&[ScrapeResult {
            url: "https://en.wikipedia.org/wiki/Amsterdam".to_string(),
            ok: true,
            error: None,
            html: Some("<h1>Amsterdam</h1>".to_string()),
            parsed: Some(ScrapedPage {
                title: "Amsterdam".to_string(),
                summary: "Capital of the Netherlands.".to_string(),
            }),
            fetched_at_utc: "2024-01-01T00:00:00+00:00".to_string(),
        }])
        .unwrap();

    assert!(root.join("scraped_pages.jsonl").as_std_path().exists());
    assert!(!root.join("raw_fetches.jsonl").as_std_path().exists());
}

#[test]
fn health_check_reflects_writability() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().join("raw")).unwrap();
    let store = RawStore::new(root);
    assert!(store.health_check());

    let blocked = Utf8PathBuf::from_path_buf(dir.path().join("blocked")).unwrap();
    fs::write(blocked.as_std_path(), b"file").unwrap();
    let store = RawStore::new(blocked);
    assert!(!store.health_check());
}
