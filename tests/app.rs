use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;

use assert_matches::assert_matches;
use serde_json::json;

use ecopulse::app::AppService;
use ecopulse::config::{Config, ConfigLoader, ResolvedConfig};
use ecopulse::curated::CuratedStore;
use ecopulse::domain::RawFetchResult;
use ecopulse::error::EcoError;
use ecopulse::fetch::FetchClient;
use ecopulse::output::NullSink;
use ecopulse::raw_store::RawStore;
use ecopulse::source::{DataSource, SourceRegistry};
use ecopulse::wikipedia::WikipediaScraper;

fn raw(source: &str, ok: bool, payload: Option<serde_json::Value>) -> RawFetchResult {
    RawFetchResult {
        source: source.to_string(),
        url: "http://example.invalid".to_string(),
        params: Vec::new(),
        status: ok.then_some(200),
        ok,
        error: (!ok).then(|| "connection refused".to_string()),
        duration_ms: 5,
        payload_json: payload,
        payload_text: None,
        fetched_at_utc: "2024-01-01T00:00:00+00:00".to_string(),
    }
}

struct MockEnvSource;

impl DataSource for MockEnvSource {
    fn name(&self) -> &'static str {
        "open-meteo"
    }

    fn fetch(&self) -> Vec<RawFetchResult> {
        vec![
            raw(
                "open-meteo-weather-ams",
                true,
                Some(json!({
                    "hourly": {
                        "time": ["2024-01-01T00:00:00Z"],
                        "temperature_2m": [18.2],
                    }
                })),
            ),
            raw("open-meteo-air-ams", false, None),
        ]
    }
}

struct MockMacroSource;

impl DataSource for MockMacroSource {
    fn name(&self) -> &'static str {
        "worldbank"
    }

    fn fetch(&self) -> Vec<RawFetchResult> {
        vec![raw(
            "worldbank-FP.CPI.TOTL.ZG-NLD",
            true,
            Some(json!([
                {"page": 1},
                [{
                    "countryiso3code": "NLD",
                    "date": "2022",
                    "value": 10.0,
                    "indicator": {"id": "FP.CPI.TOTL.ZG"}
                }]
            ])),
        )]
    }
}

struct BlockingSource {
    entered: Arc<Barrier>,
    release: Arc<Barrier>,
}

impl DataSource for BlockingSource {
    fn name(&self) -> &'static str {
        "blocking"
    }

    fn fetch(&self) -> Vec<RawFetchResult> {
        self.entered.wait();
        self.release.wait();
        Vec::new()
    }
}

fn build_service(dir: &tempfile::TempDir, sources: SourceRegistry) -> (AppService, ResolvedConfig) {
    let config = ConfigLoader::resolve_config(Config {
        data_dir: Some(dir.path().join("data").to_string_lossy().into_owned()),
        ..Config::default()
    })
    .unwrap();
    let raw = RawStore::new(config.data_dir.join("raw"));
    let curated = CuratedStore::open(&config.sqlite_path, &config).unwrap();
    let wikipedia = WikipediaScraper::new(FetchClient::new(1).unwrap(), Vec::new()).unwrap();
    let service = AppService::new(config.clone(), sources, wikipedia, raw, curated);
    (service, config)
}

#[test]
fn fetch_all_lands_raw_and_curates() {
    let dir = tempfile::tempdir().unwrap();
    let (service, config) =
        build_service(&dir, vec![Box::new(MockEnvSource), Box::new(MockMacroSource)]);

    let summary = service.fetch_all(&NullSink).unwrap();

    assert!(summary.raw_store_ok);
    assert_eq!(summary.sources.len(), 3);

    let env_run = &summary.sources[0];
    assert_eq!(env_run.source, "open-meteo");
    assert_eq!(env_run.items, 2, "one result per sub-request, failures included");
    assert_eq!(env_run.curated_rows, 1);
    assert!(!env_run.ok, "a failed sub-request marks the source run failed");

    let macro_run = &summary.sources[1];
    assert!(macro_run.ok);
    assert_eq!(macro_run.curated_rows, 1);

    let landed = fs::read_to_string(config.data_dir.join("raw/raw_fetches.jsonl").as_std_path())
        .unwrap();
    assert_eq!(landed.lines().count(), 3);

    let hours = service.curated().latest_env_hours("ams", 10).unwrap();
    assert_eq!(hours.len(), 1);
    assert_eq!(hours[0].values["temp_c"], 18.2);

    assert_eq!(service.curated().recent_runs(10).unwrap().len(), 1);
    assert_eq!(service.curated().recent_source_runs(10).unwrap().len(), 3);
}

#[test]
fn fetch_all_is_repeatable_without_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _) = build_service(&dir, vec![Box::new(MockEnvSource)]);

    service.fetch_all(&NullSink).unwrap();
    service.fetch_all(&NullSink).unwrap();

    let hours = service.curated().latest_env_hours("ams", 10).unwrap();
    assert_eq!(hours.len(), 1, "re-fetching the same hour upserts, not duplicates");
}

#[test]
fn fetch_all_rejects_reentrant_calls() {
    let dir = tempfile::tempdir().unwrap();
    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let (service, _) = build_service(
        &dir,
        vec![Box::new(BlockingSource {
            entered: entered.clone(),
            release: release.clone(),
        })],
    );
    let service = Arc::new(service);

    let background = {
        let service = service.clone();
        thread::spawn(move || service.fetch_all(&NullSink))
    };

    entered.wait();
    assert!(service.is_fetching());
    assert_matches!(service.fetch_all(&NullSink), Err(EcoError::FetchBusy));
    release.wait();

    let summary = background.join().unwrap().unwrap();
    assert_eq!(summary.sources.len(), 2);
    assert!(!service.is_fetching(), "state returns to Idle after the run");
}

#[test]
fn fetch_all_continues_without_raw_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigLoader::resolve_config(Config {
        data_dir: Some(dir.path().join("data").to_string_lossy().into_owned()),
        ..Config::default()
    })
    .unwrap();
    fs::create_dir_all(config.data_dir.as_std_path()).unwrap();
    fs::write(config.data_dir.join("raw").as_std_path(), b"not a directory").unwrap();

    let raw = RawStore::new(config.data_dir.join("raw"));
    let curated = CuratedStore::open(&config.sqlite_path, &config).unwrap();
    let wikipedia = WikipediaScraper::new(FetchClient::new(1).unwrap(), Vec::new()).unwrap();
    let service = AppService::new(config, vec![Box::new(MockEnvSource)], wikipedia, raw, curated);

    let summary = service.fetch_all(&NullSink).unwrap();
    assert!(!summary.raw_store_ok);
    assert_eq!(summary.sources[0].curated_rows, 1);
    let hours = service.curated().latest_env_hours("ams", 10).unwrap();
    assert_eq!(hours.len(), 1);
}
