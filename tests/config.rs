use std::fs;

use ecopulse::config::ConfigLoader;

#[test]
fn resolve_reads_explicit_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ecopulse.json");
    fs::write(
        &path,
        r#"{
            "locations": [
                {"key": "ber", "name": "Berlin", "lat": 52.52, "lon": 13.405,
                 "wikipedia_url": "https://en.wikipedia.org/wiki/Berlin"}
            ],
            "refresh_interval_secs": 600,
            "data_dir": "/tmp/ecopulse-test"
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.locations.len(), 1);
    assert_eq!(resolved.locations[0].name, "Berlin");
    assert_eq!(resolved.refresh_interval_secs, 600);
    assert_eq!(resolved.data_dir.as_str(), "/tmp/ecopulse-test");
    assert_eq!(resolved.sqlite_path.as_str(), "/tmp/ecopulse-test/ecopulse.sqlite");
    assert_eq!(resolved.regions.len(), 4);
    assert_eq!(resolved.macro_indicators.len(), 4);
}

#[test]
fn resolve_fails_on_malformed_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ecopulse.json");
    fs::write(&path, "{not json").unwrap();
    assert!(ConfigLoader::resolve(path.to_str()).is_err());
}

#[test]
fn resolve_fails_on_missing_explicit_file() {
    assert!(ConfigLoader::resolve(Some("/nonexistent/ecopulse.json")).is_err());
}
