use std::fs;

use camino::Utf8PathBuf;

use ecopulse::config::{Config, ConfigLoader};
use ecopulse::curated::CuratedStore;
use ecopulse::domain::{EnvHourlyFact, MacroAnnualFact};
use ecopulse::export::{export_env_csv, export_macro_csv};

#[test]
fn env_export_writes_natural_key_and_value() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigLoader::resolve_config(Config::default()).unwrap();
    let db = Utf8PathBuf::from_path_buf(dir.path().join("ecopulse.sqlite")).unwrap();
    let store = CuratedStore::open(&db, &config).unwrap();

    store
        .upsert_env_facts(&[
            EnvHourlyFact {
                location_key: "ams".parse().unwrap(),
                indicator_code: "temp_c".to_string(),
                ts_utc: "2024-01-01T00:00:00Z".to_string(),
                value: 18.2,
            },
            EnvHourlyFact {
                location_key: "ams".parse().unwrap(),
                indicator_code: "pm2_5".to_string(),
                ts_utc: "2024-01-01T00:00:00Z".to_string(),
                value: 3.2,
            },
        ])
        .unwrap();

    let out = Utf8PathBuf::from_path_buf(dir.path().join("env.csv")).unwrap();
    let rows = export_env_csv(&store, "ams", &out).unwrap();
    assert_eq!(rows, 2);

    let content = fs::read_to_string(out.as_std_path()).unwrap();
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some("location_key,indicator_code,ts_utc,value"));
    assert_eq!(lines.next(), Some("ams,pm2_5,2024-01-01T00:00:00Z,3.2"));
    assert_eq!(lines.next(), Some("ams,temp_c,2024-01-01T00:00:00Z,18.2"));
}

#[test]
fn macro_export_leaves_null_values_empty() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigLoader::resolve_config(Config::default()).unwrap();
    let db = Utf8PathBuf::from_path_buf(dir.path().join("ecopulse.sqlite")).unwrap();
    let store = CuratedStore::open(&db, &config).unwrap();

    store
        .upsert_macro_facts(&[
            MacroAnnualFact {
                region_code: "NLD".to_string(),
                indicator_code: "FP.CPI.TOTL.ZG".to_string(),
                year: 2021,
                value: Some(2.7),
            },
            MacroAnnualFact {
                region_code: "NLD".to_string(),
                indicator_code: "FP.CPI.TOTL.ZG".to_string(),
                year: 2022,
                value: None,
            },
        ])
        .unwrap();

    let out = Utf8PathBuf::from_path_buf(dir.path().join("macro.csv")).unwrap();
    let rows = export_macro_csv(&store, "FP.CPI.TOTL.ZG", &out).unwrap();
    assert_eq!(rows, 2);

    let content = fs::read_to_string(out.as_std_path()).unwrap();
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some("region_code,indicator_code,year,value"));
    assert_eq!(lines.next(), Some("NLD,FP.CPI.TOTL.ZG,2021,2.7"));
    assert_eq!(lines.next(), Some("NLD,FP.CPI.TOTL.ZG,2022,"));
}
