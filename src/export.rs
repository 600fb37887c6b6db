use camino::Utf8Path;
use tracing::info;

use crate::curated::CuratedStore;
use crate::error::EcoError;

pub fn export_env_csv(
    store: &CuratedStore,
    location_key: &str,
    path: &Utf8Path,
) -> Result<usize, EcoError> {
    let facts = store.env_facts(location_key)?;
    let mut writer =
        csv::Writer::from_path(path.as_std_path()).map_err(|err| EcoError::Export(err.to_string()))?;
    writer
        .write_record(["location_key", "indicator_code", "ts_utc", "value"])
        .map_err(|err| EcoError::Export(err.to_string()))?;
    for fact in &facts {
        writer
            .write_record([
                fact.location_key.as_str(),
                &fact.indicator_code,
                &fact.ts_utc,
                &fact.value.to_string(),
            ])
            .map_err(|err| EcoError::Export(err.to_string()))?;
    }
    writer
        .flush()
        .map_err(|err| EcoError::Export(err.to_string()))?;
    info!(location = location_key, rows = facts.len(), path = %path, "exported environment facts");
    Ok(facts.len())
}

pub fn export_macro_csv(
    store: &CuratedStore,
    indicator_code: &str,
    path: &Utf8Path,
) -> Result<usize, EcoError> {
    let facts = store.macro_facts(indicator_code)?;
    let mut writer =
        csv::Writer::from_path(path.as_std_path()).map_err(|err| EcoError::Export(err.to_string()))?;
    writer
        .write_record(["region_code", "indicator_code", "year", "value"])
        .map_err(|err| EcoError::Export(err.to_string()))?;
    for fact in &facts {
        let value = fact.value.map(|value| value.to_string()).unwrap_or_default();
        writer
            .write_record([
                &fact.region_code,
                &fact.indicator_code,
                &fact.year.to_string(),
                &value,
            ])
            .map_err(|err| EcoError::Export(err.to_string()))?;
    }
    writer
        .flush()
        .map_err(|err| EcoError::Export(err.to_string()))?;
    info!(indicator = indicator_code, rows = facts.len(), path = %path, "exported macro facts");
    Ok(facts.len())
}
