use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EcoError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationKey(String);

impl LocationKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LocationKey {
    type Err = EcoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        let is_valid = !normalized.is_empty()
            && normalized.chars().all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit());
        if !is_valid {
            return Err(EcoError::InvalidLocationKey(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub key: LocationKey,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub wikipedia_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorCategory {
    Environment,
    Macro,
}

impl fmt::Display for IndicatorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorCategory::Environment => write!(f, "environment"),
            IndicatorCategory::Macro => write!(f, "macro"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Indicator {
    pub code: String,
    pub name: String,
    pub unit: Option<String>,
    pub category: IndicatorCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFetchResult {
    pub source: String,
    pub url: String,
    pub params: Vec<(String, String)>,
    pub status: Option<u16>,
    pub ok: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub payload_json: Option<Value>,
    pub payload_text: Option<String>,
    pub fetched_at_utc: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub title: String,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub url: String,
    pub ok: bool,
    pub error: Option<String>,
    pub html: Option<String>,
    pub parsed: Option<ScrapedPage>,
    pub fetched_at_utc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvHourlyFact {
    pub location_key: LocationKey,
    pub indicator_code: String,
    pub ts_utc: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroAnnualFact {
    pub region_code: String,
    pub indicator_code: String,
    pub year: i32,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceRunSummary {
    pub source: String,
    pub ok: bool,
    pub items: usize,
    pub curated_rows: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchSummary {
    pub started_at_utc: String,
    pub finished_at_utc: String,
    pub ok: bool,
    pub raw_store_ok: bool,
    pub sources: Vec<SourceRunSummary>,
}

impl FetchSummary {
    pub fn total_items(&self) -> usize {
        self.sources.iter().map(|run| run.items).sum()
    }

    pub fn total_curated_rows(&self) -> usize {
        self.sources.iter().map(|run| run.curated_rows).sum()
    }
}

pub fn parse_env_source_tag(tag: &str) -> Option<(&str, LocationKey)> {
    let mut parts = tag.rsplitn(3, '-');
    let location = parts.next()?;
    let category = parts.next()?;
    let prefix = parts.next()?;
    if prefix != "open-meteo" {
        return None;
    }
    let key = location.parse().ok()?;
    match category {
        "weather" | "air" => Some((category, key)),
        _ => None,
    }
}

pub fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_key_normalizes_and_validates() {
        let key: LocationKey = " AMS ".parse().unwrap();
        assert_eq!(key.as_str(), "ams");
        assert!("a b".parse::<LocationKey>().is_err());
        assert!("".parse::<LocationKey>().is_err());
    }

    #[test]
    fn env_source_tag_roundtrip() {
        let (category, key) = parse_env_source_tag("open-meteo-weather-ams").unwrap();
        assert_eq!(category, "weather");
        assert_eq!(key.as_str(), "ams");

        let (category, key) = parse_env_source_tag("open-meteo-air-nyc").unwrap();
        assert_eq!(category, "air");
        assert_eq!(key.as_str(), "nyc");
    }

    #[test]
    fn env_source_tag_rejects_foreign_tags() {
        assert!(parse_env_source_tag("worldbank-FP.CPI.TOTL.ZG-NLD").is_none());
        assert!(parse_env_source_tag("open-meteo-soil-ams").is_none());
        assert!(parse_env_source_tag("weather-ams").is_none());
    }
}
