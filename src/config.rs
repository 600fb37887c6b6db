use std::env;
use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::domain::{Indicator, IndicatorCategory, Location, Region};
use crate::error::EcoError;

pub const USER_AGENT: &str = concat!("ecopulse/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub locations: Option<Vec<LocationEntry>>,
    #[serde(default)]
    pub regions: Option<Vec<RegionEntry>>,
    #[serde(default)]
    pub macro_indicators: Option<Vec<IndicatorEntry>>,
    #[serde(default)]
    pub refresh_interval_secs: Option<u64>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub data_dir: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LocationEntry {
    pub key: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub wikipedia_url: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RegionEntry {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct IndicatorEntry {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub locations: Vec<Location>,
    pub regions: Vec<Region>,
    pub env_indicators: Vec<Indicator>,
    pub macro_indicators: Vec<Indicator>,
    pub refresh_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub data_dir: Utf8PathBuf,
    pub sqlite_path: Utf8PathBuf,
}

impl ResolvedConfig {
    pub fn location(&self, key: &str) -> Option<&Location> {
        self.locations.iter().find(|loc| loc.key.as_str() == key)
    }

    pub fn macro_indicator(&self, code: &str) -> Option<&Indicator> {
        self.macro_indicators.iter().find(|ind| ind.code == code)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, EcoError> {
        let config_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => {
                let default = PathBuf::from("ecopulse.json");
                default.exists().then_some(default)
            }
        };

        let config = match config_path {
            Some(config_path) => {
                let content = fs::read_to_string(&config_path)
                    .map_err(|_| EcoError::ConfigRead(config_path.clone()))?;
                serde_json::from_str(&content)
                    .map_err(|err| EcoError::ConfigParse(err.to_string()))?
            }
            None => Config::default(),
        };

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, EcoError> {
        let locations = config
            .locations
            .unwrap_or_else(default_location_entries)
            .into_iter()
            .map(|entry| {
                Ok(Location {
                    key: entry.key.parse()?,
                    name: entry.name,
                    lat: entry.lat,
                    lon: entry.lon,
                    wikipedia_url: entry.wikipedia_url,
                })
            })
            .collect::<Result<Vec<_>, EcoError>>()?;

        let regions = match config.regions {
            Some(entries) => entries
                .into_iter()
                .map(|entry| Region {
                    code: entry.code,
                    name: entry.name,
                })
                .collect(),
            None => default_regions(),
        };

        let macro_indicators = match config.macro_indicators {
            Some(entries) => entries
                .into_iter()
                .map(|entry| Indicator {
                    code: entry.code,
                    name: entry.name,
                    unit: entry.unit,
                    category: IndicatorCategory::Macro,
                })
                .collect(),
            None => default_macro_indicators(),
        };

        let refresh_interval_secs = env_override("ECOPULSE_REFRESH_INTERVAL")
            .or(config.refresh_interval_secs)
            .unwrap_or(3600);
        let request_timeout_secs = env_override("ECOPULSE_REQUEST_TIMEOUT")
            .or(config.request_timeout_secs)
            .unwrap_or(10);

        let data_dir = match env::var("ECOPULSE_DATA_DIR").ok().or(config.data_dir) {
            Some(dir) => Utf8PathBuf::from(dir),
            None => default_data_dir()?,
        };
        let sqlite_path = data_dir.join("ecopulse.sqlite");

        Ok(ResolvedConfig {
            locations,
            regions,
            env_indicators: env_indicators(),
            macro_indicators,
            refresh_interval_secs,
            request_timeout_secs,
            data_dir,
            sqlite_path,
        })
    }
}

fn env_override(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|value| value.parse().ok())
}

fn default_data_dir() -> Result<Utf8PathBuf, EcoError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.home_dir().join(".local/share/ecopulse")).ok()
        })
        .ok_or_else(|| EcoError::Filesystem("unable to resolve data directory".to_string()))
}

fn default_location_entries() -> Vec<LocationEntry> {
    [
        ("ams", "Amsterdam", 52.3676, 4.9041, "https://en.wikipedia.org/wiki/Amsterdam"),
        ("bru", "Brussels", 50.8503, 4.3517, "https://en.wikipedia.org/wiki/Brussels"),
        ("nyc", "New York City", 40.7128, -74.0060, "https://en.wikipedia.org/wiki/New_York_City"),
    ]
    .into_iter()
    .map(|(key, name, lat, lon, url)| LocationEntry {
        key: key.to_string(),
        name: name.to_string(),
        lat,
        lon,
        wikipedia_url: url.to_string(),
    })
    .collect()
}

fn default_regions() -> Vec<Region> {
    [
        ("NLD", "Netherlands"),
        ("EUU", "European Union"),
        ("USA", "United States"),
        ("WLD", "World"),
    ]
    .into_iter()
    .map(|(code, name)| Region {
        code: code.to_string(),
        name: name.to_string(),
    })
    .collect()
}

fn default_macro_indicators() -> Vec<Indicator> {
    [
        ("FP.CPI.TOTL.ZG", "Inflation (annual %)"),
        ("SL.UEM.TOTL.ZS", "Unemployment (annual %)"),
        ("NY.GDP.MKTP.KD.ZG", "GDP growth (annual %)"),
        ("EN.ATM.CO2E.PC", "CO2 emissions (metric tons per capita)"),
    ]
    .into_iter()
    .map(|(code, name)| Indicator {
        code: code.to_string(),
        name: name.to_string(),
        unit: None,
        category: IndicatorCategory::Macro,
    })
    .collect()
}

pub fn env_indicators() -> Vec<Indicator> {
    [
        ("temp_c", "Temperature", Some("°C")),
        ("wind_kph", "Wind speed", Some("km/h")),
        ("precip_mm", "Precipitation", Some("mm")),
        ("pm2_5", "PM2.5", Some("µg/m³")),
        ("pm10", "PM10", Some("µg/m³")),
        ("european_aqi", "European AQI", None),
        ("us_aqi", "US AQI", None),
    ]
    .into_iter()
    .map(|(code, name, unit)| Indicator {
        code: code.to_string(),
        name: name.to_string(),
        unit: unit.map(str::to_string),
        category: IndicatorCategory::Environment,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_all_dimensions() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.locations.len(), 3);
        assert_eq!(resolved.regions.len(), 4);
        assert_eq!(resolved.macro_indicators.len(), 4);
        assert_eq!(resolved.env_indicators.len(), 7);
        assert_eq!(resolved.refresh_interval_secs, 3600);
    }

    #[test]
    fn config_file_overrides_locations() {
        let config = Config {
            locations: Some(vec![LocationEntry {
                key: "ber".to_string(),
                name: "Berlin".to_string(),
                lat: 52.52,
                lon: 13.405,
                wikipedia_url: "https://en.wikipedia.org/wiki/Berlin".to_string(),
            }]),
            ..Config::default()
        };
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.locations.len(), 1);
        assert_eq!(resolved.locations[0].key.as_str(), "ber");
    }

    #[test]
    fn invalid_location_key_is_rejected() {
        let config = Config {
            locations: Some(vec![LocationEntry {
                key: "New York".to_string(),
                name: "New York City".to_string(),
                lat: 40.7128,
                lon: -74.0060,
                wikipedia_url: String::new(),
            }]),
            ..Config::default()
        };
        assert!(ConfigLoader::resolve_config(config).is_err());
    }
}
