use serde_json::Value;
use tracing::debug;

use crate::domain::{EnvHourlyFact, MacroAnnualFact, RawFetchResult, parse_env_source_tag};

const ENV_METRICS: &[(&str, &str)] = &[
    ("temperature_2m", "temp_c"),
    ("wind_speed_10m", "wind_kph"),
    ("precipitation", "precip_mm"),
    ("pm2_5", "pm2_5"),
    ("pm10", "pm10"),
    ("european_aqi", "european_aqi"),
    ("us_aqi", "us_aqi"),
];

pub fn transform_env(raw: &RawFetchResult) -> Vec<EnvHourlyFact> {
    let Some((_, location_key)) = parse_env_source_tag(&raw.source) else {
        return Vec::new();
    };
    if !raw.ok {
        return Vec::new();
    }
    let Some(hourly) = raw.payload_json.as_ref().and_then(|payload| payload.get("hourly")) else {
        debug!(source = %raw.source, "payload missing hourly block, skipping");
        return Vec::new();
    };
    let Some(times) = hourly.get("time").and_then(Value::as_array) else {
        debug!(source = %raw.source, "payload missing time axis, skipping");
        return Vec::new();
    };

    let mut facts = Vec::new();
    for (field, indicator_code) in ENV_METRICS {
        let Some(values) = hourly.get(*field).and_then(Value::as_array) else {
            continue;
        };
        for (idx, ts) in times.iter().enumerate() {
            let Some(ts_utc) = ts.as_str() else {
                continue;
            };
            let Some(value) = values.get(idx).and_then(Value::as_f64) else {
                continue;
            };
            facts.push(EnvHourlyFact {
                location_key: location_key.clone(),
                indicator_code: (*indicator_code).to_string(),
                ts_utc: ts_utc.to_string(),
                value,
            });
        }
    }
    facts
}

pub fn transform_macro(raw: &RawFetchResult) -> Vec<MacroAnnualFact> {
    if !raw.ok {
        return Vec::new();
    }
    let Some(payload) = raw.payload_json.as_ref().and_then(Value::as_array) else {
        return Vec::new();
    };
    let Some(entries) = payload.get(1).and_then(Value::as_array) else {
        debug!(source = %raw.source, "payload missing data page, skipping");
        return Vec::new();
    };

    let mut facts = Vec::new();
    for entry in entries {
        let Some(region_code) = entry
            .get("countryiso3code")
            .and_then(Value::as_str)
            .filter(|code| !code.is_empty())
        else {
            continue;
        };
        let Some(indicator_code) = entry
            .get("indicator")
            .and_then(|indicator| indicator.get("id"))
            .and_then(Value::as_str)
        else {
            continue;
        };
        let Some(year) = entry
            .get("date")
            .and_then(Value::as_str)
            .and_then(|date| date.parse::<i32>().ok())
        else {
            continue;
        };
        let value = entry.get("value").and_then(Value::as_f64);
        facts.push(MacroAnnualFact {
            region_code: region_code.to_string(),
            indicator_code: indicator_code.to_string(),
            year,
            value,
        });
    }
    facts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(source: &str, payload: serde_json::Value) -> RawFetchResult {
        RawFetchResult {
            source: source.to_string(),
            url: String::new(),
            params: Vec::new(),
            status: Some(200),
            ok: true,
            error: None,
            duration_ms: 12,
            payload_json: Some(payload),
            payload_text: None,
            fetched_at_utc: "2024-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn weather_payload_maps_to_indicator_rows() {
        let payload = json!({
            "hourly": {
                "time": ["2024-01-01T00:00", "2024-01-01T01:00"],
                "temperature_2m": [18.2, 17.9],
                "wind_speed_10m": [12.0, null],
            }
        });
        let facts = transform_env(&raw("open-meteo-weather-ams", payload));

        assert_eq!(facts.len(), 3);
        assert!(facts.iter().all(|fact| fact.location_key.as_str() == "ams"));
        let temp = facts
            .iter()
            .find(|fact| fact.indicator_code == "temp_c" && fact.ts_utc == "2024-01-01T00:00")
            .unwrap();
        assert_eq!(temp.value, 18.2);
        assert_eq!(
            facts.iter().filter(|fact| fact.indicator_code == "wind_kph").count(),
            1
        );
    }

    #[test]
    fn air_payload_uses_same_hour_axis() {
        let payload = json!({
            "hourly": {
                "time": ["2024-01-01T00:00"],
                "pm2_5": [3.2],
                "pm10": [4.1],
                "european_aqi": [51.0],
                "us_aqi": [48.0],
            }
        });
        let facts = transform_env(&raw("open-meteo-air-ams", payload));
        assert_eq!(facts.len(), 4);
        assert!(facts.iter().all(|fact| fact.ts_utc == "2024-01-01T00:00"));
    }

    #[test]
    fn malformed_env_payload_yields_empty() {
        let missing_hourly = raw("open-meteo-weather-ams", json!({"latitude": 52.3}));
        assert!(transform_env(&missing_hourly).is_empty());

        let missing_time = raw(
            "open-meteo-weather-ams",
            json!({"hourly": {"temperature_2m": [1.0]}}),
        );
        assert!(transform_env(&missing_time).is_empty());

        let mut failed = raw("open-meteo-weather-ams", json!({}));
        failed.ok = false;
        assert!(transform_env(&failed).is_empty());
    }

    #[test]
    fn foreign_source_tag_yields_empty() {
        let payload = json!({"hourly": {"time": ["2024-01-01T00:00"], "temperature_2m": [1.0]}});
        assert!(transform_env(&raw("worldbank-FP.CPI.TOTL.ZG-NLD", payload)).is_empty());
    }

    #[test]
    fn worldbank_payload_maps_to_annual_rows() {
        let payload = json!([
            {"page": 1, "pages": 1},
            [
                {
                    "countryiso3code": "NLD",
                    "date": "2022",
                    "value": 10.0,
                    "indicator": {"id": "FP.CPI.TOTL.ZG", "value": "Inflation"}
                },
                {
                    "countryiso3code": "NLD",
                    "date": "2021",
                    "value": null,
                    "indicator": {"id": "FP.CPI.TOTL.ZG", "value": "Inflation"}
                },
                {
                    "countryiso3code": "",
                    "date": "2020",
                    "value": 1.0,
                    "indicator": {"id": "FP.CPI.TOTL.ZG", "value": "Inflation"}
                }
            ]
        ]);
        let facts = transform_macro(&raw("worldbank-FP.CPI.TOTL.ZG-NLD", payload));

        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].region_code, "NLD");
        assert_eq!(facts[0].year, 2022);
        assert_eq!(facts[0].value, Some(10.0));
        assert_eq!(facts[1].value, None);
    }

    #[test]
    fn malformed_macro_payload_yields_empty() {
        assert!(transform_macro(&raw("worldbank-X-NLD", json!({"message": "invalid"}))).is_empty());
        assert!(transform_macro(&raw("worldbank-X-NLD", json!([{"page": 1}]))).is_empty());
    }
}
