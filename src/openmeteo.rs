use tracing::info;

use crate::domain::{Location, RawFetchResult};
use crate::fetch::{FetchClient, raw_result};
use crate::source::DataSource;

pub const SOURCE_NAME: &str = "open-meteo";

const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const AIR_QUALITY_URL: &str = "https://air-quality-api.open-meteo.com/v1/air-quality";

pub struct OpenMeteoSource {
    client: FetchClient,
    locations: Vec<Location>,
}

impl OpenMeteoSource {
    pub fn new(client: FetchClient, locations: Vec<Location>) -> Self {
        Self { client, locations }
    }

    fn fetch_for_location(&self, location: &Location) -> Vec<RawFetchResult> {
        let weather_params = vec![
            ("latitude".to_string(), location.lat.to_string()),
            ("longitude".to_string(), location.lon.to_string()),
            (
                "hourly".to_string(),
                "temperature_2m,wind_speed_10m,precipitation".to_string(),
            ),
            ("timezone".to_string(), "UTC".to_string()),
        ];
        let weather_outcome = self.client.get(FORECAST_URL, &weather_params);

        let air_params = vec![
            ("latitude".to_string(), location.lat.to_string()),
            ("longitude".to_string(), location.lon.to_string()),
            (
                "hourly".to_string(),
                "pm2_5,pm10,european_aqi,us_aqi".to_string(),
            ),
            ("timezone".to_string(), "UTC".to_string()),
        ];
        let air_outcome = self.client.get(AIR_QUALITY_URL, &air_params);

        vec![
            raw_result(
                format!("{SOURCE_NAME}-weather-{}", location.key),
                FORECAST_URL.to_string(),
                weather_params,
                weather_outcome,
            ),
            raw_result(
                format!("{SOURCE_NAME}-air-{}", location.key),
                AIR_QUALITY_URL.to_string(),
                air_params,
                air_outcome,
            ),
        ]
    }
}

impl DataSource for OpenMeteoSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn fetch(&self) -> Vec<RawFetchResult> {
        let mut results = Vec::with_capacity(self.locations.len() * 2);
        for location in &self.locations {
            info!(location = %location.key, "fetching environment data");
            results.extend(self.fetch_for_location(location));
        }
        results
    }
}
