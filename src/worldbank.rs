use tracing::info;

use crate::domain::{Indicator, RawFetchResult, Region};
use crate::fetch::{FetchClient, raw_result};
use crate::source::DataSource;

pub const SOURCE_NAME: &str = "worldbank";

pub struct WorldBankSource {
    client: FetchClient,
    regions: Vec<Region>,
    indicators: Vec<Indicator>,
}

impl WorldBankSource {
    pub fn new(client: FetchClient, regions: Vec<Region>, indicators: Vec<Indicator>) -> Self {
        Self {
            client,
            regions,
            indicators,
        }
    }

    fn fetch_pair(&self, region: &Region, indicator: &Indicator) -> RawFetchResult {
        let url = format!(
            "https://api.worldbank.org/v2/country/{}/indicator/{}",
            region.code, indicator.code
        );
        let params = vec![
            ("format".to_string(), "json".to_string()),
            ("per_page".to_string(), "5000".to_string()),
        ];
        let outcome = self.client.get(&url, &params);
        raw_result(
            format!("{SOURCE_NAME}-{}-{}", indicator.code, region.code),
            url,
            params,
            outcome,
        )
    }
}

impl DataSource for WorldBankSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn fetch(&self) -> Vec<RawFetchResult> {
        let mut results = Vec::with_capacity(self.regions.len() * self.indicators.len());
        for indicator in &self.indicators {
            info!(indicator = indicator.code, "fetching macro indicator");
            for region in &self.regions {
                results.push(self.fetch_pair(region, indicator));
            }
        }
        results
    }
}
