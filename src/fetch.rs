use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config;
use crate::domain::{RawFetchResult, iso_timestamp};
use crate::error::EcoError;

const RETRY_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub status: Option<u16>,
    pub ok: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub text: Option<String>,
    pub json: Option<Value>,
}

#[derive(Clone)]
pub struct FetchClient {
    client: Client,
}

impl FetchClient {
    pub fn new(timeout_secs: u64) -> Result<Self, EcoError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(config::USER_AGENT)
                .map_err(|err| EcoError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|err| EcoError::Http(err.to_string()))?;
        Ok(Self { client })
    }

    pub fn get(&self, url: &str, params: &[(String, String)]) -> FetchOutcome {
        let start = Instant::now();
        let mut last_error = None;
        let mut last_status = None;
        let mut last_body = None;

        for attempt in 0..2u32 {
            if attempt > 0 {
                thread::sleep(Duration::from_millis(RETRY_DELAY_MS));
            }
            debug!(url, attempt = attempt + 1, "GET");
            match self.client.get(url).query(params).send() {
                Ok(response) => {
                    let status = response.status();
                    last_status = Some(status.as_u16());
                    let text = response.text().unwrap_or_default();
                    if status.is_success() {
                        let json = serde_json::from_str(&text).ok();
                        return FetchOutcome {
                            status: last_status,
                            ok: true,
                            error: None,
                            duration_ms: elapsed_ms(start),
                            text: Some(text),
                            json,
                        };
                    }
                    warn!(url, status = status.as_u16(), attempt = attempt + 1, "non-success status");
                    last_body = Some(text);
                }
                Err(err) => {
                    warn!(url, attempt = attempt + 1, error = %err, "request error");
                    last_error = Some(err.to_string());
                }
            }
        }

        FetchOutcome {
            status: last_status,
            ok: false,
            error: last_error.or(last_body),
            duration_ms: elapsed_ms(start),
            text: None,
            json: None,
        }
    }
}

pub fn raw_result(
    source: String,
    url: String,
    params: Vec<(String, String)>,
    outcome: FetchOutcome,
) -> RawFetchResult {
    RawFetchResult {
        source,
        url,
        params,
        status: outcome.status,
        ok: outcome.ok,
        error: outcome.error,
        duration_ms: outcome.duration_ms,
        payload_json: outcome.json,
        payload_text: outcome.text,
        fetched_at_utc: iso_timestamp(),
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
