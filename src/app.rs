use std::sync::Mutex;

use tracing::{info, warn};

use crate::config::ResolvedConfig;
use crate::curated::CuratedStore;
use crate::domain::{FetchSummary, SourceRunSummary, iso_timestamp};
use crate::error::EcoError;
use crate::openmeteo;
use crate::raw_store::RawStore;
use crate::source::{DataSource, SourceRegistry};
use crate::transform::{transform_env, transform_macro};
use crate::wikipedia::{self, WikipediaScraper};
use crate::worldbank;

pub trait StatusSink {
    fn status(&self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    Fetching,
}

pub struct AppService {
    config: ResolvedConfig,
    sources: SourceRegistry,
    wikipedia: WikipediaScraper,
    raw: RawStore,
    curated: CuratedStore,
    state: Mutex<FetchState>,
}

impl AppService {
    pub fn new(
        config: ResolvedConfig,
        sources: SourceRegistry,
        wikipedia: WikipediaScraper,
        raw: RawStore,
        curated: CuratedStore,
    ) -> Self {
        Self {
            config,
            sources,
            wikipedia,
            raw,
            curated,
            state: Mutex::new(FetchState::Idle),
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn curated(&self) -> &CuratedStore {
        &self.curated
    }

    pub fn raw_store_available(&self) -> bool {
        self.raw.health_check()
    }

    pub fn is_fetching(&self) -> bool {
        self.state
            .lock()
            .map(|state| *state == FetchState::Fetching)
            .unwrap_or(true)
    }

    pub fn fetch_all(&self, sink: &dyn StatusSink) -> Result<FetchSummary, EcoError> {
        let _guard = self.begin_fetch()?;
        let started_at_utc = iso_timestamp();
        self.notify(sink, "Running data fetch...");

        let raw_store_ok = self.raw.health_check();
        if !raw_store_ok {
            self.notify(sink, "Raw landing store unavailable, skipping audit trail");
        }

        let mut runs = Vec::with_capacity(self.sources.len() + 1);
        for source in &self.sources {
            runs.push(self.run_source(source.as_ref(), raw_store_ok, sink));
        }
        runs.push(self.run_wikipedia(raw_store_ok, sink));

        let ok = runs.iter().all(|run| run.ok);
        let finished_at_utc = iso_timestamp();
        let message = if ok {
            "ok".to_string()
        } else {
            let failed = runs
                .iter()
                .filter(|run| !run.ok)
                .map(|run| run.source.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            format!("failed: {failed}")
        };
        if let Err(err) = self
            .curated
            .log_run(&started_at_utc, &finished_at_utc, ok, &message)
        {
            warn!(error = %err, "failed to record fetch run");
        }

        let summary = FetchSummary {
            started_at_utc,
            finished_at_utc,
            ok,
            raw_store_ok,
            sources: runs,
        };
        self.notify(
            sink,
            &format!(
                "Fetch complete ({} payloads, {} curated rows)",
                summary.total_items(),
                summary.total_curated_rows()
            ),
        );
        Ok(summary)
    }

    fn run_source(
        &self,
        source: &dyn DataSource,
        raw_store_ok: bool,
        sink: &dyn StatusSink,
    ) -> SourceRunSummary {
        let started_at_utc = iso_timestamp();
        self.notify(sink, &format!("Fetching {}...", source.name()));

        let results = source.fetch();
        if raw_store_ok {
            if let Err(err) = self.raw.log_fetches(&results) {
                warn!(source = source.name(), error = %err, "raw landing failed");
            }
        }

        let mut error = None;
        let curated_rows = match source.name() {
            openmeteo::SOURCE_NAME => {
                let rows: Vec<_> = results.iter().flat_map(transform_env).collect();
                match self.curated.upsert_env_facts(&rows) {
                    Ok(count) => count,
                    Err(err) => {
                        error = Some(err.to_string());
                        0
                    }
                }
            }
            worldbank::SOURCE_NAME => {
                let rows: Vec<_> = results.iter().flat_map(transform_macro).collect();
                match self.curated.upsert_macro_facts(&rows) {
                    Ok(count) => count,
                    Err(err) => {
                        error = Some(err.to_string());
                        0
                    }
                }
            }
            other => {
                warn!(source = other, "no transform registered, landing raw only");
                0
            }
        };

        let failures = results.iter().filter(|result| !result.ok).count();
        if error.is_none() && failures > 0 {
            error = Some(format!(
                "{failures} of {} sub-requests failed",
                results.len()
            ));
        }

        let summary = SourceRunSummary {
            source: source.name().to_string(),
            ok: error.is_none(),
            items: results.len(),
            curated_rows,
            error,
        };
        self.finish_source_run(&summary, &started_at_utc, sink);
        summary
    }

    fn run_wikipedia(&self, raw_store_ok: bool, sink: &dyn StatusSink) -> SourceRunSummary {
        let started_at_utc = iso_timestamp();
        self.notify(sink, "Refreshing encyclopedia summaries...");

        let results = self.wikipedia.scrape_all();
        if raw_store_ok {
            if let Err(err) = self.raw.log_scrapes(&results) {
                warn!(error = %err, "raw landing failed");
            }
        }

        let mut error = None;
        let mut curated_rows = 0;
        for result in &results {
            let Some(parsed) = result.parsed.as_ref().filter(|_| result.ok) else {
                continue;
            };
            match self.curated.locations_for_wiki_url(&result.url) {
                Ok(keys) => {
                    for key in keys {
                        match self.curated.update_location_wiki(
                            &key,
                            &parsed.title,
                            &parsed.summary,
                            &result.fetched_at_utc,
                        ) {
                            Ok(()) => curated_rows += 1,
                            Err(err) => error = Some(err.to_string()),
                        }
                    }
                }
                Err(err) => error = Some(err.to_string()),
            }
        }

        let failures = results.iter().filter(|result| !result.ok).count();
        if error.is_none() && failures > 0 {
            error = Some(format!("{failures} of {} pages failed", results.len()));
        }

        let summary = SourceRunSummary {
            source: wikipedia::SOURCE_NAME.to_string(),
            ok: error.is_none(),
            items: results.len(),
            curated_rows,
            error,
        };
        self.finish_source_run(&summary, &started_at_utc, sink);
        summary
    }

    fn finish_source_run(
        &self,
        summary: &SourceRunSummary,
        started_at_utc: &str,
        sink: &dyn StatusSink,
    ) {
        let message = summary.error.as_deref().unwrap_or("ok");
        if let Err(err) = self.curated.log_source_run(
            &summary.source,
            started_at_utc,
            &iso_timestamp(),
            summary.ok,
            message,
            summary.items,
        ) {
            warn!(source = %summary.source, error = %err, "failed to record source run");
        }
        self.notify(
            sink,
            &format!(
                "{} updated ({} payloads, {} rows)",
                summary.source, summary.items, summary.curated_rows
            ),
        );
    }

    fn begin_fetch(&self) -> Result<FetchGuard<'_>, EcoError> {
        let mut state = self.state.lock().map_err(|_| EcoError::FetchBusy)?;
        if *state == FetchState::Fetching {
            return Err(EcoError::FetchBusy);
        }
        *state = FetchState::Fetching;
        Ok(FetchGuard { state: &self.state })
    }

    fn notify(&self, sink: &dyn StatusSink, message: &str) {
        info!("{message}");
        sink.status(message);
    }
}

struct FetchGuard<'a> {
    state: &'a Mutex<FetchState>,
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            *state = FetchState::Idle;
        }
    }
}
