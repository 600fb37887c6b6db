pub mod app;
pub mod config;
pub mod curated;
pub mod domain;
pub mod error;
pub mod export;
pub mod fetch;
pub mod openmeteo;
pub mod output;
pub mod raw_store;
pub mod scheduler;
pub mod source;
pub mod transform;
pub mod tui;
pub mod wikipedia;
pub mod worldbank;

pub use crate::app::{AppService, FetchState, StatusSink};
pub use crate::domain::{
    EnvHourlyFact, FetchSummary, Location, MacroAnnualFact, RawFetchResult, ScrapeResult,
};
pub use crate::error::EcoError;
