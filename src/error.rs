use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum EcoError {
    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid location key: {0}")]
    InvalidLocationKey(String),

    #[error("unknown location: {0}")]
    UnknownLocation(String),

    #[error("unknown indicator: {0}")]
    UnknownIndicator(String),

    #[error("curated store schema error: {0}")]
    Schema(String),

    #[error("curated store query failed: {0}")]
    Sqlite(String),

    #[error("raw landing store error: {0}")]
    RawStore(String),

    #[error("http client setup failed: {0}")]
    Http(String),

    #[error("scrape setup failed: {0}")]
    Scrape(String),

    #[error("csv export failed: {0}")]
    Export(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("a fetch run is already in progress")]
    FetchBusy,
}
