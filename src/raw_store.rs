use std::fs::{self, OpenOptions};
use std::io::Write;

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::warn;

use crate::domain::{RawFetchResult, ScrapeResult};
use crate::error::EcoError;

const RAW_FETCHES: &str = "raw_fetches.jsonl";
const SCRAPED_PAGES: &str = "scraped_pages.jsonl";

#[derive(Debug, Clone)]
pub struct RawStore {
    root: Utf8PathBuf,
}

impl RawStore {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn health_check(&self) -> bool {
        if let Err(err) = fs::create_dir_all(self.root.as_std_path()) {
            warn!(root = %self.root, error = %err, "raw landing store unavailable");
            return false;
        }
        let probe = self.root.join(".health");
        match fs::write(probe.as_std_path(), b"ok") {
            Ok(()) => {
                let _ = fs::remove_file(probe.as_std_path());
                true
            }
            Err(err) => {
                warn!(root = %self.root, error = %err, "raw landing store not writable");
                false
            }
        }
    }

    pub fn log_fetches(&self, results: &[RawFetchResult]) -> Result<(), EcoError> {
        self.append_all(RAW_FETCHES, results)
    }

    pub fn log_scrapes(&self, results: &[ScrapeResult]) -> Result<(), EcoError> {
        self.append_all(SCRAPED_PAGES, results)
    }

    fn append_all<T: Serialize>(&self, collection: &str, documents: &[T]) -> Result<(), EcoError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| EcoError::RawStore(err.to_string()))?;
        let path = self.root.join(collection);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_std_path())
            .map_err(|err| EcoError::RawStore(err.to_string()))?;
        for document in documents {
            let line = serde_json::to_string(document)
                .map_err(|err| EcoError::RawStore(err.to_string()))?;
            file.write_all(line.as_bytes())
                .and_then(|_| file.write_all(b"\n"))
                .map_err(|err| EcoError::RawStore(err.to_string()))?;
        }
        Ok(())
    }
}
