use crate::domain::RawFetchResult;

pub trait DataSource: Send + Sync {
    fn name(&self) -> &'static str;
    fn fetch(&self) -> Vec<RawFetchResult>;
}

pub type SourceRegistry = Vec<Box<dyn DataSource>>;
