use scraper::{Html, Selector};
use tracing::info;

use crate::domain::{Location, ScrapeResult, ScrapedPage, iso_timestamp};
use crate::error::EcoError;
use crate::fetch::FetchClient;

pub const SOURCE_NAME: &str = "wikipedia";

pub struct WikipediaScraper {
    client: FetchClient,
    locations: Vec<Location>,
    title_selector: Selector,
    paragraph_selector: Selector,
}

impl WikipediaScraper {
    pub fn new(client: FetchClient, locations: Vec<Location>) -> Result<Self, EcoError> {
        let title_selector =
            Selector::parse("h1").map_err(|err| EcoError::Scrape(err.to_string()))?;
        let paragraph_selector =
            Selector::parse("p").map_err(|err| EcoError::Scrape(err.to_string()))?;
        Ok(Self {
            client,
            locations,
            title_selector,
            paragraph_selector,
        })
    }

    pub fn scrape_all(&self) -> Vec<ScrapeResult> {
        let mut results = Vec::with_capacity(self.locations.len());
        for location in &self.locations {
            info!(location = %location.key, "refreshing encyclopedia summary");
            results.push(self.scrape(&location.wikipedia_url));
        }
        results
    }

    pub fn scrape(&self, url: &str) -> ScrapeResult {
        let outcome = self.client.get(url, &[]);
        let html = outcome.text;
        let mut error = outcome.error;
        let mut parsed = None;

        if let Some(content) = &html {
            match self.parse_page(content) {
                Some(page) => parsed = Some(page),
                None => error = Some("no title or paragraph found in page".to_string()),
            }
        }

        ScrapeResult {
            url: url.to_string(),
            ok: error.is_none(),
            error,
            html,
            parsed,
            fetched_at_utc: iso_timestamp(),
        }
    }

    fn parse_page(&self, content: &str) -> Option<ScrapedPage> {
        let document = Html::parse_document(content);
        let title = document
            .select(&self.title_selector)
            .next()
            .map(|node| collapse_whitespace(&node.text().collect::<String>()))?;
        let summary = document
            .select(&self.paragraph_selector)
            .map(|node| collapse_whitespace(&node.text().collect::<String>()))
            .find(|text| !text.is_empty())
            .unwrap_or_default();
        if title.is_empty() {
            return None;
        }
        Some(ScrapedPage { title, summary })
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchClient;

    fn make_scraper() -> WikipediaScraper {
        WikipediaScraper::new(FetchClient::new(1).unwrap(), Vec::new()).unwrap()
    }

    #[test]
    fn parses_title_and_first_paragraph() {
        let html = r#"<html><body>
            <h1>Amsterdam</h1>
            <p>  </p>
            <p>Amsterdam is the capital
               of the Netherlands.</p>
            <p>Second paragraph.</p>
        </body></html>"#;
        let page = make_scraper().parse_page(html).unwrap();
        assert_eq!(page.title, "Amsterdam");
        assert_eq!(page.summary, "Amsterdam is the capital of the Netherlands.");
    }

    #[test]
    fn missing_title_yields_none() {
        let html = "<html><body><p>orphan paragraph</p></body></html>";
        assert!(make_scraper().parse_page(html).is_none());
    }
}
