use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

use crate::config::PipelineConfig;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Unavailable(String),
}

/// Where disclosure archives come from: a listing of years, a listing of
/// archive names per year, and the archive bytes.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    async fn list_years(&self) -> Result<Vec<u16>, SourceError>;
    async fn list_archives(&self, year: u16) -> Result<Vec<String>, SourceError>;
    async fn fetch_archive(&self, year: u16, name: &str) -> Result<Vec<u8>, SourceError>;
}

/// Where the active-entity registry comes from.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    async fn fetch_registry(&self) -> Result<Vec<u8>, SourceError>;
}

/// Reads both sources from the public open-data directory listings.
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
    registry_url: String,
}

impl HttpSource {
    pub fn new(config: &PipelineConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let mut base_url = config.archive_base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(HttpSource {
            client,
            base_url,
            registry_url: config.registry_url.clone(),
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, SourceError> {
        debug!(url, "GET");
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Unavailable(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl ArchiveSource for HttpSource {
    async fn list_years(&self) -> Result<Vec<u16>, SourceError> {
        let html = self.get(&self.base_url).await?.text().await?;
        Ok(parse_year_listing(&html))
    }

    async fn list_archives(&self, year: u16) -> Result<Vec<String>, SourceError> {
        let url = format!("{}{}/", self.base_url, year);
        let html = self.get(&url).await?.text().await?;
        Ok(parse_archive_listing(&html))
    }

    async fn fetch_archive(&self, year: u16, name: &str) -> Result<Vec<u8>, SourceError> {
        let url = format!("{}{}/{}", self.base_url, year, name);
        let bytes = self.get(&url).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ReferenceSource for HttpSource {
    async fn fetch_registry(&self) -> Result<Vec<u8>, SourceError> {
        let bytes = self.get(&self.registry_url).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

fn link_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("a[href]").expect("invalid link selector"))
}

fn extract_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(link_selector())
        .filter_map(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
        .collect()
}

/// Year sub-directories in a listing, newest first.
pub fn parse_year_listing(html: &str) -> Vec<u16> {
    let mut years: Vec<u16> = extract_links(html)
        .iter()
        .filter_map(|href| {
            let name = href.trim_end_matches('/');
            let name = name.rsplit('/').next().unwrap_or(name);
            if name.len() == 4 && name.bytes().all(|b| b.is_ascii_digit()) {
                name.parse().ok()
            } else {
                None
            }
        })
        .collect();
    years.sort_unstable_by(|a, b| b.cmp(a));
    years.dedup();
    years
}

/// ZIP archive names in a listing, in listing order.
pub fn parse_archive_listing(html: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for href in extract_links(html) {
        if !href.to_ascii_lowercase().ends_with(".zip") {
            continue;
        }
        let name = href.rsplit('/').next().unwrap_or(&href).to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    const YEAR_LISTING: &str = r#"<html><body><pre>
        <a href="../">Parent Directory</a>
        <a href="2022/">2022/</a>
        <a href="2024/">2024/</a>
        <a href="2023/">2023/</a>
        <a href="leiame.txt">leiame.txt</a>
        <a href="20245/">20245/</a>
    </pre></body></html>"#;

    #[test]
    fn years_newest_first() {
        assert_eq!(parse_year_listing(YEAR_LISTING), vec![2024, 2023, 2022]);
    }

    #[test]
    fn archive_names_only_zip() {
        let html = r#"<a href="?C=N;O=D">Name</a>
            <a href="1T2024.zip">1T2024.zip</a>
            <a href="/FTP/2024/2T2024.ZIP">2T2024.ZIP</a>
            <a href="notes.pdf">notes.pdf</a>
            <a href="1T2024.zip">again</a>"#;
        assert_eq!(parse_archive_listing(html), vec!["1T2024.zip", "2T2024.ZIP"]);
    }

    #[test]
    fn empty_listing() {
        assert!(parse_year_listing("<html></html>").is_empty());
        assert!(parse_archive_listing("not html at all").is_empty());
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let config = PipelineConfig {
            archive_base_url: "https://example.org/data".into(),
            ..PipelineConfig::default()
        };
        let source = HttpSource::new(&config).unwrap();
        assert_eq!(source.base_url, "https://example.org/data/");
    }
}
