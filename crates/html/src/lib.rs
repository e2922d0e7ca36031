//! # `ideasieve-html`: Article Text Extraction
//!
//! Implements the `ContentSource` trait from the core `ideasieve` library: fetch an
//! article page and reduce it to a title plus its paragraph text.

use async_trait::async_trait;
use ideasieve::ingest::{ContentSource, IngestError};
use ideasieve::types::PageContent;
use reqwest::Client as ReqwestClient;
use scraper::{Html, Selector};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Upper bound on the text handed to the extraction model.
pub const DEFAULT_MAX_CHARS: usize = 20_000;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum PageError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(reqwest::Error),
    #[error("Failed to fetch page: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("Page has no readable text: {0}")]
    Empty(String),
}

impl From<PageError> for IngestError {
    fn from(err: PageError) -> Self {
        match err {
            PageError::ClientBuild(e) | PageError::Fetch(e) => IngestError::Fetch(e.to_string()),
            PageError::Empty(url) => IngestError::Empty(url),
        }
    }
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

fn og_title(document: &Html) -> Option<String> {
    let selector = Selector::parse(r#"meta[property="og:title"]"#).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Title from `<title>`, then `og:title`, then the first `<h1>`.
pub fn extract_title(document: &Html) -> Option<String> {
    first_text(document, "title")
        .or_else(|| og_title(document))
        .or_else(|| first_text(document, "h1"))
}

/// Paragraph text, preferring paragraphs inside `<article>` or `<main>`.
pub fn extract_text(document: &Html) -> String {
    for scope in ["article p", "main p", "p"] {
        let Ok(selector) = Selector::parse(scope) else {
            continue;
        };
        let paragraphs: Vec<String> = document
            .select(&selector)
            .map(|p| {
                p.text()
                    .collect::<String>()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|t| !t.is_empty())
            .collect();
        if !paragraphs.is_empty() {
            return paragraphs.join("\n");
        }
    }
    String::new()
}

fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text,
    }
}

/// Parses an HTML document into `PageContent`.
pub fn parse_page(url: &str, html: &str, max_chars: usize) -> Result<PageContent, PageError> {
    let document = Html::parse_document(html);
    let text = extract_text(&document);
    if text.is_empty() {
        return Err(PageError::Empty(url.to_string()));
    }
    Ok(PageContent {
        url: url.to_string(),
        title: extract_title(&document).unwrap_or_default(),
        text: truncate_chars(text, max_chars),
    })
}

#[derive(Clone, Debug)]
pub struct HtmlContentSource {
    client: ReqwestClient,
    max_chars: usize,
}

impl HtmlContentSource {
    pub fn new(max_chars: usize) -> Result<Self, PageError> {
        let client = ReqwestClient::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("ideasieve/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(PageError::ClientBuild)?;
        Ok(Self { client, max_chars })
    }

    pub async fn fetch_page(&self, url: &str) -> Result<PageContent, PageError> {
        let html = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        debug!("Fetched {} bytes from {url}", html.len());
        parse_page(url, &html, self.max_chars)
    }
}

#[async_trait]
impl ContentSource for HtmlContentSource {
    async fn fetch_content(&self, url: &str) -> Result<PageContent, IngestError> {
        Ok(self.fetch_page(url).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_article_paragraphs_and_collapses_whitespace() {
        let html = r#"
            <html><head><title> Robots for Rent </title></head>
            <body>
                <nav><p>Home | About</p></nav>
                <article>
                    <p>Warehouses   lease robots
                       by the hour.</p>
                    <p>Demand is rising.</p>
                </article>
            </body></html>"#;
        let page = parse_page("https://robots.example.com", html, DEFAULT_MAX_CHARS).unwrap();
        assert_eq!(page.title, "Robots for Rent");
        assert_eq!(page.text, "Warehouses lease robots by the hour.\nDemand is rising.");
    }

    #[test]
    fn falls_back_to_og_title_and_truncates() {
        let html = r#"<html><head><meta property="og:title" content="Ünïcode Story"></head>
            <body><p>ééééé</p></body></html>"#;
        let page = parse_page("https://example.com", html, 3).unwrap();
        assert_eq!(page.title, "Ünïcode Story");
        assert_eq!(page.text, "ééé");
    }

    #[test]
    fn page_without_paragraphs_is_empty() {
        let err = parse_page("https://example.com", "<html><body><div>x</div></body></html>", 10)
            .unwrap_err();
        assert!(matches!(err, PageError::Empty(_)));
    }
}
