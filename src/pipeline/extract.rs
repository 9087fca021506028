//! Stage 2: pull the primary content container out of the parsed page.
//!
//! Tries semantic containers first (`main`, `article`, `[role=main]`,
//! common content IDs and classes), then falls back to `body`, then the
//! raw document as a last resort.

use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::errors::ExtractionError;

const MAX_HTML_SIZE: usize = 10 * 1024 * 1024;

static CONTENT_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        "main",
        "article",
        "[role='main']",
        "#main-content",
        ".main-content",
        "#content",
        ".content",
        ".post-content",
        ".entry-content",
        "[itemprop='articleBody']",
        ".article-body",
        ".story-body",
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("hardcoded selector must parse"))
    .collect()
});

static BODY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("hardcoded selector must parse"));

/// What survives extraction: the raw HTML of the chosen container, plus the
/// page `<title>` if one was present (carried forward for frontmatter).
#[derive(Debug, Clone)]
pub struct ExtractedDoc {
    pub container_html: String,
    pub title: Option<String>,
}

pub trait Extractor: Send + Sync {
    fn extract(&self, url: &str, html: &str) -> Result<ExtractedDoc, ExtractionError>;
}

#[derive(Debug, Default)]
pub struct ScraperExtractor;

impl Extractor for ScraperExtractor {
    fn extract(&self, url: &str, html: &str) -> Result<ExtractedDoc, ExtractionError> {
        if html.len() > MAX_HTML_SIZE {
            return Err(ExtractionError::NoContentFound {
                url: url.to_string(),
            });
        }

        let document = Html::parse_document(html);
        let title_selector =
            Selector::parse("title").expect("hardcoded selector must parse");
        let title = document
            .select(&title_selector)
            .next()
            .map(|e| e.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty());

        for selector in CONTENT_SELECTORS.iter() {
            if let Some(element) = document.select(selector).next() {
                return Ok(ExtractedDoc {
                    container_html: element.html(),
                    title,
                });
            }
        }

        if let Some(body) = document.select(&BODY_SELECTOR).next() {
            let has_text = body.text().any(|t| !t.trim().is_empty());
            if !has_text {
                return Err(ExtractionError::NoContentFound {
                    url: url.to_string(),
                });
            }
            return Ok(ExtractedDoc {
                container_html: body.html(),
                title,
            });
        }

        if html.trim().is_empty() {
            return Err(ExtractionError::NoContentFound {
                url: url.to_string(),
            });
        }

        Ok(ExtractedDoc {
            container_html: html.to_string(),
            title,
        })
    }
}
