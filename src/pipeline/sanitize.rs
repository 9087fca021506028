//! Stage 3: strip non-content elements from the extracted container.
//!
//! Removes scripts, styles, navigation, headers, footers, asides, forms,
//! iframes, and comments, mirroring the element classes filtered out in
//! this codebase's earlier HTML-cleaning pass.

use scraper::{Html, Selector};

use crate::errors::SanitizationError;

const REMOVE_SELECTORS: &[&str] = &[
    "script",
    "style",
    "nav",
    "header",
    "footer",
    "aside",
    "form",
    "iframe",
    "noscript",
    "[aria-hidden='true']",
    "[hidden]",
];

#[derive(Debug, Clone)]
pub struct SanitizedHtmlDoc {
    pub html: String,
    /// Raw `href` values of every anchor still present after cleaning,
    /// carried forward for the frontier submission that follows a
    /// successful write.
    pub discovered_links: Vec<String>,
}

pub trait Sanitizer: Send + Sync {
    fn sanitize(&self, url: &str, html: &str) -> Result<SanitizedHtmlDoc, SanitizationError>;
}

#[derive(Debug, Default)]
pub struct ScraperSanitizer;

impl Sanitizer for ScraperSanitizer {
    fn sanitize(&self, url: &str, html: &str) -> Result<SanitizedHtmlDoc, SanitizationError> {
        let cleaned = remove_matching(html, REMOVE_SELECTORS);

        if cleaned.trim().is_empty() {
            return Err(SanitizationError::EmptyResult {
                url: url.to_string(),
            });
        }

        let reparsed = Html::parse_fragment(&cleaned);
        let top_level_count = reparsed
            .root_element()
            .children()
            .filter(|c| c.value().is_element())
            .count();
        if top_level_count > 1 {
            // A single cohesive container is expected coming out of
            // extraction; more than one top-level element after cleaning
            // means extraction picked up sibling noise alongside the real
            // content root.
            return Err(SanitizationError::CompetingRoots {
                url: url.to_string(),
            });
        }

        let discovered_links = extract_links(&cleaned);

        Ok(SanitizedHtmlDoc {
            html: cleaned,
            discovered_links,
        })
    }
}

fn extract_links(html: &str) -> Vec<String> {
    let selector = Selector::parse("a[href]").expect("hardcoded selector must parse");
    let doc = Html::parse_fragment(html);
    doc.select(&selector)
        .filter_map(|e| e.value().attr("href"))
        .map(str::to_string)
        .collect()
}

fn remove_matching(html: &str, selectors: &[&str]) -> String {
    let mut out = html.to_string();

    for sel_str in selectors {
        let Ok(selector) = Selector::parse(sel_str) else {
            continue;
        };
        loop {
            let doc = Html::parse_fragment(&out);
            let Some(matched) = doc.select(&selector).next().map(|e| e.html()) else {
                break;
            };
            let replaced = out.replacen(&matched, "", 1);
            if replaced == out {
                break;
            }
            out = replaced;
        }
    }
    out
}
