//! Stage 4: turn sanitized HTML into Markdown, carrying forward the page
//! links discovered during sanitization as absolute URLs.

use htmd::HtmlToMarkdown;
use url::Url;

use crate::errors::ConversionError;

#[derive(Debug, Clone)]
pub struct ConvertedDoc {
    pub markdown: String,
    /// Outbound page links, resolved to absolute URLs and filtered to
    /// `http`/`https`. Submitted to the frontier at `depth + 1` after a
    /// successful write.
    pub link_refs: Vec<Url>,
}

pub trait Converter: Send + Sync {
    fn convert(
        &self,
        url: &Url,
        html: &str,
        discovered_links: &[String],
    ) -> Result<ConvertedDoc, ConversionError>;
}

/// `htmd`-backed converter, configured to drop elements that should never
/// have survived sanitization but are cheap to defend against twice.
pub struct HtmdConverter {
    converter: HtmlToMarkdown,
}

impl Default for HtmdConverter {
    fn default() -> Self {
        let converter = HtmlToMarkdown::builder()
            .skip_tags(vec!["script", "style", "nav", "header", "footer"])
            .build();
        Self { converter }
    }
}

impl Converter for HtmdConverter {
    fn convert(
        &self,
        url: &Url,
        html: &str,
        discovered_links: &[String],
    ) -> Result<ConvertedDoc, ConversionError> {
        let markdown = self
            .converter
            .convert(html)
            .map_err(|e| ConversionError::Partial {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if markdown.trim().is_empty() {
            return Err(ConversionError::RuleViolation {
                url: url.to_string(),
                message: "conversion produced no text content".to_string(),
            });
        }

        let link_refs = discovered_links
            .iter()
            .filter_map(|href| url.join(href).ok())
            .filter(|u| u.scheme() == "http" || u.scheme() == "https")
            .collect();

        Ok(ConvertedDoc { markdown, link_refs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://example.com/docs/guide").unwrap()
    }

    #[test]
    fn converts_basic_markup() {
        let html = "<h1>Title</h1><p>Hello <strong>world</strong></p>";
        let out = HtmdConverter::default().convert(&url(), html, &[]).unwrap();
        assert!(out.markdown.contains("# Title"));
        assert!(out.markdown.contains("Hello"));
    }

    #[test]
    fn empty_input_is_a_rule_violation() {
        let err = HtmdConverter::default()
            .convert(&url(), "<div></div>", &[])
            .unwrap_err();
        assert!(matches!(err, ConversionError::RuleViolation { .. }));
    }

    #[test]
    fn resolves_relative_links_and_drops_non_http_schemes() {
        let html = "<p>text</p>";
        let links = vec![
            "/other".to_string(),
            "mailto:a@example.com".to_string(),
            "https://elsewhere.example/x".to_string(),
        ];
        let out = HtmdConverter::default().convert(&url(), html, &links).unwrap();
        assert_eq!(out.link_refs.len(), 2);
        assert_eq!(out.link_refs[0].as_str(), "https://example.com/other");
        assert_eq!(out.link_refs[1].as_str(), "https://elsewhere.example/x");
    }
}
