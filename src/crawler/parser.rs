//! HTML parser for extracting the page heading and outbound links
//!
//! Parsing goes through html5ever (via `scraper`), which recovers from
//! unclosed tags and other malformed markup the way browsers do, so a broken
//! document still yields whatever heading and links can be found.

use scraper::{Html, Selector};
use std::collections::HashSet;

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    /// Trimmed text of the first `<h1>`, if any
    pub heading: Option<String>,

    /// Raw `href` values of `<a>` elements, in document order, without repeats
    pub hrefs: Vec<String>,
}

/// Parses HTML bytes and extracts the heading and raw link targets
///
/// Invalid UTF-8 is replaced rather than rejected. Parsing never fails.
///
/// # Example
///
/// ```
/// use site_crawler::crawler::parse_page;
///
/// let html = br#"<html><body><h1> Home </h1><a href="/b">B</a><a href="/b">again</a></body></html>"#;
/// let parsed = parse_page(html);
/// assert_eq!(parsed.heading.as_deref(), Some("Home"));
/// assert_eq!(parsed.hrefs, vec!["/b".to_string()]);
/// ```
pub fn parse_page(body: &[u8]) -> ParsedPage {
    let html = String::from_utf8_lossy(body);
    let document = Html::parse_document(&html);

    ParsedPage {
        heading: extract_heading(&document),
        hrefs: extract_hrefs(&document),
    }
}

/// Extracts the text of the first `<h1>` in document order
fn extract_heading(document: &Html) -> Option<String> {
    let heading_selector = Selector::parse("h1").ok()?;

    document
        .select(&heading_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extracts the raw href of every anchor, dropping repeats
fn extract_hrefs(document: &Html) -> Vec<String> {
    let Ok(anchor_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let mut seen = HashSet::new();

    document
        .select(&anchor_selector)
        .filter_map(|element| element.value().attr("href"))
        .filter(|href| seen.insert(*href))
        .map(str::to_string)
        .collect()
}
