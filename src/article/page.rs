//! Field extraction from fetched article pages.
//!
//! Everything here is synchronous and works on page text, so parsed
//! documents never live across an `.await`.

use chrono::NaiveDate;

use super::error::ArticleError;
use crate::html::{Document, Element};

const PRIMARY_ABOUT: &str = "article_primary_about";
const SECONDARY_ABOUT: &str = "article_about";
const AUTHOR_NAME: &str = "auth_header_name";
const DISCLOSURE_ID: &str = "a-disclosure";

/// Metadata read from the authenticated page of a valid article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Metadata {
    pub ticker: String,
    pub publication_date: NaiveDate,
    pub authors: Vec<String>,
    pub title: String,
    pub included_symbols: Vec<String>,
}

/// Result of inspecting the authenticated page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MetadataScan {
    Valid(Metadata),
    Invalid { primary_anchors: usize },
}

/// Tagged anchors (`a[href][sasource=<tag>]`) in document order.
fn tagged_anchors(doc: &Document, id: &str, tag: &str) -> Result<Vec<Element>, ArticleError> {
    doc.select(&format!("a[href][sasource=\"{tag}\"]"))
        .map_err(|e| ArticleError::query(id, e))
}

fn anchor_texts(anchors: &[Element]) -> Vec<String> {
    anchors
        .iter()
        .map(|a| a.text().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Extracts the ticker from primary-anchor text such as `Apple Inc. (AAPL)`.
///
/// Uses the last whitespace-separated token with surrounding parentheses
/// removed. Returns `None` when nothing is left.
#[must_use]
pub fn extract_ticker(anchor_text: &str) -> Option<String> {
    let token = anchor_text.split_whitespace().last()?;
    let ticker = token.trim_start_matches('(').trim_end_matches(')');
    if ticker.is_empty() {
        None
    } else {
        Some(ticker.to_string())
    }
}

/// Validates the single-ticker rule and reads the metadata fields.
pub(crate) fn scan_metadata(id: &str, source: &str) -> Result<MetadataScan, ArticleError> {
    let doc = Document::parse(source);

    let primary = tagged_anchors(&doc, id, PRIMARY_ABOUT)?;
    if primary.len() != 1 {
        return Ok(MetadataScan::Invalid {
            primary_anchors: primary.len(),
        });
    }
    let ticker = extract_ticker(primary[0].text())
        .ok_or_else(|| ArticleError::missing(id, "primary ticker text"))?;

    let included_symbols = anchor_texts(&tagged_anchors(&doc, id, SECONDARY_ABOUT)?);
    let authors = anchor_texts(&tagged_anchors(&doc, id, AUTHOR_NAME)?);

    let title = doc
        .find_by_tag("h1")
        .map_err(|e| ArticleError::query(id, e))?
        .into_iter()
        .next()
        .map(|h| h.text().trim().to_string())
        .ok_or_else(|| ArticleError::missing(id, "h1 title"))?;

    let time = doc
        .find_by_attribute("time", "itemprop", "datePublished")
        .map_err(|e| ArticleError::query(id, e))?
        .into_iter()
        .next()
        .ok_or_else(|| ArticleError::missing(id, "published date time element"))?;
    let raw_date = time
        .attr("content")
        .or_else(|| time.attr("datetime"))
        .ok_or_else(|| ArticleError::missing(id, "published date attribute"))?;
    let publication_date = parse_date_prefix(raw_date).ok_or_else(|| ArticleError::InvalidDate {
        article_id: id.to_string(),
        value: raw_date.to_string(),
    })?;

    Ok(MetadataScan::Valid(Metadata {
        ticker,
        publication_date,
        authors,
        title,
        included_symbols,
    }))
}

/// Parses the leading `YYYY-MM-DD` of a timestamp such as `2017-03-02T10:00:00-05:00`.
#[must_use]
pub fn parse_date_prefix(raw: &str) -> Option<NaiveDate> {
    let prefix = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

/// Joins paragraph texts that precede the first disclosure paragraph.
///
/// Each paragraph contributes its text followed by `\n`. Without a
/// disclosure paragraph every paragraph is used.
///
/// ```
/// use harvester_core::article::extract_body;
///
/// let page = r#"<p>one</p><p>two</p><p id="a-disclosure">I am long</p><p>after</p>"#;
/// assert_eq!(extract_body(page).unwrap(), "one\ntwo\n");
/// ```
///
/// # Errors
///
/// Returns [`HtmlError`](crate::html::HtmlError) only if the paragraph query fails.
pub fn extract_body(source: &str) -> Result<String, crate::html::HtmlError> {
    let paragraphs = Document::parse(source).find_by_tag("p")?;
    let cut = paragraphs
        .iter()
        .position(|p| p.has_attr_value("id", DISCLOSURE_ID))
        .unwrap_or(paragraphs.len());

    Ok(paragraphs[..cut].iter().fold(String::new(), |mut body, p| {
        body.push_str(p.text());
        body.push('\n');
        body
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn page(primary: &[&str]) -> String {
        let anchors: String = primary
            .iter()
            .map(|t| format!(r#"<a href="/symbol/x" sasource="article_primary_about">{t}</a>"#))
            .collect();
        format!(
            r#"<html><body>
            <h1> Apple Beats Again </h1>
            <time itemprop="datePublished" content="2017-03-02T10:00:00-05:00">Mar 2</time>
            <a href="/author/jane" sasource="auth_header_name">Jane Roe</a>
            <a href="/author/john" sasource="auth_header_name">John Doe</a>
            {anchors}
            <a href="/symbol/MSFT" sasource="article_about">MSFT</a>
            <a sasource="article_about">NOHREF</a>
            <a href="/symbol/GOOG" sasource="article_about">GOOG</a>
            </body></html>"#
        )
    }

    #[test]
    fn test_extract_ticker_variants() {
        assert_eq!(extract_ticker("(AAPL)").as_deref(), Some("AAPL"));
        assert_eq!(extract_ticker("Apple Inc. (AAPL)").as_deref(), Some("AAPL"));
        assert_eq!(extract_ticker("  BRK.B  ").as_deref(), Some("BRK.B"));
        assert_eq!(extract_ticker("()"), None);
        assert_eq!(extract_ticker("   "), None);
    }

    #[test]
    fn test_scan_single_primary_is_valid() {
        let scan = scan_metadata("1", &page(&["(AAPL)"])).unwrap();
        let MetadataScan::Valid(meta) = scan else {
            panic!("expected valid scan");
        };
        assert_eq!(meta.ticker, "AAPL");
        assert_eq!(meta.title, "Apple Beats Again");
        assert_eq!(meta.authors, vec!["Jane Roe", "John Doe"]);
        assert_eq!(meta.included_symbols, vec!["MSFT", "GOOG"]);
        assert_eq!(
            meta.publication_date,
            NaiveDate::from_ymd_opt(2017, 3, 2).unwrap()
        );
    }

    #[test]
    fn test_scan_zero_or_many_primary_is_invalid() {
        assert_eq!(
            scan_metadata("1", &page(&[])).unwrap(),
            MetadataScan::Invalid { primary_anchors: 0 }
        );
        assert_eq!(
            scan_metadata("1", &page(&["(AAPL)", "(MSFT)"])).unwrap(),
            MetadataScan::Invalid { primary_anchors: 2 }
        );
    }

    #[test]
    fn test_scan_missing_title_is_error() {
        let source = page(&["(AAPL)"]).replace("<h1> Apple Beats Again </h1>", "");
        let err = scan_metadata("9", &source).unwrap_err();
        assert!(matches!(err, ArticleError::MissingElement { .. }));
    }

    #[test]
    fn test_scan_datetime_fallback_and_bad_date() {
        let source = page(&["(AAPL)"]).replace(
            r#"content="2017-03-02T10:00:00-05:00""#,
            r#"datetime="2019-12-31""#,
        );
        let MetadataScan::Valid(meta) = scan_metadata("1", &source).unwrap() else {
            panic!("expected valid scan");
        };
        assert_eq!(
            meta.publication_date,
            NaiveDate::from_ymd_opt(2019, 12, 31).unwrap()
        );

        let bad = page(&["(AAPL)"]).replace("2017-03-02T10", "yesterday!");
        assert!(matches!(
            scan_metadata("1", &bad).unwrap_err(),
            ArticleError::InvalidDate { .. }
        ));
    }

    #[test]
    fn test_body_stops_at_disclosure() {
        let source = r#"<p>p1</p><p>p2</p><p id="a-disclosure">p3</p><p>p4</p>"#;
        assert_eq!(extract_body(source).unwrap(), "p1\np2\n");
    }

    #[test]
    fn test_body_without_disclosure_uses_all() {
        let source = "<p>p1</p><p>p2 <b>bold</b></p>";
        assert_eq!(extract_body(source).unwrap(), "p1\np2 bold\n");
    }

    #[test]
    fn test_body_disclosure_first_is_empty() {
        let source = r#"<p id="a-disclosure">d</p><p>x</p>"#;
        assert_eq!(extract_body(source).unwrap(), "");
    }

    #[test]
    fn test_parse_date_prefix_rejects_short() {
        assert!(parse_date_prefix("2017-03").is_none());
    }
}
