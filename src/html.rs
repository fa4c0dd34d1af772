//! Minimal structured queries over an HTML document.
//!
//! Element selection is by tag name and attribute value. Results are owned
//! snapshots so callers never hold the parsed tree across an `.await`
//! (`scraper::Html` is not `Send`).

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

/// Errors from building a query.
#[derive(Debug, Error)]
pub enum HtmlError {
    /// The generated CSS selector was rejected by the parser.
    #[error("invalid selector '{selector}': {reason}")]
    Selector {
        /// The selector text.
        selector: String,
        /// Parser message.
        reason: String,
    },
}

/// Owned snapshot of a matched element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    text: String,
}

impl Element {
    fn from_ref(element: ElementRef<'_>) -> Self {
        let value = element.value();
        Self {
            tag: value.name().to_string(),
            attributes: value
                .attrs()
                .map(|(name, val)| (name.to_string(), val.to_string()))
                .collect(),
            text: element.text().collect(),
        }
    }

    /// Tag name, lower-cased.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Concatenated text of all descendant text nodes.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Value of attribute `name`, if present.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns `true` if attribute `name` is present with exactly `value`.
    #[must_use]
    pub fn has_attr_value(&self, name: &str, value: &str) -> bool {
        self.attr(name) == Some(value)
    }
}

/// A parsed HTML document.
pub struct Document {
    html: Html,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document").finish_non_exhaustive()
    }
}

impl Document {
    /// Parses a full HTML document. Malformed markup is tolerated.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }

    /// All elements with tag `tag`, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`HtmlError::Selector`] if `tag` is not a valid tag name.
    pub fn find_by_tag(&self, tag: &str) -> Result<Vec<Element>, HtmlError> {
        self.select(tag)
    }

    /// All `tag` elements whose attribute `attr` equals `value`, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`HtmlError::Selector`] if the tag or attribute name is invalid.
    pub fn find_by_attribute(
        &self,
        tag: &str,
        attr: &str,
        value: &str,
    ) -> Result<Vec<Element>, HtmlError> {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        self.select(&format!("{tag}[{attr}=\"{escaped}\"]"))
    }

    /// All elements matching a raw CSS selector, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`HtmlError::Selector`] if the selector does not parse.
    pub fn select(&self, css: &str) -> Result<Vec<Element>, HtmlError> {
        let selector = Selector::parse(css).map_err(|e| HtmlError::Selector {
            selector: css.to_string(),
            reason: e.to_string(),
        })?;
        Ok(self.html.select(&selector).map(Element::from_ref).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <h1>Title <em>here</em></h1>
        <a href="/s/a" sasource="article_about">A</a>
        <a sasource="article_about">no href</a>
        <a href="/s/b" sasource="article_about">B</a>
        <p>one</p><p id="a-disclosure">disc</p>
    </body></html>"#;

    #[test]
    fn test_find_by_tag_collects_nested_text() {
        let doc = Document::parse(PAGE);
        let headings = doc.find_by_tag("h1").unwrap();
        assert_eq!(headings.len(), 1);
        assert_eq!(headings[0].text(), "Title here");
        assert_eq!(headings[0].tag(), "h1");
    }

    #[test]
    fn test_find_by_attribute_matches_value() {
        let doc = Document::parse(PAGE);
        let about = doc.find_by_attribute("a", "sasource", "article_about").unwrap();
        let texts: Vec<_> = about.iter().map(Element::text).collect();
        assert_eq!(texts, vec!["A", "no href", "B"]);
    }

    #[test]
    fn test_select_with_presence_filter() {
        let doc = Document::parse(PAGE);
        let about = doc.select(r#"a[href][sasource="article_about"]"#).unwrap();
        assert_eq!(about.len(), 2);
        assert_eq!(about[1].attr("href"), Some("/s/b"));
    }

    #[test]
    fn test_attr_lookup() {
        let doc = Document::parse(PAGE);
        let paragraphs = doc.find_by_tag("p").unwrap();
        assert_eq!(paragraphs[0].attr("id"), None);
        assert!(paragraphs[1].has_attr_value("id", "a-disclosure"));
    }

    #[test]
    fn test_invalid_selector_is_error() {
        let doc = Document::parse(PAGE);
        let err = doc.select("a[").unwrap_err();
        assert!(matches!(err, HtmlError::Selector { .. }));
    }

    #[test]
    fn test_value_with_quote_is_escaped() {
        let doc = Document::parse(r#"<a data-x='say "hi"'>q</a>"#);
        let found = doc.find_by_attribute("a", "data-x", "say \"hi\"").unwrap();
        assert_eq!(found.len(), 1);
    }
}
