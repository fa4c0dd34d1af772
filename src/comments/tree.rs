//! Comment payload model and tree flattening.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use super::CommentError;

/// How comment text is treated before storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentPolicy {
    /// Keep text as received.
    #[default]
    Passthrough,
    /// Drop everything except printable ASCII and ASCII whitespace.
    AsciiOnly,
}

/// Applies `policy` to comment text.
///
/// ```
/// use harvester_core::comments::{ContentPolicy, sanitize};
///
/// assert_eq!(sanitize("caf\u{e9} \u{1f680}ok", ContentPolicy::AsciiOnly), "caf ok");
/// assert_eq!(sanitize("caf\u{e9}", ContentPolicy::Passthrough), "caf\u{e9}");
/// ```
#[must_use]
pub fn sanitize(content: &str, policy: ContentPolicy) -> Cow<'_, str> {
    match policy {
        ContentPolicy::Passthrough => Cow::Borrowed(content),
        ContentPolicy::AsciiOnly => {
            let keep = |c: char| c.is_ascii_graphic() || c.is_ascii_whitespace();
            if content.chars().all(keep) {
                Cow::Borrowed(content)
            } else {
                Cow::Owned(content.chars().filter(|&c| keep(c)).collect())
            }
        }
    }
}

/// Top-level shape of the comment-list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentPayload {
    /// Top-level comments keyed by id.
    #[serde(default, deserialize_with = "comment_map")]
    pub comments: BTreeMap<String, Comment>,
}

impl CommentPayload {
    /// Decodes a comment-list response body.
    ///
    /// Reply chains may be nested far deeper than serde_json's default
    /// recursion limit; the stack is grown on demand instead.
    ///
    /// # Errors
    ///
    /// Returns the decoder error for malformed JSON or an unexpected shape.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        let mut json = serde_json::Deserializer::from_str(body);
        json.disable_recursion_limit();
        let payload = Self::deserialize(serde_stacker::Deserializer::new(&mut json))?;
        json.end()?;
        Ok(payload)
    }
}

/// One comment as delivered by the site, children still nested.
#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    /// Comment id.
    #[serde(deserialize_with = "lenient_id")]
    pub id: i64,
    /// Author's user id.
    #[serde(deserialize_with = "lenient_id")]
    pub user_id: i64,
    /// Creation timestamp; only the leading date is kept.
    pub created_on: String,
    /// Comment text.
    #[serde(default)]
    pub content: String,
    /// Parent comment id, `None` for a root comment.
    #[serde(default, deserialize_with = "lenient_opt_id")]
    pub parent_id: Option<i64>,
    /// Discussion thread id.
    #[serde(default, deserialize_with = "lenient_opt_id")]
    pub discussion_id: Option<i64>,
    /// Replies keyed by id. The site sends `[]` when there are none.
    #[serde(default, deserialize_with = "comment_map")]
    pub children: BTreeMap<String, Comment>,
}

/// A comment as stored: one row per tree node, no children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatComment {
    /// Comment id.
    pub id: i64,
    /// Owning article id.
    pub article_id: String,
    /// Author's user id.
    pub user_id: i64,
    /// Creation date.
    pub date: NaiveDate,
    /// Text after the content policy was applied.
    pub content: String,
    /// Parent comment id, `None` for a root comment.
    pub parent_id: Option<i64>,
    /// Discussion thread id.
    pub discussion_id: Option<i64>,
}

impl Comment {
    fn into_flat(
        mut self,
        article_id: &str,
        policy: ContentPolicy,
    ) -> Result<FlatComment, CommentError> {
        let date = crate::article::parse_date_prefix(&self.created_on).ok_or_else(|| {
            CommentError::InvalidDate {
                article_id: article_id.to_string(),
                comment_id: self.id,
                value: self.created_on.clone(),
            }
        })?;

        let content = match sanitize(&self.content, policy) {
            Cow::Borrowed(_) => std::mem::take(&mut self.content),
            Cow::Owned(cleaned) => cleaned,
        };

        Ok(FlatComment {
            id: self.id,
            article_id: article_id.to_string(),
            user_id: self.user_id,
            date,
            content,
            parent_id: self.parent_id,
            discussion_id: self.discussion_id,
        })
    }
}

// Deep reply chains are torn down with a work list, not recursive drops.
impl Drop for Comment {
    fn drop(&mut self) {
        let mut pending: Vec<Comment> = std::mem::take(&mut self.children).into_values().collect();
        while let Some(mut node) = pending.pop() {
            pending.extend(std::mem::take(&mut node.children).into_values());
        }
    }
}

fn sorted_by_id(nodes: impl IntoIterator<Item = Comment>) -> Vec<Comment> {
    let mut nodes: Vec<Comment> = nodes.into_iter().collect();
    nodes.sort_by_key(|c| c.id);
    nodes
}

/// Flattens comment trees into pre-order rows.
///
/// Roots and every sibling group are visited in ascending id order. A parent
/// is always emitted before its descendants. Traversal uses an explicit
/// stack, so thread depth does not grow the call stack.
///
/// # Errors
///
/// Returns [`CommentError::InvalidDate`] if a `created_on` value has no
/// leading `YYYY-MM-DD`.
pub fn flatten(
    article_id: &str,
    roots: impl IntoIterator<Item = Comment>,
    policy: ContentPolicy,
) -> Result<Vec<FlatComment>, CommentError> {
    let mut stack: Vec<Comment> = sorted_by_id(roots);
    stack.reverse();
    let mut flat = Vec::with_capacity(stack.len());

    while let Some(mut node) = stack.pop() {
        let children = sorted_by_id(std::mem::take(&mut node.children).into_values());
        flat.push(node.into_flat(article_id, policy)?);
        stack.extend(children.into_iter().rev());
    }

    Ok(flat)
}

/// Accepts a map keyed by id, a list, or `null`. The site sends `[]` for
/// "no replies". Entries are decoded in place, nothing is buffered.
struct CommentMapVisitor;

impl<'de> Visitor<'de> for CommentMapVisitor {
    type Value = BTreeMap<String, Comment>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map or list of comments")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut comments = BTreeMap::new();
        while let Some((key, comment)) = access.next_entry::<String, Comment>()? {
            comments.insert(key, comment);
        }
        Ok(comments)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut comments = BTreeMap::new();
        while let Some(comment) = access.next_element::<Comment>()? {
            comments.insert(comment.id.to_string(), comment);
        }
        Ok(comments)
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(BTreeMap::new())
    }

    fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(BTreeMap::new())
    }
}

fn comment_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, Comment>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(CommentMapVisitor)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Text(String),
}

impl RawId {
    fn parse<E: serde::de::Error>(self) -> Result<i64, E> {
        match self {
            Self::Int(n) => Ok(n),
            Self::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("expected numeric id, got '{s}'"))),
        }
    }
}

fn lenient_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer)?.parse()
}

fn lenient_opt_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(raw) => raw.parse().map(Some),
        None => Ok(None),
    }
}
