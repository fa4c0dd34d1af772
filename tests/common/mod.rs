//! Shared fixtures for integration tests: a mock content site and fast fetchers.
//!
//! Each test binary uses a different subset, hence the dead-code allowance.
#![allow(dead_code)]

use harvester_core::Fetcher;
use harvester_core::config::{Endpoints, FetchSettings};
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Cookie header used by authenticated fixtures.
pub const SESSION_COOKIE: &str = "session=abc123";

/// Fetcher with a single attempt and no rate limiting.
pub fn fast_fetcher() -> Fetcher {
    let settings = FetchSettings {
        max_attempts: 1,
        rate_limit_ms: 0,
        connect_timeout_secs: 5,
        read_timeout_secs: 10,
        ..FetchSettings::default()
    };
    Fetcher::from_settings(&settings).expect("fetcher builds")
}

pub fn endpoints(server: &MockServer) -> Endpoints {
    Endpoints::with_base_url(server.uri())
}

/// Article page with the given primary-ticker anchor texts and paragraphs.
///
/// A disclosure paragraph followed by a trailing paragraph is always appended.
pub fn article_page(primary: &[&str], paragraphs: &[&str]) -> String {
    let anchors: String = primary
        .iter()
        .map(|t| format!(r#"<a href="/symbol/x" sasource="article_primary_about">{t}</a>"#))
        .collect();
    let body: String = paragraphs.iter().map(|p| format!("<p>{p}</p>")).collect();
    format!(
        r#"<html><body>
        <h1>Quarterly Results Review</h1>
        <time itemprop="datePublished" content="2017-03-02T10:00:00-05:00">Mar 2</time>
        <a href="/author/jane" sasource="auth_header_name">Jane Roe</a>
        {anchors}
        <a href="/symbol/MSFT" sasource="article_about">MSFT</a>
        {body}
        <p id="a-disclosure">Disclosure: I am long.</p>
        <p>Comments below</p>
        </body></html>"#
    )
}

/// Serves `page` for article `id` to every request.
pub async fn mount_article(server: &MockServer, id: &str, page: String) {
    Mock::given(method("GET"))
        .and(path(format!("/article/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(server)
        .await;
}

/// Serves `page` for article `id` only to requests carrying [`SESSION_COOKIE`].
pub async fn mount_authenticated_article(server: &MockServer, id: &str, page: String) {
    Mock::given(method("GET"))
        .and(path(format!("/article/{id}")))
        .and(header("cookie", SESSION_COOKIE))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .with_priority(1)
        .mount(server)
        .await;
}

/// Serves a comment payload for article `id`.
pub async fn mount_comments(server: &MockServer, id: &str, payload: Value) {
    Mock::given(method("GET"))
        .and(path("/account/ajax_get_comments"))
        .and(query_param("id", id))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload))
        .mount(server)
        .await;
}

/// Serves a raw comment-list body for article `id`.
pub async fn mount_comments_body(server: &MockServer, id: &str, body: String) {
    Mock::given(method("GET"))
        .and(path("/account/ajax_get_comments"))
        .and(query_param("id", id))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

/// Serves a raw body for one listing page of `symbol`.
pub async fn mount_listing(server: &MockServer, symbol: &str, page: u32, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/symbol/{symbol}/more_focus")))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

/// Listing page body referencing the given article ids.
pub fn listing_body(ids: &[&str]) -> String {
    ids.iter()
        .map(|id| format!(r#"<a href="/article/{id}-some-title">t</a>"#))
        .collect()
}

fn comment(id: i64, parent: Option<i64>, content: &str, children: Value) -> Value {
    json!({
        "id": id,
        "user_id": 900 + id,
        "created_on": "2017-03-03T08:15:00-05:00",
        "content": content,
        "parent_id": parent,
        "discussion_id": 77,
        "children": children,
    })
}

/// Thread A(1) -> [B(2) -> [D(4)], C(3)], ids offset by `base`.
pub fn comment_thread(base: i64) -> Value {
    let (a, b, c, d) = (base + 1, base + 2, base + 3, base + 4);
    json!({
        "comments": {
            a.to_string(): comment(a, None, "A", json!({
                b.to_string(): comment(b, Some(a), "B", json!({
                    d.to_string(): comment(d, Some(b), "D", json!([])),
                })),
                c.to_string(): comment(c, Some(a), "C", json!([])),
            })),
        }
    })
}

/// Comment-list body holding one reply chain `1 -> 2 -> ... -> depth`.
///
/// Built as text so the fixture itself never recurses.
pub fn reply_chain_body(depth: usize) -> String {
    let mut body = String::from(r#"{"comments": {"1": "#);
    for id in 1..=depth {
        let parent = if id == 1 {
            "null".to_string()
        } else {
            (id - 1).to_string()
        };
        body.push_str(&format!(
            r#"{{"id": {id}, "user_id": 5, "created_on": "2017-03-03", "content": "reply {id}", "parent_id": {parent}, "discussion_id": 77, "children": "#
        ));
        if id < depth {
            body.push_str(&format!(r#"{{"{}": "#, id + 1));
        } else {
            body.push_str("[]");
        }
    }
    body.push_str(&"}}".repeat(depth - 1));
    body.push_str("}}}");
    body
}
