//! Article Harvester Core Library
//!
//! Collects single-ticker articles and their reader discussions from a
//! financial content site and stores them in SQLite for text analysis.
//!
//! # Architecture
//!
//! Leaves first:
//! - [`auth`] - Session cookie credentials
//! - [`config`] - JSON configuration and endpoint templates
//! - [`fetch`] - Rate-limited HTTP GET with bounded retry
//! - [`html`] - Tag/attribute queries over parsed pages
//! - [`discover`] - Article-id discovery from listing pages
//! - [`article`] - Article page parsing and validation
//! - [`comments`] - Comment payload fetching and tree flattening
//! - [`db`] / [`store`] - Database setup and duplicate-tolerant writes
//! - [`collect`] - The per-id collection run
//! - [`ids`] - Comma-separated id list files
//! - [`analysis`] - Negative-word scoring of stored text

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod analysis;
pub mod article;
pub mod auth;
pub mod collect;
pub mod comments;
pub mod config;
pub mod db;
pub mod discover;
pub mod fetch;
pub mod html;
pub mod ids;
pub mod store;

// Re-export commonly used types
pub use article::{Article, ArticleOutcome, ArticleParser};
pub use auth::Credentials;
pub use collect::{Collector, IdOutcome, RunOptions, RunSummary};
pub use comments::{CommentFetcher, ContentPolicy, FlatComment};
pub use config::HarvestConfig;
pub use db::Database;
pub use discover::{Discoverer, FailedPagePolicy};
pub use fetch::{FetchError, FetchResponse, Fetcher, RetryPolicy};
pub use store::{Store, WriteOutcome};
