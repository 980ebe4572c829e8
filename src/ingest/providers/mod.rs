// src/ingest/providers/mod.rs
pub mod arxiv;
pub mod github;
pub mod hackernews;
pub mod rss;

pub use arxiv::ArxivConnector;
pub use github::GithubConnector;
pub use hackernews::HackerNewsConnector;
pub use rss::{DevtoConnector, GoogleNewsConnector, OfficialBlogsConnector};
