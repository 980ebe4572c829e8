// src/ingest/http.rs
//! Shared outbound HTTP client and small GET helpers.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::HttpConfig;

pub fn build_client(cfg: &HttpConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
        .user_agent(cfg.user_agent.clone())
        .build()
        .context("building http client")
}

/// GET returning the body; non-2xx is an error.
pub async fn get_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .with_context(|| format!("GET {url} status"))?;
    resp.text().await.with_context(|| format!("GET {url} body"))
}

/// GET + JSON decode with optional extra headers.
pub async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    headers: &[(&str, &str)],
) -> Result<T> {
    let mut req = client.get(url);
    for (k, v) in headers {
        req = req.header(*k, *v);
    }
    let resp = req
        .send()
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .with_context(|| format!("GET {url} status"))?;
    resp.json::<T>()
        .await
        .with_context(|| format!("GET {url} json"))
}
