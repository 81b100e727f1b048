//! Reference URL tools
//!
//! Pages added here are fetched on request, reduced to plain text and
//! handed to the suggestion prompt as grounding.

use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{error, info};

use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::ReferenceUrl;

#[derive(Debug, Clone, Deserialize)]
pub struct AddUrlRequest {
    pub url: String,
}

/// Accept only absolute http(s) urls
pub fn parse_url(raw: &str) -> AppResult<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| AppError::Validation(format!("invalid url '{}': {}", raw.trim(), e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AppError::Validation(format!(
            "unsupported url scheme '{}'",
            other
        ))),
    }
}

pub fn list_urls(db: &Database) -> AppResult<Vec<ReferenceUrl>> {
    Ok(db.with_conn(ReferenceUrl::list)?)
}

pub fn add_url(db: &Database, request: AddUrlRequest) -> AppResult<ReferenceUrl> {
    let url = parse_url(&request.url)?;
    let created = db.with_conn(|conn| ReferenceUrl::create(conn, url.as_str(), Utc::now()))?;
    match created {
        Some(row) => {
            info!("Added reference url {} ({})", row.id, row.url);
            Ok(row)
        }
        None => Err(AppError::Validation(format!("url '{}' is already stored", url))),
    }
}

pub fn delete_url(db: &Database, id: i64) -> AppResult<()> {
    if db.with_conn(|conn| ReferenceUrl::delete(conn, id))? {
        info!("Deleted reference url {}", id);
        Ok(())
    } else {
        Err(AppError::url_not_found(id))
    }
}

/// Fetch a stored url, strip it to text and save the result
///
/// A failed fetch leaves the stored row as it was.
pub async fn index_url(
    db: &Database,
    client: &Client,
    id: i64,
    timeout: Duration,
) -> AppResult<ReferenceUrl> {
    let row = db
        .with_conn(|conn| ReferenceUrl::get_by_id(conn, id))?
        .ok_or_else(|| AppError::url_not_found(id))?;

    let html = fetch_page(client, &row.url, timeout).await.map_err(|e| {
        error!("Indexing url {} ({}) failed: {}", id, row.url, e);
        e
    })?;
    let text = strip_html(&html);

    let updated = db
        .with_conn(|conn| ReferenceUrl::set_content(conn, id, &text, Utc::now()))?
        .ok_or_else(|| AppError::url_not_found(id))?;

    info!("Indexed url {} ({} chars)", id, text.len());
    Ok(updated)
}

async fn fetch_page(client: &Client, url: &str, timeout: Duration) -> AppResult<String> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| AppError::FetchFailed(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::FetchFailed(format!("{} returned {}", url, status)));
    }

    response
        .text()
        .await
        .map_err(|e| AppError::FetchFailed(e.to_string()))
}

/// Reduce an HTML document to whitespace-collapsed text
pub fn strip_html(html: &str) -> String {
    let without_blocks = remove_blocks(&remove_blocks(html, "script"), "style");

    let mut text = String::with_capacity(without_blocks.len());
    let mut in_tag = false;
    for c in without_blocks.chars() {
        match c {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    decode_entities(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop `<tag ...>...</tag>` elements with their bodies, case-insensitively
fn remove_blocks(html: &str, tag: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);

    let mut out = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(start) = lower[pos..].find(&open).map(|i| pos + i) {
        out.push_str(&html[pos..start]);
        match lower[start..].find(&close) {
            Some(end) => pos = start + end + close.len(),
            None => {
                pos = html.len();
                break;
            }
        }
    }
    out.push_str(&html[pos..]);
    out
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
