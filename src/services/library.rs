//! Remote document library.
//!
//! Lists the PDFs the analysis service offers and downloads picked items so
//! they can be added to the registry like local uploads.

use bytes::Bytes;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::http_client::{embedded_error, HttpClient};
use crate::registry::NewDocument;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Could not reach library: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("{0}")]
    Rejected(String),

    #[error("Invalid response from library")]
    InvalidResponse,
}

/// A document offered by the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryItem {
    pub name: String,
    pub url: String,
    /// Path of the item inside the library.
    pub key: Option<String>,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LibraryListing {
    pub items: Vec<LibraryItem>,
    /// Set when the library is unavailable, for example not configured.
    pub warning: Option<String>,
}

impl LibraryListing {
    /// Find an item by key or name.
    pub fn find(&self, reference: &str) -> Option<&LibraryItem> {
        let reference = reference.trim();
        self.items
            .iter()
            .find(|item| item.key.as_deref() == Some(reference))
            .or_else(|| self.items.iter().find(|item| item.name == reference))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawListing {
    items: Vec<RawItem>,
    warning: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawItem {
    name: Option<String>,
    url: Option<String>,
    key: Option<String>,
    size: Option<Value>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl RawItem {
    fn into_item(self, http: &HttpClient) -> Option<LibraryItem> {
        let url = non_empty(self.url)?;
        let key = non_empty(self.key);
        let name = non_empty(self.name).or_else(|| {
            key.as_deref()
                .and_then(|k| k.rsplit('/').find(|s| !s.is_empty()))
                .map(str::to_string)
        })?;
        Some(LibraryItem {
            name,
            url: http.resolve(&url),
            key,
            size: self.size.as_ref().and_then(Value::as_u64),
        })
    }
}

/// Parse a `/library` response body.
pub(crate) fn parse_listing(body: Value, http: &HttpClient) -> Result<LibraryListing, LibraryError> {
    let raw: RawListing =
        serde_json::from_value(body).map_err(|_| LibraryError::InvalidResponse)?;
    let total = raw.items.len();
    let items: Vec<LibraryItem> = raw
        .items
        .into_iter()
        .filter_map(|item| item.into_item(http))
        .collect();
    if items.len() < total {
        debug!("Ignored {} incomplete library item(s)", total - items.len());
    }
    Ok(LibraryListing {
        items,
        warning: non_empty(raw.warning),
    })
}

/// Client for the library endpoints.
#[derive(Clone)]
pub struct LibraryClient {
    http: HttpClient,
}

impl LibraryClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn list(&self) -> Result<LibraryListing, LibraryError> {
        let response = self.http.get(&self.http.endpoint("library")).await?;
        let status = response.status;
        let body = response.bytes().await?;
        let json: Option<Value> = serde_json::from_slice(&body).ok();

        if !status.is_success() {
            return Err(match json.as_ref().and_then(embedded_error) {
                Some(message) => LibraryError::Rejected(message),
                None => LibraryError::Http {
                    status: status.as_u16(),
                },
            });
        }

        let listing = parse_listing(json.ok_or(LibraryError::InvalidResponse)?, &self.http)?;
        if let Some(warning) = &listing.warning {
            warn!("Library: {}", warning);
        }
        Ok(listing)
    }

    /// Download one item.
    ///
    /// HTML answers (login pages, proxy errors) are rejected instead of being
    /// handed to the analysis service as a PDF.
    pub async fn fetch(&self, item: &LibraryItem) -> Result<Bytes, LibraryError> {
        let response = self.http.get(&item.url).await?;
        if !response.is_success() {
            return Err(LibraryError::Http {
                status: response.status.as_u16(),
            });
        }
        if let Some(content_type) = response.content_type() {
            if content_type.starts_with("text/html") {
                return Err(LibraryError::Rejected(format!(
                    "Expected a PDF, got {}",
                    content_type
                )));
            }
        }
        Ok(response.bytes().await?)
    }

    /// Download picked items. Failed downloads become documents without
    /// payload that carry the failure message.
    pub async fn pick(&self, items: &[LibraryItem]) -> Vec<NewDocument> {
        let payloads = join_all(items.iter().map(|item| self.fetch(item))).await;

        items
            .iter()
            .zip(payloads)
            .map(|(item, payload)| NewDocument::Library {
                name: item.name.clone(),
                url: item.url.clone(),
                key: item.key.clone(),
                payload: payload.map_err(|e| {
                    warn!("Failed to fetch {}: {}", item.name, e);
                    e.to_string()
                }),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn http() -> HttpClient {
        HttpClient::new("http://api.test", None).unwrap()
    }

    #[test]
    fn test_parse_listing_filters_incomplete_items() {
        let body = json!({
            "items": [
                {"name": "a.pdf", "url": "https://files.test/a.pdf", "key": "2024/a.pdf", "size": 1024},
                {"url": "/files/b.pdf", "key": "2023/b.pdf"},
                {"name": "no-url.pdf"},
                {"url": "https://files.test/anon.pdf"}
            ]
        });
        let listing = parse_listing(body, &http()).unwrap();

        assert_eq!(listing.items.len(), 2);
        assert_eq!(listing.items[0].size, Some(1024));
        assert_eq!(listing.items[1].name, "b.pdf");
        assert_eq!(listing.items[1].url, "http://api.test/files/b.pdf");
        assert!(listing.warning.is_none());
    }

    #[test]
    fn test_parse_listing_warning() {
        let body = json!({"items": [], "warning": "Library bucket not configured"});
        let listing = parse_listing(body, &http()).unwrap();
        assert!(listing.items.is_empty());
        assert_eq!(
            listing.warning.as_deref(),
            Some("Library bucket not configured")
        );
    }

    #[test]
    fn test_parse_listing_rejects_wrong_shape() {
        assert!(matches!(
            parse_listing(json!({"items": "nope"}), &http()),
            Err(LibraryError::InvalidResponse)
        ));
    }

    #[test]
    fn test_find_by_key_or_name() {
        let listing = parse_listing(
            json!({"items": [{"name": "a.pdf", "url": "https://files.test/a.pdf", "key": "2024/a.pdf"}]}),
            &http(),
        )
        .unwrap();
        assert!(listing.find("2024/a.pdf").is_some());
        assert!(listing.find("a.pdf").is_some());
        assert!(listing.find("b.pdf").is_none());
    }
}
