//! Response handling for the analysis service.

use std::collections::HashMap;

use bytes::Bytes;
use reqwest::{Response, StatusCode};
use serde_json::Value;

use crate::models::AnalysisResult;
use crate::services::analysis::AnalysisError;

/// HTTP response wrapper.
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HashMap<String, String>,
    pub(crate) response: Response,
}

impl HttpResponse {
    pub(crate) fn new(response: Response) -> Self {
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();
        Self {
            status: response.status(),
            headers,
            response,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(|s| s.as_str())
    }

    pub async fn bytes(self) -> Result<Bytes, reqwest::Error> {
        self.response.bytes().await
    }
}

/// Extract a non-empty `error` string from a JSON body.
pub(crate) fn embedded_error(body: &Value) -> Option<String> {
    match body.get("error")? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Turn an `/analyze` response into a result or a human readable error.
pub fn decode_analysis(status: StatusCode, body: &[u8]) -> Result<AnalysisResult, AnalysisError> {
    let json: Option<Value> = serde_json::from_slice(body).ok();

    if !status.is_success() {
        let status = status.as_u16();
        return Err(match json.as_ref().and_then(embedded_error) {
            Some(message) => AnalysisError::Rejected { status, message },
            None => AnalysisError::Http { status },
        });
    }

    let value = match json {
        Some(value @ Value::Object(_)) => value,
        _ => return Err(AnalysisError::InvalidResponse),
    };

    if let Some(message) = embedded_error(&value) {
        return Err(AnalysisError::Service(message));
    }

    serde_json::from_value(value).map_err(|e| {
        tracing::debug!("Analysis response did not match the expected shape: {}", e);
        AnalysisError::InvalidResponse
    })
}
