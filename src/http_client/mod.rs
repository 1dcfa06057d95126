//! HTTP client for the remote analysis service.

mod response;
mod user_agent;

pub use response::{decode_analysis, HttpResponse};
pub use user_agent::{resolve_user_agent, USER_AGENT};

pub(crate) use response::embedded_error;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use crate::models::AnalysisResult;
use crate::services::analysis::{AnalysisBackend, AnalysisError, AnalysisRequest};

/// Default service location when nothing is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Strip trailing slashes so endpoint paths can be appended.
pub fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_API_URL.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Client for the analysis service endpoints.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

/// The HTTP implementation of [`AnalysisBackend`].
pub type HttpAnalysisClient = HttpClient;

impl HttpClient {
    /// Create a client. No timeout is applied unless one is given.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, AnalysisError> {
        Self::with_user_agent(base_url, timeout, None)
    }

    /// Create a client with custom user agent configuration.
    /// - None: default buzzscan user agent
    /// - Some(custom): custom user agent string
    pub fn with_user_agent(
        base_url: &str,
        timeout: Option<Duration>,
        user_agent_config: Option<&str>,
    ) -> Result<Self, AnalysisError> {
        let user_agent = resolve_user_agent(user_agent_config);
        let mut builder = Client::builder()
            .user_agent(&user_agent)
            .gzip(true)
            .brotli(true);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| AnalysisError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: normalize_base_url(base_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the URL of a service endpoint.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Resolve a possibly relative link returned by the service.
    pub fn resolve(&self, href: &str) -> String {
        if Url::parse(href).is_ok() {
            return href.to_string();
        }
        Url::parse(&format!("{}/", self.base_url))
            .and_then(|base| base.join(href))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| self.endpoint(href))
    }

    /// Make a GET request.
    pub async fn get(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
        let start = Instant::now();
        let response = self.client.get(url).send().await?;
        debug!(
            "GET {} -> {} in {}ms",
            url,
            response.status().as_u16(),
            start.elapsed().as_millis()
        );
        Ok(HttpResponse::new(response))
    }

    /// Submit one document to `/analyze`.
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let url = self.endpoint("analyze");
        let size = request.payload.len();

        let file = Part::bytes(request.payload.to_vec())
            .file_name(request.file_name.clone())
            .mime_str("application/pdf")?;
        let form = Form::new()
            .part("file", file)
            .text("buzzwords", request.keywords)
            .text("word_budget", request.word_budget.as_str());

        info!("Submitting {} ({} bytes) for analysis", request.file_name, size);
        let start = Instant::now();
        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status();
        let body: Bytes = response.bytes().await?;
        debug!(
            "POST {} -> {} in {}ms",
            url,
            status.as_u16(),
            start.elapsed().as_millis()
        );

        decode_analysis(status, &body)
    }
}

#[async_trait]
impl AnalysisBackend for HttpClient {
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        HttpClient::analyze(self, request).await
    }
}
