//! Request executor seam shared by the catalog client, the provider client and
//! the link extractor.
//!
//! Components receive an `Arc<dyn RequestExecutor>` instead of a handle to a
//! whole client, so tests substitute canned responses without a network.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::config::ProviderConfig;
use crate::deadline::Deadline;
use crate::error::LookupError;

/// A single outbound GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Short name of the dependency, used in error reports
    pub service: &'static str,
}

impl FetchRequest {
    pub fn get(service: &'static str, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            service,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }
}

/// Response body and the metadata callers inspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Checks whether the response declares an HTML body.
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("text/html"))
    }

    /// Converts a non-success status into the matching error kind.
    ///
    /// # Errors
    ///
    /// - `LookupError::NotFound` - Status 404
    /// - `LookupError::Upstream` - Any other non-2xx status
    pub fn error_for_status(self, service: &str, what: &str) -> Result<Self, LookupError> {
        match self.status {
            200..=299 => Ok(self),
            404 => Err(LookupError::not_found(what)),
            status => Err(LookupError::upstream(
                service,
                format!("returned status code {status}"),
            )),
        }
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// - `LookupError::Upstream` - The body is not the expected JSON shape
    pub fn json<T: serde::de::DeserializeOwned>(&self, service: &str) -> Result<T, LookupError> {
        serde_json::from_str(&self.body)
            .map_err(|e| LookupError::upstream(service, format!("JSON parsing failed: {e}")))
    }
}

/// Executes outbound requests on behalf of a component.
#[async_trait]
pub trait RequestExecutor: Send + Sync + Debug {
    /// Performs `request` within `deadline`.
    ///
    /// # Errors
    ///
    /// - `LookupError::Upstream` - Transport failure or unreadable body
    /// - `LookupError::Timeout` - The deadline elapsed first
    async fn execute(
        &self,
        request: FetchRequest,
        deadline: &Deadline,
    ) -> Result<FetchResponse, LookupError>;
}

/// `reqwest` backed executor with a shared connection pool.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    /// Creates an executor with a fresh client.
    ///
    /// # Errors
    ///
    /// - `LookupError::Internal` - The TLS backend could not be initialised
    pub fn new() -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .build()
            .map_err(|e| LookupError::internal(format!("HTTP client setup failed: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn execute(
        &self,
        request: FetchRequest,
        deadline: &Deadline,
    ) -> Result<FetchResponse, LookupError> {
        let service = request.service;
        let mut builder = self.client.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let operation = format!("{service} request");
        deadline
            .run(&operation, async move {
                let response = builder.send().await.map_err(|e| {
                    LookupError::upstream(service, format!("HTTP request failed: {e}"))
                })?;

                let status = response.status().as_u16();
                let content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                let body = response.text().await.map_err(|e| {
                    LookupError::upstream(service, format!("reading body failed: {e}"))
                })?;

                tracing::trace!("{} {} -> {}", service, request.url, status);

                Ok(FetchResponse {
                    status,
                    content_type,
                    body,
                })
            })
            .await
    }
}

/// Headers the provider expects from a browser making an XHR request.
pub fn browser_headers(provider: &ProviderConfig) -> Vec<(String, String)> {
    let host = url::Url::parse(&provider.base_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_default();

    let mut headers = vec![
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        ),
        ("Accept-Language", "en-US,en;q=0.9".to_string()),
        ("Cookie", "__ddg2_=;".to_string()),
        ("DNT", "1".to_string()),
        ("Sec-Fetch-Dest", "empty".to_string()),
        ("Sec-Fetch-Mode", "cors".to_string()),
        ("X-Requested-With", "XMLHttpRequest".to_string()),
        ("User-Agent", provider.user_agent.clone()),
    ];
    if !host.is_empty() {
        headers.push(("Host", host));
    }

    headers
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}
