//! Canned request executor for tests that must not touch the network.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::deadline::Deadline;
use crate::error::LookupError;
use crate::http::{FetchRequest, FetchResponse, RequestExecutor};

/// Scripted outcome for one URL.
#[derive(Debug, Clone)]
pub enum Canned {
    Respond(FetchResponse),
    Fail(LookupError),
    /// Never answers; only the caller's deadline ends the request
    Stall,
}

impl Canned {
    pub fn html(body: impl Into<String>) -> Self {
        Self::Respond(FetchResponse {
            status: 200,
            content_type: Some("text/html; charset=UTF-8".to_string()),
            body: body.into(),
        })
    }

    pub fn json(body: impl Into<String>) -> Self {
        Self::Respond(FetchResponse {
            status: 200,
            content_type: Some("application/json".to_string()),
            body: body.into(),
        })
    }

    pub fn status(status: u16) -> Self {
        Self::Respond(FetchResponse {
            status,
            content_type: Some("text/html".to_string()),
            body: String::new(),
        })
    }
}

/// Executor answering from a URL table; unknown URLs get a 404.
///
/// Every request is recorded so tests can assert on headers and call counts.
#[derive(Debug, Default)]
pub struct CannedExecutor {
    routes: HashMap<String, Canned>,
    latency: Option<Duration>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl CannedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers requests for exactly `url` with `canned`.
    pub fn route(mut self, url: impl Into<String>, canned: Canned) -> Self {
        self.routes.insert(url.into(), canned);
        self
    }

    /// Delays every answer by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Returns a copy of every request received so far.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().clone()
    }

    /// Counts requests whose URL equals `url`.
    pub fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|request| request.url == url)
            .count()
    }
}

#[async_trait]
impl RequestExecutor for CannedExecutor {
    async fn execute(
        &self,
        request: FetchRequest,
        deadline: &Deadline,
    ) -> Result<FetchResponse, LookupError> {
        self.requests.lock().push(request.clone());
        let canned = self
            .routes
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| Canned::status(404));
        let latency = self.latency;

        deadline
            .run(&format!("{} request", request.service), async move {
                if let Some(latency) = latency {
                    tokio::time::sleep(latency).await;
                }
                match canned {
                    Canned::Respond(response) => Ok(response),
                    Canned::Fail(error) => Err(error),
                    Canned::Stall => {
                        std::future::pending::<()>().await;
                        Err(LookupError::internal("pending future resolved"))
                    }
                }
            })
            .await
    }
}
