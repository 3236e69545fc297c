//! HTTP agent implementation

use crate::config::AgentConfig;
use crate::errors::HttpError;
use crate::types::HttpMethod;
use reqwest::{header::CONTENT_TYPE, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

/// Status code and fully read body of a completed exchange
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Fail with [`HttpError::Status`] unless the target answered exactly 200
    pub fn require_ok(self, method: HttpMethod, path: &str) -> Result<Self, HttpError> {
        if self.status == 200 {
            Ok(self)
        } else {
            Err(HttpError::Status {
                method,
                path: path.to_string(),
                status: self.status,
            })
        }
    }
}

/// A simulated client: one cookie jar, one base URL, one cancellation scope.
///
/// Cloning (or [`Agent::scoped`]) shares the underlying connection pool and
/// cookie jar, so a session established through one handle is visible to all.
#[derive(Debug, Clone)]
pub struct Agent {
    client: Client,
    base_url: Url,
    timeout: Duration,
    cancel: CancellationToken,
}

impl Agent {
    /// Create an agent with a fresh cookie jar
    pub fn new(base_url: &str, config: &AgentConfig) -> Result<Self, HttpError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| HttpError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        debug!(
            "Creating agent for {} with {}s timeout",
            base_url,
            config.timeout.as_secs()
        );
        let client = Client::builder()
            .cookie_store(true)
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url,
            timeout: config.timeout,
            cancel: CancellationToken::new(),
        })
    }

    /// Bind this agent to a cancellation token
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Same session, different cancellation scope
    pub fn scoped(&self, cancel: CancellationToken) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            timeout: self.timeout,
            cancel,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `path` against the base URL. Absolute URLs are used as is.
    pub fn resolve(&self, path: &str) -> Result<Url, HttpError> {
        let resolved = if path.starts_with("http://") || path.starts_with("https://") {
            Url::parse(path)
        } else {
            self.base_url.join(path)
        };
        resolved.map_err(|e| HttpError::InvalidUrl(format!("{}: {}", path, e)))
    }

    pub async fn get(&self, path: &str) -> Result<HttpResponse, HttpError> {
        self.execute(HttpMethod::Get, path, None, None).await
    }

    /// GET with a tighter deadline than the agent-wide timeout
    pub async fn get_within(&self, path: &str, limit: Duration) -> Result<HttpResponse, HttpError> {
        self.execute(HttpMethod::Get, path, None, Some(limit)).await
    }

    pub async fn post_json<T>(&self, path: &str, body: &T) -> Result<HttpResponse, HttpError>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(body)?;
        self.execute(HttpMethod::Post, path, Some(payload), None).await
    }

    /// POST without a body, still announced as JSON
    pub async fn post_empty(&self, path: &str) -> Result<HttpResponse, HttpError> {
        self.execute(HttpMethod::Post, path, None, None).await
    }

    async fn execute(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Vec<u8>>,
        limit: Option<Duration>,
    ) -> Result<HttpResponse, HttpError> {
        let url = self.resolve(path)?;
        debug!("Building {} request to {}", method, url);

        let mut request = self.client.request(method.into(), url);
        if method != HttpMethod::Get {
            request = request.header(CONTENT_TYPE, "application/json");
        }
        if let Some(body) = body {
            request = request.body(body);
        }
        if let Some(limit) = limit {
            request = request.timeout(limit);
        }

        let exchange = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?.to_vec();
            Ok::<_, reqwest::Error>(HttpResponse { status, body })
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(HttpError::Cancelled { path: path.to_string() }),
            result = exchange => match result {
                Ok(response) => {
                    debug!("{} {} answered {}", method, path, response.status);
                    Ok(response)
                }
                Err(e) if e.is_timeout() => Err(HttpError::Timeout {
                    path: path.to_string(),
                    after: limit.unwrap_or(self.timeout),
                }),
                Err(e) => Err(HttpError::NetworkError(e)),
            },
        }
    }
}
