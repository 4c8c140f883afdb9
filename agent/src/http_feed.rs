//! HTTP transport for the alert bridge status endpoint.

use async_trait::async_trait;
use sentrix_env::{EnvError, FeedSource, RawAlert};
use std::time::Duration;

/// Polls `GET <url>` and decodes the bridge's latest record.
pub struct HttpFeed {
    url: String,
    agent: ureq::Agent,
    timeout: Duration,
}

impl HttpFeed {
    /// Polls slower than `timeout` fail with [`EnvError::Timeout`].
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            // Backstop for the blocking thread once the poll has given up
            agent: ureq::AgentBuilder::new().timeout(timeout * 2).build(),
            timeout,
        }
    }
}

fn fetch(agent: &ureq::Agent, url: &str) -> Result<String, EnvError> {
    let response = agent.get(url).call().map_err(|e| match e {
        ureq::Error::Status(code, _) => EnvError::unavailable(format!("{} returned HTTP {}", url, code)),
        ureq::Error::Transport(t) => EnvError::unavailable(t.to_string()),
    })?;
    response.into_string().map_err(EnvError::decode)
}

/// Empty bodies and `null` mean the bridge has nothing yet.
pub fn decode(body: &str) -> Result<Option<RawAlert>, EnvError> {
    let body = body.trim();
    if body.is_empty() || body == "null" {
        return Ok(None);
    }
    serde_json::from_str(body).map(Some).map_err(EnvError::decode)
}

#[async_trait]
impl FeedSource for HttpFeed {
    async fn poll(&self) -> Result<Option<RawAlert>, EnvError> {
        let agent = self.agent.clone();
        let url = self.url.clone();
        // ureq blocks; keep it off the frame loop's worker
        let request = tokio::task::spawn_blocking(move || fetch(&agent, &url));
        let body = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| EnvError::Timeout(self.timeout.as_millis() as u64))?
            .map_err(|e| EnvError::ContextError(e.to_string()))??;
        decode(&body)
    }

    fn describe(&self) -> String {
        format!("http({})", self.url)
    }
}
