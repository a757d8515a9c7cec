use super::FetchError;
use std::time::Duration;
use tracing::debug;

/// Thin wrapper over `reqwest::Client`: one attempt per call, no retry.
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true);

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let inner = builder.build().map_err(|source| FetchError::Network {
            url: String::from("<client>"),
            source,
        })?;

        Ok(Self { inner })
    }

    /// Fetch a URL as text. Non-2xx statuses are errors.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        debug!("GET {}", url);

        let network = |source| FetchError::Network {
            url: url.to_string(),
            source,
        };

        let resp = self.inner.get(url).send().await.map_err(network)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        resp.text().await.map_err(network)
    }
}
