use std::time::Duration;

use tracing::trace;
use url::Url;

/// HTTP check, any 2xx or 3xx answer counts as up
#[derive(Debug, Clone, Default)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn request(
        &self,
        method: reqwest::Method,
        url: Url,
        timeout: Duration,
    ) -> Result<(), reqwest::Error> {
        let response = self.client.request(method, url).timeout(timeout).send().await?;
        let status = response.status();
        trace!(%status, "http probe answered");

        if status.is_success() || status.is_redirection() {
            Ok(())
        } else {
            // Surface the status as an error
            response.error_for_status().map(|_| ())
        }
    }
}
