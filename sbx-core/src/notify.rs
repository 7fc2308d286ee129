//! Fire-and-forget callout that triggers the server-side file stream.
//!
//! When the server pushes a file token over the TCP link, the device
//! fetches the actual content out-of-band over HTTP. The response is
//! ignored; a failed request is only a diagnostic.

use tracing::{debug, warn};

/// Port the management server's HTTP API listens on.
pub const NOTIFY_PORT: u16 = 5000;

/// Client for the download-stream trigger endpoint.
#[derive(Debug, Clone)]
pub struct StreamNotifier {
    host: String,
    client: reqwest::Client,
}

impl StreamNotifier {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            client: reqwest::Client::new(),
        }
    }

    /// The stream-trigger URL for one file token.
    pub fn url(&self, token: &str) -> String {
        format!(
            "http://{}:{}/api/device_ctrl/download_file_stream?fileToken={}",
            self.host, NOTIFY_PORT, token
        )
    }

    /// Fire the callout in the background. The response is discarded.
    pub fn spawn(&self, token: String) {
        let url = self.url(&token);
        let client = self.client.clone();
        tokio::spawn(async move {
            debug!(%url, "triggering file stream");
            if let Err(e) = client.get(&url).send().await {
                warn!(%url, "stream notify failed: {e}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_embeds_host_and_token() {
        let notifier = StreamNotifier::new("192.0.2.10");
        assert_eq!(
            notifier.url("a1b2c3d4"),
            "http://192.0.2.10:5000/api/device_ctrl/download_file_stream?fileToken=a1b2c3d4"
        );
    }
}
