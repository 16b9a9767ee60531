use crate::Error;
use serde::Serialize;
use tracing::{error, info, warn};
use url::Url;

/// Receives failures which should reach a human.
pub trait ErrorSink: Send + Sync {
    fn capture(&self, source: &str, error: &Error);
}

/// Only logs captured errors.
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn capture(&self, source: &str, error: &Error) {
        error!(source, %error, "Captured error");
    }
}

#[derive(Serialize)]
struct Report<'a> {
    source: &'a str,
    error: String,
}

/// Posts captured errors to a webhook without blocking the caller.
pub struct WebhookErrorSink {
    url: Url,
    client: reqwest::Client,
}

impl WebhookErrorSink {
    pub fn new(url: Url) -> WebhookErrorSink {
        WebhookErrorSink {
            url,
            client: reqwest::Client::new(),
        }
    }
}

impl ErrorSink for WebhookErrorSink {
    fn capture(&self, source: &str, error: &Error) {
        error!(source, %error, "Captured error");
        let report = Report {
            source,
            error: error.to_string(),
        };
        let Ok(body) = serde_json::to_value(&report) else {
            return;
        };
        let client = self.client.clone();
        let url = self.url.clone();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime, dropping error report");
            return;
        };
        runtime.spawn(async move { send_report(&client, url, body).await });
    }
}

async fn send_report(client: &reqwest::Client, url: Url, body: serde_json::Value) {
    match client.post(url).json(&body).send().await {
        Ok(response) => {
            info!(response_status = ?response.status(), "Sent error report");
        }
        Err(e) => {
            error!(error = %e, "Failed to send error report");
        }
    }
}
