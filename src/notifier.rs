use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tracing::info;
use url::Url;

use crate::error::PublishError;
use crate::reporter;

/// Timeout for a single webhook post.
const POST_TIMEOUT: Duration = Duration::from_secs(10);

/// Destination for formatted messages.
pub trait Notifier {
    /// Deliver one message. An `Err` means the event must not be marked posted.
    fn post(&self, text: &str) -> impl Future<Output = Result<(), PublishError>> + Send;
}

/// Slack incoming webhook.
pub struct SlackWebhook {
    http: Client,
    url: Url,
}

impl SlackWebhook {
    pub fn new(url: Url) -> Result<Self, PublishError> {
        let http = Client::builder().timeout(POST_TIMEOUT).build()?;
        Ok(Self { http, url })
    }
}

impl Notifier for SlackWebhook {
    async fn post(&self, text: &str) -> Result<(), PublishError> {
        let resp = self
            .http
            .post(self.url.clone())
            .json(&json!({ "text": text }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        info!("Posted to Slack successfully");
        Ok(())
    }
}

/// Dry-run sink: prints each message to stdout instead of posting it.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreviewSink;

impl Notifier for PreviewSink {
    async fn post(&self, text: &str) -> Result<(), PublishError> {
        reporter::report_preview(text)?;
        Ok(())
    }
}

/// The channel chosen at startup.
pub enum Channel {
    Slack(SlackWebhook),
    Preview(PreviewSink),
}

impl Notifier for Channel {
    async fn post(&self, text: &str) -> Result<(), PublishError> {
        match self {
            Channel::Slack(slack) => slack.post(text).await,
            Channel::Preview(preview) => preview.post(text).await,
        }
    }
}
