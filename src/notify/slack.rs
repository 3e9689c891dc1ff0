use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

use super::{NotifyError, Notifier};

const SLACK_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
}

/// Slack answers HTTP 200 for most failures and reports them in the body.
#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SlackResponse {
    fn into_result(self) -> Result<(), NotifyError> {
        if self.ok {
            Ok(())
        } else {
            Err(NotifyError::Api(
                self.error.unwrap_or_else(|| "unknown_error".to_string()),
            ))
        }
    }
}

pub struct SlackNotifier {
    client: Client,
    token: String,
}

impl SlackNotifier {
    pub fn new(token: String) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, token })
    }

    fn endpoint(method: &str) -> String {
        format!("{}/{}", SLACK_API_BASE, method)
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn post_message(&self, channel: &str, text: &str) -> Result<(), NotifyError> {
        let body = PostMessageRequest { channel, text };
        debug!(target: "slack", channel = channel, "Sending chat.postMessage");

        let response = self
            .client
            .post(Self::endpoint("chat.postMessage"))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let result = response.json::<SlackResponse>().await?.into_result();
        match &result {
            Ok(()) => info!(target: "slack", channel = channel, "Posted message"),
            Err(e) => error!(target: "slack", channel = channel, "Slack API error: {}", e),
        }
        result
    }
}
