use async_trait::async_trait;
use thiserror::Error;

pub mod slack;

pub use slack::SlackNotifier;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("notification API error: {0}")]
    Api(String),
}

/// Posts short text messages to a chat channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn post_message(&self, channel: &str, text: &str) -> Result<(), NotifyError>;
}
