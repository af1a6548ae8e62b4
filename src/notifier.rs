//! Team notifications about who is on call.

use crate::buddy::Buddy;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Slack mention that pings everybody in the channel.
pub const CHANNEL_MENTION: &str = "<!channel>";

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Notification request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Notification endpoint returned status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Notification was not delivered within {0:?}")]
    Timeout(Duration),
}

/// Every failure of a single send; a notifier may target several endpoints.
#[derive(Debug, thiserror::Error)]
#[error("{} notification delivery error(s): {}", .0.len(), JoinedErrors(.0))]
pub struct DeliveryErrors(pub Vec<DeliveryError>);

impl DeliveryErrors {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<DeliveryError> for DeliveryErrors {
    fn from(error: DeliveryError) -> Self {
        Self(vec![error])
    }
}

struct JoinedErrors<'a>(&'a [DeliveryError]);

impl fmt::Display for JoinedErrors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str, channel: &str) -> Result<(), DeliveryErrors>;
}

/// Text announcing `buddy` to the team.
pub fn notification_message(buddy: &Buddy) -> String {
    if buddy.is_resolved() {
        format!(
            "{}: Just for your information *{}* ({}) is on call",
            CHANNEL_MENTION, buddy.name, buddy.contact
        )
    } else {
        format!("{}: :warning: no buddy on call, check the calendar!", CHANNEL_MENTION)
    }
}

#[derive(Debug, Serialize)]
struct SlackPayload<'a> {
    text: &'a str,
    channel: &'a str,
    link_names: &'a str,
}

/// Posts to one or more Slack incoming webhooks.
pub struct SlackNotifier {
    client: Client,
    webhooks: Vec<SecretString>,
}

impl SlackNotifier {
    pub fn new(webhooks: Vec<SecretString>, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, webhooks })
    }

    async fn post(&self, webhook: &SecretString, payload: &SlackPayload<'_>) -> Result<(), DeliveryError> {
        let response = self.client.post(webhook.expose_secret()).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected { status: status.as_u16(), body });
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, message: &str, channel: &str) -> Result<(), DeliveryErrors> {
        let payload = SlackPayload { text: message, channel, link_names: "1" };
        debug!("Sending Slack notification to {} webhook(s): {:?}", self.webhooks.len(), payload);

        let mut errors = Vec::new();
        for webhook in &self.webhooks {
            if let Err(e) = self.post(webhook, &payload).await {
                errors.push(e);
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(DeliveryErrors(errors)) }
    }
}
