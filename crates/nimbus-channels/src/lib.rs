//! Notification delivery channel drivers (spec §4.6): slack_dm, slack_channel,
//! email, in_app. Each driver sends one `NotificationQueueItem` and reports a
//! [`ChannelError`] classifying whether the send is worth retrying.

pub mod email;
pub mod in_app;
pub mod slack;
pub mod truncate;

use async_trait::async_trait;
use nimbus_types::NotificationQueueItem;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    #[error("channel request failed: {0}")]
    Transient(String),
    #[error("channel rejected payload: {0}")]
    Permanent(String),
}

#[async_trait]
pub trait ChannelDriver: Send + Sync {
    async fn send(&self, item: &NotificationQueueItem) -> Result<(), ChannelError>;
}

pub use email::{EmailDriver, HttpMailer, Mailer};
pub use in_app::InAppDriver;
pub use slack::{SlackChannelDriver, SlackDmDriver};
