pub mod error;
pub mod event;
pub mod notification;
pub mod recording;
pub mod retry;
pub mod rules;
pub mod sequence;
pub mod webhook;

pub use error::NimbusError;
pub use event::EngineEvent;
pub use notification::{
    NotificationChannel, NotificationFeedback, NotificationFrequency, NotificationInteraction,
    NotificationPriority, NotificationQueueItem, NotificationQueueStatus, UserMetrics,
};
pub use recording::{
    BotDeployment, BotDeploymentStatus, MediaUploadStatus, Recording, RecordingStatus,
    StatusHistoryEntry,
};
pub use retry::RetryJob;
pub use rules::{DomainMode, RecordingRule, RoutingRule};
pub use sequence::{SequenceExecution, SequenceExecutionStatus, StepOutcome, StepResult};
pub use webhook::{WebhookEvent, WebhookStatus};
