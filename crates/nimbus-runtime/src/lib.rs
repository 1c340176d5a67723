//! Cron-driven worker/scheduler runtime for the Nimbus engine (spec §4.4,
//! §4.6). Owns the in-process domain stores the workers operate on and the
//! three tick loops themselves; `nimbus-engine`'s binary entry point spawns
//! them on an interval.

pub mod media_upload_worker;
pub mod notification_worker;
pub mod stores;
pub mod transcript_worker;

pub use media_upload_worker::{MediaUploadTickReport, MediaUploadWorker};
pub use notification_worker::{NotificationTickReport, NotificationWorker};
pub use stores::{BotDeploymentStore, NotificationQueueStore, RecordingStore, RetryJobStore, UserMetricsStore};
pub use transcript_worker::{TranscriptTickReport, TranscriptWorker};
