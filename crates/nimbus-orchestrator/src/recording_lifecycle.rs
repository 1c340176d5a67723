//! Recording lifecycle reducer (spec §4.4): translates webhook-driven
//! BotDeployment status transitions into the commands the worker layer must
//! run. State transitions themselves are validated by
//! `BotDeploymentStatus::allowed_successors`; this reducer decides what
//! *else* happens when a transition succeeds, following the pure
//! `(state, event) -> (new_state, commands)` shape used throughout the
//! engine.

use nimbus_types::{BotDeployment, BotDeploymentStatus, RecordingStatus};

#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    ProviderStatusChanged { next: BotDeploymentStatus, detail: Option<String> },
    TranscriptReady,
    MediaUploadCompleted,
    CancelRequested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleCommand {
    SetRecordingStatus(RecordingStatus),
    EnqueueMediaUploadJob,
    EnqueueTranscriptFetchJob,
    EnqueueThumbnailJob,
    EnqueueCompletionNotification,
}

/// Applies one lifecycle event to a BotDeployment. Returns `None` if the
/// requested transition is illegal (caller maps that to `conflict`).
pub fn reduce(
    deployment: &mut BotDeployment,
    event: LifecycleEvent,
) -> Option<Vec<LifecycleCommand>> {
    match event {
        LifecycleEvent::ProviderStatusChanged { next, detail } => {
            if !deployment.push_transition(next, detail) {
                return None;
            }
            let mut commands = Vec::new();
            if next == BotDeploymentStatus::Completed {
                commands.push(LifecycleCommand::SetRecordingStatus(RecordingStatus::Processing));
                commands.push(LifecycleCommand::EnqueueMediaUploadJob);
            }
            if next == BotDeploymentStatus::Failed {
                commands.push(LifecycleCommand::SetRecordingStatus(RecordingStatus::Failed));
            }
            Some(commands)
        }
        LifecycleEvent::TranscriptReady => {
            Some(vec![LifecycleCommand::EnqueueTranscriptFetchJob])
        }
        LifecycleEvent::MediaUploadCompleted => Some(vec![
            LifecycleCommand::EnqueueThumbnailJob,
            LifecycleCommand::EnqueueCompletionNotification,
        ]),
        LifecycleEvent::CancelRequested => {
            if !deployment.push_transition(BotDeploymentStatus::Cancelled, None) {
                return None;
            }
            Some(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn deployment_in(status: BotDeploymentStatus) -> BotDeployment {
        BotDeployment {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            recording_id: Uuid::new_v4(),
            bot_id: "bot_1".into(),
            status,
            status_history: vec![],
            scheduled_join_time: Utc::now(),
            actual_join_time: None,
            leave_time: None,
            error_code: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn completing_enqueues_media_upload_and_marks_recording_processing() {
        let mut deployment = deployment_in(BotDeploymentStatus::Leaving);
        let commands = reduce(
            &mut deployment,
            LifecycleEvent::ProviderStatusChanged { next: BotDeploymentStatus::Completed, detail: None },
        )
        .expect("legal transition");
        assert!(commands.contains(&LifecycleCommand::EnqueueMediaUploadJob));
        assert!(commands.contains(&LifecycleCommand::SetRecordingStatus(RecordingStatus::Processing)));
    }

    #[test]
    fn illegal_transition_from_scheduled_to_completed_is_rejected() {
        let mut deployment = deployment_in(BotDeploymentStatus::Scheduled);
        let result = reduce(
            &mut deployment,
            LifecycleEvent::ProviderStatusChanged { next: BotDeploymentStatus::Completed, detail: None },
        );
        assert!(result.is_none());
        assert_eq!(deployment.status, BotDeploymentStatus::Scheduled);
    }

    #[test]
    fn cancel_is_allowed_from_any_non_terminal_state() {
        let mut deployment = deployment_in(BotDeploymentStatus::InMeeting);
        let commands = reduce(&mut deployment, LifecycleEvent::CancelRequested).expect("cancel allowed");
        assert!(commands.is_empty());
        assert_eq!(deployment.status, BotDeploymentStatus::Cancelled);
    }
}
