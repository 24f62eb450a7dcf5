//! Submission orchestration for admin tooling
//!
//! Drives one form submission through validate -> encode -> dispatch ->
//! notify. The dispatcher and observer are trait objects so the surrounding
//! state container (whatever the embedding UI uses) stays out of this
//! module. The dispatch call is the only suspension point; every state
//! write after it is guarded by the detach flag so tear-down mid-flight
//! cannot trip a late update.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use crate::client::form::{DraftRecord, TransportPayload};
use crate::ingest::descriptor::EntityDescriptor;
use crate::types::ErrorMap;

/// Shown when the server gives no usable message
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// Where the submission currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionPhase {
    Idle,
    Validating,
    Submitting,
    Succeeded,
    Failed,
}

/// Server verdict on a dispatched submission
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub success: bool,
    pub message: Option<String>,
}

/// What the UI should do after a successful submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    /// Navigate away from the form (create/update flows)
    LeaveForm,
    /// Re-run the last list query so the view reflects the change
    RefreshList,
}

/// Sends an encoded payload to the server. Implementations wrap whatever
/// transport the tooling uses.
#[async_trait]
pub trait SubmitDispatcher: Send + Sync {
    /// Resolve with the server's verdict, or an error string on transport
    /// failure
    async fn dispatch(&self, payload: TransportPayload) -> Result<SubmitOutcome, String>;
}

/// Receives submission side effects: field annotations, notifications and
/// the post-success action
pub trait SubmissionObserver: Send + Sync {
    fn field_errors(&self, errors: &ErrorMap);
    fn notify_success(&self, message: &str);
    fn notify_error(&self, message: &str);
    /// Clear transient success/error flags held in shared state before the
    /// follow-up runs. Optional; defaults to a no-op.
    fn clear_transient(&self) {}
    fn follow_up(&self, action: FollowUp);
}

/// How one submit call ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResult {
    /// Another submission was already in flight; nothing happened
    Blocked,
    /// Local validation failed; no network call was made
    Invalid(ErrorMap),
    /// The dispatch completed with the given verdict
    Completed { success: bool },
    /// The orchestrator was detached while the call was in flight; no state
    /// was written after the await
    Detached,
}

/// Client-side submission state machine:
/// Idle -> Validating -> Submitting -> (Succeeded | Failed) -> Idle
pub struct SubmissionOrchestrator {
    dispatcher: Arc<dyn SubmitDispatcher>,
    observer: Arc<dyn SubmissionObserver>,
    descriptor: &'static EntityDescriptor,
    on_success: FollowUp,
    phase: Mutex<SubmissionPhase>,
    detached: AtomicBool,
}

impl SubmissionOrchestrator {
    pub fn new(
        dispatcher: Arc<dyn SubmitDispatcher>,
        observer: Arc<dyn SubmissionObserver>,
        descriptor: &'static EntityDescriptor,
        on_success: FollowUp,
    ) -> Self {
        Self {
            dispatcher,
            observer,
            descriptor,
            on_success,
            phase: Mutex::new(SubmissionPhase::Idle),
            detached: AtomicBool::new(false),
        }
    }

    pub fn phase(&self) -> SubmissionPhase {
        *self.phase.lock().unwrap()
    }

    /// Mark the orchestrator as torn down. A dispatch already in flight
    /// finishes silently; no observer call or phase write happens after.
    pub fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }

    fn set_phase(&self, phase: SubmissionPhase) {
        *self.phase.lock().unwrap() = phase;
    }

    /// Run one submission. The draft is borrowed, never consumed: on any
    /// failure the caller still holds the user's input for retry.
    pub async fn submit(&self, draft: &DraftRecord) -> SubmitResult {
        // Single-flight guard: while a dispatch is awaited, further submits
        // are rejected without side effects
        {
            let mut phase = self.phase.lock().unwrap();
            if *phase == SubmissionPhase::Submitting {
                debug!("Submission already in flight, ignoring");
                return SubmitResult::Blocked;
            }
            *phase = SubmissionPhase::Validating;
        }

        let errors = draft.validate(self.descriptor);
        if !errors.is_empty() {
            self.observer.field_errors(&errors);
            self.set_phase(SubmissionPhase::Failed);
            self.set_phase(SubmissionPhase::Idle);
            return SubmitResult::Invalid(errors);
        }

        let payload = draft.build_payload();
        self.set_phase(SubmissionPhase::Submitting);

        // The only suspension point
        let result = self.dispatcher.dispatch(payload).await;

        if self.detached.load(Ordering::SeqCst) {
            return SubmitResult::Detached;
        }

        match result {
            Ok(outcome) if outcome.success => {
                self.observer
                    .notify_success(outcome.message.as_deref().unwrap_or("Saved successfully"));
                self.observer.clear_transient();
                self.observer.follow_up(self.on_success);
                self.set_phase(SubmissionPhase::Succeeded);
                self.set_phase(SubmissionPhase::Idle);
                SubmitResult::Completed { success: true }
            }
            Ok(outcome) => {
                let message = outcome
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| GENERIC_FAILURE.to_string());
                self.observer.notify_error(&message);
                self.set_phase(SubmissionPhase::Failed);
                self.set_phase(SubmissionPhase::Idle);
                SubmitResult::Completed { success: false }
            }
            Err(transport_error) => {
                let message = if transport_error.trim().is_empty() {
                    GENERIC_FAILURE.to_string()
                } else {
                    transport_error
                };
                self.observer.notify_error(&message);
                self.set_phase(SubmissionPhase::Failed);
                self.set_phase(SubmissionPhase::Idle);
                SubmitResult::Completed { success: false }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::descriptor::DISTRICT;
    use tokio::sync::Semaphore;

    fn valid_draft() -> DraftRecord {
        let mut draft = DraftRecord {
            name: "Bhopal".to_string(),
            slug: "bhopal".to_string(),
            lat: Some(23.2599),
            lng: Some(77.4126),
            ..Default::default()
        };
        draft.set_image_url("https://example.com/x.jpg".to_string());
        draft
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl RecordingObserver {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl SubmissionObserver for RecordingObserver {
        fn field_errors(&self, errors: &ErrorMap) {
            self.events
                .lock()
                .unwrap()
                .push(format!("fields:{}", errors.len()));
        }
        fn notify_success(&self, message: &str) {
            self.events.lock().unwrap().push(format!("success:{message}"));
        }
        fn notify_error(&self, message: &str) {
            self.events.lock().unwrap().push(format!("error:{message}"));
        }
        fn clear_transient(&self) {
            self.events.lock().unwrap().push("clear".to_string());
        }
        fn follow_up(&self, action: FollowUp) {
            self.events.lock().unwrap().push(format!("follow_up:{action:?}"));
        }
    }

    struct StaticDispatcher {
        outcome: Result<SubmitOutcome, String>,
        calls: Mutex<usize>,
    }

    impl StaticDispatcher {
        fn new(outcome: Result<SubmitOutcome, String>) -> Self {
            Self {
                outcome,
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl SubmitDispatcher for StaticDispatcher {
        async fn dispatch(&self, _payload: TransportPayload) -> Result<SubmitOutcome, String> {
            *self.calls.lock().unwrap() += 1;
            self.outcome.clone()
        }
    }

    /// Dispatcher that parks until the test grants a permit
    struct GatedDispatcher {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl SubmitDispatcher for GatedDispatcher {
        async fn dispatch(&self, _payload: TransportPayload) -> Result<SubmitOutcome, String> {
            let _permit = self.gate.acquire().await.unwrap();
            Ok(SubmitOutcome {
                success: true,
                message: None,
            })
        }
    }

    fn orchestrator(
        dispatcher: Arc<dyn SubmitDispatcher>,
        observer: Arc<RecordingObserver>,
    ) -> SubmissionOrchestrator {
        SubmissionOrchestrator::new(dispatcher, observer, &DISTRICT, FollowUp::LeaveForm)
    }

    #[tokio::test]
    async fn test_invalid_draft_never_dispatches() {
        let dispatcher = Arc::new(StaticDispatcher::new(Ok(SubmitOutcome {
            success: true,
            message: None,
        })));
        let observer = Arc::new(RecordingObserver::default());
        let orch = orchestrator(dispatcher.clone(), observer.clone());

        let result = orch.submit(&DraftRecord::default()).await;

        assert!(matches!(result, SubmitResult::Invalid(_)));
        assert_eq!(*dispatcher.calls.lock().unwrap(), 0);
        assert_eq!(orch.phase(), SubmissionPhase::Idle);
        // Field errors surfaced, no notifications fired
        let events = observer.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].starts_with("fields:"));
    }

    #[tokio::test]
    async fn test_success_fires_notification_then_follow_up() {
        let dispatcher = Arc::new(StaticDispatcher::new(Ok(SubmitOutcome {
            success: true,
            message: Some("District created".to_string()),
        })));
        let observer = Arc::new(RecordingObserver::default());
        let orch = orchestrator(dispatcher, observer.clone());

        let result = orch.submit(&valid_draft()).await;

        assert_eq!(result, SubmitResult::Completed { success: true });
        assert_eq!(
            observer.events(),
            vec![
                "success:District created".to_string(),
                "clear".to_string(),
                "follow_up:LeaveForm".to_string(),
            ]
        );
        assert_eq!(orch.phase(), SubmissionPhase::Idle);
    }

    #[tokio::test]
    async fn test_server_error_uses_server_message() {
        let dispatcher = Arc::new(StaticDispatcher::new(Ok(SubmitOutcome {
            success: false,
            message: Some("A district with this slug already exists".to_string()),
        })));
        let observer = Arc::new(RecordingObserver::default());
        let orch = orchestrator(dispatcher, observer.clone());

        let result = orch.submit(&valid_draft()).await;

        assert_eq!(result, SubmitResult::Completed { success: false });
        assert_eq!(
            observer.events(),
            vec!["error:A district with this slug already exists".to_string()]
        );
    }

    #[tokio::test]
    async fn test_transport_failure_falls_back_to_generic_message() {
        let dispatcher = Arc::new(StaticDispatcher::new(Err(String::new())));
        let observer = Arc::new(RecordingObserver::default());
        let orch = orchestrator(dispatcher, observer.clone());

        orch.submit(&valid_draft()).await;

        assert_eq!(observer.events(), vec![format!("error:{GENERIC_FAILURE}")]);
    }

    #[tokio::test]
    async fn test_duplicate_submission_blocked_while_in_flight() {
        let gate = Arc::new(Semaphore::new(0));
        let dispatcher = Arc::new(GatedDispatcher { gate: gate.clone() });
        let observer = Arc::new(RecordingObserver::default());
        let orch = Arc::new(orchestrator(dispatcher, observer));

        let first = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move { orch.submit(&valid_draft()).await })
        };

        // Wait for the first submission to reach its suspension point
        while orch.phase() != SubmissionPhase::Submitting {
            tokio::task::yield_now().await;
        }

        let second = orch.submit(&valid_draft()).await;
        assert_eq!(second, SubmitResult::Blocked);

        gate.add_permits(1);
        let first = first.await.unwrap();
        assert_eq!(first, SubmitResult::Completed { success: true });
    }

    #[tokio::test]
    async fn test_detach_guards_post_await_writes() {
        let gate = Arc::new(Semaphore::new(0));
        let dispatcher = Arc::new(GatedDispatcher { gate: gate.clone() });
        let observer = Arc::new(RecordingObserver::default());
        let orch = Arc::new(orchestrator(dispatcher, observer.clone()));

        let in_flight = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move { orch.submit(&valid_draft()).await })
        };

        while orch.phase() != SubmissionPhase::Submitting {
            tokio::task::yield_now().await;
        }

        // Tear down mid-flight, then let the dispatch resolve
        orch.detach();
        gate.add_permits(1);

        let result = in_flight.await.unwrap();
        assert_eq!(result, SubmitResult::Detached);
        // No notification, no follow-up, no phase write after the await
        assert!(observer.events().is_empty());
        assert_eq!(orch.phase(), SubmissionPhase::Submitting);
    }
}
