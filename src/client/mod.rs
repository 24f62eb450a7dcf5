//! Submission-side building blocks for admin tooling
//!
//! Form state, transport encoding and the submission state machine used by
//! Rust clients of the content API. Nothing here assumes a particular UI or
//! state container; the seams are the dispatcher and observer traits.

pub mod form;
pub mod orchestrator;

pub use form::{DraftRecord, TransportPayload, UploadMethodState};
pub use orchestrator::{
    FollowUp, SubmissionObserver, SubmissionOrchestrator, SubmissionPhase, SubmitDispatcher,
    SubmitOutcome, SubmitResult,
};
