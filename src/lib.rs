// src/lib.rs

pub mod autosave;
pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod heartbeat;
pub mod integrity;
pub mod models;
pub mod session;
pub mod store;
pub mod tasks;
pub mod timekeeper;

// Re-export the surface a hosting exam UI works with.
pub use config::SessionConfig;
pub use error::ExamError;
pub use gateway::{PersistenceGateway, PersistenceMode};
pub use integrity::{Capability, CapabilitySet, ProctorSignal};
pub use models::answer::AnswerDraft;
pub use models::exam::{ExamDefinition, Question, QuestionPayload};
pub use models::identity::Identity;
pub use models::submission::{LiveSessionRecord, Submission};
pub use session::{
    SessionController, SessionDeps, SessionPhase, SubmitOutcome, SubmitReason, ViolationOutcome,
};
