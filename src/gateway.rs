// src/gateway.rs

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::ExamError;
use crate::models::exam::ExamDefinition;
use crate::models::submission::{LiveSessionRecord, Submission};
use crate::store::ExamStore;

/// Which backend the gateway is currently using.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceMode {
    Remote,
    LocalFallback,
}

/// Routes every read and write to the primary remote store until the
/// first availability or permission failure, then performs a sticky,
/// process-wide cut-over to the local fallback store.
///
/// The switch is one-way for the lifetime of this gateway: once in
/// `LocalFallback`, no further requests reach the primary and prior
/// remote-only state is not consulted again. The mode is owned here
/// (not module-level state) and exposed as a watch channel so the
/// hosting UI can surface "working offline" the moment it happens.
pub struct PersistenceGateway {
    primary: Arc<dyn ExamStore>,
    fallback: Arc<dyn ExamStore>,
    mode_tx: watch::Sender<PersistenceMode>,
}

impl PersistenceGateway {
    pub fn new(primary: Arc<dyn ExamStore>, fallback: Arc<dyn ExamStore>) -> Self {
        let (mode_tx, _) = watch::channel(PersistenceMode::Remote);
        Self {
            primary,
            fallback,
            mode_tx,
        }
    }

    pub fn mode(&self) -> PersistenceMode {
        *self.mode_tx.borrow()
    }

    /// Observable mode changes; fires once, on the cut-over.
    pub fn mode_changes(&self) -> watch::Receiver<PersistenceMode> {
        self.mode_tx.subscribe()
    }

    /// Flips to the local fallback. Idempotent; later calls keep the
    /// already-switched mode and do not re-notify.
    fn switch_to_fallback(&self, cause: &ExamError) {
        self.mode_tx.send_if_modified(|mode| {
            if *mode == PersistenceMode::LocalFallback {
                return false;
            }
            tracing::warn!(
                "primary store failed ({}); switching to local fallback for the rest of this process",
                cause
            );
            *mode = PersistenceMode::LocalFallback;
            true
        });
    }

    /// Decides per call whether to try the primary. Returns the error
    /// untouched when it does not warrant failover.
    fn after_primary_error(&self, error: ExamError) -> Result<(), ExamError> {
        if error.triggers_failover() {
            self.switch_to_fallback(&error);
            Ok(())
        } else {
            Err(error)
        }
    }

    pub async fn get_exam(&self, id: &str) -> Result<Option<ExamDefinition>, ExamError> {
        if self.mode() == PersistenceMode::Remote {
            match self.primary.get_exam(id).await {
                Ok(found) => return Ok(found),
                Err(e) => self.after_primary_error(e)?,
            }
        }
        self.fallback.get_exam(id).await
    }

    pub async fn get_submission(&self, id: &str) -> Result<Option<Submission>, ExamError> {
        if self.mode() == PersistenceMode::Remote {
            match self.primary.get_submission(id).await {
                Ok(found) => return Ok(found),
                Err(e) => self.after_primary_error(e)?,
            }
        }
        self.fallback.get_submission(id).await
    }

    pub async fn list_submissions(&self, exam_id: &str) -> Result<Vec<Submission>, ExamError> {
        if self.mode() == PersistenceMode::Remote {
            match self.primary.list_submissions(exam_id).await {
                Ok(found) => return Ok(found),
                Err(e) => self.after_primary_error(e)?,
            }
        }
        self.fallback.list_submissions(exam_id).await
    }

    pub async fn upsert_submission(&self, submission: &Submission) -> Result<(), ExamError> {
        if self.mode() == PersistenceMode::Remote {
            match self.primary.upsert_submission(submission).await {
                Ok(()) => return Ok(()),
                Err(e) => self.after_primary_error(e)?,
            }
        }
        self.fallback.upsert_submission(submission).await
    }

    pub async fn delete_submission(&self, id: &str) -> Result<(), ExamError> {
        if self.mode() == PersistenceMode::Remote {
            match self.primary.delete_submission(id).await {
                Ok(()) => return Ok(()),
                Err(e) => self.after_primary_error(e)?,
            }
        }
        self.fallback.delete_submission(id).await
    }

    pub async fn list_live_sessions(
        &self,
        exam_id: &str,
    ) -> Result<Vec<LiveSessionRecord>, ExamError> {
        if self.mode() == PersistenceMode::Remote {
            match self.primary.list_live_sessions(exam_id).await {
                Ok(found) => return Ok(found),
                Err(e) => self.after_primary_error(e)?,
            }
        }
        self.fallback.list_live_sessions(exam_id).await
    }

    pub async fn upsert_live_session(&self, record: &LiveSessionRecord) -> Result<(), ExamError> {
        if self.mode() == PersistenceMode::Remote {
            match self.primary.upsert_live_session(record).await {
                Ok(()) => return Ok(()),
                Err(e) => self.after_primary_error(e)?,
            }
        }
        self.fallback.upsert_live_session(record).await
    }

    pub async fn delete_live_session(&self, key: &str) -> Result<(), ExamError> {
        if self.mode() == PersistenceMode::Remote {
            match self.primary.delete_live_session(key).await {
                Ok(()) => return Ok(()),
                Err(e) => self.after_primary_error(e)?,
            }
        }
        self.fallback.delete_live_session(key).await
    }
}
