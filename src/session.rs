// src/session.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use tokio::sync::{mpsc, watch};

use crate::autosave::AutosavePersister;
use crate::clock::Clock;
use crate::config::{DISQUALIFIED_TAG, SessionConfig};
use crate::error::ExamError;
use crate::gateway::PersistenceGateway;
use crate::heartbeat::HeartbeatReporter;
use crate::integrity::{CapabilitySet, IntegrityMonitor, ProctorSignal};
use crate::models::answer::{AnswerDraft, DraftRecord, GradedAnswer};
use crate::models::exam::ExamDefinition;
use crate::models::identity::Identity;
use crate::models::submission::{LiveSessionRecord, Submission};
use crate::store::draft::DraftStore;
use crate::tasks::TaskHandle;
use crate::timekeeper::Timekeeper;

/// Lifecycle of one exam session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Setup,
    Active,
    Submitting,
    Submitted,
    Disqualified,
}

/// Why a submit was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitReason {
    User,
    Timeout,
    Violation,
}

/// Result of a submit call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Committed {
        phase: SessionPhase,
        total_score: u32,
        /// Set when neither store accepted the submission. The
        /// session is terminal regardless; the hosting UI should
        /// surface this to the student.
        persist_warning: Option<String>,
    },
    /// The lock was already set (or the session never started); the
    /// call was a no-op.
    Ignored,
}

/// Result of recording a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationOutcome {
    /// Session already locked or not active.
    Ignored,
    /// Below the threshold; surface a warning to the student.
    Warned { count: u32, remaining: u32 },
    /// Threshold reached; the session was force-submitted.
    Disqualified,
}

/// Collaborators injected into a session.
pub struct SessionDeps {
    pub gateway: Arc<PersistenceGateway>,
    pub drafts: Arc<dyn DraftStore>,
    pub clock: Arc<dyn Clock>,
    pub capabilities: CapabilitySet,
    pub config: SessionConfig,
}

struct SessionInner {
    phase: SessionPhase,
    identity: Option<Identity>,
    answers: HashMap<String, AnswerDraft>,
    /// Per-session random permutation of question ids, fixed when the
    /// session becomes ACTIVE.
    order: Vec<String>,
    violations: u32,
    started_at: Option<DateTime<Utc>>,
}

/// The orchestrating state machine of one proctored exam session.
///
/// Owns the lock flag that makes the commit path at-most-once, the
/// identity and answer set, and the handles of every periodic task
/// (timekeeper, heartbeat, autosave, integrity monitor). All of those
/// tasks reach back into this controller through `Weak` references
/// and are stopped the moment the session leaves ACTIVE.
pub struct SessionController {
    exam: ExamDefinition,
    student_id: String,
    config: SessionConfig,
    gateway: Arc<PersistenceGateway>,
    drafts: Arc<dyn DraftStore>,
    clock: Arc<dyn Clock>,
    capabilities: CapabilitySet,
    heartbeat: Arc<HeartbeatReporter>,

    /// At-most-once commit gate. Checked-and-set in one synchronous
    /// step; every state-mutating entry point re-checks it.
    locked: AtomicBool,

    inner: Mutex<SessionInner>,
    tasks: Mutex<Vec<TaskHandle>>,

    dirty_tx: Mutex<Option<mpsc::UnboundedSender<()>>>,
    signal_tx: Mutex<Option<mpsc::UnboundedSender<ProctorSignal>>>,
    remaining_rx: Mutex<Option<watch::Receiver<i64>>>,

    /// True while the student must re-acquire fullscreen. A modal
    /// overlay condition, not a lifecycle state: answers are rejected
    /// until it clears, but the timer and heartbeats keep running.
    fullscreen_tx: watch::Sender<bool>,
}

impl SessionController {
    /// Builds a session in SETUP, restoring any crash-recovery draft
    /// for this (exam, student) pair. Restored answers are merged by
    /// question id; ids that no longer exist in the exam (or whose
    /// answer kind no longer matches the question) are dropped.
    pub async fn new(exam: ExamDefinition, student_id: impl Into<String>, deps: SessionDeps) -> Arc<Self> {
        let student_id = student_id.into();
        let draft_key = Submission::composite_id(&exam.id, &student_id);

        let restored = match deps.drafts.load(&draft_key).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("draft restore for '{}' failed: {}", draft_key, e);
                None
            }
        };

        let mut answers = HashMap::new();
        let mut identity = None;
        if let Some(draft) = restored {
            for (question_id, answer) in draft.answers {
                match exam.question(&question_id) {
                    Some(q) if q.accepts(&answer) => {
                        answers.insert(question_id, answer);
                    }
                    _ => {
                        tracing::debug!(
                            "dropping stale draft answer for unknown question '{}'",
                            question_id
                        );
                    }
                }
            }
            identity = Some(draft.identity);
            tracing::info!("restored draft for '{}' ({} answers)", draft_key, answers.len());
        }

        let heartbeat = Arc::new(HeartbeatReporter::new(
            Arc::clone(&deps.gateway),
            &deps.config,
        ));
        let (fullscreen_tx, _) = watch::channel(false);

        Arc::new(Self {
            exam,
            student_id,
            config: deps.config,
            gateway: deps.gateway,
            drafts: deps.drafts,
            clock: deps.clock,
            capabilities: deps.capabilities,
            heartbeat,
            locked: AtomicBool::new(false),
            inner: Mutex::new(SessionInner {
                phase: SessionPhase::Setup,
                identity,
                answers,
                order: Vec::new(),
                violations: 0,
                started_at: None,
            }),
            tasks: Mutex::new(Vec::new()),
            dirty_tx: Mutex::new(None),
            signal_tx: Mutex::new(None),
            remaining_rx: Mutex::new(None),
            fullscreen_tx,
        })
    }

    // --- lifecycle -----------------------------------------------------

    /// Transitions SETUP -> ACTIVE: validates the identity, checks the
    /// access window, fixes this session's question order, and starts
    /// the timekeeper, integrity monitor, autosave and heartbeat tasks.
    pub async fn start(self: &Arc<Self>, identity: Identity) -> Result<(), ExamError> {
        identity.ensure_complete()?;

        let now = self.clock.now();
        if !self.exam.access_window_contains(now) {
            return Err(ExamError::Validation(format!(
                "exam '{}' is not open at {}",
                self.exam.id, now
            )));
        }

        {
            let mut inner = self.inner.lock().unwrap();
            if inner.phase != SessionPhase::Setup {
                return Err(ExamError::Validation(
                    "session has already been started".to_string(),
                ));
            }

            let mut order: Vec<String> =
                self.exam.questions.iter().map(|q| q.id.clone()).collect();
            order.shuffle(&mut rand::thread_rng());

            inner.phase = SessionPhase::Active;
            inner.identity = Some(identity);
            inner.started_at = Some(now);
            inner.order = order;
        }

        self.capabilities.acquire_all();
        self.spawn_tasks();

        tracing::info!(
            "session active for student '{}' on exam '{}' ({} questions)",
            self.student_id,
            self.exam.id,
            self.exam.questions.len()
        );
        Ok(())
    }

    /// Starts using the identity recovered from a draft, letting a
    /// crashed session resume as already-started.
    pub async fn resume(self: &Arc<Self>) -> Result<(), ExamError> {
        let identity = self.restored_identity().ok_or_else(|| {
            ExamError::Validation("no saved draft to resume from".to_string())
        })?;
        self.start(identity).await
    }

    /// Commits the session: grades, persists the submission, stops
    /// every periodic task, and transitions to the terminal phase.
    ///
    /// Guarded by an atomic check-and-set of the lock flag, so a race
    /// between the timekeeper, the integrity monitor, and the student
    /// pressing "submit" produces exactly one persisted submission;
    /// every later call is a silent no-op.
    pub async fn submit(self: &Arc<Self>, reason: SubmitReason) -> SubmitOutcome {
        if self
            .locked
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return SubmitOutcome::Ignored;
        }

        // The commit runs on its own task. Submit is reached from
        // inside the timekeeper and integrity-monitor tasks, and the
        // commit cancels exactly those tasks; detaching means the
        // commit survives the cancellation of its caller.
        let this = Arc::clone(self);
        let commit = tokio::spawn(async move { this.commit(reason).await });
        match commit.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("commit task failed: {}", e);
                SubmitOutcome::Ignored
            }
        }
    }

    async fn commit(self: Arc<Self>, reason: SubmitReason) -> SubmitOutcome {
        // Cancel all periodic work immediately; anything already
        // scheduled will see the lock and no-op.
        self.stop_tasks();

        let submission = {
            let mut inner = self.inner.lock().unwrap();
            let Some(identity) = inner.identity.clone() else {
                // Submit before start: nothing to commit. The session
                // never became ACTIVE, so no tasks can race us here.
                self.locked.store(false, Ordering::SeqCst);
                return SubmitOutcome::Ignored;
            };
            inner.phase = SessionPhase::Submitting;
            self.build_submission(&inner, &identity, reason)
        };

        let persist_warning = match self.gateway.upsert_submission(&submission).await {
            Ok(()) => {
                // Draft is only cleared once the submission is safe.
                if let Err(e) = self.drafts.clear(&self.draft_key()).await {
                    tracing::warn!("failed to clear draft after submit: {}", e);
                }
                None
            }
            Err(e) => {
                let failure = ExamError::CommitFailure(e.to_string());
                tracing::error!("{}", failure);
                Some(failure.to_string())
            }
        };

        let terminal = if reason == SubmitReason::Violation {
            SessionPhase::Disqualified
        } else {
            SessionPhase::Submitted
        };
        self.inner.lock().unwrap().phase = terminal;

        tracing::info!(
            "session for '{}' ended: {:?} (reason {:?}, score {})",
            self.student_id,
            terminal,
            reason,
            submission.total_score
        );

        SubmitOutcome::Committed {
            phase: terminal,
            total_score: submission.total_score,
            persist_warning,
        }
    }

    /// Records one integrity violation: bumps the count, pushes it
    /// out-of-band through the heartbeat reporter, and disqualifies
    /// the session when the threshold is reached.
    pub async fn record_violation(self: &Arc<Self>, signal: &ProctorSignal) -> ViolationOutcome {
        if self.locked.load(Ordering::SeqCst) {
            return ViolationOutcome::Ignored;
        }

        let (count, record) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.phase != SessionPhase::Active {
                return ViolationOutcome::Ignored;
            }
            inner.violations += 1;
            (inner.violations, self.live_record_from(&inner))
        };

        // Out-of-cadence push so the monitoring board sees violation
        // spikes without waiting for the next heartbeat tick. Detached:
        // a retrying push must not hold up the threshold check below.
        if let Some(record) = record {
            let reporter = Arc::clone(&self.heartbeat);
            tokio::spawn(async move {
                reporter.push(record).await;
            });
        }

        if count >= self.config.violation_threshold {
            tracing::warn!(
                "violation threshold reached ({}): {}",
                count,
                signal.description()
            );
            self.submit(SubmitReason::Violation).await;
            ViolationOutcome::Disqualified
        } else {
            ViolationOutcome::Warned {
                count,
                remaining: self.config.violation_threshold - count,
            }
        }
    }

    // --- answers -------------------------------------------------------

    /// Stores or replaces the draft answer for one question and pokes
    /// the autosave debounce. Rejected while the fullscreen overlay is
    /// up; silently ignored once the session is locked.
    pub fn set_answer(&self, question_id: &str, answer: AnswerDraft) -> Result<(), ExamError> {
        if self.locked.load(Ordering::SeqCst) {
            // Terminal state: mutations are a silent no-op.
            return Ok(());
        }
        if *self.fullscreen_tx.borrow() {
            return Err(ExamError::Validation(
                "fullscreen must be restored before continuing".to_string(),
            ));
        }

        let question = self.exam.question(question_id).ok_or_else(|| {
            ExamError::Validation(format!("unknown question '{}'", question_id))
        })?;
        if !question.accepts(&answer) {
            return Err(ExamError::Validation(format!(
                "answer kind does not match question '{}'",
                question_id
            )));
        }

        {
            let mut inner = self.inner.lock().unwrap();
            if inner.phase != SessionPhase::Active {
                return Err(ExamError::Validation(
                    "session is not active".to_string(),
                ));
            }
            inner.answers.insert(question_id.to_string(), answer);
        }

        if let Some(tx) = self.dirty_tx.lock().unwrap().as_ref() {
            let _ = tx.send(());
        }
        Ok(())
    }

    // --- host-facing accessors -----------------------------------------

    pub fn phase(&self) -> SessionPhase {
        self.inner.lock().unwrap().phase
    }

    pub fn violation_count(&self) -> u32 {
        self.inner.lock().unwrap().violations
    }

    /// This session's shuffled question order (empty before ACTIVE).
    pub fn question_order(&self) -> Vec<String> {
        self.inner.lock().unwrap().order.clone()
    }

    pub fn answer(&self, question_id: &str) -> Option<AnswerDraft> {
        self.inner.lock().unwrap().answers.get(question_id).cloned()
    }

    /// Identity recovered from a saved draft, if any.
    pub fn restored_identity(&self) -> Option<Identity> {
        let inner = self.inner.lock().unwrap();
        match inner.phase {
            SessionPhase::Setup => inner.identity.clone(),
            _ => None,
        }
    }

    /// Where the hosting UI pushes proctoring signals while ACTIVE.
    pub fn signal_sender(&self) -> Option<mpsc::UnboundedSender<ProctorSignal>> {
        self.signal_tx.lock().unwrap().clone()
    }

    /// Remaining whole seconds, updated every timekeeper tick.
    pub fn remaining_time(&self) -> Option<watch::Receiver<i64>> {
        self.remaining_rx.lock().unwrap().clone()
    }

    /// True while the student must re-acquire fullscreen.
    pub fn fullscreen_alerts(&self) -> watch::Receiver<bool> {
        self.fullscreen_tx.subscribe()
    }

    /// Called by the hosting UI once fullscreen has been re-entered.
    pub fn fullscreen_restored(&self) {
        self.fullscreen_tx.send_replace(false);
    }

    /// Heartbeats dropped after exhausting their retry budget.
    pub fn heartbeat_failures(&self) -> u64 {
        self.heartbeat.failed_pushes()
    }

    pub fn gateway(&self) -> &Arc<PersistenceGateway> {
        &self.gateway
    }

    pub fn exam(&self) -> &ExamDefinition {
        &self.exam
    }

    pub fn draft_key(&self) -> String {
        Submission::composite_id(&self.exam.id, &self.student_id)
    }

    // --- internals -----------------------------------------------------

    pub(crate) fn require_fullscreen(&self) {
        // send_replace stores the flag even with no subscriber; the
        // overlay state must hold whether or not the UI is watching.
        self.fullscreen_tx.send_replace(true);
    }

    /// Snapshot for a heartbeat push; `None` once locked or no longer
    /// ACTIVE, which ends the periodic loop without another push.
    pub(crate) fn live_record(&self) -> Option<LiveSessionRecord> {
        if self.locked.load(Ordering::SeqCst) {
            return None;
        }
        let inner = self.inner.lock().unwrap();
        if inner.phase != SessionPhase::Active {
            return None;
        }
        self.live_record_from(&inner)
    }

    fn live_record_from(&self, inner: &SessionInner) -> Option<LiveSessionRecord> {
        let identity = inner.identity.as_ref()?;
        Some(LiveSessionRecord {
            exam_id: self.exam.id.clone(),
            student_id: self.student_id.clone(),
            student_name: identity.name.clone(),
            started_at: inner.started_at?,
            last_heartbeat: self.clock.now(),
            violation_count: inner.violations,
        })
    }

    /// Snapshot for the autosave worker; `None` once locked.
    pub(crate) fn draft_snapshot(&self) -> Option<(String, DraftRecord)> {
        if self.locked.load(Ordering::SeqCst) {
            return None;
        }
        let inner = self.inner.lock().unwrap();
        let identity = inner.identity.clone()?;
        Some((
            self.draft_key(),
            DraftRecord {
                answers: inner.answers.clone(),
                identity,
            },
        ))
    }

    fn build_submission(
        &self,
        inner: &SessionInner,
        identity: &Identity,
        reason: SubmitReason,
    ) -> Submission {
        let mut total_score = 0;
        let answers: Vec<GradedAnswer> = self
            .exam
            .questions
            .iter()
            .map(|q| {
                let answer = inner.answers.get(&q.id).cloned();
                let score = q.grade(answer.as_ref());
                total_score += score;
                GradedAnswer {
                    question_id: q.id.clone(),
                    answer,
                    score,
                    feedback: None,
                }
            })
            .collect();

        let disqualified = reason == SubmitReason::Violation;
        let student_name = if disqualified {
            format!("{}{}", identity.name, DISQUALIFIED_TAG)
        } else {
            identity.name.clone()
        };

        Submission {
            id: Submission::composite_id(&self.exam.id, &self.student_id),
            exam_id: self.exam.id.clone(),
            student_id: self.student_id.clone(),
            student_name,
            student_nim: identity.nim.clone(),
            answers,
            total_score: if disqualified { 0 } else { total_score },
            submitted_at: self.clock.now(),
            is_graded: false,
            violation_count: inner.violations,
        }
    }

    fn spawn_tasks(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);

        let (timer, remaining_rx) = Timekeeper::start(
            weak.clone(),
            self.exam.end_time,
            self.config.tick_interval,
            Arc::clone(&self.clock),
        );
        *self.remaining_rx.lock().unwrap() = Some(remaining_rx);

        let heartbeat = self
            .heartbeat
            .start_periodic(weak.clone(), self.config.heartbeat_interval);

        let (dirty_tx, dirty_rx) = mpsc::unbounded_channel();
        *self.dirty_tx.lock().unwrap() = Some(dirty_tx);
        let autosave = AutosavePersister::start(
            weak.clone(),
            Arc::clone(&self.drafts),
            self.config.autosave_debounce,
            dirty_rx,
        );

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        *self.signal_tx.lock().unwrap() = Some(signal_tx);
        let monitor = IntegrityMonitor::start(weak, signal_rx);

        let mut tasks = self.tasks.lock().unwrap();
        tasks.push(timer);
        tasks.push(heartbeat);
        tasks.push(autosave);
        tasks.push(monitor);
    }

    fn stop_tasks(&self) {
        for task in self.tasks.lock().unwrap().drain(..) {
            task.stop();
        }
        // Closing the channels lets any not-yet-aborted worker drain
        // out instead of waiting forever.
        self.dirty_tx.lock().unwrap().take();
        self.signal_tx.lock().unwrap().take();
        self.capabilities.release_all();
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        for task in self.tasks.lock().unwrap().drain(..) {
            task.stop();
        }
    }
}
