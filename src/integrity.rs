// src/integrity.rs

use std::sync::Arc;
use std::sync::Weak;

use tokio::sync::mpsc;

use crate::session::{SessionController, ViolationOutcome};
use crate::tasks::TaskHandle;

/// A proctoring signal observed by the hosting UI and forwarded to
/// the integrity monitor. Each occurrence while the session is ACTIVE
/// and unlocked becomes exactly one violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProctorSignal {
    /// The exam tab became hidden.
    VisibilityHidden,
    /// The window lost focus.
    WindowBlur,
    /// The student left fullscreen. Also raises the re-acquire
    /// overlay until fullscreen is restored.
    FullscreenExit,
    /// A forbidden key combination, e.g. "Ctrl+C".
    ForbiddenKey(String),
    ClipboardCopy,
    ClipboardPaste,
    ClipboardCut,
    ContextMenu,
}

impl ProctorSignal {
    pub fn description(&self) -> String {
        match self {
            ProctorSignal::VisibilityHidden => "left the exam tab".to_string(),
            ProctorSignal::WindowBlur => "exam window lost focus".to_string(),
            ProctorSignal::FullscreenExit => "exited fullscreen".to_string(),
            ProctorSignal::ForbiddenKey(combo) => {
                format!("pressed forbidden key combination '{}'", combo)
            }
            ProctorSignal::ClipboardCopy => "copied exam content".to_string(),
            ProctorSignal::ClipboardPaste => "pasted external content".to_string(),
            ProctorSignal::ClipboardCut => "cut exam content".to_string(),
            ProctorSignal::ContextMenu => "opened the context menu".to_string(),
        }
    }
}

/// An environment capability the monitor tries to hold for the
/// duration of the session (fullscreen, keyboard lock, clipboard
/// restriction). Acquisition is best-effort: an unsupported
/// capability must degrade to a no-op, never an error.
pub trait Capability: Send + Sync {
    fn name(&self) -> &str;

    /// Attempts to acquire. `false` means the environment does not
    /// support it or refused; the session proceeds regardless.
    fn try_acquire(&self) -> bool;

    fn release(&self);
}

/// Stand-in for a capability the environment does not provide.
pub struct UnsupportedCapability {
    name: String,
}

impl UnsupportedCapability {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Capability for UnsupportedCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_acquire(&self) -> bool {
        false
    }

    fn release(&self) {}
}

/// The capabilities a session attempts to hold while ACTIVE.
#[derive(Default, Clone)]
pub struct CapabilitySet {
    capabilities: Vec<Arc<dyn Capability>>,
}

impl CapabilitySet {
    pub fn new(capabilities: Vec<Arc<dyn Capability>>) -> Self {
        Self { capabilities }
    }

    pub fn acquire_all(&self) {
        for cap in &self.capabilities {
            if cap.try_acquire() {
                tracing::debug!("capability '{}' acquired", cap.name());
            } else {
                tracing::debug!("capability '{}' unsupported, continuing without it", cap.name());
            }
        }
    }

    pub fn release_all(&self) {
        for cap in &self.capabilities {
            cap.release();
        }
    }
}

/// Consumes proctoring signals and turns each into a violation on the
/// session controller. A detection bug must never take down the exam,
/// so everything past the channel boundary is logged, not propagated.
pub struct IntegrityMonitor;

impl IntegrityMonitor {
    pub fn start(
        session: Weak<SessionController>,
        mut signals: mpsc::UnboundedReceiver<ProctorSignal>,
    ) -> TaskHandle {
        TaskHandle::spawn(async move {
            while let Some(signal) = signals.recv().await {
                let Some(session) = session.upgrade() else {
                    break;
                };

                if signal == ProctorSignal::FullscreenExit {
                    session.require_fullscreen();
                }

                match session.record_violation(&signal).await {
                    ViolationOutcome::Disqualified => {
                        tracing::warn!(
                            "session disqualified after violation: {}",
                            signal.description()
                        );
                        break;
                    }
                    ViolationOutcome::Warned { count, remaining } => {
                        tracing::warn!(
                            "violation {} ({} remaining before disqualification): {}",
                            count,
                            remaining,
                            signal.description()
                        );
                    }
                    ViolationOutcome::Ignored => {}
                }
            }
        })
    }
}
