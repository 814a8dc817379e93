// src/autosave.rs

use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::session::SessionController;
use crate::store::draft::DraftStore;
use crate::tasks::TaskHandle;

/// Debounced writer of the local crash-recovery draft.
///
/// The controller signals this worker on every answer mutation. The
/// worker waits for a quiet period of `debounce` before snapshotting
/// `{answers, identity}` to the draft store, so a burst of typing
/// costs one write. The draft key is cleared by the controller only
/// on a successful submit; any other termination leaves it intact
/// for recovery.
pub struct AutosavePersister;

impl AutosavePersister {
    pub fn start(
        session: Weak<SessionController>,
        drafts: Arc<dyn DraftStore>,
        debounce: Duration,
        mut dirty_rx: mpsc::UnboundedReceiver<()>,
    ) -> TaskHandle {
        TaskHandle::spawn(async move {
            while dirty_rx.recv().await.is_some() {
                // Restart the quiet-period window for every further
                // mutation that lands inside it.
                loop {
                    match tokio::time::timeout(debounce, dirty_rx.recv()).await {
                        Ok(Some(())) => continue,
                        Ok(None) => return,
                        Err(_elapsed) => break,
                    }
                }

                let Some(session) = session.upgrade() else {
                    break;
                };
                let Some((key, draft)) = session.draft_snapshot() else {
                    // Locked or no identity yet; nothing worth saving.
                    continue;
                };
                if let Err(e) = drafts.save(&key, &draft).await {
                    tracing::warn!("autosave of draft '{}' failed: {}", key, e);
                }
            }
        })
    }
}
