// src/heartbeat.rs

use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::SessionConfig;
use crate::gateway::PersistenceGateway;
use crate::models::submission::LiveSessionRecord;
use crate::session::SessionController;
use crate::tasks::TaskHandle;

/// Pushes "this student is still here" records to the persistence
/// gateway, on a fixed cadence plus out-of-band when a violation is
/// recorded.
///
/// Heartbeats are best-effort: a failed push is retried a bounded
/// number of times with a fixed backoff, then logged and counted.
/// It never blocks or fails the exam session, but the loss is
/// observable through `failed_pushes` rather than silently swallowed.
pub struct HeartbeatReporter {
    gateway: Arc<PersistenceGateway>,
    retry_limit: u32,
    backoff: Duration,
    failed_pushes: AtomicU64,
}

impl HeartbeatReporter {
    pub fn new(gateway: Arc<PersistenceGateway>, config: &SessionConfig) -> Self {
        Self {
            gateway,
            retry_limit: config.heartbeat_retry_limit,
            backoff: config.heartbeat_backoff,
            failed_pushes: AtomicU64::new(0),
        }
    }

    /// Heartbeats dropped after exhausting retries.
    pub fn failed_pushes(&self) -> u64 {
        self.failed_pushes.load(Ordering::SeqCst)
    }

    /// Pushes one record, retrying within the configured budget.
    pub async fn push(&self, record: LiveSessionRecord) {
        let mut attempt = 0;
        loop {
            match self.gateway.upsert_live_session(&record).await {
                Ok(()) => return,
                Err(e) if attempt < self.retry_limit => {
                    attempt += 1;
                    tracing::debug!(
                        "heartbeat push failed ({}), retry {}/{}",
                        e,
                        attempt,
                        self.retry_limit
                    );
                    tokio::time::sleep(self.backoff).await;
                }
                Err(e) => {
                    self.failed_pushes.fetch_add(1, Ordering::SeqCst);
                    tracing::warn!("heartbeat dropped after {} retries: {}", self.retry_limit, e);
                    return;
                }
            }
        }
    }

    /// Spawns the periodic push loop. The loop takes a fresh snapshot
    /// from the controller each tick; once the session is locked the
    /// snapshot is `None` and the loop ends without another push.
    pub fn start_periodic(
        self: &Arc<Self>,
        session: Weak<SessionController>,
        interval: Duration,
    ) -> TaskHandle {
        let reporter = Arc::clone(self);
        TaskHandle::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(session) = session.upgrade() else {
                    break;
                };
                let Some(record) = session.live_record() else {
                    break;
                };
                reporter.push(record).await;
            }
        })
    }
}
