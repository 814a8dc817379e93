// src/timekeeper.rs

use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::clock::Clock;
use crate::session::{SessionController, SubmitReason};
use crate::tasks::TaskHandle;

/// Drift-resistant countdown to the exam's absolute deadline.
///
/// Every tick recomputes `end_time - clock.now()` instead of
/// decrementing a counter, so a stretch of suspended ticks (tab in
/// the background, laptop asleep) cannot stretch the exam: the first
/// tick after waking sees the true remaining time and force-submits
/// if the deadline has passed.
pub struct Timekeeper;

impl Timekeeper {
    /// Spawns the countdown task. Returns the cancellable handle and
    /// a receiver carrying the remaining whole seconds for display.
    pub fn start(
        session: Weak<SessionController>,
        end_time: DateTime<Utc>,
        tick: Duration,
        clock: Arc<dyn Clock>,
    ) -> (TaskHandle, watch::Receiver<i64>) {
        let initial = (end_time - clock.now()).num_seconds().max(0);
        let (remaining_tx, remaining_rx) = watch::channel(initial);

        let handle = TaskHandle::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                interval.tick().await;
                let Some(session) = session.upgrade() else {
                    break;
                };

                let remaining = (end_time - clock.now()).num_seconds();
                let _ = remaining_tx.send(remaining.max(0));

                if remaining <= 0 {
                    tracing::info!("exam deadline reached, forcing submit");
                    session.submit(SubmitReason::Timeout).await;
                    break;
                }
            }
        });

        (handle, remaining_rx)
    }
}
