//! Periodic background smart sync.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{SyncEngine, SyncOutcome};

/// Runs [`SyncEngine::smart_sync`] every `period` and on demand.
///
/// The first round starts immediately. Each round's health check decides
/// whether anything is sent. Dropping the scheduler stops the task after the round
/// in flight, if any.
pub struct SyncScheduler {
    trigger: mpsc::Sender<()>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
    outcomes: watch::Receiver<Option<SyncOutcome>>,
}

impl SyncScheduler {
    pub fn start(engine: SyncEngine, period: Duration) -> Self {
        let (trigger, mut trigger_rx) = mpsc::channel::<()>(1);
        let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();
        let (outcome_tx, outcomes) = watch::channel(None);

        info!(period_secs = period.as_secs(), "Starting sync scheduler");

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    maybe = trigger_rx.recv() => {
                        if maybe.is_none() {
                            break;
                        }
                        debug!("Manual sync requested");
                    }
                    _ = ticker.tick() => {}
                }

                let outcome = engine.smart_sync().await;
                outcome_tx.send_replace(Some(outcome));
            }

            info!("Sync scheduler stopped");
        });

        Self {
            trigger,
            shutdown: Some(shutdown),
            handle: Some(handle),
            outcomes,
        }
    }

    /// Request a round now. Returns false if one is already queued or the
    /// scheduler has stopped.
    pub fn sync_now(&self) -> bool {
        self.trigger.try_send(()).is_ok()
    }

    /// Most recent round result.
    pub fn last_outcome(&self) -> Option<SyncOutcome> {
        self.outcomes.borrow().clone()
    }

    /// Receiver notified after every round.
    pub fn subscribe(&self) -> watch::Receiver<Option<SyncOutcome>> {
        self.outcomes.clone()
    }

    /// Stop the loop and wait for the task to exit.
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Sync scheduler task failed");
            }
        }
    }
}
