//! Notification pump.
//!
//! Flushes the manager's coalesced notification queue once per window, so a
//! burst of updates reaches subscribers as a single cycle. The loop holds the
//! manager weakly and exits once it is dropped.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::master::MasterFuelManager;

pub async fn run_notification_loop(
    manager: Weak<MasterFuelManager>,
    window: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(window);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Notification loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                let Some(manager) = manager.upgrade() else {
                    tracing::debug!("Fuel manager dropped; notification loop exiting");
                    break;
                };
                let delivered = manager.flush_notifications();
                if delivered > 0 {
                    tracing::trace!("Delivered {} fuel notification(s)", delivered);
                }
            }
        }
    }
}

/// Spawn the pump with the manager's configured window.
///
/// Dropping or sending on the returned sender stops the loop.
pub fn spawn_notification_loop(
    manager: &Arc<MasterFuelManager>,
) -> (JoinHandle<()>, broadcast::Sender<()>) {
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let window = manager.config().notification_window();
    let handle = tokio::spawn(run_notification_loop(
        Arc::downgrade(manager),
        window,
        shutdown_rx,
    ));
    (handle, shutdown_tx)
}
