//! Bus listener
//!
//! Delivers every message from the publish/subscribe bus to the [`StateBus`].
//! Malformed payloads are logged and dropped; the listener keeps running.

use std::sync::Arc;

use thrm_common::bus::BusReceiver;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::state::StateBus;

/// Counters returned when the listener exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    pub delivered: u64,
    pub malformed: u64,
    /// Messages lost because the listener fell behind
    pub lagged: u64,
}

/// Consume `rx` until the bus closes or `shutdown` becomes true
pub async fn run_bus_listener(
    mut rx: BusReceiver,
    state: Arc<StateBus>,
    mut shutdown: watch::Receiver<bool>,
) -> ListenerStats {
    let mut stats = ListenerStats::default();
    info!("Bus listener started");

    loop {
        if *shutdown.borrow() {
            info!("Bus listener shutting down");
            break;
        }

        tokio::select! {
            received = rx.recv() => match received {
                Ok(message) => {
                    match state.on_sensor_event(&message.topic, &message.payload).await {
                        Ok(()) => stats.delivered += 1,
                        Err(e) => {
                            stats.malformed += 1;
                            warn!("Dropping message: {}", e);
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    stats.lagged += skipped;
                    warn!("Bus listener lagged, {} messages dropped", skipped);
                }
                Err(RecvError::Closed) => {
                    warn!("Transport disconnected");
                    break;
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!(
        "Bus listener stopped: delivered={} malformed={} lagged={}",
        stats.delivered, stats.malformed, stats.lagged
    );
    stats
}
