//! SSE broadcaster for dashboard clients

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use thrm_common::events::DashboardEvent;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// SSE Broadcaster manages client connections and event distribution
#[derive(Clone)]
pub struct SseBroadcaster {
    tx: broadcast::Sender<DashboardEvent>,
}

impl SseBroadcaster {
    /// Create a new SSE broadcaster
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer per client
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        info!("SSE broadcaster initialized with capacity {}", capacity);
        Self { tx }
    }

    /// Broadcast an event, ignoring if no clients are connected
    pub fn broadcast_lossy(&self, event: DashboardEvent) {
        let _ = self.tx.send(event);
    }

    /// Get current number of connected clients
    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Raw receiver for in-process consumers
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.tx.subscribe()
    }

    /// Create an SSE stream for a new client connection.
    ///
    /// `initial` is sent first so the client renders the current state
    /// without waiting for the next broadcast tick.
    pub fn subscribe_stream(
        &self,
        initial: DashboardEvent,
    ) -> impl Stream<Item = Result<Event, Infallible>> {
        let live = BroadcastStream::new(self.tx.subscribe()).filter_map(|result| async move {
            match result {
                Ok(event) => to_sse_event(&event).map(Ok),
                Err(e) => {
                    // Lagging client: skip what it missed
                    warn!("SSE client error: {:?}", e);
                    None
                }
            }
        });

        stream::iter(to_sse_event(&initial).map(Ok)).chain(live)
    }

    /// Axum SSE response for GET /events
    pub fn handle_sse_connection(
        &self,
        initial: DashboardEvent,
    ) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
        let stream = self.subscribe_stream(initial);
        info!("New SSE client connected, total clients: {}", self.client_count());

        Sse::new(stream).keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text("keep-alive"),
        )
    }
}

/// Convert a dashboard event to an SSE frame (`event:` name + JSON `data:`)
pub fn to_sse_event(event: &DashboardEvent) -> Option<Event> {
    match Event::default()
        .id(Uuid::new_v4().to_string())
        .event(event.event_name())
        .json_data(event)
    {
        Ok(sse) => Some(sse),
        Err(e) => {
            debug!("Failed to serialize {} event: {}", event.event_name(), e);
            None
        }
    }
}
