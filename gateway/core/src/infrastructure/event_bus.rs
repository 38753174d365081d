// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Transfer Events
//
// Provides in-memory event streaming using tokio broadcast channels.
// Enables real-time progress streaming to SSE endpoints and observers.
//
// In-memory only: events are lost on restart, matching the queue's own
// non-persistent state.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::events::TransferEvent;
use crate::domain::transfer::JobId;

/// Event bus for publishing and subscribing to transfer events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<TransferEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity.
    /// Capacity determines how many events can be buffered before dropping
    /// old ones.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: TransferEvent) {
        debug!(job_id = %event.job().id, "Publishing transfer event");

        // send() returns the number of receivers; zero subscribers is fine.
        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to transfer event");
        }
    }

    /// Subscribe to all transfer events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe and filter for a specific job id.
    /// Useful for streaming progress for a single job.
    pub fn subscribe_job(&self, job_id: JobId) -> JobEventReceiver {
        JobEventReceiver {
            receiver: self.sender.subscribe(),
            job_id,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Receiver for all transfer events
pub struct EventReceiver {
    receiver: broadcast::Receiver<TransferEvent>,
}

impl EventReceiver {
    /// Receive the next event (blocks until an event is available)
    pub async fn recv(&mut self) -> Result<TransferEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<TransferEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver for job-specific events (filtered)
pub struct JobEventReceiver {
    receiver: broadcast::Receiver<TransferEvent>,
    job_id: JobId,
}

impl JobEventReceiver {
    /// Receive the next event for the subscribed job, skipping others.
    pub async fn recv(&mut self) -> Result<TransferEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(|e| match e {
                broadcast::error::RecvError::Closed => EventBusError::Closed,
                broadcast::error::RecvError::Lagged(n) => {
                    warn!("Event receiver lagged by {} events", n);
                    EventBusError::Lagged(n)
                }
            })?;

            if event.job().id == self.job_id {
                return Ok(event);
            }
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}
