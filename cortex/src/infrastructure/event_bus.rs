// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus - Pub/Sub for Cortex Domain Events
//
// In-memory event streaming over a tokio broadcast channel. Publishing never
// blocks and never fails: with no subscribers the event is dropped.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::events::CortexEvent;

#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<CortexEvent>>,
}

impl EventBus {
    /// Capacity is the number of events buffered before slow receivers lag.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish(&self, event: CortexEvent) {
        debug!(event_type = event.event_type(), "Publishing cortex event");

        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

pub struct EventReceiver {
    receiver: broadcast::Receiver<CortexEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<CortexEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    pub fn try_recv(&mut self) -> Result<CortexEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Drain every event currently buffered.
    pub fn drain(&mut self) -> Vec<CortexEvent> {
        let mut events = Vec::new();
        loop {
            match self.try_recv() {
                Ok(event) => events.push(event),
                Err(EventBusError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        events
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::episode::EpisodeId;
    use chrono::Utc;

    fn backfilled() -> CortexEvent {
        CortexEvent::EpisodeEmbeddingBackfilled {
            episode_id: EpisodeId::new(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        event_bus.publish(backfilled());

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.event_type(), "episode_embedding_backfilled");
    }

    #[test]
    fn test_publish_without_subscribers_is_dropped() {
        let event_bus = EventBus::new(10);
        assert_eq!(event_bus.subscriber_count(), 0);
        event_bus.publish(backfilled());
    }

    #[test]
    fn test_drain_collects_buffered_events() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();
        event_bus.publish(backfilled());
        event_bus.publish(backfilled());

        assert_eq!(receiver.drain().len(), 2);
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }
}
