use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Lifecycle events emitted by the marketplace services. Consumed by an
/// in-process logging task; nothing financial depends on delivery of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartItemAdded {
        account_id: i32,
        catalog_item_id: Uuid,
    },
    CartCleared(i32),

    // Order events
    OrderCreated(Uuid),
    OrderApproved(Uuid),
    OrderCancelled(Uuid),
    OrderDelivered(Uuid),
    OrderRefunded(Uuid),
    OrderExpired(Uuid),

    // Payment events
    PaymentLogged {
        order_id: Uuid,
        status: String,
    },

    // Delivery events
    DeliveryFailed {
        order_id: Uuid,
        reason: String,
    },

    // Catalog events
    StockDepleted(Uuid),

    // Boss-points events
    BossPointsSpent {
        account_id: i32,
        points: i32,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Send, logging instead of failing when the channel is gone. Events are
    /// observability, never control flow.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

/// Drains the event channel and logs each event. Runs for the lifetime of
/// the process.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(?event, "marketplace event");
    }
    info!("Event channel closed; event processor exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let order_id = Uuid::new_v4();

        sender.send(Event::OrderCreated(order_id)).await.unwrap();

        match rx.recv().await {
            Some(Event::OrderCreated(id)) => assert_eq!(id, order_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        // Must not panic or error out.
        sender.send_or_log(Event::CartCleared(1)).await;
    }
}
