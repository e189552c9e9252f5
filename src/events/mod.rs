use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Events emitted by the fulfillment core after a successful commit.
///
/// Delivery is best-effort: a full or closed channel is logged and never
/// fails the operation that produced the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderReady(Uuid),
    OrderPickedUp(Uuid),
    OrderSoftDeleted(Uuid),
    OrderRestored(Uuid),
    CustomerForceDeleted(Uuid),
    BoxesMaterialized {
        order_id: Uuid,
        count: i32,
    },
    BoxAssignedToPallet {
        box_id: String,
        pallet_id: Uuid,
    },
    BoxesAssignedToShelf {
        shelf_id: Uuid,
        count: usize,
    },
    PalletAssignedToShelf {
        pallet_id: Uuid,
        shelf_id: Uuid,
    },
    HoldingRecounted {
        carrier_id: Uuid,
        holding: i32,
    },
    PickupNotificationQueued(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Creates a bounded event channel plus a logging consumer task, for
/// deployments without a real downstream subscriber.
pub fn logging_event_channel(buffer: usize) -> (EventSender, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(buffer);
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            info!(?event, "event");
        }
        debug!("event channel closed");
    });
    (EventSender::new(tx), handle)
}
