use futures::StreamExt;
use log::{debug, error, info, warn};

use crate::fanout::Coordinator;
use crate::integration::pubsub;

use super::Event;

/// Feeds every order event published on NATS to the coordinator until the subscription ends.
pub async fn listen(client: async_nats::Client, fanout: Coordinator) {
    let mut subscriber = match client.subscribe(pubsub::ORDER_EVENTS).await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to subscribe to {}: {e}", pubsub::ORDER_EVENTS);
            return;
        }
    };
    info!("Listening for order events on {}", pubsub::ORDER_EVENTS);

    while let Some(msg) = subscriber.next().await {
        let event = match serde_json::from_slice::<Event>(&msg.payload) {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping undecodable order event: {e}");
                continue;
            }
        };

        match fanout.order_transitioned(&event).await {
            Ok(Some(n)) => debug!("order {} produced notification {}", event.order_id(), n.id()),
            Ok(None) => {}
            Err(e) => error!("Failed to notify about order {}: {e:?}", event.order_id()),
        }
    }

    warn!("Order event subscription on {} ended", pubsub::ORDER_EVENTS);
}
