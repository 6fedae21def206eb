//! Notification fanout delivering named events to every connection
//! subscribed to a session code.
//!
//! Two interchangeable backends sit behind [`EventBroker`]: a process-local
//! broadcaster for single-instance deployments and a Redis pub/sub bridge
//! that replays a shared channel into each process's local broadcaster, so
//! connections attached to different instances observe the same events.

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// Publish/subscribe contract the engine-facing flows talk to.
///
/// `publish` is fire-and-forget: it never blocks the caller on slow or dead
/// sinks, and delivery is only guaranteed to connections alive at publish
/// time. There is no replay log; reconnecting clients recover through the
/// snapshot endpoint.
pub trait EventBroker: Send + Sync {
    /// Register a delivery sink for a session code.
    fn subscribe(&self, code: u32) -> broadcast::Receiver<ServerEvent>;
    /// Deliver an event to every live subscriber of a session code.
    fn publish(&self, code: u32, event: ServerEvent);
}

/// In-process broker fanning out through one broadcast channel per code.
pub struct LocalBroker {
    capacity: usize,
    hubs: DashMap<u32, broadcast::Sender<ServerEvent>>,
}

impl LocalBroker {
    /// Create a broker whose per-code channels buffer `capacity` events for
    /// lagging subscribers.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            hubs: DashMap::new(),
        }
    }
}

impl EventBroker for LocalBroker {
    fn subscribe(&self, code: u32) -> broadcast::Receiver<ServerEvent> {
        self.hubs
            .entry(code)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    fn publish(&self, code: u32, event: ServerEvent) {
        let Some(sender) = self.hubs.get(&code) else {
            return;
        };

        if sender.send(event).is_err() {
            drop(sender);
            // Last subscriber went away; reap the idle hub so expired codes
            // don't accumulate senders forever.
            self.hubs
                .remove_if(&code, |_, sender| sender.receiver_count() == 0);
        }
    }
}

#[cfg(feature = "redis-store")]
pub use redis_broker::RedisBroker;

#[cfg(feature = "redis-store")]
mod redis_broker {
    use std::{sync::Arc, time::Duration};

    use futures::StreamExt;
    use redis::aio::ConnectionManager;
    use serde::{Deserialize, Serialize};
    use tokio::time::sleep;
    use tracing::{info, warn};

    use super::{EventBroker, LocalBroker, ServerEvent, broadcast};
    use crate::dao::game_store::redis::{RedisDaoError, RedisResult};

    /// Shared pub/sub channel all instances publish to and replay from.
    const EVENT_CHANNEL: &str = "caption-clash-events";
    /// Backoff between subscription attempts when the channel drops.
    const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

    /// Wire envelope carried on the shared channel.
    #[derive(Debug, Serialize, Deserialize)]
    struct EventEnvelope {
        code: u32,
        event: Option<String>,
        data: String,
    }

    /// Cross-process broker: `publish` serializes onto a shared Redis
    /// channel; a background listener replays every message (including this
    /// process's own) into the local broadcaster.
    pub struct RedisBroker {
        local: LocalBroker,
        publisher: ConnectionManager,
        channel: Arc<str>,
    }

    impl RedisBroker {
        /// Connect the publisher side and spawn the replay listener.
        pub async fn connect(url: &str, capacity: usize) -> RedisResult<Arc<Self>> {
            let client =
                redis::Client::open(url).map_err(|source| RedisDaoError::Client { source })?;
            let publisher = ConnectionManager::new(client.clone())
                .await
                .map_err(|source| RedisDaoError::Client { source })?;

            let broker = Arc::new(Self {
                local: LocalBroker::new(capacity),
                publisher,
                channel: Arc::from(EVENT_CHANNEL),
            });

            tokio::spawn(run_listener(client, Arc::clone(&broker)));

            Ok(broker)
        }
    }

    impl EventBroker for RedisBroker {
        fn subscribe(&self, code: u32) -> broadcast::Receiver<ServerEvent> {
            self.local.subscribe(code)
        }

        fn publish(&self, code: u32, event: ServerEvent) {
            let envelope = EventEnvelope {
                code,
                event: event.event,
                data: event.data,
            };

            let payload = match serde_json::to_string(&envelope) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(code, error = %err, "failed to encode event envelope");
                    return;
                }
            };

            // Local delivery happens when the listener replays the message,
            // so the publish itself only has to reach the channel. Spawned so
            // a slow broker never stalls the state transition that fired it.
            let mut conn = self.publisher.clone();
            let channel = Arc::clone(&self.channel);
            tokio::spawn(async move {
                let result = redis::cmd("PUBLISH")
                    .arg(channel.as_ref())
                    .arg(payload)
                    .query_async::<()>(&mut conn)
                    .await;
                if let Err(err) = result {
                    warn!(code, error = %err, "failed to publish event to shared channel");
                }
            });
        }
    }

    /// Replay loop: subscribe to the shared channel and push every envelope
    /// into the local broadcaster, resubscribing forever on failure.
    async fn run_listener(client: redis::Client, broker: Arc<RedisBroker>) {
        loop {
            let mut pubsub = match client.get_async_pubsub().await {
                Ok(pubsub) => pubsub,
                Err(err) => {
                    warn!(error = %err, "event channel connection failed");
                    sleep(RESUBSCRIBE_DELAY).await;
                    continue;
                }
            };

            if let Err(err) = pubsub.subscribe(broker.channel.as_ref()).await {
                warn!(error = %err, "event channel subscribe failed");
                sleep(RESUBSCRIBE_DELAY).await;
                continue;
            }

            info!(channel = %broker.channel, "listening on shared event channel");

            let mut messages = pubsub.on_message();
            while let Some(message) = messages.next().await {
                let payload: String = match message.get_payload() {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!(error = %err, "unreadable event payload; skipping");
                        continue;
                    }
                };

                match serde_json::from_str::<EventEnvelope>(&payload) {
                    Ok(envelope) => broker.local.publish(
                        envelope.code,
                        ServerEvent {
                            event: envelope.event,
                            data: envelope.data,
                        },
                    ),
                    Err(err) => warn!(error = %err, "undecodable event envelope; skipping"),
                }
            }

            warn!("shared event channel closed; resubscribing");
            sleep(RESUBSCRIBE_DELAY).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str) -> ServerEvent {
        ServerEvent {
            event: Some(name.to_string()),
            data: "{}".into(),
        }
    }

    #[tokio::test]
    async fn delivers_to_every_subscriber_of_the_code() {
        let broker = LocalBroker::new(8);
        let mut first = broker.subscribe(1234);
        let mut second = broker.subscribe(1234);
        let mut other = broker.subscribe(5678);

        broker.publish(1234, event("playerjoined"));

        assert_eq!(
            first.recv().await.unwrap().event.as_deref(),
            Some("playerjoined")
        );
        assert_eq!(
            second.recv().await.unwrap().event.as_deref(),
            Some("playerjoined")
        );
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let broker = LocalBroker::new(8);
        broker.publish(4321, event("roundstarted"));
    }

    #[tokio::test]
    async fn idle_hubs_are_reaped_after_last_unsubscribe() {
        let broker = LocalBroker::new(8);
        let receiver = broker.subscribe(1234);
        drop(receiver);

        broker.publish(1234, event("playerjoined"));
        assert!(broker.hubs.get(&1234).is_none());
    }
}
