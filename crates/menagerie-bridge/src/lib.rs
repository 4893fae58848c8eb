//! Cross-instance event bridge: local synchronous emission plus best-effort
//! replication over NATS.
//!
//! Every domain event is emitted into the in-process broadcast channel
//! first -- local correctness never depends on bus availability. Bridged
//! events are additionally published (fire-and-forget, on a spawned task)
//! to `menagerie.events.<kind>` wrapped in an [`EventEnvelope`] carrying
//! this instance's id. The consumer side subscribes to all event subjects
//! at startup, drops envelopes whose origin equals the local instance id
//! (anti-feedback-loop), and re-emits the rest locally as if produced here.
//!
//! The bus is at-least-once and multi-consumer; subscribers must tolerate
//! duplicate deliveries.

use futures::StreamExt as _;
use menagerie_types::{DomainEvent, EventEnvelope, InstanceId};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Subject prefix for all bridged events.
const SUBJECT_PREFIX: &str = "menagerie.events";

/// Wildcard subject matching every bridged event kind.
const SUBJECT_ALL: &str = "menagerie.events.>";

/// Capacity of the in-process broadcast channel.
///
/// Lagging local subscribers lose the oldest events (broadcast semantics);
/// the room drains its receiver every loop iteration so this is ample.
const LOCAL_CHANNEL_CAPACITY: usize = 256;

/// Errors that can occur in the event bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A NATS operation failed.
    #[error("NATS error: {0}")]
    Nats(String),

    /// Envelope serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Build the publish subject for an event kind.
fn subject_for(kind: &str) -> String {
    format!("{SUBJECT_PREFIX}.{kind}")
}

/// Whether a received envelope should be re-emitted locally.
///
/// Envelopes published by this instance come back over the shared bus;
/// accepting them would double-apply every event.
const fn should_accept(envelope: &EventEnvelope, local: InstanceId) -> bool {
    envelope.origin.into_inner().as_u128() != local.into_inner().as_u128()
}

/// The event bridge: local broadcast plus NATS replication.
pub struct EventBridge {
    instance_id: InstanceId,
    local: broadcast::Sender<DomainEvent>,
    nats: Option<async_nats::Client>,
}

impl EventBridge {
    /// Create a bridge for this instance.
    ///
    /// `nats` may be `None` to run without replication (single-instance
    /// deployments, tests); local emission is unaffected.
    pub fn new(instance_id: InstanceId, nats: Option<async_nats::Client>) -> Self {
        let (local, _) = broadcast::channel(LOCAL_CHANNEL_CAPACITY);
        Self {
            instance_id,
            local,
            nats,
        }
    }

    /// Connect to NATS and create a bridge around the connection.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Nats`] if the connection cannot be
    /// established.
    pub async fn connect(instance_id: InstanceId, url: &str) -> Result<Self, BridgeError> {
        info!(url, "connecting to NATS");
        let client = async_nats::connect(url)
            .await
            .map_err(|e| BridgeError::Nats(format!("failed to connect to {url}: {e}")))?;
        info!("NATS connection established");
        Ok(Self::new(instance_id, Some(client)))
    }

    /// The id this bridge stamps on outgoing envelopes.
    pub const fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    /// Subscribe to the local event stream (both locally-produced and
    /// accepted remote events).
    pub fn subscribe_local(&self) -> broadcast::Receiver<DomainEvent> {
        self.local.subscribe()
    }

    /// Emit an event.
    ///
    /// Local emission is synchronous and always happens. If the event is
    /// bridged and a bus connection exists, the envelope is published on a
    /// spawned task; publish failures are logged and never propagate.
    pub fn emit(&self, event: DomainEvent) {
        let bridged = event.is_bridged();
        let kind = event.kind();

        // A send error only means no local subscribers right now.
        let _ = self.local.send(event.clone());

        if !bridged {
            return;
        }
        let Some(client) = self.nats.clone() else {
            return;
        };

        let envelope = EventEnvelope {
            origin: self.instance_id,
            event,
        };
        let subject = subject_for(kind);
        match serde_json::to_vec(&envelope) {
            Ok(payload) => {
                tokio::spawn(async move {
                    if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                        warn!(subject, error = %e, "failed to publish bridged event");
                    }
                });
            }
            Err(e) => {
                warn!(subject, error = %e, "failed to serialize bridged event");
            }
        }
    }

    /// Start the consumer loop: subscribe to every event subject and
    /// re-emit accepted remote envelopes into the local stream.
    ///
    /// Returns immediately; the loop runs on a spawned task for the life
    /// of the NATS connection. A bridge without a bus connection is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Nats`] if the subscription fails.
    pub async fn spawn_consumer(&self) -> Result<(), BridgeError> {
        let Some(client) = self.nats.clone() else {
            debug!("no NATS connection, bridge consumer disabled");
            return Ok(());
        };

        let mut subscriber = client
            .subscribe(SUBJECT_ALL.to_owned())
            .await
            .map_err(|e| BridgeError::Nats(format!("failed to subscribe to {SUBJECT_ALL}: {e}")))?;
        info!(subject = SUBJECT_ALL, "bridge consumer subscribed");

        let local = self.local.clone();
        let instance_id = self.instance_id;
        tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                match serde_json::from_slice::<EventEnvelope>(&message.payload) {
                    Ok(envelope) => {
                        if !should_accept(&envelope, instance_id) {
                            debug!(subject = %message.subject, "dropping own bridged event");
                            continue;
                        }
                        debug!(
                            subject = %message.subject,
                            origin = %envelope.origin,
                            "re-emitting remote event"
                        );
                        let _ = local.send(envelope.event);
                    }
                    Err(e) => {
                        warn!(
                            subject = %message.subject,
                            error = %e,
                            "failed to deserialize bridged event"
                        );
                    }
                }
            }
            info!("bridge consumer stream ended");
        });

        Ok(())
    }
}

impl std::fmt::Debug for EventBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBridge")
            .field("instance_id", &self.instance_id)
            .field("connected", &self.nats.is_some())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use menagerie_types::{PetId, SessionId};
    use rust_decimal::Decimal;

    use super::*;

    fn fed_event() -> DomainEvent {
        DomainEvent::PetFed {
            session_id: SessionId::new("s1"),
            pet_id: PetId::new(),
            food_value: Decimal::from(25),
        }
    }

    #[test]
    fn subject_includes_event_kind() {
        assert_eq!(subject_for("pet_fed"), "menagerie.events.pet_fed");
    }

    #[test]
    fn own_origin_is_dropped() {
        let local = InstanceId::new();
        let envelope = EventEnvelope {
            origin: local,
            event: fed_event(),
        };
        assert!(!should_accept(&envelope, local));
    }

    #[test]
    fn foreign_origin_is_accepted() {
        let envelope = EventEnvelope {
            origin: InstanceId::new(),
            event: fed_event(),
        };
        assert!(should_accept(&envelope, InstanceId::new()));
    }

    #[tokio::test]
    async fn local_emission_reaches_subscribers_without_bus() {
        let bridge = EventBridge::new(InstanceId::new(), None);
        let mut rx = bridge.subscribe_local();

        bridge.emit(fed_event());

        let received = rx.recv().await.unwrap();
        assert!(matches!(received, DomainEvent::PetFed { .. }));
    }

    #[tokio::test]
    async fn emit_without_subscribers_does_not_error() {
        let bridge = EventBridge::new(InstanceId::new(), None);
        // No receiver exists; emit must still be safe.
        bridge.emit(fed_event());
    }

    // Integration tests that require a live NATS server are marked #[ignore].
    #[tokio::test]
    #[ignore = "requires live NATS server (docker compose up -d)"]
    async fn connect_to_nats() {
        let result = EventBridge::connect(InstanceId::new(), "nats://localhost:4222").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    #[ignore = "requires live NATS server (docker compose up -d)"]
    async fn bridged_event_crosses_instances() {
        let a = EventBridge::connect(InstanceId::new(), "nats://localhost:4222")
            .await
            .unwrap();
        let b = EventBridge::connect(InstanceId::new(), "nats://localhost:4222")
            .await
            .unwrap();
        b.spawn_consumer().await.unwrap();
        let mut rx = b.subscribe_local();

        a.emit(fed_event());

        let received =
            tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv()).await;
        assert!(matches!(received, Ok(Ok(DomainEvent::PetFed { .. }))));
    }
}
