//! Room lifecycle and session management.
//!
//! A room moves through `Created -> Active -> Disposing -> Disposed`
//! (terminal; no further commands are processed). The room runs as one
//! tokio task owning its state; transports talk to it through a
//! [`RoomHandle`] and receive pushes on the per-session channel they
//! register at join.
//!
//! Reconnection: an unconsented leave reserves the session id for a grace
//! window. The player's pets are detached from room memory at leave and
//! re-hydrated from durable storage when the same session resumes, so a
//! dropped connection never loses assets.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use menagerie_db::{PetStore, SessionStore, UserStore};
use menagerie_types::{
    DomainEvent, InboundMessage, OutboundMessage, Player, RoomState, SessionId,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::deps::{RoomConfig, RoomDeps};
use crate::handlers::{pets, queries};
use crate::pipeline;
use crate::tick::{self, TickCounters};

/// Bootstrap-hook attempts before giving up (non-fatal).
const BOOTSTRAP_ATTEMPTS: u32 = 3;

/// Fixed delay between bootstrap attempts.
const BOOTSTRAP_RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(1);

/// The room lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Constructed, not yet running.
    Created,
    /// Processing commands and ticking.
    Active,
    /// Draining; new commands are ignored.
    Disposing,
    /// Terminal.
    Disposed,
}

/// Join parameters supplied by the (already authenticated) transport.
#[derive(Debug, Clone)]
pub struct JoinOptions {
    /// The wallet the session authenticated with.
    pub wallet_address: String,
}

/// Commands a transport may send to the room task.
#[derive(Debug)]
pub enum RoomCommand {
    /// A session wants in; `client` is its outbound push channel.
    Join {
        /// The joining session.
        session_id: SessionId,
        /// Authenticated join parameters.
        options: JoinOptions,
        /// Outbound channel for welcome/response/resync pushes.
        client: mpsc::UnboundedSender<OutboundMessage>,
    },
    /// An inbound action message.
    Message(InboundMessage),
    /// A session disconnected.
    Leave {
        /// The leaving session.
        session_id: SessionId,
        /// Whether the client left deliberately (no reconnection window).
        consented: bool,
    },
    /// Shut the room down.
    Dispose,
}

/// A cheap, clonable sender for pushing commands into a room task.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    tx: mpsc::UnboundedSender<RoomCommand>,
}

impl RoomHandle {
    /// Ask the room to admit a session. Returns `false` if the room task
    /// is gone.
    pub fn join(
        &self,
        session_id: SessionId,
        options: JoinOptions,
        client: mpsc::UnboundedSender<OutboundMessage>,
    ) -> bool {
        self.tx
            .send(RoomCommand::Join {
                session_id,
                options,
                client,
            })
            .is_ok()
    }

    /// Forward an inbound message. Returns `false` if the room task is gone.
    pub fn send(&self, message: InboundMessage) -> bool {
        self.tx.send(RoomCommand::Message(message)).is_ok()
    }

    /// Report a disconnect. Returns `false` if the room task is gone.
    pub fn leave(&self, session_id: SessionId, consented: bool) -> bool {
        self.tx
            .send(RoomCommand::Leave {
                session_id,
                consented,
            })
            .is_ok()
    }

    /// Ask the room to dispose. Returns `false` if the room task is gone.
    pub fn dispose(&self) -> bool {
        self.tx.send(RoomCommand::Dispose).is_ok()
    }
}

/// A held reconnection slot for an unconsented leaver.
#[derive(Debug, Clone)]
struct Reservation {
    wallet_address: String,
    expires_at: DateTime<Utc>,
}

/// One room instance: state, collaborators, connected clients.
pub struct Room {
    pub(crate) state: RoomState,
    pub(crate) deps: RoomDeps,
    pub(crate) config: RoomConfig,
    pub(crate) phase: RoomPhase,
    pub(crate) clients: BTreeMap<SessionId, mpsc::UnboundedSender<OutboundMessage>>,
    reservations: BTreeMap<SessionId, Reservation>,
    counters: TickCounters,
}

impl Room {
    /// Construct a room in the `Created` phase.
    pub fn new(config: RoomConfig, deps: RoomDeps) -> Self {
        let state = RoomState::new(config.room_name.clone(), Utc::now());
        Self {
            state,
            deps,
            config,
            phase: RoomPhase::Created,
            clients: BTreeMap::new(),
            reservations: BTreeMap::new(),
            counters: TickCounters::default(),
        }
    }

    /// Construct a room and spawn its task, returning the handle.
    pub fn spawn(config: RoomConfig, deps: RoomDeps) -> RoomHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let room = Self::new(config, deps);
        tokio::spawn(room.run(rx));
        RoomHandle { tx }
    }

    /// The room's single sequence: commands, the tick, and bridged events
    /// drain through one loop, so nothing here runs concurrently with
    /// anything else that touches `RoomState`.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<RoomCommand>) {
        self.on_create().await;

        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut events = self.deps.bridge.subscribe_local();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(RoomCommand::Dispose) | None => {
                        self.on_dispose().await;
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                },
                _ = ticker.tick() => {
                    let now = Utc::now();
                    self.purge_reservations(now);
                    tick::run_tick(
                        &mut self.state,
                        &self.deps,
                        &self.config,
                        &mut self.counters,
                        now,
                    )
                    .await;
                }
                event = events.recv() => self.observe_event(event),
            }
        }
    }

    /// Dispatch one non-dispose command.
    async fn handle_command(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Join {
                session_id,
                options,
                client,
            } => self.on_join(session_id, &options, client).await,
            RoomCommand::Message(message) => self.on_message(message).await,
            RoomCommand::Leave {
                session_id,
                consented,
            } => self.on_leave(&session_id, consented).await,
            RoomCommand::Dispose => {}
        }
    }

    /// `Created -> Active`: run the bounded-retry bootstrap hook.
    ///
    /// The hook verifies the reference cache is warm. Exhaustion is logged
    /// and the room starts anyway -- gameplay degrades, the room survives.
    pub(crate) async fn on_create(&mut self) {
        for attempt in 1..=BOOTSTRAP_ATTEMPTS {
            if self.deps.catalog.is_warm() {
                break;
            }
            warn!(
                room = self.state.room_name,
                attempt, "reference cache not warm yet"
            );
            if attempt < BOOTSTRAP_ATTEMPTS {
                tokio::time::sleep(BOOTSTRAP_RETRY_DELAY).await;
            } else {
                warn!(
                    room = self.state.room_name,
                    "bootstrap exhausted, starting with a cold reference cache"
                );
            }
        }

        self.phase = RoomPhase::Active;
        info!(
            room = self.state.room_name,
            tick_interval_secs = self.config.tick_interval.as_secs(),
            "room created"
        );
        self.deps.metrics.incr("room.created");
    }

    /// Admit a session: hydrate from durable storage, register the client
    /// channel, send the welcome push.
    pub(crate) async fn on_join(
        &mut self,
        session_id: SessionId,
        options: &JoinOptions,
        client: mpsc::UnboundedSender<OutboundMessage>,
    ) {
        if self.phase != RoomPhase::Active {
            debug!(%session_id, "join ignored, room not active");
            return;
        }

        let wallet = options.wallet_address.as_str();

        if self.is_blacklisted(wallet).await {
            warn!(%session_id, wallet, "blacklisted wallet refused");
            self.deps.metrics.incr("room.join.refused");
            return;
        }

        let resumed = self.reservations.remove(&session_id).is_some();
        let now = Utc::now();

        // Hydrate the account; on storage failure fall back to catalog
        // defaults. Purchases re-read the durable balance anyway, so a
        // stale mirror cannot overspend.
        let starting_tokens = self.deps.catalog.default_info().starting_tokens;
        let tokens = match UserStore::new(self.deps.postgres.pool())
            .find_or_create(wallet, starting_tokens)
            .await
        {
            Ok(record) => record.tokens,
            Err(e) => {
                warn!(%session_id, wallet, error = %e, "account hydration failed, using defaults");
                starting_tokens
            }
        };

        let player = Player::new(session_id.clone(), wallet, tokens, now);
        if let Err(e) = self.state.add_player(player) {
            warn!(%session_id, error = %e, "join rejected");
            return;
        }

        // Re-hydrate pets from durable storage (also how a resumed session
        // gets back the pets detached at leave).
        let mut pets_restored = 0u32;
        match PetStore::new(self.deps.postgres.pool())
            .find_by_wallet(wallet)
            .await
        {
            Ok(rows) => {
                for row in rows {
                    let pet = row.into_pet(session_id.clone());
                    if self.state.attach_pet(pet).is_ok() {
                        pets_restored = pets_restored.saturating_add(1);
                    }
                }
            }
            Err(e) => {
                warn!(%session_id, wallet, error = %e, "pet hydration failed");
            }
        }

        let welcome = OutboundMessage::Welcome {
            room_name: self.state.room_name.clone(),
            session_id: session_id.clone(),
            tokens,
            pets_restored,
        };
        let _ = client.send(welcome);
        self.clients.insert(session_id.clone(), client);

        // Session audit row, fire-and-forget.
        let postgres = self.deps.postgres.clone();
        let audit_session = session_id.clone();
        let audit_wallet = wallet.to_owned();
        let room_name = self.state.room_name.clone();
        tokio::spawn(async move {
            if let Err(e) = SessionStore::new(postgres.pool())
                .record_join(&audit_session, &audit_wallet, &room_name, now)
                .await
            {
                warn!(session_id = %audit_session, error = %e, "session audit write failed");
            }
        });

        self.deps.bridge.emit(DomainEvent::PlayerJoined {
            session_id: session_id.clone(),
            wallet_address: wallet.to_owned(),
        });
        self.deps.metrics.incr("room.join");
        info!(%session_id, wallet, resumed, pets_restored, "player joined");
    }

    /// Run one inbound message through the pipeline and push the result.
    pub(crate) async fn on_message(&mut self, message: InboundMessage) {
        if self.phase != RoomPhase::Active {
            debug!(session_id = %message.session_id, "message ignored, room not active");
            return;
        }

        let session_id = message.session_id.clone();
        let Some(processed) = pipeline::process(&mut self.state, &self.deps, message).await
        else {
            return;
        };

        let resync = processed.resync;
        self.push(
            &session_id,
            OutboundMessage::Response {
                action: processed.action.to_owned(),
                response: processed.response,
            },
        );

        if resync {
            self.push_state_sync(&session_id);
        }
    }

    /// Remove a session: flush its deferred state, detach its pets, grant
    /// the reconnection window for unconsented leaves.
    pub(crate) async fn on_leave(&mut self, session_id: &SessionId, consented: bool) {
        if self.phase == RoomPhase::Disposed {
            return;
        }

        let Some(player) = self.state.player(session_id) else {
            debug!(%session_id, "leave for unknown session");
            return;
        };
        let wallet = player.wallet_address.clone();
        let now = Utc::now();

        // Flush deferred inventory state before the player disappears.
        if player.inventory_dirty {
            let inventory = serde_json::to_value(&player.inventory).unwrap_or_default();
            if let Err(e) = UserStore::new(self.deps.postgres.pool())
                .save_inventory(&wallet, &inventory)
                .await
            {
                warn!(%session_id, wallet, error = %e, "leave inventory flush failed");
            }
        }

        // Persist final pet stats, then detach them from room memory. The
        // durable rows survive; a resume re-hydrates from them.
        let rows = pets::snapshot_player_pets(&self.state, session_id);
        if let Err(e) = PetStore::new(self.deps.postgres.pool()).save_stats(&rows).await {
            warn!(%session_id, wallet, error = %e, "leave pet persist failed");
        }
        let removed = self.state.detach_player_pets(session_id);

        self.state.remove_player(session_id);
        self.clients.remove(session_id);

        if !consented {
            let grace = chrono::Duration::from_std(self.config.reconnect_grace)
                .unwrap_or_else(|_| chrono::Duration::seconds(60));
            let expires_at = now.checked_add_signed(grace).unwrap_or(now);
            self.reservations.insert(
                session_id.clone(),
                Reservation {
                    wallet_address: wallet.clone(),
                    expires_at,
                },
            );
        }

        let postgres = self.deps.postgres.clone();
        let audit_session = session_id.clone();
        tokio::spawn(async move {
            if let Err(e) = SessionStore::new(postgres.pool())
                .record_leave(&audit_session, consented, now)
                .await
            {
                warn!(session_id = %audit_session, error = %e, "session audit close failed");
            }
        });

        self.deps.bridge.emit(DomainEvent::PlayerLeft {
            session_id: session_id.clone(),
            consented,
        });
        self.deps.metrics.incr("room.leave");
        info!(%session_id, wallet, consented, pets_detached = removed.len(), "player left");
    }

    /// `-> Disposing -> Disposed`: final flush, release clients.
    ///
    /// Spawned writes may still be in flight when this returns; the stores
    /// tolerate writes landing after the room is gone.
    pub(crate) async fn on_dispose(&mut self) {
        if self.phase == RoomPhase::Disposed {
            return;
        }
        self.phase = RoomPhase::Disposing;
        info!(room = self.state.room_name, "room disposing");

        tick::flush_dirty_players(&mut self.state, &self.deps).await;
        tick::snapshot_pets(&self.state, &self.deps).await;

        self.clients.clear();
        self.reservations.clear();
        self.phase = RoomPhase::Disposed;
        self.deps.metrics.incr("room.disposed");
        info!(room = self.state.room_name, "room disposed");
    }

    /// Push one message to one session, dropping dead channels.
    fn push(&mut self, session_id: &SessionId, message: OutboundMessage) {
        let gone = self
            .clients
            .get(session_id)
            .is_some_and(|client| client.send(message).is_err());
        if gone {
            debug!(%session_id, "client channel closed, dropping");
            self.clients.remove(session_id);
        }
    }

    /// Push a full pets-state resync to one session.
    fn push_state_sync(&mut self, session_id: &SessionId) {
        let Ok(pets) = queries::player_pets(&self.state, session_id) else {
            return;
        };
        self.push(session_id, OutboundMessage::StateSync { pets });
    }

    /// Look up the wallet in the layered blacklist cache.
    async fn is_blacklisted(&self, wallet: &str) -> bool {
        let Some(cache) = self.deps.cache.as_ref() else {
            return false;
        };
        let key = format!("blacklist:{wallet}");
        cache.get(&key).await.is_some()
    }

    /// Drop reservations whose grace window has elapsed.
    fn purge_reservations(&mut self, now: DateTime<Utc>) {
        self.reservations.retain(|session_id, reservation| {
            let keep = reservation.expires_at > now;
            if !keep {
                debug!(%session_id, wallet = reservation.wallet_address, "reconnection window expired");
            }
            keep
        });
    }

    /// React to a locally-emitted or bridge-replicated domain event.
    ///
    /// State mutation already happened wherever the event was produced;
    /// this is the observation side (logs, metrics).
    fn observe_event(&self, event: Result<DomainEvent, broadcast::error::RecvError>) {
        match event {
            Ok(event) => {
                debug!(room = self.state.room_name, kind = event.kind(), "domain event");
                self.deps.metrics.incr("room.event");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(room = self.state.room_name, skipped, "event stream lagged");
            }
            // Closed cannot happen while `deps` holds the bridge.
            Err(broadcast::error::RecvError::Closed) => {}
        }
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("room_name", &self.state.room_name)
            .field("phase", &self.phase)
            .field("players", &self.state.player_count)
            .field("pets", &self.state.pets.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use menagerie_types::{Pet, PetId};

    use crate::deps::RoomConfig;
    use crate::testutil::{attach_cat, test_deps};

    use super::*;

    fn test_room() -> Room {
        let config = RoomConfig::new("pet_room")
            .with_reconnect_grace(std::time::Duration::from_secs(60));
        Room::new(config, test_deps())
    }

    fn join_directly(room: &mut Room, session: &str) -> SessionId {
        let session_id = SessionId::new(session);
        let player = Player::new(
            session_id.clone(),
            format!("0x{session}"),
            rust_decimal::Decimal::from(100),
            Utc::now(),
        );
        room.state.add_player(player).unwrap();
        session_id
    }

    #[tokio::test]
    async fn create_activates_the_room() {
        let mut room = test_room();
        assert_eq!(room.phase, RoomPhase::Created);
        room.on_create().await;
        assert_eq!(room.phase, RoomPhase::Active);
    }

    #[tokio::test]
    async fn join_with_unreachable_storage_falls_back_to_defaults() {
        let mut room = test_room();
        room.on_create().await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let session_id = SessionId::new("a");
        room.on_join(
            session_id.clone(),
            &JoinOptions {
                wallet_address: String::from("0xa"),
            },
            tx,
        )
        .await;

        let player = room.state.player(&session_id).unwrap();
        // Hydration failed; the catalog starting balance stands in.
        assert_eq!(
            player.tokens,
            room.deps.catalog.default_info().starting_tokens
        );

        let welcome = rx.recv().await.unwrap();
        assert!(matches!(
            welcome,
            OutboundMessage::Welcome { pets_restored: 0, .. }
        ));
    }

    #[tokio::test]
    async fn unconsented_leave_detaches_pets_and_reserves_the_session() {
        let mut room = test_room();
        room.on_create().await;
        let session_id = join_directly(&mut room, "a");
        let pet_a = attach_cat(&mut room.state, &session_id);
        let pet_b = attach_cat(&mut room.state, &session_id);
        assert_eq!(room.state.pets.len(), 2);

        room.on_leave(&session_id, false).await;

        // Immediately after leave, neither pet id remains in the room.
        assert!(room.state.pet(pet_a).is_none());
        assert!(room.state.pet(pet_b).is_none());
        assert!(room.state.pets.is_empty());
        assert!(room.state.player(&session_id).is_none());
        assert_eq!(room.state.player_count, 0);
        // The session may resume within the grace window.
        assert!(room.reservations.contains_key(&session_id));
    }

    #[tokio::test]
    async fn consented_leave_grants_no_reservation() {
        let mut room = test_room();
        room.on_create().await;
        let session_id = join_directly(&mut room, "a");

        room.on_leave(&session_id, true).await;
        assert!(room.reservations.is_empty());
    }

    #[tokio::test]
    async fn reservations_expire_after_the_grace_window() {
        let mut room = test_room();
        room.on_create().await;
        let session_id = join_directly(&mut room, "a");
        room.on_leave(&session_id, false).await;
        assert!(room.reservations.contains_key(&session_id));

        // Still inside the window: the reservation holds.
        room.purge_reservations(Utc::now());
        assert!(room.reservations.contains_key(&session_id));

        // Past the window: purged.
        let later = Utc::now().checked_add_signed(Duration::seconds(120)).unwrap();
        room.purge_reservations(later);
        assert!(room.reservations.is_empty());
    }

    #[tokio::test]
    async fn disposed_room_processes_nothing() {
        let mut room = test_room();
        room.on_create().await;
        let session_id = join_directly(&mut room, "a");
        room.on_dispose().await;
        assert_eq!(room.phase, RoomPhase::Disposed);

        // Messages after disposal are ignored outright.
        room.on_message(InboundMessage {
            session_id: session_id.clone(),
            body: serde_json::json!({ "action": "get_inventory" }),
        })
        .await;

        // Joins after disposal are ignored too.
        let (tx, _rx) = mpsc::unbounded_channel();
        room.on_join(
            SessionId::new("b"),
            &JoinOptions {
                wallet_address: String::from("0xb"),
            },
            tx,
        )
        .await;
        assert!(room.state.player(&SessionId::new("b")).is_none());

        // Dispose is idempotent.
        room.on_dispose().await;
        assert_eq!(room.phase, RoomPhase::Disposed);
    }

    #[tokio::test]
    async fn leave_for_unknown_session_is_a_no_op() {
        let mut room = test_room();
        room.on_create().await;
        room.on_leave(&SessionId::new("ghost"), false).await;
        assert!(room.reservations.is_empty());
    }

    #[tokio::test]
    async fn ownership_survives_attach_of_foreign_pet() {
        let mut room = test_room();
        room.on_create().await;
        let a = join_directly(&mut room, "a");
        let b = join_directly(&mut room, "b");
        let pet_a = attach_cat(&mut room.state, &a);
        let _pet_b = attach_cat(&mut room.state, &b);

        // Leaving player a must not disturb player b's pets.
        room.on_leave(&a, false).await;
        assert_eq!(room.state.pets.len(), 1);
        assert!(room.state.pet(pet_a).is_none());
        assert_eq!(room.state.player(&b).unwrap().total_pets_owned, 1);
    }

    #[tokio::test]
    async fn pet_attach_failure_does_not_poison_join() {
        let mut room = test_room();
        room.on_create().await;
        // A pet whose owner never joined cannot be attached.
        let stray = Pet::new(PetId::new(), SessionId::new("ghost"), "cat", Utc::now());
        assert!(room.state.attach_pet(stray).is_err());
        assert!(room.state.pets.is_empty());
    }
}
