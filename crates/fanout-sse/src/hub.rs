//! Event hub: the actor that owns the client registry.
//!
//! All registry access happens inside a single task reading from a shutdown
//! token and an ordered command mailbox. Producers only ever enqueue, so the
//! registry needs no lock and commands from one caller keep their order.

use crate::client::{create_client, Client, ClientId, ClientReceiver};
use crate::config::SseConfig;
use crate::event::Event;
use crate::metrics::HubMetrics;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where a routed event goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// One client.
    Client(ClientId),
    /// Every client registered when the message is processed.
    Broadcast,
}

/// An event together with its destination.
#[derive(Debug, Clone)]
pub struct RoutingMessage {
    /// Destination.
    pub target: Target,
    /// Event to deliver.
    pub event: Event,
}

enum Command {
    Subscribe(Client),
    Unsubscribe {
        client_id: ClientId,
        /// Only remove the entry if it is still this registration.
        serial: Option<u64>,
    },
    Route(RoutingMessage),
    Snapshot(oneshot::Sender<Vec<ClientId>>),
}

/// Cumulative hub statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    /// Clients currently registered.
    pub current_clients: usize,
    /// Subscriptions since start.
    pub total_subscribes: u64,
    /// Removals since start (explicit, evicted, or at shutdown).
    pub total_unsubscribes: u64,
    /// Events handed to clients since start.
    pub total_events: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
    current_clients: AtomicUsize,
    total_subscribes: AtomicU64,
    total_unsubscribes: AtomicU64,
    total_events: AtomicU64,
}

impl StatsCounters {
    fn snapshot(&self) -> HubStats {
        HubStats {
            current_clients: self.current_clients.load(Ordering::Relaxed),
            total_subscribes: self.total_subscribes.load(Ordering::Relaxed),
            total_unsubscribes: self.total_unsubscribes.load(Ordering::Relaxed),
            total_events: self.total_events.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
struct HubInner {
    config: SseConfig,
    commands: mpsc::Sender<Command>,
    shutdown: CancellationToken,
    actor: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<StatsCounters>,
    metrics: Option<HubMetrics>,
}

/// Handle to the hub actor. Cheap to clone; every clone talks to the same actor.
#[derive(Debug, Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl Hub {
    /// Start a hub actor on the current Tokio runtime.
    ///
    /// Metrics are built only when `config.metrics.enabled` is set.
    pub fn new(config: SseConfig) -> Self {
        let metrics = HubMetrics::from_config(&config.metrics);
        let (commands, mailbox) = mpsc::channel(config.mailbox_size.max(1));
        let shutdown = CancellationToken::new();
        let stats = Arc::new(StatsCounters::default());

        let actor = HubActor {
            clients: HashMap::new(),
            mailbox,
            shutdown: shutdown.clone(),
            stats: stats.clone(),
            metrics: metrics.clone(),
        };
        let handle = tokio::spawn(actor.run());

        Self {
            inner: Arc::new(HubInner {
                config,
                commands,
                shutdown,
                actor: Mutex::new(Some(handle)),
                stats,
                metrics,
            }),
        }
    }

    /// Hub configuration.
    pub fn config(&self) -> &SseConfig {
        &self.inner.config
    }

    /// Hub metrics, if enabled.
    pub fn metrics(&self) -> Option<&HubMetrics> {
        self.inner.metrics.as_ref()
    }

    /// Build a client with this hub's idle timeout and buffer size. A missing
    /// or empty ID is replaced with a random UUID.
    pub fn new_client(&self, client_id: Option<ClientId>) -> (Client, ClientReceiver) {
        let client_id = client_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        create_client(
            client_id,
            self.inner.config.client_idle(),
            self.inner.config.client_buffer,
        )
    }

    /// Build, subscribe and guard a client in one step.
    ///
    /// The returned [`Connection`] unsubscribes the client when dropped.
    pub async fn connect(&self, client_id: Option<ClientId>) -> Connection {
        let (client, receiver) = self.new_client(client_id);
        let subscription = Subscription {
            hub: self.clone(),
            client_id: client.id.clone(),
            serial: client.serial(),
        };
        self.subscribe(client).await;
        Connection {
            receiver,
            subscription,
        }
    }

    /// Register a client, evicting any registration with the same ID.
    pub async fn subscribe(&self, client: Client) {
        self.send(Command::Subscribe(client)).await;
    }

    /// Remove a client. Unknown IDs are ignored.
    pub async fn unsubscribe(&self, client_id: &str) {
        self.send(Command::Unsubscribe {
            client_id: client_id.to_string(),
            serial: None,
        })
        .await;
    }

    /// Deliver an event to one client. Dropped if the client is not registered.
    pub async fn notify(&self, client_id: impl Into<ClientId>, event: Event) {
        self.route(RoutingMessage {
            target: Target::Client(client_id.into()),
            event,
        })
        .await;
    }

    /// Deliver an event to every registered client.
    pub async fn broadcast(&self, event: Event) {
        self.route(RoutingMessage {
            target: Target::Broadcast,
            event,
        })
        .await;
    }

    /// Enqueue a routing message.
    pub async fn route(&self, message: RoutingMessage) {
        self.send(Command::Route(message)).await;
    }

    /// IDs of the currently registered clients. Empty once the hub is closed.
    pub async fn client_ids(&self) -> Vec<ClientId> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Snapshot(reply)).await;
        response.await.unwrap_or_default()
    }

    /// Whether a client with this ID is registered.
    pub async fn contains(&self, client_id: &str) -> bool {
        self.client_ids().await.iter().any(|id| id == client_id)
    }

    /// Snapshot of the hub counters.
    pub fn stats(&self) -> HubStats {
        self.inner.stats.snapshot()
    }

    /// Whether [`Hub::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Stop the actor: every registered client gets its done signal and is
    /// removed. Waits for the actor to exit. Calling it again is a no-op.
    pub async fn close(&self) {
        self.inner.shutdown.cancel();
        let handle = self.inner.actor.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Hub actor terminated abnormally");
            }
        }
    }

    async fn send(&self, command: Command) {
        if self.inner.commands.send(command).await.is_err() {
            debug!("Hub closed, command dropped");
        }
    }

    /// Unsubscribe without waiting, for use from `Drop`.
    fn unsubscribe_detached(&self, client_id: ClientId, serial: u64) {
        let command = Command::Unsubscribe {
            client_id,
            serial: Some(serial),
        };
        match self.inner.commands.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Closed(_)) => debug!("Hub closed, unsubscribe dropped"),
            Err(TrySendError::Full(command)) => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let commands = self.inner.commands.clone();
                    runtime.spawn(async move {
                        let _ = commands.send(command).await;
                    });
                }
                Err(_) => warn!("Hub mailbox full and no runtime available, unsubscribe dropped"),
            },
        }
    }
}

/// Guard that unsubscribes its client when dropped.
///
/// The unsubscribe carries the registration serial, so a guard belonging to a
/// connection that was already replaced by a reconnect with the same ID does
/// not remove the newer registration.
#[derive(Debug)]
pub struct Subscription {
    hub: Hub,
    client_id: ClientId,
    serial: u64,
}

impl Subscription {
    /// ID of the guarded client.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub
            .unsubscribe_detached(std::mem::take(&mut self.client_id), self.serial);
    }
}

/// A subscribed client: the stream-side receiver plus its cleanup guard.
#[derive(Debug)]
pub struct Connection {
    /// Stream-side half of the client.
    pub receiver: ClientReceiver,
    /// Unsubscribes on drop.
    pub subscription: Subscription,
}

struct RegisteredClient {
    client: Client,
    since: Instant,
}

struct HubActor {
    clients: HashMap<ClientId, RegisteredClient>,
    mailbox: mpsc::Receiver<Command>,
    shutdown: CancellationToken,
    stats: Arc<StatsCounters>,
    metrics: Option<HubMetrics>,
}

impl HubActor {
    async fn run(mut self) {
        debug!("Hub actor started");
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                command = self.mailbox.recv() => match command {
                    Some(command) => self.handle(command).await,
                    // Every handle is gone.
                    None => break,
                },
            }
        }
        self.close_all();
        debug!("Hub actor stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Subscribe(client) => self.subscribe(client),
            Command::Unsubscribe { client_id, serial } => self.unsubscribe(&client_id, serial),
            Command::Route(RoutingMessage {
                target: Target::Client(client_id),
                event,
            }) => {
                self.notify(&client_id, &event).await;
            }
            Command::Route(RoutingMessage {
                target: Target::Broadcast,
                event,
            }) => self.broadcast(&event).await,
            Command::Snapshot(reply) => {
                let _ = reply.send(self.clients.keys().cloned().collect());
            }
        }
    }

    fn subscribe(&mut self, client: Client) {
        if let Some(previous) = self.clients.remove(&client.id) {
            self.release(previous, "replaced");
        }

        let client_id = client.id.clone();
        self.clients.insert(
            client_id.clone(),
            RegisteredClient {
                client,
                since: Instant::now(),
            },
        );

        self.stats.total_subscribes.fetch_add(1, Ordering::Relaxed);
        self.stats.current_clients.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = &self.metrics {
            metrics.record_subscribe(&client_id);
        }
        info!(client_id = %client_id, "Client subscribed");
    }

    fn unsubscribe(&mut self, client_id: &str, serial: Option<u64>) {
        let current = match self.clients.get(client_id) {
            Some(registered) => registered.client.serial(),
            None => {
                debug!(client_id = %client_id, "Unsubscribe: client not found");
                return;
            }
        };
        if serial.is_some_and(|serial| serial != current) {
            debug!(client_id = %client_id, "Unsubscribe: stale registration ignored");
            return;
        }
        if let Some(registered) = self.clients.remove(client_id) {
            self.release(registered, "unsubscribed");
        }
    }

    /// Deliver to one client. Returns false if the hub shut down mid-send.
    async fn notify(&mut self, client_id: &str, event: &Event) -> bool {
        let Some(registered) = self.clients.get(client_id) else {
            debug!(client_id = %client_id, event = %event.event, "Notify: client not found");
            return true;
        };
        let events = registered.client.events();

        // A full buffer parks the actor here until the stream loop catches up.
        let sent = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return false,
            sent = events.send(event.clone()) => sent,
        };

        match sent {
            Ok(()) => {
                self.stats.total_events.fetch_add(1, Ordering::Relaxed);
                if let Some(metrics) = &self.metrics {
                    metrics.record_event(client_id);
                }
                debug!(client_id = %client_id, event = %event.event, "Notified client");
            }
            Err(_) => {
                debug!(client_id = %client_id, "Notify: client stream already gone");
            }
        }
        true
    }

    /// Deliver to each registered client in turn. A slow client delays the
    /// ones after it in this pass.
    async fn broadcast(&mut self, event: &Event) {
        let targets: Vec<ClientId> = self.clients.keys().cloned().collect();
        debug!(event = %event.event, recipients = targets.len(), "Broadcasting event");
        for client_id in targets {
            if !self.notify(&client_id, event).await {
                break;
            }
        }
    }

    /// Signal, account for and drop a client that has left the registry.
    /// Dropping it closes its event channel.
    fn release(&self, registered: RegisteredClient, reason: &'static str) {
        let RegisteredClient { client, since } = registered;
        client.signal_done();

        let connected_for = since.elapsed();
        self.stats.total_unsubscribes.fetch_add(1, Ordering::Relaxed);
        self.stats.current_clients.fetch_sub(1, Ordering::Relaxed);
        if let Some(metrics) = &self.metrics {
            metrics.record_unsubscribe(&client.id, connected_for);
        }
        info!(
            client_id = %client.id,
            duration_seconds = connected_for.as_secs_f64(),
            reason,
            "Client unsubscribed"
        );
    }

    fn close_all(&mut self) {
        let clients = std::mem::take(&mut self.clients);
        info!(clients = clients.len(), "Closing hub");
        for (_, registered) in clients {
            self.release(registered, "shutdown");
        }
    }
}
