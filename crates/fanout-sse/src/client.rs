//! Client handles: the hub-side senders and the stream-side receivers of one connection.

use crate::event::Event;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Unique identifier for a connected client.
pub type ClientId = String;

/// Registration serials start at 1 and are never reused within a process.
static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Hub-side half of a connection.
///
/// Only the hub actor holds this once the client is subscribed. Dropping it
/// closes the event channel, which ends the paired [`ClientReceiver`]'s stream.
#[derive(Debug)]
pub struct Client {
    /// Client identifier.
    pub id: ClientId,
    /// Idle timeout; zero disables it.
    pub idle: Duration,
    serial: u64,
    events: mpsc::Sender<Event>,
    done: mpsc::Sender<()>,
}

impl Client {
    /// Registration serial, distinguishing reconnects that reuse an ID.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// A sender for the event channel.
    pub(crate) fn events(&self) -> mpsc::Sender<Event> {
        self.events.clone()
    }

    /// Signal the stream loop to close. Returns false if a signal is already
    /// pending or the stream side is gone.
    pub(crate) fn signal_done(&self) -> bool {
        self.done.try_send(()).is_ok()
    }
}

/// Stream-side half of a connection, consumed by [`crate::stream::run`].
#[derive(Debug)]
pub struct ClientReceiver {
    /// Client identifier.
    pub id: ClientId,
    /// Idle timeout; zero disables it.
    pub idle: Duration,
    serial: u64,
    pub(crate) events: mpsc::Receiver<Event>,
    pub(crate) done: mpsc::Receiver<()>,
}

impl ClientReceiver {
    /// Registration serial of the paired [`Client`].
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Receive the next event without going through the stream loop.
    pub async fn recv(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// Receive an already-delivered event, if any.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.events.try_recv().ok()
    }

    /// Whether the hub has signalled this client to close.
    pub fn is_done_signalled(&mut self) -> bool {
        self.done.try_recv().is_ok()
    }
}

/// Create a client with fresh channels.
///
/// `buffer` is the event channel capacity; zero is raised to one, the
/// smallest hand-off the runtime supports.
pub fn create_client(id: ClientId, idle: Duration, buffer: usize) -> (Client, ClientReceiver) {
    let serial = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);
    let (events_tx, events_rx) = mpsc::channel(buffer.max(1));
    let (done_tx, done_rx) = mpsc::channel(1);

    let client = Client {
        id: id.clone(),
        idle,
        serial,
        events: events_tx,
        done: done_tx,
    };
    let receiver = ClientReceiver {
        id,
        idle,
        serial,
        events: events_rx,
        done: done_rx,
    };
    (client, receiver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let (client, receiver) = create_client("test-client".to_string(), Duration::ZERO, 1);
        assert_eq!(client.id, "test-client");
        assert_eq!(receiver.id, "test-client");
        assert_eq!(client.serial(), receiver.serial());
    }

    #[test]
    fn test_serials_are_unique() {
        let (a, _ra) = create_client("same".to_string(), Duration::ZERO, 1);
        let (b, _rb) = create_client("same".to_string(), Duration::ZERO, 1);
        assert_ne!(a.serial(), b.serial());
    }

    #[test]
    fn test_done_signal_single_slot() {
        let (client, mut receiver) = create_client("c".to_string(), Duration::ZERO, 1);
        assert!(client.signal_done());
        // Second signal overflows the slot and is dropped.
        assert!(!client.signal_done());
        assert!(receiver.is_done_signalled());
        assert!(!receiver.is_done_signalled());
    }

    #[tokio::test]
    async fn test_event_hand_off() {
        let (client, mut receiver) = create_client("c".to_string(), Duration::ZERO, 0);
        client
            .events()
            .send(Event::new("message", "hello"))
            .await
            .unwrap();
        let event = receiver.recv().await.unwrap();
        assert_eq!(event.data, "hello");
    }

    #[tokio::test]
    async fn test_drop_closes_channels() {
        let (client, mut receiver) = create_client("c".to_string(), Duration::ZERO, 1);
        drop(client);
        assert!(receiver.recv().await.is_none());
        assert!(!receiver.is_done_signalled());
    }

    #[test]
    fn test_signal_after_receiver_dropped() {
        let (client, receiver) = create_client("c".to_string(), Duration::ZERO, 1);
        drop(receiver);
        assert!(!client.signal_done());
    }
}
