//! Registry of currently connected clients.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;
use uuid::Uuid;

use lanchat_protocol::envelope::Event;

use crate::connection::Client;

/// Process-scoped table of online clients, keyed by connection id.
///
/// Broadcasts go to whoever is connected at that moment; a client whose
/// send buffer is gone (mid-disconnect) is skipped, never waited on.
#[derive(Default)]
pub struct Registry {
    clients: RwLock<HashMap<Uuid, Client>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a client and returns the new online count.
    pub fn insert(&self, client: Client) -> usize {
        let mut clients = self.clients.write().unwrap();
        clients.insert(client.id, client);
        clients.len()
    }

    /// Removes a client and returns the remaining online count.
    pub fn remove(&self, id: Uuid) -> usize {
        let mut clients = self.clients.write().unwrap();
        clients.remove(&id);
        clients.len()
    }

    /// Number of connected clients.
    pub fn online_count(&self) -> usize {
        self.clients.read().unwrap().len()
    }

    /// Sends an event to every connected client.
    pub fn broadcast(&self, event: &Event) {
        self.broadcast_filtered(event, None);
    }

    /// Sends an event to every connected client except `exclude`.
    pub fn broadcast_except(&self, exclude: Uuid, event: &Event) {
        self.broadcast_filtered(event, Some(exclude));
    }

    fn broadcast_filtered(&self, event: &Event, exclude: Option<Uuid>) {
        let clients = self.clients.read().unwrap();
        for (id, client) in clients.iter() {
            if exclude == Some(*id) {
                continue;
            }
            if let Err(e) = client.sender.send_event(event) {
                debug!(ip = %client.ip, "skipping broadcast to client: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::sender_pair;
    use lanchat_protocol::EventType;

    fn client(ip: &str) -> (Client, tokio::sync::mpsc::Receiver<tokio_tungstenite::tungstenite::Message>) {
        let (sender, rx) = sender_pair();
        (
            Client {
                id: Uuid::new_v4(),
                ip: ip.into(),
                sender,
            },
            rx,
        )
    }

    #[test]
    fn insert_and_remove_track_count() {
        let registry = Registry::new();
        let (a, _rx_a) = client("10.0.0.1");
        let (b, _rx_b) = client("10.0.0.2");

        assert_eq!(registry.insert(a.clone()), 1);
        assert_eq!(registry.insert(b.clone()), 2);
        assert_eq!(registry.online_count(), 2);
        assert_eq!(registry.remove(a.id), 1);
        assert_eq!(registry.remove(a.id), 1); // idempotent
        assert_eq!(registry.remove(b.id), 0);
    }

    #[test]
    fn broadcast_reaches_all_clients() {
        let registry = Registry::new();
        let (a, mut rx_a) = client("10.0.0.1");
        let (b, mut rx_b) = client("10.0.0.2");
        registry.insert(a);
        registry.insert(b);

        let event = Event::new::<()>(EventType::MessageSent, None).unwrap();
        registry.broadcast(&event);

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn broadcast_except_skips_excluded() {
        let registry = Registry::new();
        let (a, mut rx_a) = client("10.0.0.1");
        let (b, mut rx_b) = client("10.0.0.2");
        let a_id = a.id;
        registry.insert(a);
        registry.insert(b);

        let event = Event::new::<()>(EventType::MessageSent, None).unwrap();
        registry.broadcast_except(a_id, &event);

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn broadcast_survives_dead_client() {
        let registry = Registry::new();
        let (a, rx_a) = client("10.0.0.1");
        let (b, mut rx_b) = client("10.0.0.2");
        registry.insert(a);
        registry.insert(b);

        drop(rx_a); // simulate a client mid-disconnect

        let event = Event::new::<()>(EventType::MessageSent, None).unwrap();
        registry.broadcast(&event);
        assert!(rx_b.try_recv().is_ok());
    }
}
