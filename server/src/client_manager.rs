//! Session registry and message fan-out for the chat server
//!
//! This module handles the server-side bookkeeping of connected clients, including:
//! - Session lifecycle (accept, login, disconnect)
//! - Case-insensitive username reservation
//! - Per-session quiz state (last submitted answer, last question seen)
//! - Targeted sends and broadcasts through per-session outbound queues
//!
//! The registry is owned by the server's coordinator task, so every mutation
//! is serialized without additional locking.

use log::{debug, info};
use shared::ServerMessage;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// Commands consumed by a session's writer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Message(ServerMessage),
    /// Flush what is queued, then close the connection
    Close,
}

/// Represents one connected client
///
/// Each session maintains:
/// - Connection metadata (ID, peer address)
/// - The username claimed at login, if any
/// - The answer submitted for the current quiz round
/// - The queue feeding the connection's writer task
#[derive(Debug)]
pub struct Session {
    /// Unique client identifier assigned by the server
    pub id: u32,
    /// Peer address, used for logging
    pub addr: SocketAddr,
    /// Username with its original casing, set once on successful login
    pub user_name: Option<String>,
    /// Trimmed answer most recently submitted this round
    pub last_answer: Option<String>,
    /// Number of the quiz round whose question this session was sent
    pub seen_round: Option<u64>,
    outbound: mpsc::UnboundedSender<Outgoing>,
}

impl Session {
    /// Creates a session that has not logged in yet
    pub fn new(id: u32, addr: SocketAddr, outbound: mpsc::UnboundedSender<Outgoing>) -> Self {
        Self {
            id,
            addr,
            user_name: None,
            last_answer: None,
            seen_round: None,
            outbound,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.user_name.is_some()
    }

    /// Queues a message for this session's writer
    ///
    /// Never waits on the socket. Returns false if the writer has already
    /// gone away; its disconnect event is on its way to the coordinator.
    pub fn send(&self, message: ServerMessage) -> bool {
        self.outbound.send(Outgoing::Message(message)).is_ok()
    }

    /// Asks the writer task to flush and close the connection
    pub fn close(&self) {
        let _ = self.outbound.send(Outgoing::Close);
    }
}

/// Holds every live session
///
/// Sessions are keyed by ID in a `BTreeMap`, so iteration (and therefore
/// broadcast order) follows accept order and is stable between calls.
pub struct ClientManager {
    /// Connected sessions indexed by their unique ID
    clients: BTreeMap<u32, Session>,
    /// Next available client ID for new connections
    next_client_id: u32,
    /// Maximum number of concurrent sessions allowed
    max_clients: usize,
}

impl ClientManager {
    /// Creates an empty registry with the given capacity limit
    ///
    /// Client IDs start from 1 and increment for each accepted connection.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: BTreeMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a freshly accepted, not yet logged-in session
    ///
    /// Returns None if the server is at capacity.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        outbound: mpsc::UnboundedSender<Outgoing>,
    ) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Session::new(client_id, addr, outbound));

        Some(client_id)
    }

    /// Deregisters a session, handing it back to the caller
    ///
    /// Idempotent: a second call for the same ID returns None.
    pub fn remove_client(&mut self, client_id: &u32) -> Option<Session> {
        let session = self.clients.remove(client_id)?;
        info!("Client {} disconnected", session.id);
        Some(session)
    }

    pub fn get(&self, client_id: &u32) -> Option<&Session> {
        self.clients.get(client_id)
    }

    pub fn get_mut(&mut self, client_id: &u32) -> Option<&mut Session> {
        self.clients.get_mut(client_id)
    }

    /// Checks whether any session other than `except` holds `name`,
    /// ignoring case
    pub fn is_name_taken(&self, name: &str, except: Option<u32>) -> bool {
        let wanted = name.to_lowercase();
        self.clients.values().any(|session| {
            Some(session.id) != except
                && session
                    .user_name
                    .as_ref()
                    .is_some_and(|taken| taken.to_lowercase() == wanted)
        })
    }

    /// Delivers a message to exactly one session
    pub fn send_to(&self, client_id: u32, message: ServerMessage) -> bool {
        match self.clients.get(&client_id) {
            Some(session) => {
                let sent = session.send(message);
                if !sent {
                    debug!("Client {} outbound queue already closed", client_id);
                }
                sent
            }
            None => false,
        }
    }

    /// Delivers a message to every session except `exclude`
    ///
    /// Takes a snapshot of the recipients first, then enqueues in registry
    /// order. Returns the number of sessions the message was queued for.
    pub fn broadcast(&self, message: &ServerMessage, exclude: Option<u32>) -> usize {
        let recipients: Vec<&Session> = self
            .clients
            .values()
            .filter(|session| Some(session.id) != exclude)
            .collect();

        let mut delivered = 0;
        for session in recipients {
            if session.send(message.clone()) {
                delivered += 1;
            } else {
                debug!("Skipping client {}: outbound queue closed", session.id);
            }
        }
        delivered
    }

    /// Sends a close request to every session (server shutdown)
    pub fn disconnect_all(&self) {
        for session in self.clients.values() {
            session.close();
        }
    }

    /// IDs of all sessions in registry order
    pub fn client_ids(&self) -> Vec<u32> {
        self.clients.keys().copied().collect()
    }

    pub fn sessions_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.clients.values_mut()
    }

    /// Usernames of logged-in sessions in registry order
    pub fn logged_in_names(&self) -> Vec<String> {
        self.clients
            .values()
            .filter_map(|session| session.user_name.clone())
            .collect()
    }

    /// Returns the number of currently connected sessions
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no sessions are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn add(
        manager: &mut ClientManager,
        addr: SocketAddr,
    ) -> (u32, mpsc::UnboundedReceiver<Outgoing>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (manager.add_client(addr, tx).unwrap(), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Outgoing>) -> Vec<Outgoing> {
        let mut out = Vec::new();
        while let Ok(item) = rx.try_recv() {
            out.push(item);
        }
        out
    }

    #[test]
    fn test_session_creation() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = Session::new(1, test_addr(), tx);

        assert_eq!(session.id, 1);
        assert_eq!(session.addr, test_addr());
        assert!(!session.is_logged_in());
        assert!(session.last_answer.is_none());
        assert!(session.seen_round.is_none());
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new(5);
        assert_eq!(manager.max_clients, 5);
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = ClientManager::new(3);

        let (id1, _rx1) = add(&mut manager, test_addr());
        let (id2, _rx2) = add(&mut manager, test_addr2());

        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.client_ids(), vec![1, 2]);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);

        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        assert!(manager.add_client(test_addr(), tx1).is_some());
        assert!(manager.add_client(test_addr2(), tx2).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client_is_idempotent() {
        let mut manager = ClientManager::new(2);
        let (id, _rx) = add(&mut manager, test_addr());

        assert!(manager.remove_client(&id).is_some());
        assert!(manager.remove_client(&id).is_none());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_remove_nonexistent_client() {
        let mut manager = ClientManager::new(2);
        assert!(manager.remove_client(&999).is_none());
    }

    #[test]
    fn test_is_name_taken_ignores_case() {
        let mut manager = ClientManager::new(3);
        let (id1, _rx1) = add(&mut manager, test_addr());
        let (id2, _rx2) = add(&mut manager, test_addr2());

        manager.get_mut(&id1).unwrap().user_name = Some("Alice".to_string());

        assert!(manager.is_name_taken("alice", Some(id2)));
        assert!(manager.is_name_taken("ALICE", None));
        assert!(!manager.is_name_taken("alice", Some(id1)));
        assert!(!manager.is_name_taken("bob", Some(id2)));
    }

    #[test]
    fn test_send_to_single_session() {
        let mut manager = ClientManager::new(3);
        let (id1, mut rx1) = add(&mut manager, test_addr());
        let (_id2, mut rx2) = add(&mut manager, test_addr2());

        assert!(manager.send_to(id1, ServerMessage::Result { result: true }));
        assert!(!manager.send_to(999, ServerMessage::Result { result: true }));

        assert_eq!(
            drain(&mut rx1),
            vec![Outgoing::Message(ServerMessage::Result { result: true })]
        );
        assert!(drain(&mut rx2).is_empty());
    }

    #[test]
    fn test_broadcast_excludes_one_session() {
        let mut manager = ClientManager::new(3);
        let (id1, mut rx1) = add(&mut manager, test_addr());
        let (_id2, mut rx2) = add(&mut manager, test_addr2());
        let (_id3, mut rx3) = add(&mut manager, test_addr2());

        let message = ServerMessage::NewUser {
            username: "Alice".to_string(),
        };
        assert_eq!(manager.broadcast(&message, Some(id1)), 2);

        assert!(drain(&mut rx1).is_empty());
        assert_eq!(drain(&mut rx2), vec![Outgoing::Message(message.clone())]);
        assert_eq!(drain(&mut rx3), vec![Outgoing::Message(message)]);
    }

    #[test]
    fn test_broadcast_skips_closed_queues() {
        let mut manager = ClientManager::new(3);
        let (_id1, rx1) = add(&mut manager, test_addr());
        let (_id2, mut rx2) = add(&mut manager, test_addr2());

        drop(rx1);

        let message = ServerMessage::Result { result: false };
        assert_eq!(manager.broadcast(&message, None), 1);
        assert_eq!(drain(&mut rx2), vec![Outgoing::Message(message)]);
    }

    #[test]
    fn test_broadcast_preserves_call_order() {
        let mut manager = ClientManager::new(2);
        let (_id, mut rx) = add(&mut manager, test_addr());

        for i in 0..5 {
            manager.broadcast(
                &ServerMessage::Message {
                    text: i.to_string(),
                    sender: "Alice".to_string(),
                },
                None,
            );
        }

        let texts: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter_map(|item| match item {
                Outgoing::Message(ServerMessage::Message { text, .. }) => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn test_disconnect_all_sends_close() {
        let mut manager = ClientManager::new(2);
        let (_id1, mut rx1) = add(&mut manager, test_addr());
        let (_id2, mut rx2) = add(&mut manager, test_addr2());

        manager.disconnect_all();

        assert_eq!(drain(&mut rx1), vec![Outgoing::Close]);
        assert_eq!(drain(&mut rx2), vec![Outgoing::Close]);
    }

    #[test]
    fn test_logged_in_names_in_registry_order() {
        let mut manager = ClientManager::new(3);
        let (id1, _rx1) = add(&mut manager, test_addr());
        let (_id2, _rx2) = add(&mut manager, test_addr2());
        let (id3, _rx3) = add(&mut manager, test_addr2());

        manager.get_mut(&id3).unwrap().user_name = Some("Bob".to_string());
        manager.get_mut(&id1).unwrap().user_name = Some("Alice".to_string());

        assert_eq!(manager.logged_in_names(), vec!["Alice", "Bob"]);
    }
}
