//! Connection bookkeeping for the UDP transport
//!
//! This module handles the server-side management of connected clients, including:
//! - Client connection lifecycle (connect, disconnect, timeout)
//! - Per-connection input ordering so stale or duplicated packets are dropped
//! - Connection health monitoring and automatic cleanup
//! - Client capacity management and address tracking
//!
//! The client manager hands out the connection ids the arena authority keys
//! its participants by; it never touches match state itself.

use arena_shared::ConnectionId;
use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Represents a connected client
///
/// Each client maintains:
/// - Connection metadata (ID, address, last activity)
/// - The newest input sequence accepted from it
#[derive(Debug)]
pub struct Client {
    /// Unique connection identifier assigned by the server
    pub id: ConnectionId,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Highest input sequence number we've accepted
    pub last_processed_input: u32,
}

impl Client {
    /// Creates a new client with the given ID and network address
    ///
    /// The client starts with no processed inputs and is marked as
    /// recently active.
    pub fn new(id: ConnectionId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            last_processed_input: 0,
        }
    }

    /// Accepts an input only if it is newer than everything seen so far
    ///
    /// UDP may reorder or duplicate packets; dropping anything at or below
    /// the last accepted sequence keeps per-connection processing in the
    /// order the client issued its inputs.
    pub fn accept_input(&mut self, sequence: u32) -> bool {
        self.last_seen = Instant::now();
        if sequence <= self.last_processed_input {
            return false;
        }
        self.last_processed_input = sequence;
        true
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Checks if the client has exceeded the connection timeout
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// Enforces the server capacity limit and maps network addresses to the
/// connection ids the authority works with.
pub struct ClientManager {
    /// Connected clients indexed by their connection id
    clients: HashMap<ConnectionId, Client>,
    /// Next available id for new connections
    next_client_id: ConnectionId,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    /// Creates a new client manager with the specified capacity limit
    ///
    /// Connection ids start from 1 and increment for each new connection.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns Some(connection_id) if successful, None if server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<ConnectionId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        let client = Client::new(client_id, addr);
        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, client);

        Some(client_id)
    }

    /// Removes a client from the server
    ///
    /// Returns true if the client was found and removed, false if they were
    /// already gone (for instance after a timeout raced an explicit disconnect).
    pub fn remove_client(&mut self, client_id: &ConnectionId) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    /// Finds a connection id by network address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<ConnectionId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Runs the sequence check for one input of the given client
    ///
    /// Returns false for unknown clients and for stale or duplicated inputs.
    pub fn accept_input(&mut self, client_id: ConnectionId, sequence: u32) -> bool {
        self.clients
            .get_mut(&client_id)
            .is_some_and(|client| client.accept_input(sequence))
    }

    /// Refreshes the activity timestamp of a client
    pub fn touch(&mut self, client_id: ConnectionId) -> bool {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.touch();
            true
        } else {
            false
        }
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the removed connection ids so the authority can run its
    /// disconnect path for each of them.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<ConnectionId> {
        let timed_out: Vec<ConnectionId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    /// Gets all connection ids and their network addresses
    pub fn get_client_addrs(&self) -> Vec<(ConnectionId, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_client_creation() {
        let addr = test_addr();
        let client = Client::new(1, addr);

        assert_eq!(client.id, 1);
        assert_eq!(client.addr, addr);
        assert_eq!(client.last_processed_input, 0);
    }

    #[test]
    fn test_client_accept_input_in_order() {
        let mut client = Client::new(1, test_addr());

        assert!(client.accept_input(1));
        assert!(client.accept_input(3));
        assert!(!client.accept_input(2));
        assert!(!client.accept_input(3));
        assert_eq!(client.last_processed_input, 3);
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(1, test_addr());

        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(client.is_timed_out(Duration::from_secs(1)));

        client.touch();
        assert!(!client.is_timed_out(Duration::from_secs(1)));
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

        let client_id1 = manager.add_client(test_addr()).unwrap();
        let client_id2 = manager.add_client(test_addr2()).unwrap();

        assert_eq!(client_id1, 1);
        assert_eq!(client_id2, 2);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);

        assert!(manager.add_client(test_addr()).is_some());
        assert!(manager.add_client(test_addr2()).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_ids_not_reused_after_remove() {
        let mut manager = ClientManager::new(2);

        let first = manager.add_client(test_addr()).unwrap();
        assert!(manager.remove_client(&first));
        assert!(!manager.remove_client(&first));

        let second = manager.add_client(test_addr()).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = ClientManager::new(2);
        let client_id1 = manager.add_client(test_addr()).unwrap();
        let _client_id2 = manager.add_client(test_addr2()).unwrap();

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(client_id1));

        let unknown_addr: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown_addr), None);
    }

    #[test]
    fn test_accept_input_unknown_client() {
        let mut manager = ClientManager::new(2);
        assert!(!manager.accept_input(999, 1));
        assert!(!manager.touch(999));
    }

    #[test]
    fn test_check_timeouts_removes_silent_clients() {
        let mut manager = ClientManager::new(2);
        let quiet = manager.add_client(test_addr()).unwrap();
        let active = manager.add_client(test_addr2()).unwrap();

        if let Some(client) = manager.clients.get_mut(&quiet) {
            client.last_seen = Instant::now() - Duration::from_secs(10);
        }

        let removed = manager.check_timeouts(Duration::from_secs(5));

        assert_eq!(removed, vec![quiet]);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.find_client_by_addr(test_addr2()), Some(active));
    }
}
