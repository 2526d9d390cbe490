//! # Arena Server Library
//!
//! This library provides the authoritative server for a round-based dash
//! arena. Participants steer an agent, dash into each other to score, and the
//! first to reach the win score ends the round. After a short delay everyone
//! respawns and a new round starts.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Match State
//! The server owns spawn points, scores, dash cooldowns, invincibility and the
//! round phase. Clients never mutate any of it directly; they send intents
//! (move, dash) and the server decides.
//!
//! ### Connection Management
//! Handles the complete lifecycle of client connections including:
//! - Connection establishment and participant spawning
//! - Input ordering (stale or duplicated inputs are dropped)
//! - Disconnection handling and cleanup of every timer a participant owns
//! - Timeout detection for silent clients
//!
//! ### Replication
//! Every observable change is committed as a numbered delta. Deltas are
//! broadcast in commit order; a joining or desynchronised client receives a
//! welcome snapshot tagged with the last sequence it already reflects.
//!
//! ## Architecture Design
//!
//! ### Single Authority
//! All events (network packets, contact reports, timer expiry) are funnelled
//! through one [`arena::Arena`] on the main loop, so no two mutations ever
//! overlap. Timers are deadline-ordered and carry generation tokens; a timer
//! belonging to a released participant or superseded grant is discarded when
//! it fires.
//!
//! ### Logical Time
//! The arena clock advances by the configured tick interval on every tick,
//! which keeps the match rules deterministic and testable without sleeping.
//!
//! ### UDP-Based Communication
//! Uses UDP sockets for low-latency communication with clients. Clients
//! detect lost deltas from gaps in the sequence numbers and ask for a resync.
//!
//! ## Module Organization
//!
//! - `arena`: the authority tying every component together
//! - `registry`: connection to participant mapping, spawn and teardown
//! - `round`: hit resolution and the round lifecycle
//! - `ability`: dash performing and cooldown timers
//! - `invincibility`: reason-keyed invincibility with timed expiry
//! - `spawn`: the pool of free spawn points
//! - `timer`: the deadline-ordered timer queue
//! - `broadcast`: the ordered replication outbox
//! - `motion`: the movement capability used for impulses and rotation
//! - `client_manager` / `network`: the UDP transport
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use arena_server::config::ArenaConfig;
//! use arena_server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ArenaConfig {
//!         win_score: 5,
//!         ..ArenaConfig::default()
//!     };
//!     let mut server = Server::new("127.0.0.1:8080", config).await?;
//!
//!     // Runs until shutdown:
//!     // - Receives connects, inputs and contact reports
//!     // - Ticks the arena at the configured interval
//!     // - Broadcasts committed deltas and motion commands
//!     // - Drops clients that stop sending
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod ability;
pub mod arena;
pub mod broadcast;
pub mod client_manager;
pub mod config;
pub mod error;
pub mod invincibility;
pub mod motion;
pub mod network;
pub mod participant;
pub mod registry;
pub mod round;
pub mod spawn;
pub mod timer;
pub mod utils;
