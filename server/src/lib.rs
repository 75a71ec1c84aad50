//! # Quiz Chat Server Library
//!
//! This library provides the server for a small chat room with a built-in
//! arithmetic quiz. Clients connect over TCP, claim a unique display name,
//! exchange chat messages, and answer a new puzzle every quiz interval.
//!
//! ## Core Responsibilities
//!
//! ### Session Management
//! Handles the complete lifecycle of client connections including:
//! - Connection acceptance and client ID assignment
//! - The login handshake and case-insensitive name reservation
//! - Disconnection handling, cleanup and departure notices
//!
//! ### Message Relay
//! Chat messages from a logged-in user are relayed to every other connected
//! client, tagged with the sender's name.
//!
//! ### Quiz Rounds
//! On a fixed cadence the server grades the answers submitted for the
//! previous puzzle, sends each client its own result, and broadcasts a new
//! puzzle of the form `a + b + c * d = r` with one slot hidden.
//!
//! ## Architecture Design
//!
//! ### Single Coordinator Loop
//! One task owns the session registry and the quiz state. It accepts
//! connections, applies session events in arrival order and fires quiz
//! ticks, so every mutation is serialized without locks.
//!
//! ### Per-Connection Tasks
//! Each connection gets a reader task that reassembles newline-delimited JSON
//! frames and a writer task that drains an outbound queue. Enqueueing never
//! waits on a socket, so a stalled client cannot hold up delivery to others.
//!
//! ### Explicit Actions
//! The protocol handler and the quiz master return lists of [`protocol::Action`]s
//! instead of writing to sockets, which keeps them testable without a
//! network stack.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! The session registry: per-client state, targeted sends and broadcasts.
//!
//! ### Protocol Module (`protocol`)
//! The login / chat / answer state machine and action dispatch.
//!
//! ### Quiz Module (`quiz`)
//! Puzzle generation, rendering and grading.
//!
//! ### Network Module (`network`)
//! TCP listener, connection tasks and the coordinator loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::new(ServerConfig {
//!         address: "127.0.0.1:1967".to_string(),
//!         quiz_interval: Duration::from_secs(10),
//!         max_clients: 64,
//!         seed: None,
//!     })
//!     .await?;
//!
//!     // Serves clients until Ctrl+C
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod network;
pub mod protocol;
pub mod quiz;
