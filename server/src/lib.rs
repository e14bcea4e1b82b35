//! # Arena Server Library
//!
//! This library provides the authoritative server for the arena shooter. It
//! owns the canonical world, accepts TCP clients speaking newline-delimited
//! JSON, simulates bullets and combat, and streams world snapshots back to
//! every joined client.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Combat
//! Clients report their own positions, but bullets, hits, health, kills and
//! respawns are decided here only. Clients learn the outcome from snapshots.
//!
//! ### Connection Lifecycle
//! Each TCP connection runs its own task:
//! - Waits for a `join` and answers with `join_ack` before anything else
//! - Applies `update`, `shoot` and `quit` once joined
//! - Releases its player exactly once, whichever way it ends
//!
//! ### State Broadcasting
//! Twenty times a second a snapshot of every player and bullet is encoded
//! once and queued on each joined connection's outbound channel.
//!
//! ## Architecture Design
//!
//! ### Concurrent Tasks
//! The server is a set of cooperating tokio tasks sharing one
//! [`world::WorldState`]:
//! - **Accept Loop**: spawns a receive task per connection
//! - **Simulation**: advances bullets on a 60 Hz tick
//! - **Broadcaster**: sends snapshots at 20 Hz
//! - **Reaper**: evicts players silent for more than 12 seconds
//! - **Beacon**: announces the server on the LAN once a second
//!
//! ### Locking
//! Players, bullets and connections each sit behind their own lock. No code
//! path holds two of them at once, so the tasks cannot deadlock; a snapshot
//! may therefore mix two adjacent world states, which clients tolerate.
//!
//! ## Module Organization
//!
//! ### Entity Module (`entity`)
//! Server-side player and bullet records.
//!
//! ### Physics Module (`physics`)
//! Bullet integration, hit detection, damage and respawn rules, and the
//! sub-step split of elapsed time.
//!
//! ### World Module (`world`)
//! The shared store and every mutation the tasks perform on it.
//!
//! ### Connection Module (`connection`)
//! The per-connection handshake state machine and receive loop.
//!
//! ### Network Module (`network`)
//! Listener, configuration and the periodic simulation, broadcast and reaper tasks.
//!
//! ### Discovery Module (`discovery`)
//! The UDP broadcast beacon.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // TCP on 0.0.0.0:5000, discovery beacon on UDP 5001
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod discovery;
pub mod entity;
pub mod network;
pub mod physics;
pub mod world;
