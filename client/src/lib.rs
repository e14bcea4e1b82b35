//! # Arena Client Library
//!
//! This library provides the client side of the arena shooter: finding a
//! server on the LAN, joining it, moving the local avatar from input, and
//! presenting the server's snapshots of everyone else.
//!
//! ## Architecture Overview
//!
//! ### Local Authority Over Movement
//! The client moves its own avatar immediately from input and reports the
//! resulting position twenty times a second. The server trusts these reports
//! and never sends corrections, so the local position is never rolled back.
//!
//! ### Server Authority Over Combat
//! Shots are sent as directions only. Bullets, hits, health and kills come
//! back in snapshots, and the client shows its own health from the latest
//! one.
//!
//! ### Snapshot Replacement
//! Each `state` message replaces the remote players and bullets wholesale.
//! The client's own entry in the snapshot is ignored when drawing.
//!
//! ## Module Organization
//!
//! ### Config Module (`config`)
//! Client settings, color parsing and random identity defaults.
//!
//! ### Discovery Module (`discovery`)
//! Listens for the server's UDP broadcast and returns its TCP address.
//!
//! ### Game Module (`game`)
//! The predicted avatar, the latest snapshot and the update throttle.
//!
//! ### Input Module (`input`)
//! The `InputSource` seam plus a scripted headless source.
//!
//! ### Network Module (`network`)
//! TCP session: join, receive task and the 60 Hz frame loop.
//!
//! ### Rendering Module (`rendering`)
//! The `RenderSink` seam plus a headless logging renderer.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::LocalAvatar;
//! use client::input::ScriptedInput;
//! use client::network::Client;
//! use client::rendering::LogRenderer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let addr = "127.0.0.1:5000".parse()?;
//!     let avatar = LocalAvatar::new("bot".to_string(), [0, 200, 0], 400.0, 300.0);
//!
//!     let mut client = Client::connect(addr, avatar).await?;
//!     let mut input = ScriptedInput::new(1, Some(600));
//!     let mut renderer = LogRenderer::default();
//!
//!     // Ten seconds of wandering and shooting, then `quit`
//!     client.run(&mut input, &mut renderer).await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod discovery;
pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
