//! # Platformer Game Client Library
//!
//! Client side of the networked platformer: local prediction of the player's
//! own movement, reconciliation against the server's snapshots, and the
//! WebSocket session that carries both.
//!
//! ## Architecture Overview
//!
//! ### Client-Side Prediction
//! The local player is simulated every physics tick with the same movement and
//! landing code the rest of the game uses, so input feels immediate. The
//! predicted state is reported to the server as an advisory position.
//!
//! ### Reconciliation
//! Snapshots from the server overwrite everything except the local player's
//! position. That is only snapped back when it drifts more than the teleport
//! threshold from the server's view, which happens after respawns and
//! death-zone falls.
//!
//! ### Mirrors
//! Remote players and bullets are never simulated locally. They are whatever
//! the latest snapshot said.
//!
//! ## Module Organization
//!
//! - `game`: [`game::ClientGameState`], prediction, reconciliation, render view
//! - `input`: the [`input::InputSource`] trait, bot inputs, report throttle
//! - `network`: [`network::Client`] session, disconnect notices
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::input::ScriptedInput;
//! use client::network::{Client, SessionEnd};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect("ws://127.0.0.1:8080", "bot").await?;
//!     let mut input = ScriptedInput::new(Some(1));
//!
//!     match client.run(&mut input, Some(Duration::from_secs(10))).await? {
//!         SessionEnd::Left => println!("left cleanly"),
//!         SessionEnd::Lost(notice) => println!("lost: {}", notice.reason),
//!     }
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;

pub use game::ClientGameState;
pub use network::{Client, ClientError};
