//! # Platformer Game Server
//!
//! Authoritative server for the networked 2D platformer. It owns the canonical
//! game state, accepts advisory position reports and fire requests from
//! clients, and broadcasts a full snapshot to every joined client each tick.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Clients simulate their own movement and report it. The server checks the
//! reports, applies them, and owns everything else: bullets, hits, health,
//! deaths, respawns, kill counts and the death zone.
//!
//! ### Connection Management
//! Handles the lifecycle of WebSocket connections:
//! - Join validation (empty, overlong and duplicate names are rejected)
//! - Colour assignment from a fixed palette
//! - Idle timeouts and the capacity limit
//! - Clean and unexpected disconnects
//!
//! ### State Broadcasting
//! Every tick the snapshot is serialised once and queued for each joined
//! connection. A connection whose outbound queue is full skips that snapshot
//! instead of stalling the loop.
//!
//! ## Architecture
//!
//! ### Single Owner Event Loop
//! One task owns the [`game::GameState`] and the [`client_manager::ClientManager`].
//! Connection tasks never touch either; they forward decoded messages and
//! close notifications through a channel, so every mutation happens in order
//! on one task.
//!
//! ## Module Organization
//!
//! - `client_manager`: connection registry, phases, outbound queues, timeouts
//! - `config`: runtime settings
//! - `error`: server error type
//! - `game`: canonical state and the per-tick simulation
//! - `network`: WebSocket accept loop, per-connection tasks and the main loop
//! - `palette`: player colour assignment
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(ServerConfig::default()).await?;
//!
//!     let shutdown = server.shutdown_handle();
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         shutdown.shutdown();
//!     });
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod error;
pub mod game;
pub mod network;
pub mod palette;

pub use config::ServerConfig;
pub use error::ServerError;
pub use network::{Server, ShutdownHandle};
