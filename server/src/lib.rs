//! # Territory Arena Server
//!
//! Authoritative server for the territory game. One process hosts one room:
//! it owns every snake, runs the simulation at a fixed tick rate and sends
//! snapshots to the connected clients at a lower patch rate.
//!
//! ## Module Organization
//!
//! ### Collision (`collision`)
//! Wall, self and player collision checks, food pickup and the score formula.
//!
//! ### Arena (`arena`)
//! Eases the arena half-size towards a target that follows the number of
//! living snakes, holding back shrinks that would trap a snake or its territory.
//!
//! ### Room (`room`)
//! The per-room tick. Queued player commands are applied first, then every
//! snake is advanced, checked for collisions, given a chance to close a
//! territory loop and rescored. The tick returns a list of [`room::RoomEvent`]s.
//!
//! ### Client Manager (`client_manager`)
//! Address to player id mapping, capacity and timeouts.
//!
//! ### Network (`network`)
//! UDP transport. Incoming packets become room commands; room events become
//! `spawn`/`death` packets for the affected player.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use shared::GameConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new("127.0.0.1:8080", GameConfig::load_or_default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod arena;
pub mod client_manager;
pub mod collision;
pub mod network;
pub mod room;
