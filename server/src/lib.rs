//! # Arena Match Server
//!
//! The authoritative server for a 2D platform shooter. Many independent
//! matches run concurrently on one process; each match is a fixed-tick
//! simulation of up to `MAX_PLAYERS_PER_MATCH` players with gravity,
//! double-jump, platform collision, and hitscan-style shooting coordinated
//! between client and server via an input-debt reconciliation protocol.
//!
//! ## Module organization
//!
//! - [`player`]: per-player physics state, FIFO input queue and LIFO
//!   input-debt stack.
//! - [`match_state`]: the fixed-step accumulator loop, input-debt
//!   reconciliation, platform collision, shooting/hit handling, and the
//!   death/respawn/win/reset state machine for one match.
//! - [`matchmaker`]: registry of matches, region-based first-fit placement,
//!   reconnect routing, and the global 30 Hz driver.
//! - [`gateway`]: validates new sessions before handing them to the
//!   matchmaker.
//! - [`metrics`]: rolling-window counters, threshold alerts, daily rollup.
//! - [`network`]: UDP transport — receive/send tasks and the driver loop
//!   that ties everything above together.
//! - [`ids`]: match id and player id generation.
//! - [`config`]: CLI flags layered over environment variables.
//!
//! ## Usage
//!
//! ```no_run
//! use server::config::Config;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     env_logger::init();
//!     let config = Config::load();
//!     let server = Server::bind(&config).await?;
//!     server.run().await
//! }
//! ```

pub mod config;
pub mod gateway;
pub mod ids;
pub mod match_state;
pub mod matchmaker;
pub mod metrics;
pub mod network;
pub mod player;
