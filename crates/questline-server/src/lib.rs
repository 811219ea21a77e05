//! HTTP surface for a running Questline session.
//!
//! This crate provides an Axum server that exposes:
//!
//! - **REST endpoints** for the session's commands (score, currency, stats,
//!   minigame levels, module upgrades, reward claims, resource conversion,
//!   explicit sync) and its read-only view
//! - **`WebSocket` endpoint** (`/ws/events`) streaming session events
//!   (daily bonus, offline production, badge unlocks, remote apply)
//! - **Minimal HTML status page** (`GET /`)
//!
//! # Architecture
//!
//! Every handler forwards to the shared [`questline_sync::Session`]. The
//! session serializes mutations behind its own lock, so the server holds no
//! state of its own beyond the session handle.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
