//! Session runtime for the Questline progress engine.
//!
//! # Modules
//!
//! - [`debounce`] -- Single-slot trailing debounce for remote writes.
//! - [`session`] -- [`Session`]: load, persist, sync, and the production and
//!   presence timers around one [`ProgressEngine`].
//!
//! [`Session`]: session::Session
//! [`ProgressEngine`]: questline_core::ProgressEngine

pub mod debounce;
pub mod session;

pub use debounce::Debouncer;
pub use session::{Session, SessionDeps, SessionError};
