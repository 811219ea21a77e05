//! Shared application state for the progress API.

use std::sync::Arc;

use questline_sync::Session;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The learner session every handler operates on.
    pub session: Arc<Session>,
}

impl AppState {
    /// Wrap a running session.
    pub const fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}
