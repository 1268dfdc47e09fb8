//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use derecho_core::ports::{DatabaseService, VerificationMailer};
use derecho_core::rate_limit::RateLimiter;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub mailer: Arc<dyn VerificationMailer>,
    /// Throttles verification-email resends. Local to this process.
    pub resend_limiter: Arc<RateLimiter>,
}
