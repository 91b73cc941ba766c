use std::sync::Arc;

use crate::db::DbPool;
use crate::ws::registry::Registry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// Live connection routing tables (direct addressing + scope member sets)
    pub registry: Arc<Registry>,
    /// Secret used to verify signed session cookies (shared with the web app)
    pub session_secret: Vec<u8>,
    /// Name of the session cookie
    pub session_cookie: String,
}
