use std::sync::Arc;

use tracing::error;

use nook_auth::AdminKeys;
use nook_db::Database;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub admin_keys: AdminKeys,
    /// Acceptance window for signed visibility timestamps, in seconds.
    /// Zero disables the freshness check.
    pub sig_max_age_secs: u64,
}

pub async fn health() -> &'static str {
    "ok"
}

/// Run a blocking store call off the async runtime.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal("blocking task failed".into())
    })?
}
