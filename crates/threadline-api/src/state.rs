use std::sync::Arc;

use tracing::error;

use threadline_db::Database;

use crate::action_log::ActionLogger;
use crate::error::ApiError;
use crate::session::SessionManager;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub logger: ActionLogger,
    pub sessions: SessionManager,
    /// Used by `/_synthetic/reset` when the caller gives no seed.
    pub default_seed: String,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, default_seed: impl Into<String>) -> AppState {
        Arc::new(Self {
            logger: ActionLogger::new(db.clone()),
            db,
            sessions: SessionManager::default(),
            default_seed: default_seed.into(),
        })
    }
}

/// Run blocking store work off the async runtime.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!("blocking task failed"))
    })?
}
