use std::sync::Arc;

use tracing::error;

use cardsurvey_db::Database;
use cardsurvey_stats::UnknownOptionPolicy;

use crate::error::ApiError;
use crate::sessions::SessionHub;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub unknown_option: UnknownOptionPolicy,
    pub sessions: SessionHub,
}

impl AppStateInner {
    pub fn new(
        db: Database,
        jwt_secret: String,
        token_ttl: chrono::Duration,
        unknown_option: UnknownOptionPolicy,
    ) -> AppState {
        Arc::new(Self {
            db,
            jwt_secret,
            token_ttl,
            unknown_option,
            sessions: SessionHub::new(),
        })
    }
}

/// Run a blocking DB call off the async runtime.
pub async fn blocking<F, T, E>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed"))
        })?
        .map_err(Into::into)
}
