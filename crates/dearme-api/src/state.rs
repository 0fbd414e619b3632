use std::sync::Arc;

use crate::error::ApiError;

use dearme_db::Database;
use dearme_letters::{Dispatcher, LetterService};
use dearme_mail::NotificationGateway;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub letters: LetterService,
    pub dispatcher: Arc<Dispatcher>,
    pub gateway: Arc<dyn NotificationGateway>,
    pub jwt_secret: String,
    /// AES-256 key for diary text.
    pub diary_key: [u8; 32],
    /// Base URL used in emailed links, without a trailing slash.
    pub public_url: String,
}

impl AppStateInner {
    pub fn new(
        db: Arc<Database>,
        gateway: Arc<dyn NotificationGateway>,
        dispatcher: Arc<Dispatcher>,
        jwt_secret: String,
        diary_key: [u8; 32],
        public_url: &str,
    ) -> AppState {
        Arc::new(Self {
            letters: LetterService::new(db.clone()),
            db,
            dispatcher,
            gateway,
            jwt_secret,
            diary_key,
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn link(&self, path: &str) -> String {
        format!("{}{}", self.public_url, path)
    }
}

/// Run blocking work (database, password hashing) off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}
