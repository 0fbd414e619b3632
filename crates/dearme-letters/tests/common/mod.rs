#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dearme_db::Database;
use dearme_mail::{GatewayError, NotificationGateway, OutboundEmail, RecordingGateway};
use dearme_db::models::NewUser;
use dearme_types::api::LetterDraft;
use dearme_types::models::User;

pub fn db() -> Arc<Database> {
    Arc::new(Database::open_in_memory().unwrap())
}

pub fn user(db: &Database, name: &str) -> User {
    db.create_user(&NewUser {
        username: name,
        email: &format!("{name}@example.com"),
        password_hash: "hash",
        first_name: "",
        last_name: "",
    })
    .unwrap()
}

pub fn draft(delivery_date: DateTime<Utc>) -> LetterDraft {
    LetterDraft {
        subject: "To future me".into(),
        body: "<p>Remember the lake.</p>".into(),
        delivery_date,
        attachment: None,
        receivers: vec![],
        external_emails: "future@example.com".into(),
        grace_period_hours: 48,
        memory_ids: vec![],
        diary_ids: vec![],
        schedule: false,
    }
}

pub fn past() -> DateTime<Utc> {
    Utc::now() - Duration::minutes(1)
}

/// Records like [`RecordingGateway`] but sleeps before every send, so
/// concurrent sweeps actually interleave at the gateway call.
pub struct SlowGateway {
    inner: RecordingGateway,
    delay: std::time::Duration,
}

impl SlowGateway {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            inner: RecordingGateway::new(),
            delay: std::time::Duration::from_millis(delay_ms),
        }
    }

    pub fn sent_count(&self) -> usize {
        self.inner.sent_count()
    }
}

#[async_trait]
impl NotificationGateway for SlowGateway {
    async fn send(&self, email: &OutboundEmail) -> Result<(), GatewayError> {
        tokio::time::sleep(self.delay).await;
        self.inner.send(email).await
    }
}
