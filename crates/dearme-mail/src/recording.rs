use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use crate::gateway::{GatewayError, NotificationGateway, OutboundEmail};

/// Keeps every message in memory instead of sending it. Used in tests and
/// when no email provider is configured.
///
/// Failures can be queued with [`RecordingGateway::fail_next`]; each queued
/// failure is consumed by one `send` call. Failed messages are not recorded.
#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<OutboundEmail>>,
    failures: Mutex<VecDeque<String>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, reason: impl Into<String>) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push_back(reason.into());
        }
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or_default()
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn send(&self, email: &OutboundEmail) -> Result<(), GatewayError> {
        if email.to.is_empty() {
            return Err(GatewayError::NoRecipients);
        }

        let failure = self
            .failures
            .lock()
            .map_err(|e| GatewayError::Other(e.to_string()))?
            .pop_front();
        if let Some(reason) = failure {
            return Err(GatewayError::Other(reason));
        }

        info!(to = ?email.to, subject = %email.subject, "recorded outbound email");
        self.sent
            .lock()
            .map_err(|e| GatewayError::Other(e.to_string()))?
            .push(email.clone());
        Ok(())
    }
}
