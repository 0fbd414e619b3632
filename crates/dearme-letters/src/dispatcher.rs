//! Periodic delivery of due letters.
//!
//! Each sweep first locks scheduled letters whose edit window has closed,
//! then selects due letters and delivers them one by one. Before sending,
//! the sweep takes a short claim lease on the letter, timed from the moment
//! of the claim; a sweep that loses the claim skips it. Overlapping sweeps
//! therefore never send the same letter twice. Only the claim holder may
//! settle the letter afterwards. Failed deliveries release the claim and
//! keep the status, so the next sweep retries. A store error on one letter
//! is logged and the sweep moves on.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use dearme_db::Database;
use dearme_mail::{Attachment, NotificationGateway, OutboundEmail};
use dearme_types::models::{Letter, LetterStatus};

use crate::error::{DeliveryError, LetterError};
use crate::lifecycle::LetterService;
use crate::recipients::collect_recipients;

pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Also deliver due drafts.
    pub include_drafts: bool,
    /// How long a claim blocks other sweeps from the same letter.
    pub lease: chrono::Duration,
    pub max_attachment_bytes: u64,
    /// Stored attachment paths are resolved against this directory.
    pub media_root: PathBuf,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            include_drafts: false,
            lease: chrono::Duration::minutes(5),
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            media_root: PathBuf::from("media"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Scheduled letters whose edit window closed during this sweep.
    pub locked: usize,
    pub selected: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Claimed by another sweep or no longer due.
    pub skipped: usize,
}

impl SweepReport {
    pub fn is_idle(&self) -> bool {
        self.locked == 0 && self.selected == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(String),
    Skipped,
}

pub struct Dispatcher {
    db: Arc<Database>,
    gateway: Arc<dyn NotificationGateway>,
    letters: LetterService,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        db: Arc<Database>,
        gateway: Arc<dyn NotificationGateway>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            letters: LetterService::new(db.clone()),
            db,
            gateway,
            config,
        }
    }

    fn due_statuses(&self) -> Vec<LetterStatus> {
        let mut statuses = vec![LetterStatus::Scheduled, LetterStatus::Locked];
        if self.config.include_drafts {
            statuses.insert(0, LetterStatus::Draft);
        }
        statuses
    }

    /// One pass over the store. Safe to run concurrently with itself.
    ///
    /// `now` decides which windows close and which letters are due. Claims
    /// are always timed from the wall clock when they are taken.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, LetterError> {
        let letters = self.letters.clone();
        let mut report = SweepReport {
            locked: blocking(move || letters.lock_expired(now)).await?,
            ..SweepReport::default()
        };

        let statuses = self.due_statuses();
        let db = self.db.clone();
        let selection = statuses.clone();
        let due = blocking(move || Ok(db.due_letters(&selection, now)?)).await?;
        report.selected = due.len();

        for letter in due {
            match self.deliver(&letter, &statuses).await {
                Ok(DeliveryOutcome::Delivered) => report.delivered += 1,
                Ok(DeliveryOutcome::Failed(_)) => report.failed += 1,
                Ok(DeliveryOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!(letter_id = %letter.id, error = %e, "delivery aborted, moving on");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Manual "send now" by the letter's sender. Ignores the delivery date
    /// but goes through the same claim as the sweep.
    pub async fn deliver_now(
        &self,
        sender_id: Uuid,
        id: Uuid,
    ) -> Result<DeliveryOutcome, LetterError> {
        let letters = self.letters.clone();
        let letter = blocking(move || letters.get(sender_id, id)).await?;
        if letter.status == LetterStatus::Delivered {
            return Err(LetterError::AlreadyDelivered);
        }

        let statuses = [
            LetterStatus::Draft,
            LetterStatus::Scheduled,
            LetterStatus::Locked,
        ];
        self.deliver(&letter, &statuses).await
    }

    async fn deliver(
        &self,
        letter: &Letter,
        statuses: &[LetterStatus],
    ) -> Result<DeliveryOutcome, LetterError> {
        let id = letter.id;
        let db = self.db.clone();
        let claimable = statuses.to_vec();
        let lease = self.config.lease;
        let claim = blocking(move || {
            let claimed_at = Utc::now();
            Ok(db.claim_letter(id, &claimable, claimed_at, claimed_at + lease)?)
        })
        .await?;
        let Some(claim) = claim else {
            debug!(letter_id = %id, "letter claimed elsewhere, skipping");
            return Ok(DeliveryOutcome::Skipped);
        };

        let db = self.db.clone();
        match self.send(letter).await {
            Ok(()) => {
                let recorded = blocking(move || Ok(db.mark_delivered(id, claim, Utc::now())?)).await?;
                if recorded {
                    info!(letter_id = %id, "letter delivered");
                } else {
                    warn!(letter_id = %id, "letter sent after its claim was lost");
                }
                Ok(DeliveryOutcome::Delivered)
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(letter_id = %id, error = %reason, "letter delivery failed");
                let error = reason.clone();
                blocking(move || Ok(db.record_delivery_failure(id, claim, &error)?)).await?;
                Ok(DeliveryOutcome::Failed(reason))
            }
        }
    }

    async fn send(&self, letter: &Letter) -> Result<(), DeliveryError> {
        let db = self.db.clone();
        let receiver_ids = letter.receiver_ids.clone();
        let internal = tokio::task::spawn_blocking(move || db.get_user_emails(&receiver_ids)).await??;

        let recipients = collect_recipients(&internal, &letter.external_emails);
        if recipients.is_empty() {
            return Err(DeliveryError::NoRecipients);
        }

        let mut email = OutboundEmail::new(recipients, letter.subject.clone(), letter.body.clone());
        if let Some(path) = &letter.attachment {
            email = email.with_attachment(self.load_attachment(path).await?);
        }

        self.gateway.send(&email).await?;
        Ok(())
    }

    /// Read a stored attachment. The path must resolve, symlinks included,
    /// to a file inside the media root.
    async fn load_attachment(&self, stored: &str) -> Result<Attachment, DeliveryError> {
        let unreadable = |source: std::io::Error| DeliveryError::AttachmentUnreadable {
            path: stored.to_string(),
            source,
        };

        let root = tokio::fs::canonicalize(&self.config.media_root)
            .await
            .map_err(unreadable)?;
        let path = tokio::fs::canonicalize(root.join(stored))
            .await
            .map_err(unreadable)?;
        if !path.starts_with(&root) {
            return Err(DeliveryError::AttachmentOutsideMedia {
                path: stored.to_string(),
            });
        }

        let size = tokio::fs::metadata(&path).await.map_err(unreadable)?.len();
        if size > self.config.max_attachment_bytes {
            return Err(DeliveryError::AttachmentTooLarge {
                size,
                max: self.config.max_attachment_bytes,
            });
        }
        let bytes = tokio::fs::read(&path).await.map_err(unreadable)?;

        Ok(Attachment {
            name: file_name(&path),
            content_base64: B64.encode(bytes),
        })
    }
}

/// Run store work off the async workers.
async fn blocking<F, T>(f: F) -> Result<T, LetterError>
where
    F: FnOnce() -> Result<T, LetterError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string())
}

/// Background task that sweeps on a fixed interval. Errors are logged and
/// the loop keeps going.
pub async fn run_sweep_loop(dispatcher: Arc<Dispatcher>, interval: Duration) {
    let mut interval = tokio::time::interval(interval);

    loop {
        interval.tick().await;

        match dispatcher.sweep(Utc::now()).await {
            Ok(report) if report.is_idle() => {}
            Ok(report) => {
                info!(
                    locked = report.locked,
                    selected = report.selected,
                    delivered = report.delivered,
                    failed = report.failed,
                    skipped = report.skipped,
                    "Sweep finished"
                );
            }
            Err(e) => {
                warn!("Sweep error: {}", e);
            }
        }
    }
}
