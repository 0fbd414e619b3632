use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

use dearme_crypto::{keys::key_from_base64, sign::derive_key};
use dearme_letters::dispatcher::DEFAULT_MAX_ATTACHMENT_BYTES;
use dearme_mail::brevo::DEFAULT_SENDER_NAME;

const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "changeme",
];

#[derive(Debug, Clone)]
pub struct BrevoSettings {
    pub api_key: String,
    pub sender_email: String,
    pub sender_name: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub diary_key: [u8; 32],
    /// False when the diary key was derived from the JWT secret.
    pub diary_key_configured: bool,
    pub public_url: String,
    pub media_root: PathBuf,
    pub sweep_interval: Duration,
    pub sweep_include_drafts: bool,
    pub max_attachment_bytes: u64,
    pub brevo: Option<BrevoSettings>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = get("DEARME_JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("DEARME_JWT_SECRET is unset or still a placeholder. Set it in your .env file.");
        }

        let (diary_key, diary_key_configured) = match get("DEARME_DIARY_KEY") {
            Some(encoded) => (
                key_from_base64(encoded.trim()).context("DEARME_DIARY_KEY must be a base64 32-byte key")?,
                true,
            ),
            None => (derive_key(jwt_secret.as_bytes(), "dearme:diary"), false),
        };

        let port = var("DEARME_PORT", "3000")
            .parse()
            .context("DEARME_PORT must be a port number")?;
        let sweep_secs: u64 = var("DEARME_SWEEP_INTERVAL_SECS", "60")
            .parse()
            .context("DEARME_SWEEP_INTERVAL_SECS must be a number of seconds")?;
        if sweep_secs == 0 {
            bail!("DEARME_SWEEP_INTERVAL_SECS must be at least 1");
        }
        let max_attachment_bytes = match get("DEARME_MAX_ATTACHMENT_BYTES") {
            Some(v) => v.parse().context("DEARME_MAX_ATTACHMENT_BYTES must be a byte count")?,
            None => DEFAULT_MAX_ATTACHMENT_BYTES,
        };

        let brevo = match (get("BREVO_API_KEY"), get("BREVO_SENDER_EMAIL")) {
            (Some(api_key), Some(sender_email)) if !api_key.trim().is_empty() => {
                Some(BrevoSettings {
                    api_key,
                    sender_email,
                    sender_name: var("BREVO_SENDER_NAME", DEFAULT_SENDER_NAME),
                })
            }
            (Some(api_key), None) if !api_key.trim().is_empty() => {
                bail!("BREVO_SENDER_EMAIL is required when BREVO_API_KEY is set")
            }
            _ => None,
        };

        Ok(Self {
            host: var("DEARME_HOST", "0.0.0.0"),
            port,
            db_path: var("DEARME_DB_PATH", "dearme.db").into(),
            jwt_secret,
            diary_key,
            diary_key_configured,
            public_url: var("DEARME_PUBLIC_URL", "http://localhost:3000"),
            media_root: var("DEARME_MEDIA_ROOT", "./media").into(),
            sweep_interval: Duration::from_secs(sweep_secs),
            sweep_include_drafts: parse_flag(&var("DEARME_SWEEP_INCLUDE_DRAFTS", "false")),
            max_attachment_bytes,
            brevo,
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn placeholder_secret_is_refused() {
        assert!(config(&[]).is_err());
        assert!(config(&[("DEARME_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn defaults() {
        let c = config(&[("DEARME_JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(c.port, 3000);
        assert_eq!(c.sweep_interval, Duration::from_secs(60));
        assert!(!c.sweep_include_drafts);
        assert_eq!(c.max_attachment_bytes, 10 * 1024 * 1024);
        assert!(c.brevo.is_none());
        assert!(!c.diary_key_configured);
    }

    #[test]
    fn brevo_needs_a_sender() {
        assert!(config(&[("DEARME_JWT_SECRET", "s"), ("BREVO_API_KEY", "k")]).is_err());

        let c = config(&[
            ("DEARME_JWT_SECRET", "s"),
            ("BREVO_API_KEY", "k"),
            ("BREVO_SENDER_EMAIL", "noreply@dearme.app"),
            ("DEARME_SWEEP_INCLUDE_DRAFTS", "true"),
        ])
        .unwrap();
        assert_eq!(c.brevo.unwrap().sender_name, "DearMe App");
        assert!(c.sweep_include_drafts);
    }

    #[test]
    fn bad_diary_key_is_an_error() {
        assert!(config(&[("DEARME_JWT_SECRET", "s"), ("DEARME_DIARY_KEY", "short")]).is_err());
    }
}
