//! Brevo transactional email adapter (`POST /v3/smtp/email`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use crate::gateway::{GatewayError, NotificationGateway, OutboundEmail};

pub const DEFAULT_API_URL: &str = "https://api.brevo.com/v3/smtp/email";
pub const DEFAULT_SENDER_NAME: &str = "DearMe App";

#[derive(Debug, Clone)]
pub struct BrevoConfig {
    pub api_key: String,
    pub sender_email: String,
    pub sender_name: String,
    pub api_url: String,
    pub timeout: Duration,
}

impl BrevoConfig {
    pub fn new(api_key: impl Into<String>, sender_email: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            sender_email: sender_email.into(),
            sender_name: DEFAULT_SENDER_NAME.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct BrevoGateway {
    config: BrevoConfig,
    client: Client,
}

impl BrevoGateway {
    pub fn new(config: BrevoConfig) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }
}

#[derive(Serialize)]
struct Contact<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
struct BrevoAttachment<'a> {
    content: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    sender: Contact<'a>,
    to: Vec<Contact<'a>>,
    subject: &'a str,
    html_content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachment: Option<Vec<BrevoAttachment<'a>>>,
}

fn build_request<'a>(config: &'a BrevoConfig, email: &'a OutboundEmail) -> SendRequest<'a> {
    SendRequest {
        sender: Contact {
            email: &config.sender_email,
            name: Some(&config.sender_name),
        },
        to: email
            .to
            .iter()
            .map(|addr| Contact {
                email: addr,
                name: None,
            })
            .collect(),
        subject: &email.subject,
        html_content: &email.html_body,
        attachment: email.attachment.as_ref().map(|a| {
            vec![BrevoAttachment {
                content: &a.content_base64,
                name: &a.name,
            }]
        }),
    }
}

#[async_trait]
impl NotificationGateway for BrevoGateway {
    async fn send(&self, email: &OutboundEmail) -> Result<(), GatewayError> {
        if email.to.is_empty() {
            return Err(GatewayError::NoRecipients);
        }

        debug!(recipients = email.to.len(), subject = %email.subject, "sending via Brevo");

        let response = self
            .client
            .post(&self.config.api_url)
            .header("api-key", &self.config.api_key)
            .header("accept", "application/json")
            .json(&build_request(&self.config, email))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Brevo rate limit hit");
            return Err(GatewayError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Attachment;

    #[test]
    fn request_body_matches_brevo_shape() {
        let config = BrevoConfig::new("key", "noreply@dearme.app");
        let email = OutboundEmail::new(
            vec!["a@x.com".into(), "b@y.com".into()],
            "Hello",
            "<p>Hi</p>",
        )
        .with_attachment(Attachment {
            name: "photo.jpg".into(),
            content_base64: "AAEC".into(),
        });

        let body = serde_json::to_value(build_request(&config, &email)).unwrap();
        assert_eq!(body["sender"]["name"], "DearMe App");
        assert_eq!(body["sender"]["email"], "noreply@dearme.app");
        assert_eq!(body["to"][1]["email"], "b@y.com");
        assert!(body["to"][0].get("name").is_none());
        assert_eq!(body["htmlContent"], "<p>Hi</p>");
        assert_eq!(body["attachment"][0]["content"], "AAEC");
        assert_eq!(body["attachment"][0]["name"], "photo.jpg");
    }

    #[test]
    fn attachment_is_omitted_when_absent() {
        let config = BrevoConfig::new("key", "noreply@dearme.app");
        let email = OutboundEmail::new(vec!["a@x.com".into()], "s", "b");
        let body = serde_json::to_value(build_request(&config, &email)).unwrap();
        assert!(body.get("attachment").is_none());
    }

    #[tokio::test]
    async fn empty_recipient_list_is_refused_before_any_request() {
        let mut config = BrevoConfig::new("key", "noreply@dearme.app");
        config.api_url = "http://127.0.0.1:9/unreachable".into();
        let gateway = BrevoGateway::new(config).unwrap();

        let err = gateway
            .send(&OutboundEmail::new(vec![], "s", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NoRecipients));
    }
}
