use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Outcome of an accepted send. The provider id is kept for log correlation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailReceipt {
    pub id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("email send failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("email API error ({status}): {body}")]
    Api { status: u16, body: String },
}

/// Transactional email dispatch.
#[async_trait]
pub trait EmailDispatch: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<EmailReceipt, EmailError>;
}

#[derive(Clone)]
pub struct EmailClient {
    client: Client,
    api_url: String,
    api_key: String,
    from_email: String,
    from_name: String,
}

#[derive(Debug, Serialize)]
struct ResendRequest {
    from: String,
    to: Vec<String>,
    subject: String,
    html: String,
}

#[derive(Debug, Deserialize)]
struct ResendResponse {
    id: Option<String>,
}

impl EmailClient {
    pub fn new(api_key: &str, from_email: &str, from_name: &str) -> Self {
        Self {
            client: Client::new(),
            api_url: RESEND_API_URL.to_string(),
            api_key: api_key.to_string(),
            from_email: from_email.to_string(),
            from_name: from_name.to_string(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    fn sender(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_email)
    }
}

#[async_trait]
impl EmailDispatch for EmailClient {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<EmailReceipt, EmailError> {
        let request = ResendRequest {
            from: self.sender(),
            to: vec![to.to_string()],
            subject: subject.to_string(),
            html: html.to_string(),
        };

        let response = self.client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmailError::Api { status: status.as_u16(), body });
        }

        // A 2xx with an unreadable body still means the message was accepted.
        let id = response
            .json::<ResendResponse>()
            .await
            .ok()
            .and_then(|r| r.id);

        tracing::debug!(to = %to, subject = %subject, email_id = ?id, "email sent");
        Ok(EmailReceipt { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_combines_name_and_address() {
        let client = EmailClient::new("re_test", "alerts@pulse.dev", "Pulse");
        assert_eq!(client.sender(), "Pulse <alerts@pulse.dev>");
    }

    #[test]
    fn request_serializes_like_resend_expects() {
        let req = ResendRequest {
            from: "Pulse <alerts@pulse.dev>".into(),
            to: vec!["owner@example.com".into()],
            subject: "hi".into(),
            html: "<p>hi</p>".into(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["to"][0], "owner@example.com");
        assert_eq!(json["html"], "<p>hi</p>");
    }

    #[tokio::test]
    async fn unreachable_api_is_a_transport_error() {
        let client = EmailClient::new("re_test", "alerts@pulse.dev", "Pulse")
            .with_api_url("http://127.0.0.1:1/emails");
        let err = client.send("owner@example.com", "s", "<p>b</p>").await.unwrap_err();
        assert!(matches!(err, EmailError::Transport(_)));
    }
}
