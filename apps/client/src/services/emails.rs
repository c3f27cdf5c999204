use async_trait::async_trait;
use tracing::{debug, info};

use crate::api_client::ApiClient;
use crate::errors::ClientError;
use crate::models::email::{
    CompaniesResponse, EmailAction, EmailHistoryResponse, EmailRecord, EmailRequest,
    GeneratedEmailsResponse, SendEmailsResponse,
};
use crate::models::{Company, GeneratedEmail};
use crate::outbox::EmailSender;
use crate::services::require;

const GENERATE_PATH: &str = "/emails/generate";

fn request<'a>(action: EmailAction, resume_id: &'a str) -> EmailRequest<'a> {
    EmailRequest {
        action,
        resume_id,
        query: None,
        companies: None,
        emails: None,
    }
}

/// `find-companies`: targets matching the résumé and an optional free-text query.
pub async fn find_companies(
    client: &ApiClient,
    resume_id: &str,
    query: Option<&str>,
) -> Result<Vec<Company>, ClientError> {
    require("Resume id", resume_id)?;
    let body = EmailRequest {
        query,
        ..request(EmailAction::FindCompanies, resume_id)
    };
    let response: CompaniesResponse = client.post_json(GENERATE_PATH, &body).await?;
    info!("Found {} companies", response.companies.len());
    Ok(response.companies)
}

/// `generate-emails`: one draft per selected company.
pub async fn generate_emails(
    client: &ApiClient,
    resume_id: &str,
    companies: &[Company],
) -> Result<Vec<GeneratedEmail>, ClientError> {
    require("Resume id", resume_id)?;
    if companies.is_empty() {
        return Err(ClientError::Validation(
            "Please select at least one company".to_string(),
        ));
    }
    let body = EmailRequest {
        companies: Some(companies),
        ..request(EmailAction::GenerateEmails, resume_id)
    };
    let response: GeneratedEmailsResponse = client.post_json(GENERATE_PATH, &body).await?;
    info!("Generated {} emails", response.emails.len());
    Ok(response.emails)
}

/// `send-emails`: hands a batch to the backend mailer.
pub async fn send_emails(
    client: &ApiClient,
    resume_id: &str,
    emails: &[GeneratedEmail],
) -> Result<SendEmailsResponse, ClientError> {
    require("Resume id", resume_id)?;
    let body = EmailRequest {
        emails: Some(emails),
        ..request(EmailAction::SendEmails, resume_id)
    };
    let response: SendEmailsResponse = client.post_json(GENERATE_PATH, &body).await?;
    debug!("Backend accepted {} of {} emails", response.sent, emails.len());
    Ok(response)
}

/// `send-emails` for a single draft. A backend-reported failure becomes an error.
pub async fn send_one(
    client: &ApiClient,
    resume_id: &str,
    email: &GeneratedEmail,
) -> Result<(), ClientError> {
    let response = send_emails(client, resume_id, std::slice::from_ref(email)).await?;
    if response.failed > 0 {
        return Err(ClientError::Api {
            status: 502,
            message: response
                .message
                .unwrap_or_else(|| format!("Failed to send email to {}", email.recipient)),
        });
    }
    Ok(())
}

/// GET /emails/resume/:id: history of emails sent for a résumé.
pub async fn emails_for_resume(
    client: &ApiClient,
    resume_id: &str,
) -> Result<Vec<EmailRecord>, ClientError> {
    require("Resume id", resume_id)?;
    let response: EmailHistoryResponse = client
        .get_json(&format!("/emails/resume/{resume_id}"))
        .await?;
    Ok(response.emails)
}

/// Sends company outreach one email at a time through `send-emails`.
#[derive(Clone)]
pub struct CompanyEmailSender {
    client: ApiClient,
    resume_id: String,
}

impl CompanyEmailSender {
    pub fn new(client: ApiClient, resume_id: impl Into<String>) -> Self {
        Self {
            client,
            resume_id: resume_id.into(),
        }
    }
}

#[async_trait]
impl EmailSender for CompanyEmailSender {
    async fn send(&self, email: &GeneratedEmail) -> Result<(), ClientError> {
        send_one(&self.client, &self.resume_id, email).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::testing::{email_to, spawn_server};
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    async fn handler(Json(body): Json<Value>) -> Json<Value> {
        match body["action"].as_str() {
            Some("find-companies") => Json(json!({
                "companies": [{"name": "Acme", "industry": body["query"]}]
            })),
            Some("generate-emails") => Json(json!({
                "emails": body["companies"].as_array().unwrap().iter().map(|c| json!({
                    "recipient": format!("hr@{}.io", c["name"].as_str().unwrap().to_lowercase()),
                    "subject": "Hello",
                    "content": "Body",
                    "company": c["name"],
                })).collect::<Vec<_>>()
            })),
            Some("send-emails") => {
                let recipient = body["emails"][0]["recipient"].as_str().unwrap_or_default();
                if recipient.starts_with("bounce") {
                    Json(json!({"sent": 0, "failed": 1, "message": "Mailbox unavailable"}))
                } else {
                    Json(json!({"sent": 1, "failed": 0}))
                }
            }
            _ => Json(json!({})),
        }
    }

    async fn client() -> ApiClient {
        let base = spawn_server(Router::new().route("/emails/generate", post(handler))).await;
        ApiClient::new(base, Duration::from_secs(5), Arc::new(MemoryStorage::new())).unwrap()
    }

    #[tokio::test]
    async fn test_find_then_generate() {
        let client = client().await;
        let companies = find_companies(&client, "r1", Some("fintech")).await.unwrap();
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].industry.as_deref(), Some("fintech"));

        let emails = generate_emails(&client, "r1", &companies).await.unwrap();
        assert_eq!(emails[0].recipient, "hr@acme.io");
        assert_eq!(emails[0].company.as_deref(), Some("Acme"));
    }

    #[tokio::test]
    async fn test_generate_requires_selection() {
        let client = client().await;
        let err = generate_emails(&client, "r1", &[]).await.unwrap_err();
        assert_eq!(err.message(), "Please select at least one company");
    }

    #[tokio::test]
    async fn test_sender_maps_backend_failure() {
        let sender = CompanyEmailSender::new(client().await, "r1");
        assert!(sender.send(&email_to("hr@acme.io")).await.is_ok());

        let err = sender.send(&email_to("bounce@acme.io")).await.unwrap_err();
        assert_eq!(err.message(), "Mailbox unavailable");
    }
}
