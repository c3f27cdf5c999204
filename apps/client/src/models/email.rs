use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A draft produced by the generation endpoint. Lives only as long as the wizard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedEmail {
    pub recipient: String,
    pub subject: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub name: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Discriminator for the multiplexed `POST /emails/generate` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmailAction {
    FindCompanies,
    GenerateEmails,
    SendEmails,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRequest<'a> {
    pub action: EmailAction,
    pub resume_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub companies: Option<&'a [Company]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emails: Option<&'a [GeneratedEmail]>,
}

#[derive(Debug, Deserialize)]
pub struct CompaniesResponse {
    #[serde(default)]
    pub companies: Vec<Company>,
}

#[derive(Debug, Deserialize)]
pub struct GeneratedEmailsResponse {
    #[serde(default)]
    pub emails: Vec<GeneratedEmail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailsResponse {
    #[serde(default)]
    pub sent: u32,
    #[serde(default)]
    pub failed: u32,
    #[serde(default)]
    pub message: Option<String>,
}

/// A previously sent email as listed by `GET /emails/resume/:id`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRecord {
    pub recipient: String,
    pub subject: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct EmailHistoryResponse {
    #[serde(default)]
    pub emails: Vec<EmailRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SendState {
    #[default]
    Idle,
    Sending,
    Sent,
    Failed,
}

/// Per-recipient delivery tracking. UI-only, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SendStatus {
    pub state: SendState,
    pub attempts: u32,
    pub error: Option<String>,
}

impl SendStatus {
    pub fn sending(attempts: u32) -> Self {
        Self {
            state: SendState::Sending,
            attempts,
            error: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.state == SendState::Failed
    }

    pub fn is_in_flight(&self) -> bool {
        self.state == SendState::Sending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_names() {
        let req = EmailRequest {
            action: EmailAction::FindCompanies,
            resume_id: "r1",
            query: Some("fintech"),
            companies: None,
            emails: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["action"], "find-companies");
        assert_eq!(json["resumeId"], "r1");
        assert!(json.get("emails").is_none());
    }

    #[test]
    fn test_send_status_default_is_idle() {
        let status = SendStatus::default();
        assert_eq!(status.state, SendState::Idle);
        assert_eq!(status.attempts, 0);
        assert!(!status.is_failed());
    }
}
