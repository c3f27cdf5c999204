use async_trait::async_trait;
use tracing::info;

use crate::api_client::ApiClient;
use crate::errors::ClientError;
use crate::models::academic::{
    ExtraFindingsRequest, ExtraFindingsResponse, Faculty, FacultyFinding, FacultyResponse,
    FacultySearchRequest, PreviewEmailsRequest, RegenerateEmailRequest, RegeneratedEmailResponse,
    SendFacultyEmailsRequest,
};
use crate::models::email::{GeneratedEmailsResponse, SendEmailsResponse};
use crate::models::GeneratedEmail;
use crate::outbox::EmailSender;
use crate::services::require;

/// POST /academic/search-and-email
pub async fn search_and_email(
    client: &ApiClient,
    request: &FacultySearchRequest<'_>,
) -> Result<Vec<Faculty>, ClientError> {
    require("Resume id", request.resume_id)?;
    require("University", request.university)?;
    require("Department", request.department)?;
    let response: FacultyResponse = client
        .post_json("/academic/search-and-email", request)
        .await?;
    info!(
        "Found {} faculty at {}",
        response.faculty.len(),
        request.university
    );
    Ok(response.faculty)
}

/// POST /academic/extra-findings: publications and notes per faculty member.
pub async fn extra_findings(
    client: &ApiClient,
    resume_id: &str,
    faculty: &[Faculty],
) -> Result<Vec<FacultyFinding>, ClientError> {
    require("Resume id", resume_id)?;
    let response: ExtraFindingsResponse = client
        .post_json(
            "/academic/extra-findings",
            &ExtraFindingsRequest { resume_id, faculty },
        )
        .await?;
    Ok(response.findings)
}

/// POST /academic/generate-preview-emails
pub async fn generate_preview_emails(
    client: &ApiClient,
    resume_id: &str,
    faculty: &[Faculty],
) -> Result<Vec<GeneratedEmail>, ClientError> {
    require("Resume id", resume_id)?;
    if faculty.is_empty() {
        return Err(ClientError::Validation(
            "Please select at least one faculty member".to_string(),
        ));
    }
    let response: GeneratedEmailsResponse = client
        .post_json(
            "/academic/generate-preview-emails",
            &PreviewEmailsRequest { resume_id, faculty },
        )
        .await?;
    Ok(response.emails)
}

/// POST /academic/regenerate-email: a fresh draft for one faculty member.
pub async fn regenerate_email(
    client: &ApiClient,
    resume_id: &str,
    faculty: &Faculty,
    instructions: Option<&str>,
) -> Result<GeneratedEmail, ClientError> {
    require("Resume id", resume_id)?;
    let response: RegeneratedEmailResponse = client
        .post_json(
            "/academic/regenerate-email",
            &RegenerateEmailRequest {
                resume_id,
                faculty,
                instructions,
            },
        )
        .await?;
    Ok(response.email)
}

/// POST /academic/send-faculty-emails
pub async fn send_faculty_emails(
    client: &ApiClient,
    resume_id: &str,
    emails: &[GeneratedEmail],
) -> Result<SendEmailsResponse, ClientError> {
    require("Resume id", resume_id)?;
    client
        .post_json(
            "/academic/send-faculty-emails",
            &SendFacultyEmailsRequest { resume_id, emails },
        )
        .await
}

/// Faculty outreach counterpart of `CompanyEmailSender`.
#[derive(Clone)]
pub struct FacultyEmailSender {
    client: ApiClient,
    resume_id: String,
}

impl FacultyEmailSender {
    pub fn new(client: ApiClient, resume_id: impl Into<String>) -> Self {
        Self {
            client,
            resume_id: resume_id.into(),
        }
    }
}

#[async_trait]
impl EmailSender for FacultyEmailSender {
    async fn send(&self, email: &GeneratedEmail) -> Result<(), ClientError> {
        let response =
            send_faculty_emails(&self.client, &self.resume_id, std::slice::from_ref(email)).await?;
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
}
