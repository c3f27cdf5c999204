use async_trait::async_trait;
use tracing::{debug, info};

use crate::api_client::{ApiClient, MultipartUpload};
use crate::errors::ClientError;
use crate::models::resume::{HasResumeResponse, ResumeResponse, ResumeUpdate};
use crate::models::ResumeHandle;
use crate::services::require;
use crate::upload::{ResumeApi, UploadRequest};

/// POST /resumes/upload (multipart: `file`, `name`, `email`, `parseMode`).
pub async fn upload_resume(
    client: &ApiClient,
    request: UploadRequest,
) -> Result<ResumeHandle, ClientError> {
    require("Name", &request.name)?;
    require("Email", &request.email)?;

    let upload = MultipartUpload {
        file_field: "file",
        fields: vec![
            ("name", request.name),
            ("email", request.email),
            ("parseMode", request.parse_mode.as_str().to_string()),
        ],
        file: request.file,
    };
    let response: ResumeResponse = client.post_multipart("/resumes/upload", upload).await?;
    let handle = response.into_handle();
    info!("Uploaded resume {} ({:?})", handle.id, handle.parse_status);
    Ok(handle)
}

/// GET /resumes/:id
pub async fn get_resume(client: &ApiClient, id: &str) -> Result<ResumeHandle, ClientError> {
    require("Resume id", id)?;
    let response: ResumeResponse = client.get_json(&format!("/resumes/{id}")).await?;
    Ok(response.into_handle())
}

/// PATCH /resumes/:id: edits reviewed skills/experience/projects.
pub async fn update_resume(
    client: &ApiClient,
    id: &str,
    update: &ResumeUpdate,
) -> Result<ResumeHandle, ClientError> {
    require("Resume id", id)?;
    let response: ResumeResponse = client.patch_json(&format!("/resumes/{id}"), update).await?;
    debug!("Updated resume {}", id);
    Ok(response.into_handle())
}

/// POST /resumes/:id/retry-parse: puts the résumé back into `pending`.
pub async fn retry_parse(client: &ApiClient, id: &str) -> Result<ResumeHandle, ClientError> {
    require("Resume id", id)?;
    let response: ResumeResponse = client
        .post_json(&format!("/resumes/{id}/retry-parse"), &serde_json::json!({}))
        .await?;
    info!("Re-queued parsing for resume {}", id);
    Ok(response.into_handle())
}

/// DELETE /resumes/:id/skills/:index
pub async fn delete_skill(
    client: &ApiClient,
    id: &str,
    index: usize,
) -> Result<ResumeHandle, ClientError> {
    require("Resume id", id)?;
    let response: ResumeResponse = client
        .delete_json(&format!("/resumes/{id}/skills/{index}"))
        .await?;
    Ok(response.into_handle())
}

/// GET /resumes/user/:id
pub async fn get_user_resume(client: &ApiClient, user_id: &str) -> Result<ResumeHandle, ClientError> {
    require("User id", user_id)?;
    let response: ResumeResponse = client.get_json(&format!("/resumes/user/{user_id}")).await?;
    Ok(response.into_handle())
}

/// GET /resumes/user/:id/has-resume
pub async fn has_resume(client: &ApiClient, user_id: &str) -> Result<bool, ClientError> {
    require("User id", user_id)?;
    let response: HasResumeResponse = client
        .get_json(&format!("/resumes/user/{user_id}/has-resume"))
        .await?;
    Ok(response.has_resume)
}

#[async_trait]
impl ResumeApi for ApiClient {
    async fn upload_resume(&self, request: UploadRequest) -> Result<ResumeHandle, ClientError> {
        upload_resume(self, request).await
    }

    async fn fetch_resume(&self, id: &str) -> Result<ResumeHandle, ClientError> {
        get_resume(self, id).await
    }
}
