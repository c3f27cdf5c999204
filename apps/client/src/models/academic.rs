use serde::{Deserialize, Serialize};

use crate::models::email::GeneratedEmail;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Faculty {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub university: Option<String>,
    #[serde(default)]
    pub research_interests: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacultySearchRequest<'a> {
    pub resume_id: &'a str,
    pub university: &'a str,
    pub department: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub research_area: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct FacultyResponse {
    #[serde(default)]
    pub faculty: Vec<Faculty>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraFindingsRequest<'a> {
    pub resume_id: &'a str,
    pub faculty: &'a [Faculty],
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacultyFinding {
    pub faculty_email: String,
    #[serde(default)]
    pub publications: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExtraFindingsResponse {
    #[serde(default)]
    pub findings: Vec<FacultyFinding>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewEmailsRequest<'a> {
    pub resume_id: &'a str,
    pub faculty: &'a [Faculty],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateEmailRequest<'a> {
    pub resume_id: &'a str,
    pub faculty: &'a Faculty,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct RegeneratedEmailResponse {
    pub email: GeneratedEmail,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendFacultyEmailsRequest<'a> {
    pub resume_id: &'a str,
    pub emails: &'a [GeneratedEmail],
}
