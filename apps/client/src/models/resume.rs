use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParseStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl ParseStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ParseStatus::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseError {
    pub message: String,
}

/// Server-side résumé record as seen by the client.
/// Cached in local storage under `resume`; the server stays the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeHandle {
    #[serde(alias = "_id")]
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub parse_status: ParseStatus,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience: Vec<String>,
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<ParseError>,
}

impl ResumeHandle {
    /// Copies the parse results of a fresher fetch into this handle.
    pub fn merge(&mut self, fresh: ResumeHandle) {
        self.parse_status = fresh.parse_status;
        self.skills = fresh.skills;
        self.experience = fresh.experience;
        self.projects = fresh.projects;
        self.parse_error = fresh.parse_error;
        if !fresh.url.is_empty() {
            self.url = fresh.url;
        }
    }

    pub fn parse_error_message(&self) -> String {
        self.parse_error
            .as_ref()
            .map(|e| e.message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "Resume parsing failed".to_string())
    }
}

/// `/resumes/*` responses either wrap the record or return it directly.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ResumeResponse {
    Wrapped { resume: ResumeHandle },
    Bare(ResumeHandle),
}

impl ResumeResponse {
    pub fn into_handle(self) -> ResumeHandle {
        match self {
            ResumeResponse::Wrapped { resume } | ResumeResponse::Bare(resume) => resume,
        }
    }
}

/// Body of `PATCH /resumes/:id`. Absent fields are left untouched server-side.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResumeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    Ai,
    Basic,
}

impl ParseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseMode::Ai => "ai",
            ParseMode::Basic => "basic",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HasResumeResponse {
    pub has_resume: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> ResumeHandle {
        ResumeHandle {
            id: "r1".to_string(),
            url: "https://files.example.com/r1.pdf".to_string(),
            parse_status: ParseStatus::Pending,
            skills: vec![],
            experience: vec![],
            projects: vec![],
            parse_error: None,
        }
    }

    #[test]
    fn test_merge_takes_parse_results() {
        let mut handle = pending();
        let mut fresh = pending();
        fresh.parse_status = ParseStatus::Completed;
        fresh.skills = vec!["Rust".to_string(), "SQL".to_string()];
        fresh.url = String::new();

        handle.merge(fresh);
        assert_eq!(handle.parse_status, ParseStatus::Completed);
        assert_eq!(handle.skills.len(), 2);
        assert_eq!(handle.url, "https://files.example.com/r1.pdf");
    }

    #[test]
    fn test_parse_error_message_defaults() {
        let mut handle = pending();
        assert_eq!(handle.parse_error_message(), "Resume parsing failed");
        handle.parse_error = Some(ParseError {
            message: "Unreadable PDF".to_string(),
        });
        assert_eq!(handle.parse_error_message(), "Unreadable PDF");
    }

    #[test]
    fn test_camel_case_wire_format() {
        let json = serde_json::to_value(pending()).unwrap();
        assert_eq!(json["parseStatus"], "pending");
        assert!(json.get("parseError").is_none());
    }

    #[test]
    fn test_resume_response_wrapped() {
        let resp: ResumeResponse = serde_json::from_str(
            r#"{"resume":{"_id":"r9","url":"u","parseStatus":"completed","skills":["Go"]}}"#,
        )
        .unwrap();
        let handle = resp.into_handle();
        assert_eq!(handle.id, "r9");
        assert!(handle.parse_status.is_terminal());
    }
}
