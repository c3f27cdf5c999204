use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    #[serde(default)]
    pub total_users: u64,
    #[serde(default)]
    pub emails_sent: u64,
    #[serde(default)]
    pub resumes_parsed: u64,
    #[serde(default)]
    pub page_views: u64,
}

#[derive(Debug, Serialize)]
pub struct PageView<'a> {
    pub path: &'a str,
}
