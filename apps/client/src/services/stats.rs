use tracing::debug;

use crate::api_client::ApiClient;
use crate::errors::ClientError;
use crate::models::stats::{PageView, Stats};

/// GET /stats
pub async fn get_stats(client: &ApiClient) -> Result<Stats, ClientError> {
    client.get_json("/stats").await
}

/// POST /stats/pageview. Failures are logged only; page views never block navigation.
pub async fn record_pageview(client: &ApiClient, path: &str) {
    let result: Result<serde_json::Value, ClientError> =
        client.post_json("/stats/pageview", &PageView { path }).await;
    if let Err(e) = result {
        debug!("Page view for {} not recorded: {e}", path);
    }
}
