//! API client: the single point of entry for every REST call the app makes.
//!
//! Attaches the bearer token from local storage, and on a 401 exchanges the
//! token once via `/auth/refresh-token` before retrying the original request
//! exactly once. Service modules build on the JSON helpers below.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ClientError;
use crate::storage::{Storage, TOKEN_KEY};
use crate::upload::UploadFile;

pub const REFRESH_PATH: &str = "/auth/refresh-token";

/// Auth endpoints whose 401 means "bad credentials", never "stale token".
const NO_REFRESH_PATHS: &[&str] = &["/auth/login", "/auth/register", REFRESH_PATH];

/// Pages on which a 401 is expected and must not trigger a refresh.
const PUBLIC_ROUTES: &[&str] = &["/", "/login", "/signup"];

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// Multipart upload rebuilt on every attempt, since a `Form` is consumed by sending.
#[derive(Debug, Clone)]
pub struct MultipartUpload {
    pub file_field: &'static str,
    pub file: UploadFile,
    pub fields: Vec<(&'static str, String)>,
}

impl MultipartUpload {
    fn to_form(&self) -> Result<Form, ClientError> {
        let part = Part::bytes(self.file.bytes.to_vec())
            .file_name(self.file.name.clone())
            .mime_str(&self.file.content_type)?;
        let form = self
            .fields
            .iter()
            .fold(Form::new(), |form, (name, value)| form.text(*name, value.clone()));
        Ok(form.part(self.file_field, part))
    }
}

#[derive(Debug, Clone)]
enum Body {
    Empty,
    Json(serde_json::Value),
    Multipart(MultipartUpload),
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    storage: Arc<dyn Storage>,
    current_route: Arc<Mutex<String>>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        storage: Arc<dyn Storage>,
    ) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            storage,
            current_route: Arc::new(Mutex::new("/".to_string())),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn token(&self) -> Option<String> {
        self.storage.get(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    pub fn set_token(&self, token: &str) -> Result<(), ClientError> {
        self.storage.set(TOKEN_KEY, token)
    }

    pub fn clear_token(&self) -> Result<(), ClientError> {
        self.storage.remove(TOKEN_KEY)
    }

    /// Records the route the user is on; public pages suppress token refresh.
    pub fn set_current_route(&self, path: &str) {
        if let Ok(mut route) = self.current_route.lock() {
            *route = path.to_string();
        }
    }

    fn current_route(&self) -> String {
        self.current_route
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|_| "/".to_string())
    }

    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, ClientError> {
        let response = self.execute(Method::GET, path, &Body::Empty).await?;
        decode(response).await
    }

    pub async fn post_json<T, R>(&self, path: &str, payload: &T) -> Result<R, ClientError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = Body::Json(serde_json::to_value(payload)?);
        let response = self.execute(Method::POST, path, &body).await?;
        decode(response).await
    }

    pub async fn patch_json<T, R>(&self, path: &str, payload: &T) -> Result<R, ClientError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = Body::Json(serde_json::to_value(payload)?);
        let response = self.execute(Method::PATCH, path, &body).await?;
        decode(response).await
    }

    pub async fn delete_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, ClientError> {
        let response = self.execute(Method::DELETE, path, &Body::Empty).await?;
        decode(response).await
    }

    pub async fn post_multipart<R: DeserializeOwned>(
        &self,
        path: &str,
        upload: MultipartUpload,
    ) -> Result<R, ClientError> {
        let response = self
            .execute(Method::POST, path, &Body::Multipart(upload))
            .await?;
        decode(response).await
    }

    /// Sends the request; on a refreshable 401, refreshes once and retries once.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: &Body,
    ) -> Result<Response, ClientError> {
        let response = self.dispatch(method.clone(), path, body).await?;

        if response.status() != StatusCode::UNAUTHORIZED || !self.should_refresh(path) {
            return Ok(response);
        }

        debug!("{} {} returned 401, attempting token refresh", method, path);
        match self.refresh().await {
            Ok(token) => {
                self.set_token(&token)?;
                info!("Token refreshed, retrying {} {}", method, path);
                self.dispatch(method, path, body).await
            }
            Err(e) => {
                warn!("Token refresh failed: {e}");
                self.clear_token()?;
                Err(ClientError::SessionExpired)
            }
        }
    }

    fn should_refresh(&self, path: &str) -> bool {
        if NO_REFRESH_PATHS.iter().any(|p| path.starts_with(p)) {
            return false;
        }
        let route = self.current_route();
        !PUBLIC_ROUTES.contains(&route.as_str())
    }

    async fn refresh(&self) -> Result<String, ClientError> {
        let response = self.dispatch(Method::GET, REFRESH_PATH, &Body::Empty).await?;
        let refreshed: RefreshResponse = decode(response).await?;
        Ok(refreshed.token)
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: &Body,
    ) -> Result<Response, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method, &url);
        if let Some(token) = self.token() {
            request = request.bearer_auth(token);
        }
        request = match body {
            Body::Empty => request,
            Body::Json(value) => request.json(value),
            Body::Multipart(upload) => request.multipart(upload.to_form()?),
        };
        Ok(request.send().await?)
    }
}

/// Turns a response into `R`, mapping non-2xx statuses onto the error taxonomy.
async fn decode<R: DeserializeOwned>(response: Response) -> Result<R, ClientError> {
    let status = response.status();
    let text = response.text().await?;

    if status.is_success() {
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        return Ok(serde_json::from_str(text)?);
    }

    let message = extract_message(&text);
    warn!(
        "API returned {}: {}",
        status,
        message.as_deref().unwrap_or("<no message>")
    );
    match status.as_u16() {
        401 => Err(ClientError::Unauthorized { message }),
        code @ (402 | 403) => Err(ClientError::PaymentRequired {
            status: code,
            message,
        }),
        code => Err(ClientError::Api {
            status: code,
            message: message.unwrap_or_else(|| format!("Request failed with status {code}")),
        }),
    }
}

/// Pulls the human-readable message out of an error body (`message`, then `error`).
fn extract_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .message
        .or(parsed.error)
        .filter(|m| !m.trim().is_empty())
}
