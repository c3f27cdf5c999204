use serde::Deserialize;
use tracing::info;

use crate::api_client::{ApiClient, REFRESH_PATH};
use crate::errors::ClientError;
use crate::models::user::{
    AuthResponse, LoginRequest, MeResponse, MessageResponse, RegisterRequest, TokenResponse, User,
};
use crate::services::require;
use crate::storage::{Storage, VERIFICATION_EMAIL_KEY};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, serde::Serialize)]
struct EmailOnly<'a> {
    email: &'a str,
}

#[derive(Debug, serde::Serialize)]
struct PasswordOnly<'a> {
    password: &'a str,
}

/// POST /auth/login: stores the returned token.
pub async fn login(
    client: &ApiClient,
    email: &str,
    password: &str,
) -> Result<AuthResponse, ClientError> {
    require("Email", email)?;
    require("Password", password)?;

    let response: AuthResponse = client
        .post_json("/auth/login", &LoginRequest { email, password })
        .await?;
    client.set_token(&response.token)?;
    info!("Logged in as {}", response.user.email);
    Ok(response)
}

/// POST /auth/register: remembers the address for the verification page.
pub async fn register(
    client: &ApiClient,
    session_storage: &dyn Storage,
    name: &str,
    email: &str,
    password: &str,
) -> Result<RegisterResponse, ClientError> {
    require("Name", name)?;
    require("Email", email)?;
    require("Password", password)?;

    let response: RegisterResponse = client
        .post_json(
            "/auth/register",
            &RegisterRequest {
                name,
                email,
                password,
            },
        )
        .await?;
    if let Some(token) = &response.token {
        client.set_token(token)?;
    }
    session_storage.set(VERIFICATION_EMAIL_KEY, email)?;
    info!("Registered {}, awaiting verification", email);
    Ok(response)
}

/// Address captured at signup, shown on the "check your inbox" page.
pub fn pending_verification_email(session_storage: &dyn Storage) -> Option<String> {
    session_storage.get(VERIFICATION_EMAIL_KEY)
}

/// GET /auth/me
pub async fn me(client: &ApiClient) -> Result<User, ClientError> {
    let response: MeResponse = client.get_json("/auth/me").await?;
    Ok(response.into_user())
}

/// GET /auth/refresh-token: explicit refresh; stores the new token.
pub async fn refresh_token(client: &ApiClient) -> Result<String, ClientError> {
    let response: TokenResponse = client.get_json(REFRESH_PATH).await?;
    client.set_token(&response.token)?;
    Ok(response.token)
}

/// GET /auth/verify/:token: clears the pending verification address on success.
pub async fn verify_email(
    client: &ApiClient,
    session_storage: &dyn Storage,
    token: &str,
) -> Result<MessageResponse, ClientError> {
    require("Verification token", token)?;
    let response: MessageResponse = client.get_json(&format!("/auth/verify/{token}")).await?;
    session_storage.remove(VERIFICATION_EMAIL_KEY)?;
    Ok(response)
}

/// POST /auth/forgot-password
pub async fn forgot_password(client: &ApiClient, email: &str) -> Result<MessageResponse, ClientError> {
    require("Email", email)?;
    client
        .post_json("/auth/forgot-password", &EmailOnly { email })
        .await
}

/// POST /auth/reset-password/:token
pub async fn reset_password(
    client: &ApiClient,
    token: &str,
    password: &str,
) -> Result<MessageResponse, ClientError> {
    require("Reset token", token)?;
    require("Password", password)?;
    client
        .post_json(
            &format!("/auth/reset-password/{token}"),
            &PasswordOnly { password },
        )
        .await
}
