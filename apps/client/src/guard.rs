//! Route guard: authentication first, then subscription validity.
//!
//! `decide` is the pure rule. `RouteGuard::evaluate` gathers its inputs
//! (fetching the user and payment status as needed) and `Navigator` is the
//! single place where a decision turns into a route change.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::api_client::ApiClient;
use crate::errors::ClientError;
use crate::models::{PaymentStatus, User};
use crate::services::{auth, payment, stats};
use crate::session::SessionStore;

pub const LOGIN_PATH: &str = "/login";
pub const PAYMENT_REQUIRED_PATH: &str = "/payment-required";

/// Route prefixes that never require a valid subscription.
const PAYMENT_EXEMPT_PREFIXES: &[&str] = &[
    "/payment-required",
    "/payment",
    "/pricing",
    "/login",
    "/signup",
    "/onboarding",
    "/verify-email",
    "/forgot-password",
    "/reset-password",
];

/// Routes reachable without signing in, besides the landing route `/`.
/// Payment and onboarding pages need a user and are not listed.
const AUTH_EXEMPT_PREFIXES: &[&str] = &[
    "/login",
    "/signup",
    "/pricing",
    "/verify-email",
    "/forgot-password",
    "/reset-password",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    CheckingAuth,
    CheckingPayment,
    Allowed,
    RedirectLogin,
    RedirectPayment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    RedirectTo { path: String, from: Option<String> },
}

impl GuardDecision {
    fn redirect(path: &str, from: &str) -> Self {
        GuardDecision::RedirectTo {
            path: path.to_string(),
            from: Some(from.to_string()),
        }
    }

    pub fn terminal_state(&self) -> GuardState {
        match self {
            GuardDecision::Allow => GuardState::Allowed,
            GuardDecision::RedirectTo { path, .. } if path == LOGIN_PATH => GuardState::RedirectLogin,
            GuardDecision::RedirectTo { .. } => GuardState::RedirectPayment,
        }
    }
}

/// Everything `decide` needs, gathered before render.
#[derive(Debug, Clone, Default)]
pub struct GuardInput {
    pub user: Option<User>,
    /// `None` when the check was skipped or failed; treated as invalid.
    pub payment: Option<PaymentStatus>,
}

pub fn is_payment_exempt(path: &str) -> bool {
    path == "/" || PAYMENT_EXEMPT_PREFIXES.iter().any(|p| path.starts_with(p))
}

pub fn is_auth_exempt(path: &str) -> bool {
    path == "/" || AUTH_EXEMPT_PREFIXES.iter().any(|p| path.starts_with(p))
}

pub fn decide(input: &GuardInput, path: &str, now: DateTime<Utc>) -> GuardDecision {
    if input.user.is_none() {
        if is_auth_exempt(path) {
            return GuardDecision::Allow;
        }
        return GuardDecision::redirect(LOGIN_PATH, path);
    }
    if is_payment_exempt(path) {
        return GuardDecision::Allow;
    }
    let paid = input
        .payment
        .as_ref()
        .is_some_and(|status| status.is_valid_at(now));
    if paid {
        GuardDecision::Allow
    } else {
        GuardDecision::redirect(PAYMENT_REQUIRED_PATH, path)
    }
}

/// Backend calls the guard makes. Implemented by `ApiClient`.
#[async_trait]
pub trait GuardApi: Send + Sync {
    async fn current_user(&self) -> Result<User, ClientError>;
    async fn payment_status(&self) -> Result<PaymentStatus, ClientError>;
}

#[async_trait]
impl GuardApi for ApiClient {
    async fn current_user(&self) -> Result<User, ClientError> {
        auth::me(self).await
    }

    async fn payment_status(&self) -> Result<PaymentStatus, ClientError> {
        payment::payment_status(self).await
    }
}

pub struct RouteGuard {
    api: Arc<dyn GuardApi>,
    session: SessionStore,
}

impl RouteGuard {
    pub fn new(api: Arc<dyn GuardApi>, session: SessionStore) -> Self {
        Self { api, session }
    }

    pub async fn evaluate(&self, path: &str) -> GuardDecision {
        self.evaluate_at(path, Utc::now()).await
    }

    pub async fn evaluate_at(&self, path: &str, now: DateTime<Utc>) -> GuardDecision {
        debug!(?path, state = ?GuardState::CheckingAuth);
        let mut snapshot = self.session.snapshot().await;

        if snapshot.user.is_none() && snapshot.has_token {
            match self.api.current_user().await {
                Ok(user) => {
                    self.session.update_user(Some(user.clone())).await;
                    snapshot.user = Some(user);
                }
                Err(e) => {
                    warn!("Could not load current user: {e}");
                    self.end_session().await;
                    snapshot.user = None;
                }
            }
        }

        let mut input = GuardInput {
            user: snapshot.user,
            payment: None,
        };

        if input.user.is_some() && !is_payment_exempt(path) {
            debug!(?path, state = ?GuardState::CheckingPayment);
            match self.api.payment_status().await {
                Ok(status) => input.payment = Some(status),
                Err(e) if e.status() == Some(401) => {
                    warn!("Payment check rejected the session; forcing login");
                    self.end_session().await;
                    return GuardDecision::redirect(LOGIN_PATH, path);
                }
                Err(e) => warn!("Payment check failed, treating as unpaid: {e}"),
            }
        }

        let decision = decide(&input, path, now);
        debug!(?path, state = ?decision.terminal_state());
        decision
    }

    async fn end_session(&self) {
        if let Err(e) = self.session.clear_session().await {
            warn!("Could not clear session: {e}");
        }
    }
}

/// Where navigation ended up, and where the user originally wanted to go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub path: String,
    pub from: Option<String>,
}

/// Applies guard decisions; the only place that changes the current route.
pub struct Navigator {
    client: ApiClient,
    guard: RouteGuard,
}

impl Navigator {
    pub fn new(client: ApiClient, guard: RouteGuard) -> Self {
        Self { client, guard }
    }

    pub async fn navigate(&self, path: &str) -> Navigation {
        // The guard's own requests run on the requested page.
        self.client.set_current_route(path);
        let navigation = match self.guard.evaluate(path).await {
            GuardDecision::Allow => Navigation {
                path: path.to_string(),
                from: None,
            },
            GuardDecision::RedirectTo { path: target, from } => {
                info!("Redirecting {} -> {}", path, target);
                Navigation { path: target, from }
            }
        };
        self.client.set_current_route(&navigation.path);
        stats::record_pageview(&self.client, &navigation.path).await;
        navigation
    }
}
