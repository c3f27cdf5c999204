use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::errors::ClientError;
use crate::models::{ResumeHandle, User};
use crate::storage::{self, Storage, TOKEN_KEY};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub user: Option<User>,
    pub resume: Option<ResumeHandle>,
}

/// Point-in-time view handed to the route guard and the CLI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub resume: Option<ResumeHandle>,
    pub has_token: bool,
}

/// Application-state container shared by every flow.
/// Cloning is cheap; all clones see the same state. Last writer wins.
#[derive(Clone)]
pub struct SessionStore {
    state: Arc<RwLock<SessionState>>,
    storage: Arc<dyn Storage>,
}

impl SessionStore {
    /// Rebuilds the session from local storage. Only the résumé pointer is cached;
    /// the user is fetched again by the route guard.
    pub fn restore(storage: Arc<dyn Storage>) -> Self {
        let resume = storage::load_resume(storage.as_ref());
        debug!("Session restored (cached resume: {})", resume.is_some());
        Self {
            state: Arc::new(RwLock::new(SessionState { user: None, resume })),
            storage,
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        SessionSnapshot {
            user: state.user.clone(),
            resume: state.resume.clone(),
            has_token: self.has_token(),
        }
    }

    pub fn has_token(&self) -> bool {
        self.storage
            .get(TOKEN_KEY)
            .is_some_and(|token| !token.is_empty())
    }

    pub async fn current_user(&self) -> Option<User> {
        self.state.read().await.user.clone()
    }

    pub async fn resume(&self) -> Option<ResumeHandle> {
        self.state.read().await.resume.clone()
    }

    pub async fn update_user(&self, user: Option<User>) {
        self.state.write().await.user = user;
    }

    /// Replaces the résumé and mirrors it into local storage (`None` clears both).
    pub async fn update_resume(&self, resume: Option<ResumeHandle>) -> Result<(), ClientError> {
        self.update_resume_if(resume, || true).await.map(|_| ())
    }

    /// Replaces the résumé only if `commit` returns true. `commit` runs under the
    /// write lock, so readers queued behind it observe the new résumé.
    pub async fn update_resume_if(
        &self,
        resume: Option<ResumeHandle>,
        commit: impl FnOnce() -> bool,
    ) -> Result<bool, ClientError> {
        let mut state = self.state.write().await;
        if !commit() {
            return Ok(false);
        }
        match &resume {
            Some(handle) => storage::save_resume(self.storage.as_ref(), handle)?,
            None => storage::clear_resume(self.storage.as_ref())?,
        }
        state.resume = resume;
        Ok(true)
    }

    /// Drops the user, the résumé and the token.
    pub async fn clear_session(&self) -> Result<(), ClientError> {
        let mut state = self.state.write().await;
        *state = SessionState::default();
        storage::clear_resume(self.storage.as_ref())?;
        self.storage.remove(TOKEN_KEY)?;
        info!("Session cleared");
        Ok(())
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        self.clear_session().await
    }
}
