//! Résumé upload and parse polling.
//!
//! Upload validates locally, then posts the file. A `pending` result starts a
//! poll loop: fetch every `interval`, stop on `completed` / `failed`, or give up
//! once `timeout` has elapsed. One poll per uploader; a new one cancels the old.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, timeout_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::errors::ClientError;
use crate::models::resume::{ParseError, ParseMode};
use crate::models::{ParseStatus, ResumeHandle};
use crate::session::SessionStore;

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const PDF_MIME: &str = "application/pdf";

#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl UploadFile {
    pub async fn from_path(path: &Path) -> Result<Self, ClientError> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "resume".to_string());
        Ok(Self {
            content_type: content_type_for(&name).to_string(),
            name,
            bytes: Bytes::from(bytes),
        })
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    let lower = file_name.to_lowercase();
    if lower.ends_with(".pdf") {
        PDF_MIME
    } else if lower.ends_with(".docx") {
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    } else if lower.ends_with(".doc") {
        "application/msword"
    } else {
        "application/octet-stream"
    }
}

/// Rejects anything that is not a PDF of at most 5 MB. Runs before any request.
pub fn validate_upload(file: &UploadFile) -> Result<(), ClientError> {
    if file.content_type != PDF_MIME {
        return Err(ClientError::Validation("Only PDF files are allowed".to_string()));
    }
    if file.size() > MAX_UPLOAD_BYTES {
        return Err(ClientError::Validation(
            "File size must be less than 5MB".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file: UploadFile,
    pub name: String,
    pub email: String,
    pub parse_mode: ParseMode,
}

/// Résumé endpoints the upload flow depends on. Implemented by `ApiClient`.
#[async_trait]
pub trait ResumeApi: Send + Sync {
    async fn upload_resume(&self, request: UploadRequest) -> Result<ResumeHandle, ClientError>;
    async fn fetch_resume(&self, id: &str) -> Result<ResumeHandle, ClientError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    Idle,
    Polling,
    Done(ResumeHandle),
    Failed(String),
    TimedOut,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PollState::Done(_) | PollState::Failed(_) | PollState::TimedOut
        )
    }
}

/// Moves the state forward. Terminal states are final and only reachable from
/// `Polling`, so an outcome arriving after cancellation is refused.
fn transition(state: &watch::Sender<PollState>, next: PollState) -> bool {
    state.send_if_modified(|current| {
        if current.is_terminal() || (next.is_terminal() && *current != PollState::Polling) {
            return false;
        }
        *current = next;
        true
    })
}

/// Fetches `handle` every `policy.interval` until parsing settles or the budget runs out.
/// Per-tick fetch errors are logged and retried on the next tick.
pub async fn poll_until_parsed(
    api: &dyn ResumeApi,
    mut handle: ResumeHandle,
    policy: PollPolicy,
) -> Result<ResumeHandle, ClientError> {
    let start = Instant::now();
    let deadline = start + policy.timeout;
    let mut ticker = interval_at(start + policy.interval, policy.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = sleep_until(deadline) => {
                warn!("Resume {} still pending after {:?}", handle.id, policy.timeout);
                return Err(ClientError::Timeout);
            }
            _ = ticker.tick() => {}
        }

        let fetched = match timeout_at(deadline, api.fetch_resume(&handle.id)).await {
            Ok(fetched) => fetched,
            Err(_) => return Err(ClientError::Timeout),
        };

        match fetched {
            Ok(fresh) => match fresh.parse_status {
                ParseStatus::Completed => {
                    info!("Resume {} parsed ({} skills)", handle.id, fresh.skills.len());
                    handle.merge(fresh);
                    return Ok(handle);
                }
                ParseStatus::Failed => {
                    let message = fresh.parse_error_message();
                    warn!("Resume {} failed to parse: {}", handle.id, message);
                    return Err(ClientError::ParseFailed(message));
                }
                ParseStatus::Pending => debug!("Resume {} still pending", handle.id),
            },
            Err(e) => warn!("Poll tick for resume {} failed, retrying: {e}", handle.id),
        }
    }
}

/// Cancellation handle for one running poll.
pub struct PollHandle {
    resume_id: String,
    task: JoinHandle<()>,
    state: Arc<watch::Sender<PollState>>,
}

impl PollHandle {
    /// Spawns the poll loop. The session résumé is updated when it settles.
    pub fn spawn(
        api: Arc<dyn ResumeApi>,
        session: SessionStore,
        handle: ResumeHandle,
        policy: PollPolicy,
    ) -> Self {
        let resume_id = handle.id.clone();
        let state = Arc::new(watch::Sender::new(PollState::Polling));
        let task_state = state.clone();

        let task = tokio::spawn(async move {
            let failed_handle = handle.clone();
            let next = match poll_until_parsed(api.as_ref(), handle, policy).await {
                Ok(parsed) => PollState::Done(parsed),
                Err(ClientError::ParseFailed(message)) => PollState::Failed(message),
                Err(_) => PollState::TimedOut,
            };

            let stored = match &next {
                PollState::Done(parsed) => Some(parsed.clone()),
                PollState::Failed(message) => {
                    let mut failed = failed_handle;
                    failed.parse_status = ParseStatus::Failed;
                    failed.parse_error = Some(ParseError {
                        message: message.clone(),
                    });
                    Some(failed)
                }
                _ => None,
            };
            match session
                .update_resume_if(stored, || transition(&task_state, next))
                .await
            {
                Ok(true) => {}
                Ok(false) => debug!("Poll outcome arrived after cancellation; session left as is"),
                Err(e) => warn!("Could not persist parsed resume: {e}"),
            }
        });

        Self {
            resume_id,
            task,
            state,
        }
    }

    pub fn resume_id(&self) -> &str {
        &self.resume_id
    }

    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }

    /// Waits for the terminal outcome.
    pub async fn wait(&self) -> PollState {
        let mut rx = self.state.subscribe();
        let outcome = match rx.wait_for(PollState::is_terminal).await {
            Ok(state) => (*state).clone(),
            Err(_) => self.state(),
        };
        outcome
    }

    /// Stops polling. A poll that already settled keeps its outcome.
    pub fn cancel(self) {
        self.task.abort();
        if transition(&self.state, PollState::Idle) {
            debug!("Poll for resume {} cancelled", self.resume_id);
        }
    }
}

/// Upload entry point: validate, post, then poll while parsing is pending.
pub struct ResumeUploader {
    api: Arc<dyn ResumeApi>,
    session: SessionStore,
    policy: PollPolicy,
    active: Option<PollHandle>,
}

impl ResumeUploader {
    pub fn new(api: Arc<dyn ResumeApi>, session: SessionStore, policy: PollPolicy) -> Self {
        Self {
            api,
            session,
            policy,
            active: None,
        }
    }

    pub async fn upload(&mut self, request: UploadRequest) -> Result<ResumeHandle, ClientError> {
        validate_upload(&request.file)?;
        self.cancel();

        info!(
            "Uploading resume {} ({} bytes)",
            request.file.name,
            request.file.size()
        );
        let handle = self.api.upload_resume(request).await?;
        self.session.update_resume(Some(handle.clone())).await?;

        if handle.parse_status == ParseStatus::Pending {
            self.start_polling(handle.clone());
        }
        Ok(handle)
    }

    /// Starts polling `handle`, cancelling any poll already running.
    pub fn start_polling(&mut self, handle: ResumeHandle) -> &PollHandle {
        self.cancel();
        debug!("Polling resume {} every {:?}", handle.id, self.policy.interval);
        self.active.insert(PollHandle::spawn(
            self.api.clone(),
            self.session.clone(),
            handle,
            self.policy,
        ))
    }

    pub fn active(&self) -> Option<&PollHandle> {
        self.active.as_ref()
    }

    pub fn cancel(&mut self) {
        if let Some(poll) = self.active.take() {
            poll.cancel();
        }
    }
}

impl Drop for ResumeUploader {
    fn drop(&mut self) {
        self.cancel();
    }
}
