//! Shared fakes for unit tests.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::errors::ClientError;
use crate::models::resume::ParseError;
use crate::models::{GeneratedEmail, ParseStatus, ResumeHandle};
use crate::outbox::EmailSender;
use crate::upload::{ResumeApi, UploadRequest};

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn pending_resume(id: &str) -> ResumeHandle {
    ResumeHandle {
        id: id.to_string(),
        url: format!("https://files.example.com/{id}.pdf"),
        parse_status: ParseStatus::Pending,
        skills: vec![],
        experience: vec![],
        projects: vec![],
        parse_error: None,
    }
}

pub fn resume_with(id: &str, status: ParseStatus, error: Option<&str>) -> ResumeHandle {
    let mut handle = pending_resume(id);
    handle.parse_status = status;
    if status == ParseStatus::Completed {
        handle.skills = vec!["Rust".to_string()];
        handle.experience = vec!["Acme Corp, Backend Engineer".to_string()];
    }
    handle.parse_error = error.map(|message| ParseError {
        message: message.to_string(),
    });
    handle
}

pub fn email_to(recipient: &str) -> GeneratedEmail {
    GeneratedEmail {
        recipient: recipient.to_string(),
        subject: "Backend roles at your team".to_string(),
        content: "Hi, I came across your work...".to_string(),
        company: Some("Acme".to_string()),
    }
}

/// Résumé backend with scripted fetch results; unscripted fetches return `pending`.
#[derive(Default)]
pub struct FakeResumeApi {
    fetch_script: Mutex<VecDeque<Result<ResumeHandle, ClientError>>>,
    fetched_ids: Mutex<Vec<String>>,
    uploads: AtomicUsize,
    fetch_latency: Mutex<Option<Duration>>,
}

impl FakeResumeApi {
    pub fn script_fetches(&self, results: Vec<Result<ResumeHandle, ClientError>>) {
        self.fetch_script.lock().unwrap().extend(results);
    }

    pub fn set_fetch_latency(&self, latency: Duration) {
        *self.fetch_latency.lock().unwrap() = Some(latency);
    }

    pub fn upload_calls(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetched_ids.lock().unwrap().len()
    }

    pub fn fetches_for(&self, id: &str) -> usize {
        self.fetched_ids
            .lock()
            .unwrap()
            .iter()
            .filter(|fetched| fetched.as_str() == id)
            .count()
    }
}

#[async_trait]
impl ResumeApi for FakeResumeApi {
    async fn upload_resume(&self, _request: UploadRequest) -> Result<ResumeHandle, ClientError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(pending_resume("r1"))
    }

    async fn fetch_resume(&self, id: &str) -> Result<ResumeHandle, ClientError> {
        self.fetched_ids.lock().unwrap().push(id.to_string());
        let latency = *self.fetch_latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let scripted = self.fetch_script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(pending_resume(id)))
    }
}

/// Email sender that records timing and concurrency of every call.
#[derive(Default)]
pub struct FakeSender {
    failing: Mutex<HashSet<String>>,
    latency: Duration,
    calls: Mutex<Vec<(String, Instant)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeSender {
    pub fn failing(recipients: &[&str]) -> Self {
        Self {
            failing: Mutex::new(recipients.iter().map(|r| r.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn recover(&self, recipient: &str) {
        self.failing.lock().unwrap().remove(recipient);
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(r, _)| r.clone()).collect()
    }

    pub fn start_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight count even when the send is cancelled mid-await.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmailSender for FakeSender {
    async fn send(&self, email: &GeneratedEmail) -> Result<(), ClientError> {
        self.calls
            .lock()
            .unwrap()
            .push((email.recipient.clone(), Instant::now()));
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
        let in_flight = InFlight(&self.in_flight);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        drop(in_flight);

        if self.failing.lock().unwrap().contains(&email.recipient) {
            return Err(ClientError::Api {
                status: 502,
                message: "SMTP rejected".to_string(),
            });
        }
        Ok(())
    }
}
