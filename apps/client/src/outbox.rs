//! Paced email delivery with per-recipient status and manual retry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::errors::ClientError;
use crate::models::{GeneratedEmail, SendState, SendStatus};

const INTERRUPTED: &str = "Sending was interrupted";

/// Delivers one email. Implemented over the REST API for company and faculty outreach.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &GeneratedEmail) -> Result<(), ClientError>;
}

/// How a batch is paced: `concurrency` sends per step, `delay` between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    pub delay: Duration,
    pub concurrency: usize,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SendSummary {
    pub sent: usize,
    pub failed: usize,
}

type StatusMap = Arc<Mutex<HashMap<String, SendStatus>>>;

/// Statuses are only touched between awaits, so a poisoned lock still holds consistent data.
fn lock(statuses: &StatusMap) -> MutexGuard<'_, HashMap<String, SendStatus>> {
    statuses.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owned by one `send_all` call. When the call ends, however it ends, this
/// clears the busy flag and fails any item the batch left in `Sending`.
struct BatchGuard {
    busy: Arc<AtomicBool>,
    statuses: StatusMap,
    in_flight: Vec<String>,
}

impl BatchGuard {
    fn settle(&mut self, recipient: &str) {
        self.in_flight.retain(|r| r != recipient);
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        if !self.in_flight.is_empty() {
            let mut statuses = lock(&self.statuses);
            for recipient in self.in_flight.drain(..) {
                warn!("Send to {} was interrupted", recipient);
                statuses.insert(
                    recipient,
                    SendStatus {
                        state: SendState::Failed,
                        attempts: 1,
                        error: Some(INTERRUPTED.to_string()),
                    },
                );
            }
        }
        self.busy.store(false, Ordering::SeqCst);
    }
}

/// Send queue for one review session. Clones share statuses and the busy flag.
pub struct SendQueue<S: EmailSender> {
    sender: Arc<S>,
    policy: PacingPolicy,
    statuses: StatusMap,
    sent: Arc<AtomicUsize>,
    busy: Arc<AtomicBool>,
}

impl<S: EmailSender> Clone for SendQueue<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            policy: self.policy,
            statuses: self.statuses.clone(),
            sent: self.sent.clone(),
            busy: self.busy.clone(),
        }
    }
}

impl<S: EmailSender + 'static> SendQueue<S> {
    pub fn new(sender: Arc<S>, policy: PacingPolicy) -> Self {
        Self {
            sender,
            policy,
            statuses: Arc::new(Mutex::new(HashMap::new())),
            sent: Arc::new(AtomicUsize::new(0)),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True while a batch is in flight; the bulk "send all" action is disabled meanwhile.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn sent_count(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn status(&self, recipient: &str) -> SendStatus {
        lock(&self.statuses)
            .get(recipient)
            .cloned()
            .unwrap_or_default()
    }

    pub fn statuses(&self) -> HashMap<String, SendStatus> {
        lock(&self.statuses).clone()
    }

    /// Sends the batch in input order, waiting `policy.delay` between steps.
    /// Dropping the returned future stops the batch; nothing it started keeps running.
    pub async fn send_all(&self, emails: &[GeneratedEmail]) -> Result<SendSummary, ClientError> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(ClientError::Validation(
                "Emails are already being sent".to_string(),
            ));
        }
        let mut batch = BatchGuard {
            busy: self.busy.clone(),
            statuses: self.statuses.clone(),
            in_flight: Vec::new(),
        };

        info!("Sending {} emails", emails.len());
        let mut summary = SendSummary::default();

        for (step, window) in emails.chunks(self.policy.concurrency.max(1)).enumerate() {
            if step > 0 {
                tokio::time::sleep(self.policy.delay).await;
            }

            for email in window {
                self.set_status(&email.recipient, SendStatus::sending(1));
                batch.in_flight.push(email.recipient.clone());
            }

            if let [email] = window {
                let result = self.sender.send(email).await;
                batch.settle(&email.recipient);
                self.tally(&mut summary, self.record(&email.recipient, 1, result));
                continue;
            }

            let mut tasks = JoinSet::new();
            for email in window {
                let sender = self.sender.clone();
                let email = email.clone();
                tasks.spawn(async move {
                    let result = sender.send(&email).await;
                    (email.recipient, result)
                });
            }
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((recipient, result)) => {
                        batch.settle(&recipient);
                        self.tally(&mut summary, self.record(&recipient, 1, result));
                    }
                    Err(e) => warn!("Send task did not finish: {e}"),
                }
            }
            for recipient in std::mem::take(&mut batch.in_flight) {
                let lost = Err(ClientError::Validation(INTERRUPTED.to_string()));
                self.tally(&mut summary, self.record(&recipient, 1, lost));
            }
        }

        info!(
            "Batch finished: {} sent, {} failed",
            summary.sent, summary.failed
        );
        Ok(summary)
    }

    /// Re-sends a failed email. Returns `None` (and sends nothing) unless it is `Failed`.
    pub async fn retry(&self, email: &GeneratedEmail) -> Option<SendStatus> {
        let attempts = {
            let mut statuses = lock(&self.statuses);
            let status = statuses.get_mut(&email.recipient)?;
            if !status.is_failed() {
                debug!("Ignoring retry for {} ({:?})", email.recipient, status.state);
                return None;
            }
            let attempts = status.attempts + 1;
            *status = SendStatus::sending(attempts);
            attempts
        };

        info!("Retrying {} (attempt {})", email.recipient, attempts);
        let result = self.sender.send(email).await;
        Some(self.record(&email.recipient, attempts, result))
    }

    fn tally(&self, summary: &mut SendSummary, status: SendStatus) {
        match status.state {
            SendState::Sent => summary.sent += 1,
            _ => summary.failed += 1,
        }
    }

    fn set_status(&self, recipient: &str, status: SendStatus) {
        lock(&self.statuses).insert(recipient.to_string(), status);
    }

    fn record(&self, recipient: &str, attempts: u32, result: Result<(), ClientError>) -> SendStatus {
        let status = match result {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::SeqCst);
                debug!("Sent to {}", recipient);
                SendStatus {
                    state: SendState::Sent,
                    attempts,
                    error: None,
                }
            }
            Err(e) => {
                warn!("Sending to {} failed: {e}", recipient);
                SendStatus {
                    state: SendState::Failed,
                    attempts,
                    error: Some(e.message()),
                }
            }
        };
        self.set_status(recipient, status.clone());
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{email_to, FakeSender};
    use tokio::time::Instant;

    fn batch(recipients: &[&str]) -> Vec<GeneratedEmail> {
        recipients.iter().map(|r| email_to(r)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_middle_failure_scenario() {
        let sender = Arc::new(FakeSender::failing(&["two@acme.io"]));
        let queue = SendQueue::new(sender.clone(), PacingPolicy::default());
        let emails = batch(&["one@acme.io", "two@acme.io", "three@acme.io"]);

        let start = Instant::now();
        let summary = queue.send_all(&emails).await.unwrap();

        assert_eq!(summary, SendSummary { sent: 2, failed: 1 });
        assert_eq!(sender.calls(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert_eq!(queue.status("one@acme.io").state, SendState::Sent);
        let failed = queue.status("two@acme.io");
        assert_eq!(failed.state, SendState::Failed);
        assert_eq!(failed.attempts, 1);
        assert_eq!(failed.error.as_deref(), Some("SMTP rejected"));
        assert_eq!(queue.status("three@acme.io").state, SendState::Sent);
        assert_eq!(queue.sent_count(), 2);
        assert!(!queue.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sends_are_sequential_and_spaced() {
        let sender = Arc::new(FakeSender::with_latency(Duration::from_millis(300)));
        let queue = SendQueue::new(sender.clone(), PacingPolicy::default());

        queue
            .send_all(&batch(&["a@x.io", "b@x.io", "c@x.io", "d@x.io"]))
            .await
            .unwrap();

        assert_eq!(sender.max_in_flight(), 1);
        let starts = sender.start_times();
        assert_eq!(starts.len(), 4);
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(1));
        }
        assert_eq!(sender.recipients(), vec!["a@x.io", "b@x.io", "c@x.io", "d@x.io"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wider_window_from_policy() {
        let sender = Arc::new(FakeSender::with_latency(Duration::from_millis(300)));
        let policy = PacingPolicy {
            delay: Duration::from_millis(500),
            concurrency: 2,
        };
        let queue = SendQueue::new(sender.clone(), policy);

        let start = Instant::now();
        queue
            .send_all(&batch(&["a@x.io", "b@x.io", "c@x.io", "d@x.io"]))
            .await
            .unwrap();

        assert_eq!(sender.max_in_flight(), 2);
        assert_eq!(start.elapsed(), Duration::from_millis(300 + 500 + 300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_is_noop_unless_failed() {
        let sender = Arc::new(FakeSender::default());
        let queue = SendQueue::new(sender.clone(), PacingPolicy::default());
        let email = email_to("one@acme.io");

        assert_eq!(queue.retry(&email).await, None);
        queue.send_all(std::slice::from_ref(&email)).await.unwrap();
        assert_eq!(queue.retry(&email).await, None);
        assert_eq!(sender.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_increments_attempts() {
        let sender = Arc::new(FakeSender::failing(&["two@acme.io"]));
        let queue = SendQueue::new(sender.clone(), PacingPolicy::default());
        let email = email_to("two@acme.io");
        queue.send_all(std::slice::from_ref(&email)).await.unwrap();

        let status = queue.retry(&email).await.unwrap();
        assert_eq!(status.state, SendState::Failed);
        assert_eq!(status.attempts, 2);

        sender.recover("two@acme.io");
        let status = queue.retry(&email).await.unwrap();
        assert_eq!(status.state, SendState::Sent);
        assert_eq!(status.attempts, 3);
        assert_eq!(status.error, None);
        assert_eq!(queue.sent_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_batch_rejected_while_busy() {
        let sender = Arc::new(FakeSender::with_latency(Duration::from_millis(200)));
        let queue = SendQueue::new(sender.clone(), PacingPolicy::default());
        let emails = batch(&["a@x.io", "b@x.io"]);

        let running = {
            let queue = queue.clone();
            let emails = emails.clone();
            tokio::spawn(async move { queue.send_all(&emails).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(queue.is_busy());

        let err = queue.send_all(&emails).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));

        running.await.unwrap().unwrap();
        assert!(!queue.is_busy());
        assert_eq!(sender.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_batch_stops_its_send() {
        let sender = Arc::new(FakeSender::with_latency(Duration::from_millis(500)));
        let queue = SendQueue::new(sender.clone(), PacingPolicy::default());
        let emails = batch(&["a@x.io"]);

        let running = {
            let queue = queue.clone();
            let emails = emails.clone();
            tokio::spawn(async move { queue.send_all(&emails).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        running.abort();
        assert!(running.await.unwrap_err().is_cancelled());

        assert!(!queue.is_busy());
        let interrupted = queue.status("a@x.io");
        assert_eq!(interrupted.state, SendState::Failed);
        assert_eq!(interrupted.error.as_deref(), Some("Sending was interrupted"));

        queue.send_all(&emails).await.unwrap();
        assert_eq!(sender.max_in_flight(), 1);
        assert_eq!(queue.status("a@x.io").state, SendState::Sent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupted_item_can_be_retried() {
        let sender = Arc::new(FakeSender::with_latency(Duration::from_millis(500)));
        let queue = SendQueue::new(sender.clone(), PacingPolicy::default());
        let email = email_to("a@x.io");

        let running = {
            let queue = queue.clone();
            let email = email.clone();
            tokio::spawn(async move { queue.send_all(std::slice::from_ref(&email)).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        running.abort();
        let _ = running.await;

        let status = queue.retry(&email).await.unwrap();
        assert_eq!(status.state, SendState::Sent);
        assert_eq!(status.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_allowed_during_batch() {
        let sender = Arc::new(FakeSender::failing(&["a@x.io"]));
        let queue = SendQueue::new(sender.clone(), PacingPolicy::default());
        let emails = batch(&["a@x.io", "b@x.io", "c@x.io"]);

        let running = {
            let queue = queue.clone();
            let emails = emails.clone();
            tokio::spawn(async move { queue.send_all(&emails).await })
        };
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(queue.status("a@x.io").state, SendState::Failed);

        sender.recover("a@x.io");
        let retried = queue.retry(&emails[0]).await.unwrap();
        assert_eq!(retried.state, SendState::Sent);
        assert!(queue.is_busy());

        let summary = running.await.unwrap().unwrap();
        assert_eq!(summary, SendSummary { sent: 2, failed: 1 });
        assert_eq!(queue.sent_count(), 3);
    }
}
