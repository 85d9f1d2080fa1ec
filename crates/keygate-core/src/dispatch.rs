// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Fire-and-forget task dispatch.
//!
//! Email delivery runs outside the request path. The core only needs
//! `submit(job)`; the queue behind it is at-least-once and may retry with the
//! [`RetryPolicy`] carried on each [`JobEnvelope`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Queue that carries email jobs.
pub const EMAIL_QUEUE: &str = "email-queue";

// =============================================================================
// Jobs
// =============================================================================

/// Email notifications sent by the account flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailJob {
    /// Registration verification code.
    RegisterOtp {
        /// Recipient.
        email: String,
        /// Recipient display name.
        name: String,
        /// Plaintext code.
        otp: String,
    },
    /// Password reset code.
    ResetPassOtp {
        /// Recipient.
        email: String,
        /// Recipient display name.
        name: String,
        /// Plaintext code.
        otp: String,
    },
}

impl EmailJob {
    /// Job name as understood by the worker.
    pub fn job_name(&self) -> &'static str {
        match self {
            Self::RegisterOtp { .. } => "REGISTER_OTP",
            Self::ResetPassOtp { .. } => "RESET_PASS_OTP",
        }
    }

    /// Recipient address.
    pub fn recipient(&self) -> &str {
        match self {
            Self::RegisterOtp { email, .. } | Self::ResetPassOtp { email, .. } => email,
        }
    }
}

/// Retry behavior requested from the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub attempts: u32,
    /// Base delay of the exponential backoff, in milliseconds.
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            backoff_base_ms: 3000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based). `None` once exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.attempts {
            return None;
        }
        let factor = 2u64.saturating_pow(attempt - 1);
        Some(Duration::from_millis(self.backoff_base_ms.saturating_mul(factor)))
    }
}

/// A queued job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    /// Job identifier.
    pub id: Uuid,
    /// Target queue.
    pub queue: String,
    /// Job name.
    pub name: String,
    /// Serialized job body.
    pub payload: serde_json::Value,
    /// Retry policy.
    pub retry: RetryPolicy,
    /// Submission time.
    pub submitted_at: DateTime<Utc>,
}

impl JobEnvelope {
    /// Wraps an email job for the email queue.
    pub fn email(job: &EmailJob, retry: RetryPolicy) -> CoreResult<Self> {
        let payload =
            serde_json::to_value(job).map_err(|e| CoreError::dispatch(e.to_string()))?;
        Ok(Self {
            id: Uuid::now_v7(),
            queue: EMAIL_QUEUE.to_string(),
            name: job.job_name().to_string(),
            payload,
            retry,
            submitted_at: Utc::now(),
        })
    }

    /// Decodes the payload back into an email job.
    pub fn email_job(&self) -> CoreResult<EmailJob> {
        serde_json::from_value(self.payload.clone()).map_err(|e| CoreError::dispatch(e.to_string()))
    }
}

// =============================================================================
// TaskDispatcher
// =============================================================================

/// Submits jobs without waiting for their execution.
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    /// Queues a job. Success means accepted, not delivered.
    async fn submit(&self, job: JobEnvelope) -> CoreResult<()>;
}

/// Dispatcher backed by a bounded tokio channel.
///
/// The receiving half is handed to whatever worker drains the queue.
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    sender: mpsc::Sender<JobEnvelope>,
}

impl ChannelDispatcher {
    /// Creates a dispatcher and the receiver its jobs arrive on.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<JobEnvelope>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl TaskDispatcher for ChannelDispatcher {
    async fn submit(&self, job: JobEnvelope) -> CoreResult<()> {
        let job_id = job.id;
        let name = job.name.clone();
        match self.sender.try_send(job) {
            Ok(()) => {
                debug!(%job_id, job = %name, "Job queued");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(%job_id, job = %name, "Job queue full");
                Err(CoreError::dispatch("job queue is full"))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(CoreError::dispatch("job queue is closed"))
            }
        }
    }
}

/// Dispatcher that drops every job.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDispatcher;

#[async_trait]
impl TaskDispatcher for NoopDispatcher {
    async fn submit(&self, job: JobEnvelope) -> CoreResult<()> {
        debug!(job = %job.name, "Dropping job (no-op dispatcher)");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn otp_job() -> EmailJob {
        EmailJob::RegisterOtp {
            email: "ann@example.com".into(),
            name: "Ann".into(),
            otp: "123456".into(),
        }
    }

    #[test]
    fn test_backoff_is_exponential() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(3000)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(6000)));
        assert_eq!(policy.delay_for(4), Some(Duration::from_millis(24000)));
        assert_eq!(policy.delay_for(5), None);
    }

    #[test]
    fn test_envelope_round_trip() {
        let env = JobEnvelope::email(&otp_job(), RetryPolicy::default()).unwrap();
        assert_eq!(env.queue, EMAIL_QUEUE);
        assert_eq!(env.name, "REGISTER_OTP");
        assert_eq!(env.email_job().unwrap(), otp_job());
    }

    #[tokio::test]
    async fn test_channel_dispatcher_delivers() {
        let (dispatcher, mut rx) = ChannelDispatcher::channel(4);
        let env = JobEnvelope::email(&otp_job(), RetryPolicy::default()).unwrap();
        dispatcher.submit(env.clone()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), env);
    }

    #[tokio::test]
    async fn test_channel_dispatcher_full() {
        let (dispatcher, _rx) = ChannelDispatcher::channel(1);
        let env = JobEnvelope::email(&otp_job(), RetryPolicy::default()).unwrap();
        dispatcher.submit(env.clone()).await.unwrap();
        assert!(dispatcher.submit(env).await.is_err());
    }
}
