//! SubmissionRequest - queue / descriptor / 待機パラメータ

use std::time::Duration;

use super::descriptor::{TaskArguments, TaskDescriptor};
use super::ids::QueueName;

/// Default bounded wait for the start acknowledgment.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(2);

/// Default cadence of state polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default bound on the revoke call made after a timeout.
pub const DEFAULT_REVOKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Lower bound applied to `poll_interval` so the poll loop cannot spin.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// One submission: where to send what, and how long to wait for admission.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    queue_name: QueueName,
    descriptor: TaskDescriptor,
    extra_arguments: TaskArguments,
    confirmation_timeout: Duration,
    poll_interval: Duration,
    revoke_timeout: Duration,
}

impl SubmissionRequest {
    pub fn new(queue_name: QueueName, descriptor: TaskDescriptor) -> Self {
        Self {
            queue_name,
            descriptor,
            extra_arguments: TaskArguments::new(),
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            revoke_timeout: DEFAULT_REVOKE_TIMEOUT,
        }
    }

    /// 追加引数（descriptor の引数を上書きする）
    pub fn with_extra_arguments(mut self, extra: TaskArguments) -> Self {
        self.extra_arguments = extra;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    /// `MIN_POLL_INTERVAL` 未満は切り上げる
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// revoke が返ってこないときに諦めるまでの時間
    pub fn with_revoke_timeout(mut self, timeout: Duration) -> Self {
        self.revoke_timeout = timeout;
        self
    }

    pub fn queue_name(&self) -> &QueueName {
        &self.queue_name
    }

    pub fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    pub fn extra_arguments(&self) -> &TaskArguments {
        &self.extra_arguments
    }

    /// Arguments actually sent to the broker.
    pub fn effective_arguments(&self) -> TaskArguments {
        self.descriptor.merged_arguments(&self.extra_arguments)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        self.confirmation_timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn revoke_timeout(&self) -> Duration {
        self.revoke_timeout
    }
}
