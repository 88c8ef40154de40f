//! SubmissionCoordinator - 投入して、worker の着手を確認するか、取り消す
//!
//! # 状態遷移
//! - Submitting -> Rejected（enqueue が同期的に失敗）
//! - Submitting -> Enqueued -> Confirmed（期限内に STARTED 以降を観測）
//! - Submitting -> Enqueued -> TimedOut（期限切れ or キャンセル、revoke を 1 回だけ実行）
//!
//! # 設計原則
//! - broker は fire-and-forget なので、enqueue の成功は「worker が受け取った」ことを意味しない
//! - 待機は `confirmation_timeout` で必ず打ち切る（時計は enqueue が返った瞬間から）
//! - 内部で retry しない。結果は全て [`SubmissionOutcome`] として呼び出し側へ返す
//! - coordinator 自身は状態を持たない（複数の submit を並行して呼んでよい）

use std::fmt;
use std::sync::Arc;

use tokio::time::{Instant, sleep, timeout, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::domain::{
    BrokerTaskState, RevokeStatus, SubmissionOutcome, SubmissionRequest, TaskId,
};
use crate::ports::TaskBroker;

/// Phase of one submission, used as a log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionPhase {
    Submitting,
    Enqueued,
    Confirmed,
    TimedOut,
    Rejected,
}

impl SubmissionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionPhase::Submitting => "submitting",
            SubmissionPhase::Enqueued => "enqueued",
            SubmissionPhase::Confirmed => "confirmed",
            SubmissionPhase::TimedOut => "timed_out",
            SubmissionPhase::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SubmissionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&SubmissionOutcome> for SubmissionPhase {
    fn from(outcome: &SubmissionOutcome) -> Self {
        match outcome {
            SubmissionOutcome::Confirmed { .. } => SubmissionPhase::Confirmed,
            SubmissionOutcome::TimedOut { .. } => SubmissionPhase::TimedOut,
            SubmissionOutcome::Rejected { .. } => SubmissionPhase::Rejected,
        }
    }
}

/// How the confirmation wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitEnd {
    Started(BrokerTaskState),
    Expired,
    Cancelled,
}

/// Enqueue-and-confirm coordinator over a shared broker handle.
#[derive(Clone)]
pub struct SubmissionCoordinator {
    broker: Arc<dyn TaskBroker>,
}

impl SubmissionCoordinator {
    pub fn new(broker: Arc<dyn TaskBroker>) -> Self {
        Self { broker }
    }

    /// Submit and wait for admission, revoking on timeout.
    pub async fn submit(&self, request: &SubmissionRequest) -> SubmissionOutcome {
        self.submit_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Like [`submit`](Self::submit), but `cancel` ends the wait early.
    ///
    /// A cancelled wait takes the same path as an expired one: revoke once, then
    /// `TimedOut`. Cancelling before enqueue returns has no effect on the enqueue.
    pub async fn submit_with_cancel(
        &self,
        request: &SubmissionRequest,
        cancel: &CancellationToken,
    ) -> SubmissionOutcome {
        let span = info_span!(
            "submit",
            queue = %request.queue_name(),
            task = %request.descriptor().task_name(),
        );
        self.run(request, cancel).instrument(span).await
    }

    async fn run(&self, request: &SubmissionRequest, cancel: &CancellationToken) -> SubmissionOutcome {
        let descriptor = request.descriptor();
        let arguments = request.effective_arguments();

        info!(
            phase = %SubmissionPhase::Submitting,
            arguments = arguments.len(),
            "enqueue task {} to queue {}",
            descriptor.task_name(),
            request.queue_name()
        );

        let task_id = match self
            .broker
            .enqueue(descriptor.task_name(), &arguments, request.queue_name())
            .await
        {
            Ok(task_id) => task_id,
            Err(e) => {
                warn!(phase = %SubmissionPhase::Rejected, error = %e, "enqueue failed");
                return SubmissionOutcome::Rejected {
                    reason: e.to_string(),
                };
            }
        };

        // 期限は enqueue が返った時点から数える
        let deadline = Instant::now() + request.confirmation_timeout();
        debug!(
            phase = %SubmissionPhase::Enqueued,
            task_id = %task_id,
            timeout_ms = request.confirmation_timeout().as_millis() as u64,
            "waiting for task consumption in queue {}",
            request.queue_name()
        );

        match self.wait_for_start(&task_id, request, deadline, cancel).await {
            WaitEnd::Started(state) => {
                info!(
                    phase = %SubmissionPhase::Confirmed,
                    task_id = %task_id,
                    state = %state,
                    "task {} successfully consumed from queue {}",
                    descriptor.task_name(),
                    request.queue_name()
                );
                SubmissionOutcome::Confirmed { task_id }
            }
            end => {
                if end == WaitEnd::Cancelled {
                    warn!(task_id = %task_id, "confirmation wait cancelled");
                } else {
                    warn!(
                        task_id = %task_id,
                        timeout_ms = request.confirmation_timeout().as_millis() as u64,
                        "no worker started the task in time"
                    );
                }
                let revoke = self.revoke(&task_id, request).await;
                SubmissionOutcome::TimedOut { task_id, revoke }
            }
        }
    }

    /// Poll until the task reaches `Started`, the deadline passes, or `cancel` fires.
    ///
    /// A poll that is still in flight at the deadline is abandoned. Poll errors
    /// count as "not started yet".
    async fn wait_for_start(
        &self,
        task_id: &TaskId,
        request: &SubmissionRequest,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> WaitEnd {
        loop {
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => return WaitEnd::Cancelled,
                polled = timeout_at(deadline, self.broker.get_state(task_id)) => polled,
            };

            match polled {
                Err(_elapsed) => return WaitEnd::Expired,
                Ok(Ok(state)) if state.reached_started() => return WaitEnd::Started(state),
                Ok(Ok(state)) => debug!(task_id = %task_id, state = %state, "not started yet"),
                Ok(Err(e)) => warn!(task_id = %task_id, error = %e, "state poll failed"),
            }

            let now = Instant::now();
            if now >= deadline {
                return WaitEnd::Expired;
            }
            // 最後の sleep は期限までに切り詰める
            let nap = request.poll_interval().min(deadline - now);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return WaitEnd::Cancelled,
                _ = sleep(nap) => {}
            }
        }
    }

    async fn revoke(&self, task_id: &TaskId, request: &SubmissionRequest) -> RevokeStatus {
        warn!(
            phase = %SubmissionPhase::TimedOut,
            task_id = %task_id,
            "revoke task {} from queue {}",
            request.descriptor().task_name(),
            request.queue_name()
        );
        // revoke も待ち続けない（Redis の PUBLISH が返らないことがある）
        let answered = match timeout(request.revoke_timeout(), self.broker.revoke(task_id)).await {
            Ok(answered) => answered,
            Err(_elapsed) => {
                warn!(task_id = %task_id, "revoke timed out");
                return RevokeStatus::Failed {
                    reason: "revoke timed out".to_string(),
                };
            }
        };
        match answered {
            Ok(true) => RevokeStatus::Acknowledged,
            Ok(false) => {
                warn!(task_id = %task_id, "revoke was not received by any worker");
                RevokeStatus::NotAcknowledged
            }
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "revoke failed");
                RevokeStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::domain::{QueueName, TaskArguments, TaskDescriptor, TaskName};
    use crate::impls::celery_protocol::parse_result_meta;
    use crate::impls::{BrokerCall, InMemoryBroker, StateScript};
    use crate::ports::BrokerError;
    use rstest::rstest;

    fn noop_request() -> SubmissionRequest {
        SubmissionRequest::new(
            QueueName::new("q_test").unwrap(),
            TaskDescriptor::new(TaskName::new("noop").unwrap(), TaskArguments::new()),
        )
        .with_timeout(Duration::from_secs(2))
    }

    fn coordinator(broker: &Arc<InMemoryBroker>) -> SubmissionCoordinator {
        SubmissionCoordinator::new(broker.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn confirms_when_worker_starts_in_time() {
        let broker = Arc::new(InMemoryBroker::new(StateScript::StartsAfter(
            Duration::from_millis(500),
        )));
        let started = Instant::now();

        let outcome = coordinator(&broker).submit(&noop_request()).await;

        let task_id = match outcome {
            SubmissionOutcome::Confirmed { task_id } => task_id,
            other => panic!("expected Confirmed, got {other:?}"),
        };
        assert!(broker.task(&task_id).await.is_some());
        assert!(broker.revoke_calls().await.is_empty());
        // 500ms 経過後の最初の poll で確認できる
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(700));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_and_revokes_exactly_once() {
        let broker = Arc::new(InMemoryBroker::new(StateScript::NeverStarts));

        let outcome = coordinator(&broker).submit(&noop_request()).await;

        let (task_id, revoke) = match outcome {
            SubmissionOutcome::TimedOut { task_id, revoke } => (task_id, revoke),
            other => panic!("expected TimedOut, got {other:?}"),
        };
        assert_eq!(revoke, RevokeStatus::Acknowledged);
        assert_eq!(broker.revoke_calls().await, vec![task_id.clone()]);
        assert!(broker.task(&task_id).await.unwrap().revoked);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_enqueue_skips_polling_and_revoke() {
        let broker = Arc::new(
            InMemoryBroker::default()
                .failing_enqueue(BrokerError::Unavailable("connection refused".to_string())),
        );

        let outcome = coordinator(&broker).submit(&noop_request()).await;

        assert_eq!(
            outcome,
            SubmissionOutcome::Rejected {
                reason: "broker unavailable: connection refused".to_string()
            }
        );
        let calls = broker.calls().await;
        assert_eq!(calls.len(), 1);
        assert!(matches!(calls[0], BrokerCall::Enqueue { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_never_exceeds_timeout() {
        for interval_ms in [1, 70, 100, 333, 1_500, 5_000] {
            let broker = Arc::new(InMemoryBroker::new(StateScript::NeverStarts));
            let request = noop_request().with_poll_interval(Duration::from_millis(interval_ms));

            let started = Instant::now();
            let outcome = coordinator(&broker).submit(&request).await;
            let elapsed = started.elapsed();

            assert!(matches!(outcome, SubmissionOutcome::TimedOut { .. }));
            assert!(
                elapsed <= Duration::from_secs(2),
                "interval={interval_ms}ms elapsed={elapsed:?}"
            );
            assert!(elapsed >= Duration::from_secs(2));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_poll_is_cut_at_deadline() {
        let broker = Arc::new(InMemoryBroker::new(StateScript::Hangs));

        let started = Instant::now();
        let outcome = coordinator(&broker).submit(&noop_request()).await;

        assert!(matches!(outcome, SubmissionOutcome::TimedOut { .. }));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed <= Duration::from_millis(2_010));
        assert_eq!(broker.poll_count().await, 1);
        assert_eq!(broker.revoke_calls().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_errors_do_not_end_the_wait_early() {
        let broker = Arc::new(InMemoryBroker::new(StateScript::Unreachable));

        let started = Instant::now();
        let outcome = coordinator(&broker).submit(&noop_request()).await;

        assert!(matches!(outcome, SubmissionOutcome::TimedOut { .. }));
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(broker.poll_count().await > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_state_counts_as_started() {
        let broker = Arc::new(InMemoryBroker::new(StateScript::Steps(vec![(
            Duration::from_millis(200),
            BrokerTaskState::Success,
        )])));

        let outcome = coordinator(&broker).submit(&noop_request()).await;

        assert!(outcome.is_confirmed());
        assert!(broker.revoke_calls().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn revoke_failure_is_reported_not_propagated() {
        let broker = Arc::new(
            InMemoryBroker::new(StateScript::NeverStarts).failing_revoke("broken pipe"),
        );

        let outcome = coordinator(&broker).submit(&noop_request()).await;

        let revoke = match outcome {
            SubmissionOutcome::TimedOut { revoke, .. } => revoke,
            other => panic!("expected TimedOut, got {other:?}"),
        };
        assert_eq!(
            revoke,
            RevokeStatus::Failed {
                reason: "broker unavailable: broken pipe".to_string()
            }
        );
        assert_eq!(broker.revoke_calls().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_revoke_does_not_stall_the_submission() {
        let broker = Arc::new(InMemoryBroker::new(StateScript::NeverStarts).hanging_revoke());
        let request = noop_request().with_revoke_timeout(Duration::from_millis(500));

        let started = Instant::now();
        let outcome = tokio::time::timeout(
            Duration::from_secs(3_600),
            coordinator(&broker).submit(&request),
        )
        .await
        .expect("submit must return while revoke hangs");

        let revoke = match outcome {
            SubmissionOutcome::TimedOut { revoke, .. } => revoke,
            other => panic!("expected TimedOut, got {other:?}"),
        };
        assert_eq!(
            revoke,
            RevokeStatus::Failed {
                reason: "revoke timed out".to_string()
            }
        );
        assert_eq!(broker.revoke_calls().await.len(), 1);
        // 2s の待機 + 0.5s の revoke 上限
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(2_500));
        assert!(elapsed <= Duration::from_millis(2_510));
    }

    #[rstest]
    #[case::custom_progress(r#"{"status": "PROGRESS"}"#, true)]
    #[case::started(r#"{"status": "STARTED"}"#, true)]
    #[case::retry(r#"{"status": "RETRY"}"#, false)]
    #[case::received(r#"{"status": "RECEIVED"}"#, false)]
    #[tokio::test(start_paused = true)]
    async fn celery_meta_decides_confirmation(#[case] meta: &str, #[case] confirmed: bool) {
        let state = parse_result_meta(Some(meta)).unwrap();
        let broker = Arc::new(InMemoryBroker::new(StateScript::Steps(vec![(
            Duration::from_millis(50),
            state,
        )])));

        let outcome = coordinator(&broker).submit(&noop_request()).await;

        assert_eq!(outcome.is_confirmed(), confirmed, "{meta} -> {outcome:?}");
        assert_eq!(broker.revoke_calls().await.is_empty(), confirmed);
    }

    #[tokio::test(start_paused = true)]
    async fn unacknowledged_revoke_is_reported() {
        let broker =
            Arc::new(InMemoryBroker::new(StateScript::NeverStarts).unacknowledged_revoke());

        let outcome = coordinator(&broker).submit(&noop_request()).await;

        assert!(matches!(
            outcome,
            SubmissionOutcome::TimedOut {
                revoke: RevokeStatus::NotAcknowledged,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_revokes_before_timeout() {
        let broker = Arc::new(InMemoryBroker::new(StateScript::NeverStarts));
        let cancel = CancellationToken::new();
        let request = noop_request().with_timeout(Duration::from_secs(60));

        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let outcome = coordinator(&broker).submit_with_cancel(&request, &cancel).await;

        let task_id = match outcome {
            SubmissionOutcome::TimedOut { task_id, .. } => task_id,
            other => panic!("expected TimedOut, got {other:?}"),
        };
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(broker.revoke_calls().await, vec![task_id]);
    }

    #[tokio::test(start_paused = true)]
    async fn extra_arguments_reach_the_broker() {
        let broker = Arc::new(InMemoryBroker::default());
        let descriptor = TaskDescriptor::new(
            TaskName::new("tasks.create_feature").unwrap(),
            [("symbol".to_string(), "AAPL".to_string())].into_iter().collect(),
        );
        let extra: TaskArguments = [("port".to_string(), "5555".to_string())].into_iter().collect();
        let request = SubmissionRequest::new(QueueName::new("features").unwrap(), descriptor)
            .with_extra_arguments(extra);

        let outcome = coordinator(&broker).submit(&request).await;
        let task_id = outcome.task_id().cloned().unwrap();

        let task = broker.task(&task_id).await.unwrap();
        assert_eq!(task.queue.as_str(), "features");
        assert_eq!(task.arguments.get("symbol").map(String::as_str), Some("AAPL"));
        assert_eq!(task.arguments.get("port").map(String::as_str), Some("5555"));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_submissions_are_independent() {
        let broker = Arc::new(
            InMemoryBroker::new(StateScript::StartsAfter(Duration::from_millis(100)))
                .with_queue_script(QueueName::new("dead_queue").unwrap(), StateScript::NeverStarts),
        );
        let coordinator = coordinator(&broker);

        let served = noop_request();
        let orphaned = SubmissionRequest::new(
            QueueName::new("dead_queue").unwrap(),
            served.descriptor().clone(),
        );

        let (a, b) = tokio::join!(coordinator.submit(&served), coordinator.submit(&orphaned));

        assert!(a.is_confirmed());
        let task_id = match b {
            SubmissionOutcome::TimedOut { task_id, .. } => task_id,
            other => panic!("expected TimedOut, got {other:?}"),
        };
        assert_eq!(broker.revoke_calls().await, vec![task_id]);
    }

    #[test]
    fn phase_follows_outcome() {
        let id = TaskId::new("t").unwrap();
        assert_eq!(
            SubmissionPhase::from(&SubmissionOutcome::Confirmed { task_id: id.clone() }),
            SubmissionPhase::Confirmed
        );
        assert_eq!(
            SubmissionPhase::from(&SubmissionOutcome::Rejected {
                reason: String::new()
            }),
            SubmissionPhase::Rejected
        );
    }
}
