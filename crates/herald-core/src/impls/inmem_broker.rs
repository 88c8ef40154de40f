//! InMemoryBroker - 開発・テスト用の broker
//!
//! # 学習ポイント
//! - tokio::sync::Mutex による内部状態の共有（ロックを跨いで await しない）
//! - tokio::time::Instant を使うので、`start_paused` のテストで時間を進められる
//! - 呼び出し履歴（BrokerCall）を残して「revoke が何回呼ばれたか」を検証できる
//!
//! worker は存在しません。各タスクの状態は [`StateScript`] で「投入からの経過時間」に
//! 対して決まります。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::{BrokerTaskState, QueueName, TaskArguments, TaskId, TaskName};
use crate::ports::{BrokerError, TaskBroker};

/// How a task's state evolves after it is enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateScript {
    /// No worker ever picks the task up.
    NeverStarts,

    /// Reports `Started` once `delay` has passed since enqueue.
    StartsAfter(Duration),

    /// Step function over elapsed time; `Pending` before the first step.
    Steps(Vec<(Duration, BrokerTaskState)>),

    /// Every state poll fails with `Unavailable`.
    Unreachable,

    /// State polls never return.
    Hangs,
}

impl StateScript {
    fn state_at(&self, elapsed: Duration) -> BrokerTaskState {
        match self {
            StateScript::StartsAfter(delay) if elapsed >= *delay => BrokerTaskState::Started,
            StateScript::Steps(steps) => steps
                .iter()
                .filter(|(at, _)| *at <= elapsed)
                .max_by_key(|(at, _)| *at)
                .map(|(_, state)| *state)
                .unwrap_or(BrokerTaskState::Pending),
            _ => BrokerTaskState::Pending,
        }
    }
}

/// One recorded call against the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerCall {
    Enqueue {
        task_name: TaskName,
        arguments: TaskArguments,
        queue: QueueName,
    },
    GetState(TaskId),
    Revoke(TaskId),
}

/// A task as the in-memory broker stores it.
#[derive(Debug, Clone)]
pub struct EnqueuedTask {
    pub task_name: TaskName,
    pub arguments: TaskArguments,
    pub queue: QueueName,
    pub enqueued_at: Instant,
    pub revoked: bool,
    script: StateScript,
}

struct InMemoryBrokerState {
    default_script: StateScript,
    queue_scripts: HashMap<QueueName, StateScript>,
    tasks: HashMap<TaskId, EnqueuedTask>,
    calls: Vec<BrokerCall>,
    enqueue_failure: Option<BrokerError>,
    revoke_failure: Option<String>,
    revoke_acknowledged: bool,
    revoke_hangs: bool,
}

/// In-process broker with scripted worker behaviour.
pub struct InMemoryBroker {
    state: Mutex<InMemoryBrokerState>,
}

impl InMemoryBroker {
    pub fn new(default_script: StateScript) -> Self {
        Self {
            state: Mutex::new(InMemoryBrokerState {
                default_script,
                queue_scripts: HashMap::new(),
                tasks: HashMap::new(),
                calls: Vec::new(),
                enqueue_failure: None,
                revoke_failure: None,
                revoke_acknowledged: true,
                revoke_hangs: false,
            }),
        }
    }

    /// Override the script for tasks sent to `queue`.
    pub fn with_queue_script(mut self, queue: QueueName, script: StateScript) -> Self {
        self.state.get_mut().queue_scripts.insert(queue, script);
        self
    }

    /// Make every enqueue fail with `error`.
    pub fn failing_enqueue(mut self, error: BrokerError) -> Self {
        self.state.get_mut().enqueue_failure = Some(error);
        self
    }

    /// Make every revoke fail with `reason`.
    pub fn failing_revoke(mut self, reason: impl Into<String>) -> Self {
        self.state.get_mut().revoke_failure = Some(reason.into());
        self
    }

    /// Answer revokes with `false` (nobody received the request).
    pub fn unacknowledged_revoke(mut self) -> Self {
        self.state.get_mut().revoke_acknowledged = false;
        self
    }

    /// Revoke requests are recorded but never answered.
    pub fn hanging_revoke(mut self) -> Self {
        self.state.get_mut().revoke_hangs = true;
        self
    }

    pub async fn calls(&self) -> Vec<BrokerCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn revoke_calls(&self) -> Vec<TaskId> {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter_map(|c| match c {
                BrokerCall::Revoke(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn poll_count(&self) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| matches!(c, BrokerCall::GetState(_)))
            .count()
    }

    pub async fn task(&self, task_id: &TaskId) -> Option<EnqueuedTask> {
        self.state.lock().await.tasks.get(task_id).cloned()
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(StateScript::StartsAfter(Duration::ZERO))
    }
}

#[async_trait]
impl TaskBroker for InMemoryBroker {
    async fn enqueue(
        &self,
        task_name: &TaskName,
        arguments: &TaskArguments,
        queue: &QueueName,
    ) -> Result<TaskId, BrokerError> {
        let mut state = self.state.lock().await;
        state.calls.push(BrokerCall::Enqueue {
            task_name: task_name.clone(),
            arguments: arguments.clone(),
            queue: queue.clone(),
        });

        if let Some(err) = &state.enqueue_failure {
            return Err(err.clone());
        }

        let task_id = TaskId::new(Uuid::new_v4().to_string())
            .map_err(|e| BrokerError::Protocol(e.to_string()))?;
        let script = state
            .queue_scripts
            .get(queue)
            .unwrap_or(&state.default_script)
            .clone();
        state.tasks.insert(
            task_id.clone(),
            EnqueuedTask {
                task_name: task_name.clone(),
                arguments: arguments.clone(),
                queue: queue.clone(),
                enqueued_at: Instant::now(),
                revoked: false,
                script,
            },
        );
        Ok(task_id)
    }

    async fn get_state(&self, task_id: &TaskId) -> Result<BrokerTaskState, BrokerError> {
        let (script, enqueued_at) = {
            let mut state = self.state.lock().await;
            state.calls.push(BrokerCall::GetState(task_id.clone()));

            match state.tasks.get(task_id) {
                // Celery の result backend と同じく、知らない id は PENDING
                None => return Ok(BrokerTaskState::Pending),
                Some(task) if task.revoked => return Ok(BrokerTaskState::Revoked),
                Some(task) => (task.script.clone(), task.enqueued_at),
            }
        };

        // ここから先はロックを持たない
        match script {
            StateScript::Unreachable => Err(BrokerError::Unavailable(
                "result backend unreachable".to_string(),
            )),
            StateScript::Hangs => std::future::pending().await,
            script => Ok(script.state_at(enqueued_at.elapsed())),
        }
    }

    async fn revoke(&self, task_id: &TaskId) -> Result<bool, BrokerError> {
        let hangs = {
            let mut state = self.state.lock().await;
            state.calls.push(BrokerCall::Revoke(task_id.clone()));
            state.revoke_hangs
        };
        if hangs {
            return std::future::pending().await;
        }

        let mut state = self.state.lock().await;
        if let Some(reason) = &state.revoke_failure {
            return Err(BrokerError::Unavailable(reason.clone()));
        }
        let acknowledged = state.revoke_acknowledged;
        if let Some(task) = state.tasks.get_mut(task_id) {
            task.revoked = true;
        }
        Ok(acknowledged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> TaskName {
        TaskName::new(s).unwrap()
    }

    fn queue(s: &str) -> QueueName {
        QueueName::new(s).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn starts_after_delay() {
        let broker = InMemoryBroker::new(StateScript::StartsAfter(Duration::from_millis(500)));
        let id = broker
            .enqueue(&name("noop"), &TaskArguments::new(), &queue("q_test"))
            .await
            .unwrap();

        assert_eq!(broker.get_state(&id).await.unwrap(), BrokerTaskState::Pending);
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(broker.get_state(&id).await.unwrap(), BrokerTaskState::Started);
    }

    #[tokio::test(start_paused = true)]
    async fn steps_follow_elapsed_time() {
        let broker = InMemoryBroker::new(StateScript::Steps(vec![
            (Duration::from_millis(100), BrokerTaskState::Started),
            (Duration::from_millis(300), BrokerTaskState::Success),
        ]));
        let id = broker
            .enqueue(&name("noop"), &TaskArguments::new(), &queue("q"))
            .await
            .unwrap();

        assert_eq!(broker.get_state(&id).await.unwrap(), BrokerTaskState::Pending);
        tokio::time::advance(Duration::from_millis(150)).await;
        assert_eq!(broker.get_state(&id).await.unwrap(), BrokerTaskState::Started);
        tokio::time::advance(Duration::from_millis(200)).await;
        assert_eq!(broker.get_state(&id).await.unwrap(), BrokerTaskState::Success);
    }

    #[tokio::test]
    async fn queue_script_overrides_default() {
        let broker = InMemoryBroker::default()
            .with_queue_script(queue("nobody_listens"), StateScript::NeverStarts);

        let served = broker
            .enqueue(&name("noop"), &TaskArguments::new(), &queue("served"))
            .await
            .unwrap();
        let orphan = broker
            .enqueue(&name("noop"), &TaskArguments::new(), &queue("nobody_listens"))
            .await
            .unwrap();

        assert_eq!(broker.get_state(&served).await.unwrap(), BrokerTaskState::Started);
        assert_eq!(broker.get_state(&orphan).await.unwrap(), BrokerTaskState::Pending);
    }

    #[tokio::test]
    async fn revoke_marks_task_and_records_call() {
        let broker = InMemoryBroker::new(StateScript::NeverStarts);
        let id = broker
            .enqueue(&name("noop"), &TaskArguments::new(), &queue("q"))
            .await
            .unwrap();

        assert!(broker.revoke(&id).await.unwrap());
        assert_eq!(broker.get_state(&id).await.unwrap(), BrokerTaskState::Revoked);
        assert_eq!(broker.revoke_calls().await, vec![id.clone()]);
        assert!(broker.task(&id).await.unwrap().revoked);
    }

    #[tokio::test]
    async fn failing_enqueue_records_call_but_stores_nothing() {
        let broker = InMemoryBroker::default()
            .failing_enqueue(BrokerError::Unavailable("connection refused".to_string()));

        let err = broker
            .enqueue(&name("noop"), &TaskArguments::new(), &queue("q"))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::Unavailable(_)));
        assert_eq!(broker.calls().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_revoke_records_call_and_never_answers() {
        let broker = InMemoryBroker::new(StateScript::NeverStarts).hanging_revoke();
        let id = broker
            .enqueue(&name("noop"), &TaskArguments::new(), &queue("q"))
            .await
            .unwrap();

        let answer = tokio::time::timeout(Duration::from_secs(60), broker.revoke(&id)).await;

        assert!(answer.is_err());
        assert_eq!(broker.revoke_calls().await, vec![id.clone()]);
        assert!(!broker.task(&id).await.unwrap().revoked);
    }

    #[tokio::test]
    async fn unknown_task_is_pending() {
        let broker = InMemoryBroker::default();
        let id = TaskId::new("never-enqueued").unwrap();
        assert_eq!(broker.get_state(&id).await.unwrap(), BrokerTaskState::Pending);
    }
}
