//! RedisBroker - Celery 互換の broker（Redis transport + Redis result backend）
//!
//! broker と result backend は別の Redis でもよいので、接続を 2 本持ちます。
//! `MultiplexedConnection` は clone して並行に使えるので、複数の submit から
//! 同じ RedisBroker を共有できます。

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tracing::debug;
use uuid::Uuid;

use super::celery_protocol::{
    parse_result_meta, pidbox_channel, result_key, revoke_message, task_message,
};
use crate::domain::{BrokerTaskState, QueueName, TaskArguments, TaskId, TaskName};
use crate::ports::{BrokerError, TaskBroker};

pub struct RedisBroker {
    broker: MultiplexedConnection,
    backend: MultiplexedConnection,
    broker_db: i64,
    origin: String,
}

impl RedisBroker {
    /// Connect to both the broker and the result backend.
    pub async fn connect(broker_url: &str, result_backend: &str) -> Result<Self, BrokerError> {
        let broker_client = open_client(broker_url)?;
        // kombu の fanout channel 名は broker 側の db 番号を含む
        let broker_db = broker_client.get_connection_info().redis.db;
        let broker = connect_multiplexed(&broker_client).await?;
        let backend = connect_multiplexed(&open_client(result_backend)?).await?;
        Ok(Self {
            broker,
            backend,
            broker_db,
            origin: format!("gen{}@herald", std::process::id()),
        })
    }
}

fn open_client(url: &str) -> Result<redis::Client, BrokerError> {
    redis::Client::open(url)
        .map_err(|e| BrokerError::Unavailable(format!("invalid redis url: {e}")))
}

async fn connect_multiplexed(client: &redis::Client) -> Result<MultiplexedConnection, BrokerError> {
    client
        .get_multiplexed_async_connection()
        .await
        .map_err(map_redis_error)
}

fn map_redis_error(err: redis::RedisError) -> BrokerError {
    if err.is_io_error()
        || err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_timeout()
    {
        BrokerError::Unavailable(err.to_string())
    } else {
        BrokerError::Protocol(err.to_string())
    }
}

#[async_trait]
impl TaskBroker for RedisBroker {
    async fn enqueue(
        &self,
        task_name: &TaskName,
        arguments: &TaskArguments,
        queue: &QueueName,
    ) -> Result<TaskId, BrokerError> {
        let task_id = TaskId::new(Uuid::new_v4().to_string())
            .map_err(|e| BrokerError::Protocol(e.to_string()))?;
        let message = task_message(&task_id, task_name, arguments, queue, &self.origin)?;

        let mut conn = self.broker.clone();
        let depth: i64 = conn
            .lpush(queue.as_str(), message)
            .await
            .map_err(map_redis_error)?;
        debug!(task_id = %task_id, queue = %queue, depth, "message pushed");
        Ok(task_id)
    }

    async fn get_state(&self, task_id: &TaskId) -> Result<BrokerTaskState, BrokerError> {
        let mut conn = self.backend.clone();
        let raw: Option<String> = conn
            .get(result_key(task_id))
            .await
            .map_err(map_redis_error)?;
        parse_result_meta(raw.as_deref())
    }

    async fn revoke(&self, task_id: &TaskId) -> Result<bool, BrokerError> {
        let message = revoke_message(task_id)?;
        let mut conn = self.broker.clone();
        let receivers: i64 = conn
            .publish(pidbox_channel(self.broker_db), message)
            .await
            .map_err(map_redis_error)?;
        debug!(task_id = %task_id, receivers, "revoke broadcast");
        Ok(receivers > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn db_of(url: &str) -> i64 {
        open_client(url).unwrap().get_connection_info().redis.db
    }

    #[rstest]
    #[case("redis://localhost:6379", 0)]
    #[case("redis://localhost:6379/3", 3)]
    #[case("redis://:secret@redis:6379/2", 2)]
    fn broker_db_comes_from_tcp_url(#[case] url: &str, #[case] db: i64) {
        assert_eq!(db_of(url), db);
    }

    #[cfg(unix)]
    #[rstest]
    #[case("unix:///tmp/redis.sock?db=3", 3)]
    #[case("redis+unix:///tmp/r.sock?db=2", 2)]
    fn broker_db_comes_from_socket_url(#[case] url: &str, #[case] db: i64) {
        assert_eq!(db_of(url), db);
    }

    #[test]
    fn malformed_url_is_unavailable() {
        let err = open_client("not a url").unwrap_err();
        assert!(matches!(err, BrokerError::Unavailable(_)));
    }
}
