/// Redis connection wrapper for durable state.
///
/// Unlike a cache, a store must surface failures: every operation returns
/// `Result<T, CommonError>` and callers decide how to degrade. The multiplexed
/// connection is opened once and cloned per call.
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::warn;

use crate::error::CommonError;

#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    /// Open a client for `url` and establish the shared multiplexed connection.
    pub async fn connect(url: &str) -> Result<Self, CommonError> {
        let client = redis::Client::open(url)
            .inspect_err(|e| warn!(error = %e, url, "failed to create redis client"))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .inspect_err(|e| warn!(error = %e, "redis connection failed"))?;
        Ok(Self { conn })
    }

    /// Send a PING. Returns `true` if Redis answered.
    pub async fn is_available(&self) -> bool {
        let mut conn = self.conn.clone();
        let result: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        result.is_ok()
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, CommonError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis GET failed"))?;
        Ok(value)
    }

    /// Run a Lua script with `EVAL`. Redis executes the script atomically, which is
    /// how multi-key writes are kept all-or-nothing.
    pub async fn eval<T: redis::FromRedisValue>(
        &self,
        script: &str,
        keys: &[&str],
        args: &[&str],
    ) -> Result<T, CommonError> {
        let mut conn = self.conn.clone();
        let value: T = redis::cmd("EVAL")
            .arg(script)
            .arg(keys.len())
            .arg(keys)
            .arg(args)
            .query_async(&mut conn)
            .await
            .inspect_err(|e| warn!(error = %e, ?keys, "redis EVAL failed"))?;
        Ok(value)
    }

    pub async fn smembers(&self, key: &str) -> Result<Vec<String>, CommonError> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn
            .smembers(key)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis SMEMBERS failed"))?;
        Ok(members)
    }

    /// Batch GET. The result is positionally aligned with `keys`; missing keys are `None`.
    pub async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, CommonError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .inspect_err(|e| warn!(error = %e, count = keys.len(), "redis MGET failed"))?;
        Ok(values)
    }
}
