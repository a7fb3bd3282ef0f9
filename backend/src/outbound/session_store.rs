//! Redis connectivity for the session store.
//!
//! Sessions themselves go through `actix-session`'s Redis store; this pool
//! exists so readiness can ping the same server independently.

use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::RedisConnectionManager;
use bb8_redis::bb8::Pool;
use bb8_redis::redis;

use crate::domain::ports::DependencyProbe;
use crate::domain::{CustomError, ErrorKind};

/// Errors raised while building the Redis pool.
#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    /// The connection URL was rejected.
    #[error("invalid redis url: {0}")]
    Url(#[from] redis::RedisError),
}

/// Small bb8 pool against the session Redis server.
#[derive(Clone)]
pub struct RedisPool {
    inner: Pool<RedisConnectionManager>,
}

impl RedisPool {
    /// Build a lazily connecting pool; no connection is attempted here.
    ///
    /// # Errors
    /// Returns [`SessionStoreError::Url`] when `url` cannot be parsed.
    pub fn new(url: &str, connect_timeout: Duration) -> Result<Self, SessionStoreError> {
        let manager = RedisConnectionManager::new(url)?;
        let inner = Pool::builder()
            .max_size(2)
            .connection_timeout(connect_timeout)
            .build_unchecked(manager);
        Ok(Self { inner })
    }
}

#[async_trait]
impl DependencyProbe for RedisPool {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> Result<(), CustomError> {
        let mut conn = self
            .inner
            .get()
            .await
            .map_err(|err| ErrorKind::ServiceUnavailable.new().with_cause(err))?;
        let _pong: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|err| ErrorKind::ServiceUnavailable.new().with_cause(err))?;
        Ok(())
    }
}
