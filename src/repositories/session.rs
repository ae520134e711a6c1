use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use std::time::Duration;

use crate::{
    db::with_timeout,
    error::{AppError, Result},
    models::session::{Session, SessionToken},
};

/// An expiring key-value store for sessions.
///
/// Operations on one token are atomic; operations on different tokens are
/// independent.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The live session for `token`, if any. Expired sessions read as absent.
    async fn get(&self, token: &SessionToken) -> Result<Option<Session>>;

    /// Stores a session under `token` for `ttl`.
    async fn put(&self, token: &SessionToken, session: &Session, ttl: Duration) -> Result<()>;

    /// Removes a session. Removing an absent token is not an error.
    async fn delete(&self, token: &SessionToken) -> Result<()>;
}

fn session_key(token: &SessionToken) -> String {
    format!("session:{}", token.as_str())
}

/// `SessionStore` backed by Redis keys with an expiry.
#[derive(Clone)]
pub struct RedisSessionStore {
    redis: ConnectionManager,
    timeout: Duration,
}

impl RedisSessionStore {
    /// Creates a new `RedisSessionStore`.
    pub fn new(redis: ConnectionManager, timeout: Duration) -> Self {
        Self { redis, timeout }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, token: &SessionToken) -> Result<Option<Session>> {
        let mut redis = self.redis.clone();
        let key = session_key(token);

        let session_json: Option<String> =
            with_timeout(self.timeout, async { Ok(redis.get(&key).await?) }).await?;

        let Some(session_json) = session_json else {
            return Ok(None);
        };

        let session: Session = match sonic_rs::from_str(&session_json) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("❌ Invalid session JSON for {:?}: {}", token, e);
                return Ok(None);
            }
        };

        // Redis expires the key on its own; this covers clock skew between
        // the TTL and the recorded expiry.
        if session.is_expired() {
            tracing::debug!("Session {:?} expired for user: {}", token, session.user_id);
            let _: () = with_timeout(self.timeout, async { Ok(redis.del(&key).await?) })
                .await
                .unwrap_or(());
            return Ok(None);
        }

        Ok(Some(session))
    }

    async fn put(&self, token: &SessionToken, session: &Session, ttl: Duration) -> Result<()> {
        let mut redis = self.redis.clone();
        let key = session_key(token);
        let session_json = sonic_rs::to_string(session)
            .map_err(|e| AppError::Internal(format!("Session serialization failed: {}", e)))?;

        with_timeout(self.timeout, async {
            let _: () = redis.set_ex(&key, &session_json, ttl.as_secs().max(1)).await?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, token: &SessionToken) -> Result<()> {
        let mut redis = self.redis.clone();
        let key = session_key(token);

        with_timeout(self.timeout, async {
            let _: () = redis.del(&key).await?;
            Ok(())
        })
        .await
    }
}
