use async_trait::async_trait;
use deadpool_postgres::Pool;
use std::time::Duration;

use crate::{
    db::with_timeout,
    error::Result,
    models::friendship::{FriendSummary, IncomingRequest, RequestId},
    models::user::UserId,
};

/// Persists friendship edges.
///
/// Every method is a single conditional statement, so the outcome reported
/// back (inserted or not, rows affected) is exactly what happened under
/// concurrent callers.
#[async_trait]
pub trait FriendshipStore: Send + Sync {
    /// Inserts a pending edge unless any edge already links the unordered
    /// pair. Returns `None` when one does.
    async fn insert_pending(&self, requester: UserId, target: UserId) -> Result<Option<RequestId>>;

    /// Users linked to `user_id` by an accepted edge, in either direction.
    async fn list_accepted(&self, user_id: UserId) -> Result<Vec<FriendSummary>>;

    /// Deletes the accepted edge between two users. Returns rows affected.
    async fn delete_accepted(&self, a: UserId, b: UserId) -> Result<u64>;

    /// Pending edges addressed to `target`, with the sender's identity.
    async fn list_incoming(&self, target: UserId) -> Result<Vec<IncomingRequest>>;

    /// Flips a pending edge addressed to `target` to accepted. Returns rows affected.
    async fn accept(&self, request_id: RequestId, target: UserId) -> Result<u64>;

    /// Deletes a pending edge addressed to `target`. Returns rows affected.
    async fn reject(&self, request_id: RequestId, target: UserId) -> Result<u64>;
}

/// `FriendshipStore` backed by the `friendships` table.
#[derive(Clone)]
pub struct PgFriendshipStore {
    pool: Pool,
    timeout: Duration,
}

impl PgFriendshipStore {
    /// Creates a new `PgFriendshipStore`.
    pub fn new(pool: Pool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl FriendshipStore for PgFriendshipStore {
    async fn insert_pending(&self, requester: UserId, target: UserId) -> Result<Option<RequestId>> {
        with_timeout(self.timeout, async {
            let client = self.pool.get().await?;
            // Any unique violation on the unordered-pair index turns into "no row".
            let stmt = client
                .prepare_cached(
                    r#"
                    INSERT INTO friendships (user_id, friend_id, status)
                    VALUES ($1, $2, 'pending')
                    ON CONFLICT DO NOTHING
                    RETURNING id
                    "#,
                )
                .await?;
            let row = client.query_opt(&stmt, &[&requester, &target]).await?;
            Ok(row.map(|r| r.get("id")))
        })
        .await
    }

    async fn list_accepted(&self, user_id: UserId) -> Result<Vec<FriendSummary>> {
        with_timeout(self.timeout, async {
            let client = self.pool.get().await?;
            let stmt = client
                .prepare_cached(
                    r#"
                    SELECT u.id, u.username
                    FROM users u
                    JOIN (
                        SELECT friend_id AS id FROM friendships
                        WHERE user_id = $1 AND status = 'accepted'
                        UNION
                        SELECT user_id AS id FROM friendships
                        WHERE friend_id = $1 AND status = 'accepted'
                    ) AS friends ON u.id = friends.id
                    ORDER BY u.username
                    "#,
                )
                .await?;
            let rows = client.query(&stmt, &[&user_id]).await?;
            Ok(rows.iter().map(FriendSummary::from).collect())
        })
        .await
    }

    async fn delete_accepted(&self, a: UserId, b: UserId) -> Result<u64> {
        with_timeout(self.timeout, async {
            let client = self.pool.get().await?;
            let stmt = client
                .prepare_cached(
                    r#"
                    DELETE FROM friendships
                    WHERE status = 'accepted'
                      AND ((user_id = $1 AND friend_id = $2) OR (user_id = $2 AND friend_id = $1))
                    "#,
                )
                .await?;
            Ok(client.execute(&stmt, &[&a, &b]).await?)
        })
        .await
    }

    async fn list_incoming(&self, target: UserId) -> Result<Vec<IncomingRequest>> {
        with_timeout(self.timeout, async {
            let client = self.pool.get().await?;
            let stmt = client
                .prepare_cached(
                    r#"
                    SELECT f.id AS request_id, u.id AS sender_id, u.username AS sender_username
                    FROM friendships f
                    JOIN users u ON f.user_id = u.id
                    WHERE f.friend_id = $1 AND f.status = 'pending'
                    ORDER BY f.id
                    "#,
                )
                .await?;
            let rows = client.query(&stmt, &[&target]).await?;
            Ok(rows.iter().map(IncomingRequest::from).collect())
        })
        .await
    }

    async fn accept(&self, request_id: RequestId, target: UserId) -> Result<u64> {
        with_timeout(self.timeout, async {
            let client = self.pool.get().await?;
            let stmt = client
                .prepare_cached(
                    r#"
                    UPDATE friendships
                    SET status = 'accepted'
                    WHERE id = $1 AND friend_id = $2 AND status = 'pending'
                    "#,
                )
                .await?;
            Ok(client.execute(&stmt, &[&request_id, &target]).await?)
        })
        .await
    }

    async fn reject(&self, request_id: RequestId, target: UserId) -> Result<u64> {
        with_timeout(self.timeout, async {
            let client = self.pool.get().await?;
            let stmt = client
                .prepare_cached(
                    r#"
                    DELETE FROM friendships
                    WHERE id = $1 AND friend_id = $2 AND status = 'pending'
                    "#,
                )
                .await?;
            Ok(client.execute(&stmt, &[&request_id, &target]).await?)
        })
        .await
    }
}
