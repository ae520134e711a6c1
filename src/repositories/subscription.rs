use async_trait::async_trait;
use deadpool_postgres::Pool;
use std::time::Duration;
use tokio_postgres::IsolationLevel;

use crate::{
    db::with_timeout,
    error::{AppError, Result},
    models::graph::{CommunityId, GraphNode, GraphSnapshot, SharedPair},
    models::user::UserId,
};

/// Persists communities and who is subscribed to them.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Creates a community owned by `created_by`.
    async fn create_community(&self, name: &str, description: &str, created_by: UserId) -> Result<CommunityId>;

    /// Subscribes a user. Fails with `Conflict` when already subscribed and
    /// `NotFound` when the community does not exist.
    async fn subscribe(&self, user_id: UserId, community_id: CommunityId) -> Result<()>;

    /// Removes a subscription. Returns rows affected.
    async fn unsubscribe(&self, user_id: UserId, community_id: CommunityId) -> Result<u64>;

    /// Community sizes and shared-subscriber counts, read from a single
    /// consistent view.
    async fn snapshot(&self) -> Result<GraphSnapshot>;
}

/// `SubscriptionStore` backed by `communities` and `community_subscriptions`.
#[derive(Clone)]
pub struct PgSubscriptionStore {
    pool: Pool,
    timeout: Duration,
}

impl PgSubscriptionStore {
    /// Creates a new `PgSubscriptionStore`.
    pub fn new(pool: Pool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn create_community(&self, name: &str, description: &str, created_by: UserId) -> Result<CommunityId> {
        with_timeout(self.timeout, async {
            let client = self.pool.get().await?;
            let stmt = client
                .prepare_cached(
                    r#"
                    INSERT INTO communities (name, description, created_by)
                    VALUES ($1, $2, $3)
                    RETURNING id
                    "#,
                )
                .await?;
            let row = client
                .query_one(&stmt, &[&name, &description, &created_by])
                .await?;
            Ok(row.get("id"))
        })
        .await
    }

    async fn subscribe(&self, user_id: UserId, community_id: CommunityId) -> Result<()> {
        with_timeout(self.timeout, async {
            let client = self.pool.get().await?;
            let stmt = client
                .prepare_cached(
                    "INSERT INTO community_subscriptions (user_id, community_id) VALUES ($1, $2)",
                )
                .await?;
            client
                .execute(&stmt, &[&user_id, &community_id])
                .await
                .map_err(|e| match AppError::from(e) {
                    AppError::Conflict(_) => {
                        AppError::Conflict("Already subscribed to this community".to_string())
                    }
                    other => other,
                })?;
            Ok(())
        })
        .await
    }

    async fn unsubscribe(&self, user_id: UserId, community_id: CommunityId) -> Result<u64> {
        with_timeout(self.timeout, async {
            let client = self.pool.get().await?;
            let stmt = client
                .prepare_cached(
                    "DELETE FROM community_subscriptions WHERE user_id = $1 AND community_id = $2",
                )
                .await?;
            Ok(client.execute(&stmt, &[&user_id, &community_id]).await?)
        })
        .await
    }

    async fn snapshot(&self) -> Result<GraphSnapshot> {
        with_timeout(self.timeout, async {
            let mut client = self.pool.get().await?;
            // Both reads see the same snapshot, so no pair count can exceed
            // the size reported for either of its communities.
            let tx = client
                .build_transaction()
                .isolation_level(IsolationLevel::RepeatableRead)
                .read_only(true)
                .start()
                .await?;

            let nodes_stmt = tx
                .prepare_cached(
                    r#"
                    SELECT c.id, c.name, COUNT(s.user_id) AS size
                    FROM communities c
                    LEFT JOIN community_subscriptions s ON c.id = s.community_id
                    GROUP BY c.id, c.name
                    ORDER BY c.id
                    "#,
                )
                .await?;
            let nodes: Vec<GraphNode> = tx
                .query(&nodes_stmt, &[])
                .await?
                .iter()
                .map(GraphNode::from)
                .collect();

            let pairs_stmt = tx
                .prepare_cached(
                    r#"
                    SELECT s1.community_id AS source, s2.community_id AS target, COUNT(*) AS shared
                    FROM community_subscriptions s1
                    JOIN community_subscriptions s2
                      ON s1.user_id = s2.user_id AND s1.community_id < s2.community_id
                    GROUP BY s1.community_id, s2.community_id
                    ORDER BY s1.community_id, s2.community_id
                    "#,
                )
                .await?;
            let pairs: Vec<SharedPair> = tx
                .query(&pairs_stmt, &[])
                .await?
                .iter()
                .map(SharedPair::from)
                .collect();

            tx.commit().await?;
            Ok(GraphSnapshot { nodes, pairs })
        })
        .await
    }
}
