use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::graph::{CommunityId, Graph, GraphEdge, GraphNode, SharedPair};
use crate::models::user::UserId;
use crate::repositories::subscription::SubscriptionStore;

/// Counts shared subscribers for every pair of communities.
///
/// Groups subscriptions by user and only pairs communities within a user's
/// own list, so the work follows the subscription table rather than the
/// cross product of all users and communities. Pairs come out canonical
/// (`source < target`) and sorted.
pub fn count_shared_pairs(
    subscriptions: impl IntoIterator<Item = (UserId, CommunityId)>,
) -> Vec<SharedPair> {
    let mut by_user: HashMap<UserId, Vec<CommunityId>> = HashMap::new();
    for (user_id, community_id) in subscriptions {
        by_user.entry(user_id).or_default().push(community_id);
    }

    let mut counts: BTreeMap<(CommunityId, CommunityId), i64> = BTreeMap::new();
    for mut communities in by_user.into_values() {
        communities.sort_unstable();
        communities.dedup();
        for (i, source) in communities.iter().enumerate() {
            for target in &communities[i + 1..] {
                *counts.entry((*source, *target)).or_default() += 1;
            }
        }
    }

    counts
        .into_iter()
        .map(|((source, target), shared)| SharedPair {
            source,
            target,
            shared,
        })
        .collect()
}

/// Builds the community co-subscription graph on demand.
pub struct GraphAggregator {
    subscriptions: Arc<dyn SubscriptionStore>,
}

impl GraphAggregator {
    /// Creates a new `GraphAggregator`.
    pub fn new(subscriptions: Arc<dyn SubscriptionStore>) -> Self {
        Self { subscriptions }
    }

    /// Computes nodes and edges from one snapshot of the subscription data.
    pub async fn build_graph(&self) -> Result<Graph> {
        let snapshot = self.subscriptions.snapshot().await?;

        let mut nodes = snapshot.nodes;
        nodes.sort_by_key(|n| n.id);
        let by_id: HashMap<CommunityId, &GraphNode> = nodes.iter().map(|n| (n.id, n)).collect();

        let mut edges = Vec::with_capacity(snapshot.pairs.len());
        for pair in &snapshot.pairs {
            let (Some(source), Some(target)) = (by_id.get(&pair.source), by_id.get(&pair.target))
            else {
                return Err(AppError::Internal(format!(
                    "Edge {}-{} references a community missing from the snapshot",
                    pair.source, pair.target
                )));
            };
            if pair.source >= pair.target || pair.shared > source.size.min(target.size) {
                return Err(AppError::Internal(format!(
                    "Inconsistent edge {}-{} with {} shared subscribers",
                    pair.source, pair.target, pair.shared
                )));
            }
            edges.push(GraphEdge {
                source: pair.source,
                target: pair.target,
                shared: pair.shared,
                source_name: source.name.clone(),
                target_name: target.name.clone(),
                source_size: source.size,
                target_size: target.size,
            });
        }
        edges.sort_by_key(|e| (e.source, e.target));

        tracing::debug!(
            "📊 Graph built with {} nodes and {} edges",
            nodes.len(),
            edges.len()
        );
        Ok(Graph { nodes, edges })
    }

    /// Creates a community.
    pub async fn create_community(
        &self,
        name: &str,
        description: &str,
        created_by: UserId,
    ) -> Result<CommunityId> {
        let id = self
            .subscriptions
            .create_community(name, description, created_by)
            .await?;
        tracing::info!("✅ Community {} created by user {}", id, created_by);
        Ok(id)
    }

    /// Subscribes a user to a community.
    pub async fn subscribe(&self, user_id: UserId, community_id: CommunityId) -> Result<()> {
        self.subscriptions.subscribe(user_id, community_id).await?;
        tracing::info!("User {} subscribed to community {}", user_id, community_id);
        Ok(())
    }

    /// Removes a user's subscription. `NotFound` when there was none.
    pub async fn unsubscribe(&self, user_id: UserId, community_id: CommunityId) -> Result<()> {
        if self.subscriptions.unsubscribe(user_id, community_id).await? == 0 {
            return Err(AppError::NotFound);
        }
        tracing::info!("User {} unsubscribed from community {}", user_id, community_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::NewUser;
    use crate::repositories::memory::MemoryDatabase;
    use crate::repositories::user::IdentityStore;

    async fn users(db: &MemoryDatabase, names: &[&str]) -> Vec<UserId> {
        let mut ids = Vec::new();
        for name in names {
            ids.push(
                db.create(NewUser {
                    username: name.to_string(),
                    email: format!("{}@example.com", name),
                    password_hash: vec![0; 32],
                    salt: vec![0; 32],
                })
                .await
                .unwrap(),
            );
        }
        ids
    }

    #[test]
    fn pairs_are_canonical_and_counted() {
        let (u1, u2, u3) = (UserId(1), UserId(2), UserId(3));
        let (c1, c2, c3) = (CommunityId(1), CommunityId(2), CommunityId(3));
        let pairs = count_shared_pairs([
            (u1, c2),
            (u1, c1),
            (u2, c1),
            (u2, c2),
            (u2, c3),
            (u3, c3),
        ]);

        assert_eq!(
            pairs,
            vec![
                SharedPair { source: c1, target: c2, shared: 2 },
                SharedPair { source: c1, target: c3, shared: 1 },
                SharedPair { source: c2, target: c3, shared: 1 },
            ]
        );
    }

    #[test]
    fn single_subscriptions_make_no_pairs() {
        assert!(count_shared_pairs([(UserId(1), CommunityId(1))]).is_empty());
        assert!(count_shared_pairs(std::iter::empty()).is_empty());
    }

    #[tokio::test]
    async fn two_communities_one_shared_subscriber() {
        let db = MemoryDatabase::new();
        let ids = users(&db, &["u1", "u2", "u3"]).await;
        let graph = GraphAggregator::new(Arc::new(db.clone()));

        let c1 = graph.create_community("C1", "", ids[0]).await.unwrap();
        let c2 = graph.create_community("C2", "", ids[0]).await.unwrap();
        let empty = graph.create_community("Empty", "", ids[0]).await.unwrap();
        graph.subscribe(ids[0], c1).await.unwrap();
        graph.subscribe(ids[1], c1).await.unwrap();
        graph.subscribe(ids[1], c2).await.unwrap();
        graph.subscribe(ids[2], c2).await.unwrap();

        let built = graph.build_graph().await.unwrap();

        assert_eq!(built.nodes.len(), 3);
        assert_eq!(built.nodes[0], GraphNode { id: c1, name: "C1".into(), size: 2 });
        assert_eq!(built.nodes[1], GraphNode { id: c2, name: "C2".into(), size: 2 });
        assert_eq!(built.nodes[2], GraphNode { id: empty, name: "Empty".into(), size: 0 });

        assert_eq!(built.edges.len(), 1);
        let edge = &built.edges[0];
        assert_eq!((edge.source, edge.target, edge.shared), (c1, c2, 1));
        assert_eq!((edge.source_name.as_str(), edge.target_name.as_str()), ("C1", "C2"));
        assert_eq!((edge.source_size, edge.target_size), (2, 2));
    }

    #[tokio::test]
    async fn subscription_errors() {
        let db = MemoryDatabase::new();
        let ids = users(&db, &["u1"]).await;
        let graph = GraphAggregator::new(Arc::new(db));
        let c1 = graph.create_community("C1", "", ids[0]).await.unwrap();

        graph.subscribe(ids[0], c1).await.unwrap();
        assert!(matches!(graph.subscribe(ids[0], c1).await, Err(AppError::Conflict(_))));
        assert!(matches!(
            graph.subscribe(ids[0], CommunityId(77)).await,
            Err(AppError::NotFound)
        ));

        graph.unsubscribe(ids[0], c1).await.unwrap();
        assert!(matches!(graph.unsubscribe(ids[0], c1).await, Err(AppError::NotFound)));
        assert!(graph.build_graph().await.unwrap().edges.is_empty());
    }
}
