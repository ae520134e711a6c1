use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::friendship::{FriendSummary, IncomingRequest, RequestId, RequestResolution};
use crate::models::user::UserId;
use crate::repositories::friendship::FriendshipStore;
use crate::repositories::user::IdentityStore;

/// The friendship request state machine.
///
/// `none -> pending -> accepted`, with rejection and unfriending both
/// deleting the edge. All transitions are single conditional writes in the
/// store; nothing here reads first and writes second.
pub struct RelationshipEngine {
    identities: Arc<dyn IdentityStore>,
    friendships: Arc<dyn FriendshipStore>,
}

impl RelationshipEngine {
    /// Creates a new `RelationshipEngine`.
    pub fn new(identities: Arc<dyn IdentityStore>, friendships: Arc<dyn FriendshipStore>) -> Self {
        Self {
            identities,
            friendships,
        }
    }

    /// Sends a friend request from `sender` to `target`.
    pub async fn send_request(&self, sender: UserId, target: UserId) -> Result<RequestId> {
        if sender == target {
            return Err(AppError::InvalidArgument(
                "Cannot send a friend request to yourself".to_string(),
            ));
        }
        if !self.identities.user_exists(target).await? {
            return Err(AppError::NotFound);
        }

        let request_id = self
            .friendships
            .insert_pending(sender, target)
            .await?
            .ok_or_else(|| {
                AppError::Conflict(
                    "A friend request or friendship already exists between these users"
                        .to_string(),
                )
            })?;

        tracing::info!("🤝 Friend request {} sent: {} -> {}", request_id, sender, target);
        Ok(request_id)
    }

    /// Everyone `user_id` is friends with, whoever sent the original request.
    pub async fn list_friends(&self, user_id: UserId) -> Result<Vec<FriendSummary>> {
        self.friendships.list_accepted(user_id).await
    }

    /// Ends the friendship between two users.
    pub async fn delete_friendship(&self, user: UserId, friend: UserId) -> Result<()> {
        if self.friendships.delete_accepted(user, friend).await? == 0 {
            return Err(AppError::NotFound);
        }
        tracing::info!("Friendship removed between {} and {}", user, friend);
        Ok(())
    }

    /// Pending requests addressed to `target`.
    pub async fn list_incoming(&self, target: UserId) -> Result<Vec<IncomingRequest>> {
        self.friendships.list_incoming(target).await
    }

    /// Accepts or rejects a pending request on behalf of its recipient.
    ///
    /// The recipient check is part of the write, so a wrong actor, a wrong
    /// id and an already-resolved request all come back as `NotFound`.
    pub async fn update_status(
        &self,
        request_id: RequestId,
        acting_user: UserId,
        resolution: RequestResolution,
    ) -> Result<()> {
        let affected = match resolution {
            RequestResolution::Accepted => self.friendships.accept(request_id, acting_user).await?,
            RequestResolution::Rejected => self.friendships.reject(request_id, acting_user).await?,
        };

        if affected == 0 {
            tracing::debug!(
                "No pending request {} addressed to user {}",
                request_id,
                acting_user
            );
            return Err(AppError::NotFound);
        }

        tracing::info!(
            "Friend request {} {:?} by user {}",
            request_id,
            resolution,
            acting_user
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::NewUser;
    use crate::repositories::memory::MemoryDatabase;

    async fn setup(names: &[&str]) -> (RelationshipEngine, Vec<UserId>) {
        let db = MemoryDatabase::new();
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
        let db = Arc::new(db);
        (RelationshipEngine::new(db.clone(), db), ids)
    }

    #[tokio::test]
    async fn self_request_is_invalid() {
        let (engine, ids) = setup(&["a"]).await;
        assert!(matches!(
            engine.send_request(ids[0], ids[0]).await,
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn request_to_unknown_user_is_not_found() {
        let (engine, ids) = setup(&["a"]).await;
        assert!(matches!(
            engine.send_request(ids[0], UserId(999)).await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn reverse_request_conflicts() {
        let (engine, ids) = setup(&["a", "b"]).await;
        engine.send_request(ids[0], ids[1]).await.unwrap();
        assert!(matches!(
            engine.send_request(ids[1], ids[0]).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn acceptance_is_symmetric() {
        let (engine, ids) = setup(&["a", "b"]).await;
        let (a, b) = (ids[0], ids[1]);
        let request = engine.send_request(a, b).await.unwrap();

        let incoming = engine.list_incoming(b).await.unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].request_id, request);
        assert_eq!(incoming[0].sender.username, "a");
        assert!(engine.list_incoming(a).await.unwrap().is_empty());

        engine
            .update_status(request, b, RequestResolution::Accepted)
            .await
            .unwrap();

        assert!(engine.list_friends(a).await.unwrap().iter().any(|f| f.id == b));
        assert!(engine.list_friends(b).await.unwrap().iter().any(|f| f.id == a));
        assert!(engine.list_incoming(b).await.unwrap().is_empty());
        assert!(matches!(
            engine.send_request(b, a).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn only_the_recipient_can_resolve() {
        let (engine, ids) = setup(&["a", "b", "c"]).await;
        let request = engine.send_request(ids[0], ids[1]).await.unwrap();

        for actor in [ids[0], ids[2]] {
            assert!(matches!(
                engine
                    .update_status(request, actor, RequestResolution::Accepted)
                    .await,
                Err(AppError::NotFound)
            ));
        }
        assert!(matches!(
            engine
                .update_status(RequestId(4242), ids[1], RequestResolution::Accepted)
                .await,
            Err(AppError::NotFound)
        ));
        assert!(engine.list_friends(ids[0]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejection_allows_a_new_request() {
        let (engine, ids) = setup(&["a", "b"]).await;
        let request = engine.send_request(ids[0], ids[1]).await.unwrap();
        engine
            .update_status(request, ids[1], RequestResolution::Rejected)
            .await
            .unwrap();

        assert!(engine.list_incoming(ids[1]).await.unwrap().is_empty());
        assert!(engine.list_friends(ids[0]).await.unwrap().is_empty());
        engine.send_request(ids[1], ids[0]).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_accepts_apply_once() {
        let (engine, ids) = setup(&["a", "b"]).await;
        let engine = Arc::new(engine);
        let request = engine.send_request(ids[0], ids[1]).await.unwrap();

        let first = {
            let engine = engine.clone();
            let b = ids[1];
            tokio::spawn(async move {
                engine.update_status(request, b, RequestResolution::Accepted).await
            })
        };
        let second = {
            let engine = engine.clone();
            let b = ids[1];
            tokio::spawn(async move {
                engine.update_status(request, b, RequestResolution::Accepted).await
            })
        };

        let results = [first.await.unwrap(), second.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(AppError::NotFound)))
                .count(),
            1
        );
        assert_eq!(engine.list_friends(ids[0]).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_for_a_pair_have_one_winner() {
        let (engine, ids) = setup(&["a", "b"]).await;
        let engine = Arc::new(engine);

        let mut handles = Vec::new();
        for i in 0..10 {
            let engine = engine.clone();
            let (from, to) = if i % 2 == 0 { (ids[0], ids[1]) } else { (ids[1], ids[0]) };
            handles.push(tokio::spawn(async move { engine.send_request(from, to).await }));
        }

        let mut sent = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => sent += 1,
                Err(AppError::Conflict(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(sent, 1);
    }

    #[tokio::test]
    async fn delete_friendship_works_once_from_either_side() {
        let (engine, ids) = setup(&["a", "b"]).await;
        let (a, b) = (ids[0], ids[1]);
        let request = engine.send_request(a, b).await.unwrap();
        engine
            .update_status(request, b, RequestResolution::Accepted)
            .await
            .unwrap();

        engine.delete_friendship(b, a).await.unwrap();
        assert!(engine.list_friends(a).await.unwrap().is_empty());
        assert!(matches!(
            engine.delete_friendship(a, b).await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn pending_requests_cannot_be_deleted_as_friendships() {
        let (engine, ids) = setup(&["a", "b"]).await;
        engine.send_request(ids[0], ids[1]).await.unwrap();
        assert!(matches!(
            engine.delete_friendship(ids[0], ids[1]).await,
            Err(AppError::NotFound)
        ));
        assert_eq!(engine.list_incoming(ids[1]).await.unwrap().len(), 1);
    }
}
