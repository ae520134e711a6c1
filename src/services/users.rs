use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::session::AuthContext;
use crate::models::user::{ProfileUpdate, PublicProfile, UserId, UserProfile};
use crate::repositories::user::IdentityStore;

/// Profile reads and owner-only profile edits.
pub struct ProfileService {
    identities: Arc<dyn IdentityStore>,
}

impl ProfileService {
    /// Creates a new `ProfileService`.
    pub fn new(identities: Arc<dyn IdentityStore>) -> Self {
        Self { identities }
    }

    /// The public profile of any user.
    pub async fn public_profile(&self, user_id: UserId) -> Result<PublicProfile> {
        Ok(self.identities.find_profile(user_id).await?.into())
    }

    /// The caller's own profile, email included.
    pub async fn own_profile(&self, ctx: &AuthContext) -> Result<UserProfile> {
        self.identities.find_profile(ctx.user_id).await
    }

    /// Updates a profile. Only its owner may do so.
    pub async fn update_profile(
        &self,
        ctx: &AuthContext,
        user_id: UserId,
        changes: ProfileUpdate,
    ) -> Result<UserProfile> {
        if ctx.user_id != user_id {
            tracing::warn!("User {} tried to edit profile of {}", ctx.user_id, user_id);
            return Err(AppError::Forbidden);
        }
        let profile = self.identities.update_profile(user_id, changes).await?;
        tracing::info!("✅ Profile updated for user: {}", user_id);
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::SessionToken;
    use crate::models::user::NewUser;
    use crate::repositories::memory::MemoryDatabase;

    async fn user(db: &MemoryDatabase, name: &str) -> AuthContext {
        let user_id = db
            .create(NewUser {
                username: name.to_string(),
                email: format!("{}@example.com", name),
                password_hash: vec![0; 32],
                salt: vec![0; 32],
            })
            .await
            .unwrap();
        AuthContext {
            user_id,
            token: SessionToken::new(format!("token-{}", name)),
        }
    }

    #[tokio::test]
    async fn owner_can_update_profile() {
        let db = MemoryDatabase::new();
        let alice = user(&db, "alice").await;
        let profiles = ProfileService::new(Arc::new(db));

        let updated = profiles
            .update_profile(
                &alice,
                alice.user_id,
                ProfileUpdate {
                    bio: Some("hello".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.bio, "hello");
        assert_eq!(updated.username, "alice");

        let public = profiles.public_profile(alice.user_id).await.unwrap();
        assert_eq!(public.bio, "hello");
    }

    #[tokio::test]
    async fn others_are_forbidden() {
        let db = MemoryDatabase::new();
        let alice = user(&db, "alice").await;
        let bob = user(&db, "bob").await;
        let profiles = ProfileService::new(Arc::new(db));

        assert!(matches!(
            profiles
                .update_profile(&bob, alice.user_id, ProfileUpdate::default())
                .await,
            Err(AppError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn taken_username_conflicts() {
        let db = MemoryDatabase::new();
        let alice = user(&db, "alice").await;
        user(&db, "bob").await;
        let profiles = ProfileService::new(Arc::new(db));

        assert!(matches!(
            profiles
                .update_profile(
                    &alice,
                    alice.user_id,
                    ProfileUpdate {
                        username: Some("bob".into()),
                        ..Default::default()
                    },
                )
                .await,
            Err(AppError::Conflict(_))
        ));
    }
}
