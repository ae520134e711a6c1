use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::crypto::{password, token};
use crate::error::{AppError, Result};
use crate::models::session::{IssuedSession, Session, SessionToken};
use crate::models::user::{NewUser, UserId};
use crate::repositories::session::SessionStore;
use crate::repositories::user::IdentityStore;

/// Verifies credentials and manages the session lifecycle.
pub struct SessionAuthenticator {
    identities: Arc<dyn IdentityStore>,
    sessions: Arc<dyn SessionStore>,
    session_ttl: Duration,
    /// Salt used to burn a hash when the login is unknown, so both failure
    /// paths cost the same.
    decoy_salt: Vec<u8>,
}

impl SessionAuthenticator {
    /// Creates a new `SessionAuthenticator`.
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        sessions: Arc<dyn SessionStore>,
        session_ttl: Duration,
    ) -> Result<Self> {
        Ok(Self {
            identities,
            sessions,
            session_ttl,
            decoy_salt: password::generate_salt()?,
        })
    }

    /// Creates a new user.
    ///
    /// Uniqueness is enforced by the identity store's insert, so two
    /// concurrent registrations of the same username end with exactly one
    /// `Conflict`.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<UserId> {
        tracing::debug!("🔐 Creating user: {}", username);
        let salt = password::generate_salt()?;
        let password_hash = password::hash_password(password, &salt);

        let user_id = self
            .identities
            .create(NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
                salt,
            })
            .await?;

        tracing::info!("✅ User created with ID: {}", user_id);
        Ok(user_id)
    }

    /// Checks a login (username or email) and password and issues a session.
    ///
    /// `previous` is the token the client presented with the login request,
    /// if any. It is destroyed before the new one is issued so a token
    /// planted before authentication never becomes authenticated.
    pub async fn login(
        &self,
        login: &str,
        password: &str,
        previous: Option<&SessionToken>,
    ) -> Result<IssuedSession> {
        tracing::debug!("🔐 Authenticating: {}", login);

        let user_id = match self.identities.find_credential(login).await {
            Ok(credential) => {
                if !password::verify_password(password, &credential.salt, &credential.password_hash) {
                    return Err(AppError::InvalidCredentials);
                }
                credential.user_id
            }
            Err(AppError::NotFound) => {
                let _ = password::verify_password(password, &self.decoy_salt, &[0u8; password::DIGEST_LEN]);
                return Err(AppError::InvalidCredentials);
            }
            Err(e) => return Err(e),
        };

        if let Some(previous) = previous {
            self.sessions.delete(previous).await?;
            tracing::debug!("Rotated pre-login session {:?}", previous);
        }

        let issued = self.issue(user_id).await?;
        tracing::info!("✅ User authenticated: {}", user_id);
        Ok(issued)
    }

    /// Destroys a session. Unknown tokens are ignored.
    pub async fn logout(&self, token: &SessionToken) -> Result<()> {
        self.sessions.delete(token).await?;
        tracing::info!("✅ Session {:?} destroyed", token);
        Ok(())
    }

    /// Replaces a live session with a new token for the same user.
    ///
    /// The new session gets a full lifetime. Fails with `NotFound` when the
    /// old token is not live.
    pub async fn renew(&self, token: &SessionToken) -> Result<IssuedSession> {
        let session = self.sessions.get(token).await?.ok_or(AppError::NotFound)?;
        self.sessions.delete(token).await?;
        let issued = self.issue(session.user_id).await?;
        tracing::info!("✅ Session renewed for user: {}", session.user_id);
        Ok(issued)
    }

    /// The live session for `token`, if any.
    pub async fn resolve(&self, token: &SessionToken) -> Result<Option<Session>> {
        self.sessions.get(token).await
    }

    /// Changes a user's password after checking the current one.
    pub async fn change_password(
        &self,
        user_id: UserId,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        tracing::info!("🔑 Changing password for user: {}", user_id);

        let credential = self.identities.find_credential_by_id(user_id).await?;
        if !password::verify_password(old_password, &credential.salt, &credential.password_hash) {
            return Err(AppError::InvalidCredentials);
        }

        let salt = password::generate_salt()?;
        let password_hash = password::hash_password(new_password, &salt);
        self.identities
            .update_credential(user_id, password_hash, salt)
            .await?;

        tracing::info!("✅ Password changed for user: {}", user_id);
        Ok(())
    }

    async fn issue(&self, user_id: UserId) -> Result<IssuedSession> {
        let token = token::generate_session_token()?;
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.session_ttl)
            .map_err(|e| AppError::Internal(format!("Session TTL out of range: {}", e)))?;
        let session = Session {
            user_id,
            created_at: now,
            expires_at: now + ttl,
        };

        self.sessions.put(&token, &session, self.session_ttl).await?;
        tracing::debug!("🔑 Issued session {:?} for user: {}", token, user_id);

        Ok(IssuedSession {
            token,
            user_id,
            expires_at: session.expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::memory::{MemoryDatabase, MemorySessionStore};

    fn authenticator() -> (SessionAuthenticator, MemorySessionStore) {
        let sessions = MemorySessionStore::new();
        let auth = SessionAuthenticator::new(
            Arc::new(MemoryDatabase::new()),
            Arc::new(sessions.clone()),
            Duration::from_secs(24 * 3600),
        )
        .unwrap();
        (auth, sessions)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registration_has_one_winner() {
        let (auth, _) = authenticator();
        let auth = Arc::new(auth);

        let mut handles = Vec::new();
        for i in 0..8 {
            let auth = auth.clone();
            handles.push(tokio::spawn(async move {
                auth.register("alice", &format!("alice{}@example.com", i), "password123")
                    .await
            }));
        }

        let mut created = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(AppError::Conflict(_)) => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(conflicts, 7);
    }

    #[tokio::test]
    async fn login_accepts_username_or_email() {
        let (auth, _) = authenticator();
        let id = auth.register("bob", "bob@example.com", "password123").await.unwrap();

        assert_eq!(auth.login("bob", "password123", None).await.unwrap().user_id, id);
        assert_eq!(
            auth.login("bob@example.com", "password123", None).await.unwrap().user_id,
            id
        );
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let (auth, _) = authenticator();
        auth.register("carol", "carol@example.com", "password123").await.unwrap();

        let wrong_password = auth.login("carol", "password124", None).await.unwrap_err();
        let unknown_user = auth.login("mallory", "password123", None).await.unwrap_err();

        assert!(matches!(wrong_password, AppError::InvalidCredentials));
        assert!(matches!(unknown_user, AppError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[tokio::test]
    async fn login_rotates_the_presented_token() {
        let (auth, _) = authenticator();
        auth.register("dave", "dave@example.com", "password123").await.unwrap();

        let first = auth.login("dave", "password123", None).await.unwrap();
        let second = auth
            .login("dave", "password123", Some(&first.token))
            .await
            .unwrap();

        assert_ne!(first.token, second.token);
        assert!(auth.resolve(&first.token).await.unwrap().is_none());
        assert_eq!(
            auth.resolve(&second.token).await.unwrap().unwrap().user_id,
            second.user_id
        );
    }

    #[tokio::test]
    async fn failed_login_keeps_the_presented_token() {
        let (auth, _) = authenticator();
        auth.register("erin", "erin@example.com", "password123").await.unwrap();
        let live = auth.login("erin", "password123", None).await.unwrap();

        assert!(auth.login("erin", "nope-nope", Some(&live.token)).await.is_err());
        assert!(auth.resolve(&live.token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn users_may_hold_several_sessions() {
        let (auth, sessions) = authenticator();
        auth.register("frank", "frank@example.com", "password123").await.unwrap();

        let laptop = auth.login("frank", "password123", None).await.unwrap();
        let phone = auth.login("frank", "password123", None).await.unwrap();

        assert_ne!(laptop.token, phone.token);
        assert!(auth.resolve(&laptop.token).await.unwrap().is_some());
        assert!(auth.resolve(&phone.token).await.unwrap().is_some());
        assert_eq!(sessions.len().await, 2);
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let (auth, _) = authenticator();
        auth.register("grace", "grace@example.com", "password123").await.unwrap();
        let issued = auth.login("grace", "password123", None).await.unwrap();

        auth.logout(&issued.token).await.unwrap();
        auth.logout(&issued.token).await.unwrap();
        assert!(auth.resolve(&issued.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn renew_swaps_the_token_for_the_same_user() {
        let (auth, _) = authenticator();
        let id = auth.register("heidi", "heidi@example.com", "password123").await.unwrap();
        let issued = auth.login("heidi", "password123", None).await.unwrap();

        let renewed = auth.renew(&issued.token).await.unwrap();
        assert_ne!(renewed.token, issued.token);
        assert_eq!(renewed.user_id, id);
        assert!(auth.resolve(&issued.token).await.unwrap().is_none());
        assert!(matches!(auth.renew(&issued.token).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn change_password_requires_the_old_one() {
        let (auth, _) = authenticator();
        let id = auth.register("ivan", "ivan@example.com", "password123").await.unwrap();

        assert!(matches!(
            auth.change_password(id, "not-the-password", "newpassword1").await,
            Err(AppError::InvalidCredentials)
        ));
        auth.change_password(id, "password123", "newpassword1").await.unwrap();

        assert!(auth.login("ivan", "password123", None).await.is_err());
        assert!(auth.login("ivan", "newpassword1", None).await.is_ok());
    }
}
