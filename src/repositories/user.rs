use async_trait::async_trait;
use deadpool_postgres::Pool;
use std::time::Duration;

use crate::{
    db::with_timeout,
    error::{AppError, Result},
    models::user::{NewUser, ProfileUpdate, StoredCredential, UserId, UserProfile},
};

/// Persists user identities and their credentials.
///
/// Implementations must enforce username and email uniqueness in the write
/// itself, not through a prior `exists` call.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Whether a user with this username or email exists.
    async fn exists(&self, login: &str) -> Result<bool>;

    /// Whether a user with this id exists.
    async fn user_exists(&self, user_id: UserId) -> Result<bool>;

    /// Inserts a user. Fails with `Conflict` on a duplicate username or email.
    async fn create(&self, user: NewUser) -> Result<UserId>;

    /// Looks up the credential for a username or email.
    async fn find_credential(&self, login: &str) -> Result<StoredCredential>;

    /// Looks up the credential of a known user.
    async fn find_credential_by_id(&self, user_id: UserId) -> Result<StoredCredential>;

    /// Replaces the `(hash, salt)` pair of a user.
    async fn update_credential(&self, user_id: UserId, password_hash: Vec<u8>, salt: Vec<u8>) -> Result<()>;

    /// Loads a user's profile.
    async fn find_profile(&self, user_id: UserId) -> Result<UserProfile>;

    /// Applies profile changes and returns the updated profile.
    async fn update_profile(&self, user_id: UserId, changes: ProfileUpdate) -> Result<UserProfile>;
}

const PROFILE_COLUMNS: &str = "id, username, email, bio, avatar_url, created_at";

fn duplicate_identity(e: AppError) -> AppError {
    match e {
        AppError::Conflict(_) => AppError::Conflict("Username or email already taken".to_string()),
        other => other,
    }
}

/// `IdentityStore` backed by the `users` table.
#[derive(Clone)]
pub struct PgIdentityStore {
    pool: Pool,
    timeout: Duration,
}

impl PgIdentityStore {
    /// Creates a new `PgIdentityStore`.
    pub fn new(pool: Pool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn exists(&self, login: &str) -> Result<bool> {
        with_timeout(self.timeout, async {
            let client = self.pool.get().await?;
            let stmt = client
                .prepare_cached(
                    "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 OR email = $1)",
                )
                .await?;
            let row = client.query_one(&stmt, &[&login]).await?;
            Ok(row.get(0))
        })
        .await
    }

    async fn user_exists(&self, user_id: UserId) -> Result<bool> {
        with_timeout(self.timeout, async {
            let client = self.pool.get().await?;
            let stmt = client
                .prepare_cached("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                .await?;
            let row = client.query_one(&stmt, &[&user_id]).await?;
            Ok(row.get(0))
        })
        .await
    }

    async fn create(&self, user: NewUser) -> Result<UserId> {
        with_timeout(self.timeout, async {
            let client = self.pool.get().await?;
            let stmt = client
                .prepare_cached(
                    r#"
                    INSERT INTO users (username, email, password_hash, salt)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id
                    "#,
                )
                .await?;
            let row = client
                .query_one(
                    &stmt,
                    &[&user.username, &user.email, &user.password_hash, &user.salt],
                )
                .await
                .map_err(|e| duplicate_identity(AppError::from(e)))?;
            Ok(row.get("id"))
        })
        .await
    }

    async fn find_credential(&self, login: &str) -> Result<StoredCredential> {
        with_timeout(self.timeout, async {
            let client = self.pool.get().await?;
            let stmt = client
                .prepare_cached(
                    r#"
                    SELECT id, password_hash, salt
                    FROM users
                    WHERE username = $1 OR email = $1
                    ORDER BY (username = $1) DESC
                    LIMIT 1
                    "#,
                )
                .await?;
            let row = client
                .query_opt(&stmt, &[&login])
                .await?
                .ok_or(AppError::NotFound)?;
            Ok(StoredCredential::from(&row))
        })
        .await
    }

    async fn find_credential_by_id(&self, user_id: UserId) -> Result<StoredCredential> {
        with_timeout(self.timeout, async {
            let client = self.pool.get().await?;
            let stmt = client
                .prepare_cached("SELECT id, password_hash, salt FROM users WHERE id = $1")
                .await?;
            let row = client
                .query_opt(&stmt, &[&user_id])
                .await?
                .ok_or(AppError::NotFound)?;
            Ok(StoredCredential::from(&row))
        })
        .await
    }

    async fn update_credential(&self, user_id: UserId, password_hash: Vec<u8>, salt: Vec<u8>) -> Result<()> {
        with_timeout(self.timeout, async {
            let client = self.pool.get().await?;
            let stmt = client
                .prepare_cached("UPDATE users SET password_hash = $1, salt = $2 WHERE id = $3")
                .await?;
            let updated = client
                .execute(&stmt, &[&password_hash, &salt, &user_id])
                .await?;
            if updated == 0 {
                return Err(AppError::NotFound);
            }
            Ok(())
        })
        .await
    }

    async fn find_profile(&self, user_id: UserId) -> Result<UserProfile> {
        with_timeout(self.timeout, async {
            let client = self.pool.get().await?;
            let stmt = client
                .prepare_cached(&format!("SELECT {} FROM users WHERE id = $1", PROFILE_COLUMNS))
                .await?;
            let row = client
                .query_opt(&stmt, &[&user_id])
                .await?
                .ok_or(AppError::NotFound)?;
            Ok(UserProfile::from(&row))
        })
        .await
    }

    async fn update_profile(&self, user_id: UserId, changes: ProfileUpdate) -> Result<UserProfile> {
        with_timeout(self.timeout, async {
            let client = self.pool.get().await?;
            let stmt = client
                .prepare_cached(&format!(
                    r#"
                    UPDATE users
                    SET
                        username = COALESCE($2, username),
                        email = COALESCE($3, email),
                        bio = COALESCE($4, bio),
                        avatar_url = COALESCE($5, avatar_url)
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    PROFILE_COLUMNS
                ))
                .await?;
            let row = client
                .query_opt(
                    &stmt,
                    &[
                        &user_id,
                        &changes.username,
                        &changes.email,
                        &changes.bio,
                        &changes.avatar_url,
                    ],
                )
                .await
                .map_err(|e| duplicate_identity(AppError::from(e)))?
                .ok_or(AppError::NotFound)?;
            Ok(UserProfile::from(&row))
        })
        .await
    }
}
