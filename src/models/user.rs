use chrono::{DateTime, Utc};
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_postgres::Row;

/// The immutable identifier of a user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSql, FromSql,
)]
#[serde(transparent)]
#[postgres(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user that is about to be written for the first time.
pub struct NewUser {
    /// The user's username, unique across all users.
    pub username: String,
    /// The user's email address, unique across all users.
    pub email: String,
    /// The password digest.
    pub password_hash: Vec<u8>,
    /// The salt the digest was computed with.
    pub salt: Vec<u8>,
}

/// The `(hash, salt)` pair stored for a user.
///
/// Deliberately has no `Debug` impl so it cannot end up in a log line.
#[derive(Clone)]
pub struct StoredCredential {
    /// The user the credential belongs to.
    pub user_id: UserId,
    /// The password digest.
    pub password_hash: Vec<u8>,
    /// The salt the digest was computed with.
    pub salt: Vec<u8>,
}

impl From<&Row> for StoredCredential {
    fn from(row: &Row) -> Self {
        Self {
            user_id: row.get("id"),
            password_hash: row.get("password_hash"),
            salt: row.get("salt"),
        }
    }
}

/// The full profile of a user, as seen by its owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub bio: String,
    pub avatar_url: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Row> for UserProfile {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            bio: row.get("bio"),
            avatar_url: row.get("avatar_url"),
            created_at: row.get("created_at"),
        }
    }
}

/// The public part of a profile. Leaves out the email address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicProfile {
    pub id: UserId,
    pub username: String,
    pub bio: String,
    pub avatar_url: String,
}

impl From<UserProfile> for PublicProfile {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: profile.id,
            username: profile.username,
            bio: profile.bio,
            avatar_url: profile.avatar_url,
        }
    }
}

/// Changes to a profile. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}
