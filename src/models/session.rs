use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::user::UserId;

/// An opaque session credential.
///
/// `Debug` only shows a short prefix so tokens do not leak into logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wraps a raw token value, e.g. one read back from a cookie.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw token value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A short prefix that is safe to log.
    pub fn redacted(&self) -> &str {
        self.0.get(..8).unwrap_or("")
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken({}…)", self.redacted())
    }
}

/// Represents a user session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// The ID of the user this session belongs to.
    pub user_id: UserId,
    /// The timestamp when the session was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the session expires.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session is past its expiry.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// A freshly issued session, returned by login and renewal.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: SessionToken,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

/// The caller identity of an authenticated request.
///
/// Only the authorization middleware creates one, after it has resolved a
/// live session for `token`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: UserId,
    pub token: SessionToken,
}
