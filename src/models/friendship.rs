use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio_postgres::Row;

use crate::error::AppError;
use crate::models::user::UserId;

/// The identifier of a friendship edge, used to address pending requests.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSql, FromSql,
)]
#[serde(transparent)]
#[postgres(transparent)]
pub struct RequestId(pub i64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The persisted status of a friendship edge.
///
/// A rejected request has no status of its own: the row is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendshipStatus {
    Pending,
    Accepted,
}

impl FriendshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FriendshipStatus::Pending => "pending",
            FriendshipStatus::Accepted => "accepted",
        }
    }
}

/// What the recipient of a pending request decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestResolution {
    Accepted,
    Rejected,
}

impl FromStr for RequestResolution {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accepted" => Ok(RequestResolution::Accepted),
            "rejected" => Ok(RequestResolution::Rejected),
            other => Err(AppError::InvalidArgument(format!(
                "Invalid status '{}', expected 'accepted' or 'rejected'",
                other
            ))),
        }
    }
}

/// A friendship edge as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Friendship {
    pub id: RequestId,
    pub requester_id: UserId,
    pub target_id: UserId,
    pub status: FriendshipStatus,
}

/// Another user as it appears in friend lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendSummary {
    pub id: UserId,
    pub username: String,
}

impl From<&Row> for FriendSummary {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            username: row.get("username"),
        }
    }
}

/// A pending request addressed to the current user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingRequest {
    pub request_id: RequestId,
    pub sender: FriendSummary,
}

impl From<&Row> for IncomingRequest {
    fn from(row: &Row) -> Self {
        Self {
            request_id: row.get("request_id"),
            sender: FriendSummary {
                id: row.get("sender_id"),
                username: row.get("sender_username"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_parses_known_values() {
        assert_eq!(
            "accepted".parse::<RequestResolution>().unwrap(),
            RequestResolution::Accepted
        );
        assert_eq!(
            "rejected".parse::<RequestResolution>().unwrap(),
            RequestResolution::Rejected
        );
    }

    #[test]
    fn resolution_rejects_pending_and_unknown() {
        assert!(matches!(
            "pending".parse::<RequestResolution>(),
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            "blocked".parse::<RequestResolution>(),
            Err(AppError::InvalidArgument(_))
        ));
    }
}
