use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_postgres::Row;

/// The identifier of a community.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSql, FromSql,
)]
#[serde(transparent)]
#[postgres(transparent)]
pub struct CommunityId(pub i64);

impl fmt::Display for CommunityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A community and its current number of subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: CommunityId,
    pub name: String,
    pub size: i64,
}

impl From<&Row> for GraphNode {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            size: row.get("size"),
        }
    }
}

/// The number of users subscribed to both `source` and `target`.
///
/// Always canonical: `source < target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedPair {
    pub source: CommunityId,
    pub target: CommunityId,
    pub shared: i64,
}

impl From<&Row> for SharedPair {
    fn from(row: &Row) -> Self {
        Self {
            source: row.get("source"),
            target: row.get("target"),
            shared: row.get("shared"),
        }
    }
}

/// Nodes and pair counts read from one point-in-time view of the
/// subscription data.
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub pairs: Vec<SharedPair>,
}

/// An edge between two communities sharing subscribers, with both
/// endpoints denormalized for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: CommunityId,
    pub target: CommunityId,
    pub shared: i64,
    pub source_name: String,
    pub target_name: String,
    pub source_size: i64,
    pub target_size: i64,
}

/// The co-subscription graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}
