//! In-process implementations of the store traits.
//!
//! Each operation takes a single lock for its whole duration, which gives the
//! same all-or-nothing behaviour the Postgres constraints give the real
//! stores. Used by the test suites and handy for local experiments.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::{
    error::{AppError, Result},
    models::friendship::{FriendSummary, Friendship, FriendshipStatus, IncomingRequest, RequestId},
    models::graph::{CommunityId, GraphNode, GraphSnapshot},
    models::session::{Session, SessionToken},
    models::user::{NewUser, ProfileUpdate, StoredCredential, UserId, UserProfile},
    repositories::{
        friendship::FriendshipStore, session::SessionStore, subscription::SubscriptionStore,
        user::IdentityStore,
    },
    services::graph::count_shared_pairs,
};

struct UserRecord {
    profile: UserProfile,
    credential: StoredCredential,
}

struct CommunityRecord {
    name: String,
}

#[derive(Default)]
struct Tables {
    next_user_id: i64,
    next_request_id: i64,
    next_community_id: i64,
    users: BTreeMap<UserId, UserRecord>,
    friendships: BTreeMap<RequestId, Friendship>,
    communities: BTreeMap<CommunityId, CommunityRecord>,
    subscriptions: BTreeSet<(UserId, CommunityId)>,
}

impl Tables {
    fn login_taken(&self, value: &str, except: Option<UserId>) -> bool {
        self.users.values().any(|u| {
            Some(u.profile.id) != except && (u.profile.username == value || u.profile.email == value)
        })
    }

    fn username(&self, id: UserId) -> String {
        self.users
            .get(&id)
            .map(|u| u.profile.username.clone())
            .unwrap_or_default()
    }
}

/// An in-memory relational store implementing `IdentityStore`,
/// `FriendshipStore` and `SubscriptionStore` over shared tables.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryDatabase {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryDatabase {
    async fn exists(&self, login: &str) -> Result<bool> {
        Ok(self.tables.lock().await.login_taken(login, None))
    }

    async fn user_exists(&self, user_id: UserId) -> Result<bool> {
        Ok(self.tables.lock().await.users.contains_key(&user_id))
    }

    async fn create(&self, user: NewUser) -> Result<UserId> {
        let mut tables = self.tables.lock().await;
        let taken = tables.users.values().any(|u| {
            u.profile.username == user.username || u.profile.email == user.email
        });
        if taken {
            return Err(AppError::Conflict("Username or email already taken".to_string()));
        }

        tables.next_user_id += 1;
        let id = UserId(tables.next_user_id);
        tables.users.insert(
            id,
            UserRecord {
                profile: UserProfile {
                    id,
                    username: user.username,
                    email: user.email,
                    bio: String::new(),
                    avatar_url: String::new(),
                    created_at: Utc::now(),
                },
                credential: StoredCredential {
                    user_id: id,
                    password_hash: user.password_hash,
                    salt: user.salt,
                },
            },
        );
        Ok(id)
    }

    async fn find_credential(&self, login: &str) -> Result<StoredCredential> {
        let tables = self.tables.lock().await;
        tables
            .users
            .values()
            .find(|u| u.profile.username == login)
            .or_else(|| tables.users.values().find(|u| u.profile.email == login))
            .map(|u| u.credential.clone())
            .ok_or(AppError::NotFound)
    }

    async fn find_credential_by_id(&self, user_id: UserId) -> Result<StoredCredential> {
        let tables = self.tables.lock().await;
        tables
            .users
            .get(&user_id)
            .map(|u| u.credential.clone())
            .ok_or(AppError::NotFound)
    }

    async fn update_credential(&self, user_id: UserId, password_hash: Vec<u8>, salt: Vec<u8>) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let user = tables.users.get_mut(&user_id).ok_or(AppError::NotFound)?;
        user.credential.password_hash = password_hash;
        user.credential.salt = salt;
        Ok(())
    }

    async fn find_profile(&self, user_id: UserId) -> Result<UserProfile> {
        let tables = self.tables.lock().await;
        tables
            .users
            .get(&user_id)
            .map(|u| u.profile.clone())
            .ok_or(AppError::NotFound)
    }

    async fn update_profile(&self, user_id: UserId, changes: ProfileUpdate) -> Result<UserProfile> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&user_id) {
            return Err(AppError::NotFound);
        }
        for value in [&changes.username, &changes.email].into_iter().flatten() {
            if tables.login_taken(value, Some(user_id)) {
                return Err(AppError::Conflict("Username or email already taken".to_string()));
            }
        }

        let user = tables.users.get_mut(&user_id).ok_or(AppError::NotFound)?;
        let profile = &mut user.profile;
        if let Some(username) = changes.username {
            profile.username = username;
        }
        if let Some(email) = changes.email {
            profile.email = email;
        }
        if let Some(bio) = changes.bio {
            profile.bio = bio;
        }
        if let Some(avatar_url) = changes.avatar_url {
            profile.avatar_url = avatar_url;
        }
        Ok(profile.clone())
    }
}

#[async_trait]
impl FriendshipStore for MemoryDatabase {
    async fn insert_pending(&self, requester: UserId, target: UserId) -> Result<Option<RequestId>> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&requester) || !tables.users.contains_key(&target) {
            return Err(AppError::NotFound);
        }
        let linked = tables.friendships.values().any(|f| {
            (f.requester_id == requester && f.target_id == target)
                || (f.requester_id == target && f.target_id == requester)
        });
        if linked {
            return Ok(None);
        }

        tables.next_request_id += 1;
        let id = RequestId(tables.next_request_id);
        tables.friendships.insert(
            id,
            Friendship {
                id,
                requester_id: requester,
                target_id: target,
                status: FriendshipStatus::Pending,
            },
        );
        Ok(Some(id))
    }

    async fn list_accepted(&self, user_id: UserId) -> Result<Vec<FriendSummary>> {
        let tables = self.tables.lock().await;
        let mut friends: Vec<FriendSummary> = tables
            .friendships
            .values()
            .filter(|f| f.status == FriendshipStatus::Accepted)
            .filter_map(|f| {
                if f.requester_id == user_id {
                    Some(f.target_id)
                } else if f.target_id == user_id {
                    Some(f.requester_id)
                } else {
                    None
                }
            })
            .map(|id| FriendSummary {
                id,
                username: tables.username(id),
            })
            .collect();
        friends.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(friends)
    }

    async fn delete_accepted(&self, a: UserId, b: UserId) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.friendships.len();
        tables.friendships.retain(|_, f| {
            let pair = (f.requester_id == a && f.target_id == b)
                || (f.requester_id == b && f.target_id == a);
            !(pair && f.status == FriendshipStatus::Accepted)
        });
        Ok((before - tables.friendships.len()) as u64)
    }

    async fn list_incoming(&self, target: UserId) -> Result<Vec<IncomingRequest>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .friendships
            .values()
            .filter(|f| f.target_id == target && f.status == FriendshipStatus::Pending)
            .map(|f| IncomingRequest {
                request_id: f.id,
                sender: FriendSummary {
                    id: f.requester_id,
                    username: tables.username(f.requester_id),
                },
            })
            .collect())
    }

    async fn accept(&self, request_id: RequestId, target: UserId) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        match tables.friendships.get_mut(&request_id) {
            Some(f) if f.target_id == target && f.status == FriendshipStatus::Pending => {
                f.status = FriendshipStatus::Accepted;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn reject(&self, request_id: RequestId, target: UserId) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let matches = tables
            .friendships
            .get(&request_id)
            .is_some_and(|f| f.target_id == target && f.status == FriendshipStatus::Pending);
        if matches {
            tables.friendships.remove(&request_id);
            Ok(1)
        } else {
            Ok(0)
        }
    }
}

#[async_trait]
impl SubscriptionStore for MemoryDatabase {
    async fn create_community(&self, name: &str, _description: &str, created_by: UserId) -> Result<CommunityId> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&created_by) {
            return Err(AppError::NotFound);
        }
        tables.next_community_id += 1;
        let id = CommunityId(tables.next_community_id);
        tables.communities.insert(
            id,
            CommunityRecord {
                name: name.to_string(),
            },
        );
        Ok(id)
    }

    async fn subscribe(&self, user_id: UserId, community_id: CommunityId) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&user_id) || !tables.communities.contains_key(&community_id) {
            return Err(AppError::NotFound);
        }
        if !tables.subscriptions.insert((user_id, community_id)) {
            return Err(AppError::Conflict(
                "Already subscribed to this community".to_string(),
            ));
        }
        Ok(())
    }

    async fn unsubscribe(&self, user_id: UserId, community_id: CommunityId) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        Ok(tables.subscriptions.remove(&(user_id, community_id)) as u64)
    }

    async fn snapshot(&self) -> Result<GraphSnapshot> {
        let tables = self.tables.lock().await;

        let mut sizes: HashMap<CommunityId, i64> = HashMap::new();
        for (_, community_id) in &tables.subscriptions {
            *sizes.entry(*community_id).or_default() += 1;
        }

        let nodes = tables
            .communities
            .iter()
            .map(|(id, c)| GraphNode {
                id: *id,
                name: c.name.clone(),
                size: sizes.get(id).copied().unwrap_or(0),
            })
            .collect();
        let pairs = count_shared_pairs(tables.subscriptions.iter().copied());

        Ok(GraphSnapshot { nodes, pairs })
    }
}

/// An in-memory `SessionStore` that honours expiry on read.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<Mutex<HashMap<SessionToken, Session>>>,
}

impl MemorySessionStore {
    /// Creates an empty session store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of stored sessions, expired ones included.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, token: &SessionToken) -> Result<Option<Session>> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(token) {
            Some(session) if session.is_expired() => {
                sessions.remove(token);
                Ok(None)
            }
            Some(session) => Ok(Some(session.clone())),
            None => Ok(None),
        }
    }

    async fn put(&self, token: &SessionToken, session: &Session, _ttl: Duration) -> Result<()> {
        self.sessions
            .lock()
            .await
            .insert(token.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, token: &SessionToken) -> Result<()> {
        self.sessions.lock().await.remove(token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: format!("{}@example.com", name),
            password_hash: vec![1; 32],
            salt: vec![2; 32],
        }
    }

    #[tokio::test]
    async fn duplicate_username_or_email_conflicts() {
        let db = MemoryDatabase::new();
        db.create(new_user("alice")).await.unwrap();

        let mut same_email = new_user("alice2");
        same_email.email = "alice@example.com".to_string();
        assert!(matches!(db.create(same_email).await, Err(AppError::Conflict(_))));
        assert!(matches!(db.create(new_user("alice")).await, Err(AppError::Conflict(_))));
        assert!(db.exists("alice").await.unwrap());
        assert!(db.exists("alice@example.com").await.unwrap());
        assert!(!db.exists("bob").await.unwrap());
    }

    #[tokio::test]
    async fn pair_allows_only_one_edge() {
        let db = MemoryDatabase::new();
        let a = db.create(new_user("a")).await.unwrap();
        let b = db.create(new_user("b")).await.unwrap();

        assert!(db.insert_pending(a, b).await.unwrap().is_some());
        assert!(db.insert_pending(a, b).await.unwrap().is_none());
        assert!(db.insert_pending(b, a).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_sessions_read_as_absent() {
        let store = MemorySessionStore::new();
        let token = SessionToken::new("expired-token");
        let session = Session {
            user_id: UserId(1),
            created_at: Utc::now() - chrono::Duration::hours(2),
            expires_at: Utc::now() - chrono::Duration::hours(1),
        };
        store.put(&token, &session, Duration::from_secs(1)).await.unwrap();

        assert!(store.get(&token).await.unwrap().is_none());
        assert_eq!(store.len().await, 0);
    }
}
