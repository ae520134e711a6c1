use redis::aio::ConnectionManager;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::repositories::{
    friendship::{FriendshipStore, PgFriendshipStore},
    session::{RedisSessionStore, SessionStore},
    subscription::{PgSubscriptionStore, SubscriptionStore},
    user::{IdentityStore, PgIdentityStore},
};
use crate::services::{
    auth::SessionAuthenticator, graph::GraphAggregator, relationships::RelationshipEngine,
    users::ProfileService,
};

/// The store handles the services are wired from.
#[derive(Clone)]
pub struct Stores {
    pub identities: Arc<dyn IdentityStore>,
    pub friendships: Arc<dyn FriendshipStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub sessions: Arc<dyn SessionStore>,
}

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Config,
    /// Credential checks and the session lifecycle.
    pub auth: Arc<SessionAuthenticator>,
    /// The friendship state machine.
    pub relationships: Arc<RelationshipEngine>,
    /// The co-subscription graph and subscriptions.
    pub graph: Arc<GraphAggregator>,
    /// Profile reads and edits.
    pub profiles: Arc<ProfileService>,
}

impl AppState {
    /// Connects to PostgreSQL and Redis and builds the state on top of them.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = crate::db::create_pool(&config.database_url, config.storage_timeout)?;
        crate::db::run_migrations(&db).await?;
        tracing::info!("✅ PostgreSQL Pool initialized with deadpool-postgres");

        let redis_client = redis::Client::open(config.redis_url.as_str())?;
        let redis = crate::db::with_timeout(config.storage_timeout, async {
            ConnectionManager::new(redis_client).await.map_err(AppError::from)
        })
        .await?;
        tracing::info!("✅ Redis Connection Manager initialized");

        let stores = Stores {
            identities: Arc::new(PgIdentityStore::new(db.clone(), config.storage_timeout)),
            friendships: Arc::new(PgFriendshipStore::new(db.clone(), config.storage_timeout)),
            subscriptions: Arc::new(PgSubscriptionStore::new(db, config.storage_timeout)),
            sessions: Arc::new(RedisSessionStore::new(redis, config.storage_timeout)),
        };

        Self::from_stores(config, stores)
    }

    /// Builds the state from already constructed stores.
    pub fn from_stores(config: &Config, stores: Stores) -> Result<Self> {
        let auth = SessionAuthenticator::new(
            stores.identities.clone(),
            stores.sessions.clone(),
            config.session_ttl,
        )?;

        Ok(AppState {
            config: config.clone(),
            auth: Arc::new(auth),
            relationships: Arc::new(RelationshipEngine::new(
                stores.identities.clone(),
                stores.friendships,
            )),
            graph: Arc::new(GraphAggregator::new(stores.subscriptions)),
            profiles: Arc::new(ProfileService::new(stores.identities)),
        })
    }
}
