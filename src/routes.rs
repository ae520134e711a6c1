use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_cookies::CookieManagerLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    error::{AppError, Result},
    handlers, middleware_layer,
    state::AppState,
};

/// Builds the application router.
///
/// Login and registration are rate limited per client address, so the
/// router must be served with `into_make_service_with_connect_info`.
pub fn build_router(state: AppState) -> Result<Router> {
    let origin = state
        .config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|_| AppError::Internal(format!("invalid CORS origin {}", state.config.cors_origin)))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::COOKIE,
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(86400));

    let credential_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(2)
            .burst_size(20)
            .use_headers()
            .finish()
            .ok_or_else(|| AppError::Internal("invalid rate limit configuration".to_string()))?,
    );

    let credential_routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .layer(tower_governor::GovernorLayer::new(credential_governor_conf))
        .with_state(state.clone());

    let public_routes = Router::new()
        .route("/api/users/{id}", get(handlers::users::get_user))
        .route("/api/graph", get(handlers::communities::get_graph))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/renew", post(handlers::auth::renew))
        .route(
            "/api/auth/change-password",
            post(handlers::auth::change_password),
        )
        .route("/api/me", get(handlers::users::me))
        .route("/api/users/{id}", put(handlers::users::update_user))
        .route("/api/friends", get(handlers::friends::list_friends))
        .route("/api/friends/{id}", delete(handlers::friends::delete_friend))
        .route(
            "/api/friends/requests",
            post(handlers::friends::send_request),
        )
        .route(
            "/api/friends/requests/incoming",
            get(handlers::friends::list_incoming),
        )
        .route(
            "/api/friends/requests/{id}",
            put(handlers::friends::update_request),
        )
        .route(
            "/api/communities",
            post(handlers::communities::create_community),
        )
        .route(
            "/api/communities/{id}/subscription",
            post(handlers::communities::subscribe).delete(handlers::communities::unsubscribe),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth,
        ))
        .with_state(state);

    let app = Router::new()
        .merge(credential_routes)
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
        .layer(cors);

    Ok(app)
}
