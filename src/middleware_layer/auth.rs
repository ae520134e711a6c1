use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request},
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{
    error::AppError,
    models::session::{AuthContext, SessionToken},
    state::AppState,
};

/// The name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session_id";

/// Extracts the session token from the cookie, falling back to an
/// `Authorization: Bearer` header.
pub fn extract_session_token(cookies: &Cookies, headers: &http::HeaderMap) -> Option<SessionToken> {
    if let Some(cookie) = cookies.get(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(SessionToken::new(cookie.value()));
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(SessionToken::new)
}

/// A middleware that requires a valid session to be present.
///
/// Without a live session the request is answered with 401 and the handler
/// never runs. Otherwise an `AuthContext` is attached to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    tracing::debug!("🔐 Checking authentication...");

    let token = extract_session_token(&cookies, request.headers()).ok_or_else(|| {
        tracing::warn!("❌ No session token on {}", request.uri().path());
        AppError::Unauthorized
    })?;

    let session = state.auth.resolve(&token).await?.ok_or_else(|| {
        tracing::warn!("❌ Unknown or expired session {:?}", token);
        AppError::Unauthorized
    })?;

    tracing::debug!("✅ User authenticated: {}", session.user_id);

    request.extensions_mut().insert(AuthContext {
        user_id: session.user_id,
        token,
    });

    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}
