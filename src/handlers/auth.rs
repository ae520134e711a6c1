use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use tower_cookies::cookie::time::Duration;
use tower_cookies::{Cookie, Cookies};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    error::Result,
    middleware_layer::auth::{extract_session_token, SESSION_COOKIE},
    models::session::{AuthContext, IssuedSession},
    models::user::UserId,
    state::AppState,
    validation::auth::{validate_username, validated},
};

/// The request payload for user registration.
#[derive(Deserialize, Validate, Zeroize, ZeroizeOnDrop)]
pub struct RegisterRequest {
    #[garde(length(min = 3, max = 32), custom(validate_username))]
    pub username: String,
    #[garde(email, length(max = 255))]
    pub email: String,
    #[garde(length(min = 8, max = 128))]
    pub password: String,
    #[garde(matches(password))]
    pub password_confirm: String,
}

/// The request payload for user login. `login` is a username or an email.
#[derive(Deserialize, Validate, Zeroize, ZeroizeOnDrop)]
pub struct LoginRequest {
    #[garde(length(min = 1, max = 255))]
    pub login: String,
    #[garde(length(min = 1, max = 128))]
    pub password: String,
}

/// The request payload for changing a user's password.
#[derive(Deserialize, Validate, Zeroize, ZeroizeOnDrop)]
pub struct ChangePasswordRequest {
    #[garde(length(min = 1, max = 128))]
    pub old_password: String,
    #[garde(length(min = 8, max = 128))]
    pub new_password: String,
}

/// The response payload for authentication-related requests.
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
}

/// The response payload for requests that issue a session.
#[derive(Serialize)]
pub struct SessionResponse {
    pub user_id: UserId,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// The response payload for a successful registration.
#[derive(Serialize)]
pub struct RegisterResponse {
    pub user_id: UserId,
    pub message: String,
}

/// Creates a secure cookie with the given name, value, and max age.
fn create_secure_cookie(name: &str, value: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(name.to_string(), value);

    cookie.set_http_only(true);
    if secure {
        cookie.set_secure(true);
    }

    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    cookie.set_max_age(Duration::seconds(max_age_secs));
    cookie.set_path("/");

    cookie
}

fn set_session_cookie(state: &AppState, cookies: &Cookies, issued: &IssuedSession) {
    let max_age = (issued.expires_at - Utc::now()).num_seconds().max(0);
    cookies.add(create_secure_cookie(
        SESSION_COOKIE,
        issued.token.as_str().to_string(),
        max_age,
        state.config.secure_cookies,
    ));
}

fn clear_session_cookie(cookies: &Cookies) {
    let mut session_cookie = Cookie::new(SESSION_COOKIE, "");
    session_cookie.set_max_age(Duration::seconds(0));
    session_cookie.set_path("/");
    cookies.remove(session_cookie);
}

fn session_response(issued: &IssuedSession) -> SessionResponse {
    SessionResponse {
        user_id: issued.user_id,
        token: issued.token.as_str().to_string(),
        expires_at: issued.expires_at,
    }
}

/// Handles user registration.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response> {
    tracing::info!("📝 Register attempt: {}", payload.username);
    let payload = validated(payload)?;

    let user_id = state
        .auth
        .register(&payload.username, &payload.email, &payload.password)
        .await?;

    let response = RegisterResponse {
        user_id,
        message: "Registration successful".to_string(),
    };

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// Handles user login.
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Response> {
    tracing::info!("🔐 Login attempt: {}", payload.login);
    let payload = validated(payload)?;

    let previous = extract_session_token(&cookies, &headers);
    let issued = state
        .auth
        .login(&payload.login, &payload.password, previous.as_ref())
        .await?;

    set_session_cookie(&state, &cookies, &issued);
    tracing::info!("✅ Session cookie added for user: {}", issued.user_id);

    Ok((StatusCode::OK, Json(session_response(&issued))).into_response())
}

/// Handles user logout.
pub async fn logout(
    State(state): State<AppState>,
    ctx: AuthContext,
    cookies: Cookies,
) -> Result<Response> {
    tracing::info!("👋 Logout for user: {}", ctx.user_id);

    state.auth.logout(&ctx.token).await?;
    clear_session_cookie(&cookies);

    let response = AuthResponse {
        success: true,
        message: "Logout successful".to_string(),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Handles session renewal.
pub async fn renew(
    State(state): State<AppState>,
    ctx: AuthContext,
    cookies: Cookies,
) -> Result<Response> {
    let issued = state.auth.renew(&ctx.token).await?;
    set_session_cookie(&state, &cookies, &issued);

    Ok((StatusCode::OK, Json(session_response(&issued))).into_response())
}

/// Handles changing a user's password.
pub async fn change_password(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Response> {
    let payload = validated(payload)?;

    state
        .auth
        .change_password(ctx.user_id, &payload.old_password, &payload.new_password)
        .await?;

    let response = AuthResponse {
        success: true,
        message: "Password changed successfully".to_string(),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}
