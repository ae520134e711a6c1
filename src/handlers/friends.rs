use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    models::friendship::{RequestId, RequestResolution},
    models::session::AuthContext,
    models::user::UserId,
    state::AppState,
};

/// The request payload for sending a friend request.
#[derive(Deserialize, Debug)]
pub struct FriendRequestPayload {
    pub friend_id: UserId,
}

/// The request payload for resolving a friend request.
#[derive(Deserialize, Debug)]
pub struct UpdateRequestPayload {
    pub status: String,
}

#[derive(Serialize)]
pub struct FriendRequestCreated {
    pub request_id: RequestId,
    pub message: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Lists the caller's friends.
pub async fn list_friends(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> Result<Response> {
    let friends = state.relationships.list_friends(ctx.user_id).await?;
    Ok((StatusCode::OK, Json(friends)).into_response())
}

/// Sends a friend request from the caller.
pub async fn send_request(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(payload): Json<FriendRequestPayload>,
) -> Result<Response> {
    let request_id = state
        .relationships
        .send_request(ctx.user_id, payload.friend_id)
        .await?;

    let response = FriendRequestCreated {
        request_id,
        message: "Friend request sent successfully".to_string(),
    };
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// Lists pending requests addressed to the caller.
pub async fn list_incoming(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> Result<Response> {
    let requests = state.relationships.list_incoming(ctx.user_id).await?;
    Ok((StatusCode::OK, Json(requests)).into_response())
}

/// Accepts or rejects a pending request addressed to the caller.
pub async fn update_request(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(request_id): Path<RequestId>,
    Json(payload): Json<UpdateRequestPayload>,
) -> Result<Response> {
    let resolution: RequestResolution = payload.status.parse()?;
    state
        .relationships
        .update_status(request_id, ctx.user_id, resolution)
        .await?;

    let response = MessageResponse {
        message: "Friend request status updated successfully".to_string(),
    };
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Ends a friendship with the caller.
pub async fn delete_friend(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(friend_id): Path<UserId>,
) -> Result<Response> {
    state
        .relationships
        .delete_friendship(ctx.user_id, friend_id)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
