use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    models::graph::CommunityId,
    models::session::AuthContext,
    state::AppState,
    validation::auth::validated,
};

/// The request payload for creating a community.
#[derive(Deserialize, Validate, Debug)]
pub struct CreateCommunityRequest {
    #[garde(length(min = 1, max = 255))]
    pub name: String,
    #[garde(length(max = 2000))]
    #[serde(default)]
    pub description: String,
}

#[derive(Serialize)]
pub struct CommunityCreated {
    pub id: CommunityId,
}

/// Returns the co-subscription graph.
pub async fn get_graph(State(state): State<AppState>) -> Result<Response> {
    let graph = state.graph.build_graph().await?;
    Ok((StatusCode::OK, Json(graph)).into_response())
}

/// Creates a community owned by the caller.
pub async fn create_community(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(payload): Json<CreateCommunityRequest>,
) -> Result<Response> {
    let payload = validated(payload)?;
    let id = state
        .graph
        .create_community(payload.name.trim(), &payload.description, ctx.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(CommunityCreated { id })).into_response())
}

/// Subscribes the caller to a community.
pub async fn subscribe(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(community_id): Path<CommunityId>,
) -> Result<Response> {
    state.graph.subscribe(ctx.user_id, community_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Unsubscribes the caller from a community.
pub async fn unsubscribe(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(community_id): Path<CommunityId>,
) -> Result<Response> {
    state.graph.unsubscribe(ctx.user_id, community_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
