//! Signup, login and token refresh. These routes are public.

use api_types::user::{RefreshTokens, UserCredentials, UserView};
use axum::{Json, extract::State};

use crate::{ApiJson, ServerError, server::ServerState};

fn map_user(user: engine::User) -> UserView {
    UserView {
        id: user.id,
        username: user.username,
        token: user.token,
        refresh_token: user.refresh_token,
        created_at: user.created_at,
        updated_at: user.updated_at,
    }
}

pub async fn signup(
    State(state): State<ServerState>,
    ApiJson(payload): ApiJson<UserCredentials>,
) -> Result<Json<UserView>, ServerError> {
    let user = state
        .engine
        .signup(&payload.username, &payload.password)
        .await?;
    Ok(Json(map_user(user)))
}

pub async fn login(
    State(state): State<ServerState>,
    ApiJson(payload): ApiJson<UserCredentials>,
) -> Result<Json<UserView>, ServerError> {
    let user = state
        .engine
        .login(&payload.username, &payload.password)
        .await?;
    Ok(Json(map_user(user)))
}

pub async fn refresh(
    State(state): State<ServerState>,
    ApiJson(payload): ApiJson<RefreshTokens>,
) -> Result<Json<UserView>, ServerError> {
    let user = state.engine.refresh_tokens(&payload.refresh_token).await?;
    Ok(Json(map_user(user)))
}
