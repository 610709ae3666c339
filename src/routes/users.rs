// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User profile routes.
//!
//! Profiles are private: reads of other users' profiles answer 404, not 403.

use crate::error::{AppError, Result};
use crate::models::{Id, User};
use crate::routes::PageQuery;
use crate::store::Actor;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/users", get(list_users).post(create_user))
        .route(
            "/api/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<User>> {
    let id = actor.require_user().map_err(AppError::from)?.clone();
    let user = state
        .users
        .get(&actor, &id)
        .await
        .map_err(AppError::concealed)?;
    Ok(Json(user))
}

/// List all users (admins only; everyone else gets 404).
async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<User>>> {
    let options = page.find_options()?;
    let users = state
        .users
        .list(&actor, &options)
        .await
        .map_err(AppError::concealed)?;
    Ok(Json(users))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(user): Json<User>,
) -> Result<(StatusCode, Json<User>)> {
    let created = state.users.create(&actor, user).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Id>,
) -> Result<Json<User>> {
    let user = state
        .users
        .get(&actor, &id)
        .await
        .map_err(AppError::concealed)?;
    Ok(Json(user))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Id>,
    Json(mut user): Json<User>,
) -> Result<Json<User>> {
    user.id = id;
    let updated = state
        .users
        .update(&actor, user)
        .await
        .map_err(AppError::concealed)?;
    Ok(Json(updated))
}

/// Delete a user and everything they own.
async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Id>,
) -> Result<StatusCode> {
    tracing::info!(user_id = %id, actor = ?actor.user_id, "User deletion requested");
    state
        .users
        .delete(&actor, &id)
        .await
        .map_err(AppError::concealed)?;
    Ok(StatusCode::NO_CONTENT)
}
