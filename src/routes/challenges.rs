// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Challenge routes.

use crate::error::Result;
use crate::models::{Challenge, Detail, Id, Invite, Progress};
use crate::routes::PageQuery;
use crate::services::{ChallengeOperation, MemberProgress};
use crate::store::Actor;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// Challenge routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/challenges", get(list_challenges).post(create_challenge))
        .route(
            "/api/challenges/{id}",
            get(get_challenge)
                .put(replace_challenge)
                .patch(patch_challenge)
                .delete(delete_challenge),
        )
        .route("/api/challenges/{id}/join", post(join_challenge))
        .route("/api/challenges/{id}/leave", post(leave_challenge))
        .route(
            "/api/challenges/{id}/invites",
            get(list_invites).post(create_invite),
        )
        .route(
            "/api/challenges/{id}/invites/{user}",
            get(get_invite).delete(revoke_invite),
        )
        .route("/api/challenges/{id}/progress", get(get_member_progress))
        .route("/api/challenges/{id}/progress/{user}", get(get_progress))
}

// ─── Challenges ──────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateChallengeRequest {
    #[serde(flatten)]
    detail: Detail,
    /// Initial members; the caller alone when omitted
    #[serde(default)]
    members: Vec<Id>,
}

async fn list_challenges(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<Challenge>>> {
    let options = page.find_options()?;
    Ok(Json(state.challenges.list(&actor, &options).await?))
}

async fn create_challenge(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateChallengeRequest>,
) -> Result<(StatusCode, Json<Challenge>)> {
    let mut members = request.members;
    if members.is_empty() {
        members.extend(actor.user_id.clone());
    }
    let challenge = state
        .challenges
        .create(&actor, request.detail, members)
        .await?;
    Ok((StatusCode::CREATED, Json(challenge)))
}

async fn get_challenge(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Id>,
) -> Result<Json<Challenge>> {
    Ok(Json(state.challenges.get(&actor, &id).await?))
}

/// Replace the challenge detail. Members are left unchanged.
async fn replace_challenge(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Id>,
    Json(detail): Json<Detail>,
) -> Result<Json<Challenge>> {
    let operations = vec![ChallengeOperation::SetDetail(detail)];
    Ok(Json(state.challenges.update(&actor, &id, operations).await?))
}

/// Apply a batch of detail and membership changes atomically.
async fn patch_challenge(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Id>,
    Json(operations): Json<Vec<ChallengeOperation>>,
) -> Result<Json<Challenge>> {
    tracing::debug!(challenge_id = %id, count = operations.len(), "Patching challenge");
    Ok(Json(state.challenges.update(&actor, &id, operations).await?))
}

async fn delete_challenge(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Id>,
) -> Result<StatusCode> {
    state.challenges.delete(&actor, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Membership ──────────────────────────────────────────────

async fn join_challenge(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Id>,
) -> Result<Json<Challenge>> {
    Ok(Json(state.challenges.join(&actor, &id).await?))
}

async fn leave_challenge(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Id>,
) -> Result<StatusCode> {
    state.challenges.leave(&actor, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Invites ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct InviteRequest {
    user: Id,
}

async fn list_invites(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Id>,
) -> Result<Json<Vec<Invite>>> {
    Ok(Json(state.challenges.invites(&actor, &id).await?))
}

async fn create_invite(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Id>,
    Json(request): Json<InviteRequest>,
) -> Result<(StatusCode, Json<Invite>)> {
    let invite = state
        .challenges
        .invite(&actor, &id, &request.user)
        .await?;
    Ok((StatusCode::CREATED, Json(invite)))
}

async fn get_invite(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path((id, user)): Path<(Id, Id)>,
) -> Result<Json<Invite>> {
    Ok(Json(state.challenges.get_invite(&actor, &id, &user).await?))
}

async fn revoke_invite(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path((id, user)): Path<(Id, Id)>,
) -> Result<StatusCode> {
    state.challenges.revoke_invite(&actor, &id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Progress ────────────────────────────────────────────────

async fn get_progress(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path((id, user)): Path<(Id, Id)>,
) -> Result<Json<Progress>> {
    Ok(Json(state.challenges.progress(&actor, &id, &user).await?))
}

/// Progress of every member, highest first.
async fn get_member_progress(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Id>,
) -> Result<Json<Vec<MemberProgress>>> {
    Ok(Json(state.challenges.member_progress(&actor, &id).await?))
}
