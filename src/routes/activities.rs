// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity routes.

use crate::error::{AppError, Result};
use crate::models::{Activity, Id};
use crate::routes::PageQuery;
use crate::store::Actor;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/activities", get(list_activities).post(create_activity))
        .route(
            "/api/activities/{id}",
            get(get_activity).put(update_activity).delete(delete_activity),
        )
}

#[derive(Deserialize)]
struct ActivitiesQuery {
    /// Owner to list; defaults to the caller
    user: Option<Id>,
    max: Option<usize>,
    page: Option<usize>,
}

async fn list_activities(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<ActivitiesQuery>,
) -> Result<Json<Vec<Activity>>> {
    let options = PageQuery {
        max: params.max,
        page: params.page,
    }
    .find_options()?;
    tracing::debug!(user = ?params.user, ?options, "Fetching activities");

    let activities = state
        .activities
        .list(&actor, params.user.as_ref(), &options)
        .await
        .map_err(AppError::concealed)?;
    Ok(Json(activities))
}

async fn create_activity(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(activity): Json<Activity>,
) -> Result<(StatusCode, Json<Activity>)> {
    let created = state.activities.create(&actor, activity).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_activity(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Id>,
) -> Result<Json<Activity>> {
    let activity = state
        .activities
        .get(&actor, &id)
        .await
        .map_err(AppError::concealed)?;
    Ok(Json(activity))
}

async fn update_activity(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Id>,
    Json(mut activity): Json<Activity>,
) -> Result<Json<Activity>> {
    activity.id = id;
    let updated = state
        .activities
        .update(&actor, activity)
        .await
        .map_err(AppError::concealed)?;
    Ok(Json(updated))
}

async fn delete_activity(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Id>,
) -> Result<StatusCode> {
    state
        .activities
        .delete(&actor, &id)
        .await
        .map_err(AppError::concealed)?;
    Ok(StatusCode::NO_CONTENT)
}
