// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User CRUD routes.

use crate::db::UpdatedUser;
use crate::error::{AppError, Result};
use crate::models::{validate_user, User, UserPatch};
use crate::validator::Validator;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_CURRENCY: &str = "CAD";
const DEFAULT_ADMINISTRATIVE_DIVISION: &str = "province";
const INITIAL_VERSION: i64 = 1;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/users", post(create_user))
        .route(
            "/v1/users/{id}",
            get(show_user).patch(update_user).delete(delete_user),
        )
}

/// Request body for creating a user.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub province_code: String,
    #[serde(default)]
    pub country_code_alpha_2: String,
}

#[derive(Serialize)]
pub struct UserEnvelope {
    pub user: User,
}

#[derive(Serialize)]
pub struct UpdateEnvelope {
    /// Changed attributes with their stored values
    pub user: crate::db::Attributes,
    pub version: i64,
}

#[derive(Serialize)]
pub struct MessageEnvelope {
    pub message: String,
}

/// Ids are UUIDs; anything else cannot name a stored user.
fn parse_id(raw: &str) -> Result<String> {
    Uuid::parse_str(raw)
        .map(|id| id.to_string())
        .map_err(|_| AppError::NotFound("the requested resource could not be found".to_string()))
}

fn read_json<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

fn check(user: &User) -> Result<()> {
    let mut v = Validator::new();
    validate_user(&mut v, user);
    if v.valid() {
        Ok(())
    } else {
        Err(AppError::FailedValidation(v.into_errors()))
    }
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let input = read_json(payload)?;

    let user = User {
        id: Uuid::new_v4().to_string(),
        email: input.email,
        first_name: input.first_name,
        last_name: input.last_name,
        province_code: input.province_code,
        country_code_alpha2: input.country_code_alpha_2,
        currency: DEFAULT_CURRENCY.to_string(),
        administrative_division: DEFAULT_ADMINISTRATIVE_DIVISION.to_string(),
        created_at: chrono::Utc::now().format("%Y-%m-%d").to_string(),
        version: INITIAL_VERSION,
        ..Default::default()
    };

    check(&user)?;
    state.users.create(&user).await?;

    tracing::info!(user_id = %user.id, "User created");

    let location = format!("/v1/users/{}", user.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(UserEnvelope { user }),
    ))
}

async fn show_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UserEnvelope>> {
    let id = parse_id(&id)?;
    let user = state.users.get(&id).await?;
    Ok(Json(UserEnvelope { user }))
}

/// Apply a sparse patch under optimistic concurrency.
///
/// The patch is validated against the merged user before anything is
/// written; the write only succeeds if nobody updated the user since it
/// was read here.
async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<UserPatch>, JsonRejection>,
) -> Result<Json<UpdateEnvelope>> {
    let id = parse_id(&id)?;
    let current = state.users.get(&id).await?;
    let patch = read_json(payload)?;

    if patch.is_empty() {
        return Err(AppError::BadRequest(
            "request body must change at least one attribute".to_string(),
        ));
    }

    let mut merged = current.clone();
    patch.apply_to(&mut merged);
    check(&merged)?;

    let UpdatedUser {
        attributes,
        version,
    } = state.users.update(&current, &patch).await?;

    Ok(Json(UpdateEnvelope {
        user: attributes,
        version,
    }))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageEnvelope>> {
    let id = parse_id(&id)?;
    state
        .users
        .delete(&User {
            id,
            ..Default::default()
        })
        .await?;

    Ok(Json(MessageEnvelope {
        message: "user successfully deleted".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_normalizes_uuid() {
        let id = parse_id("F8AE3AD1-D5C7-4465-B446-2E931606E938").unwrap();
        assert_eq!(id, "f8ae3ad1-d5c7-4465-b446-2e931606e938");
    }

    #[test]
    fn test_parse_id_rejects_non_uuid() {
        assert!(matches!(parse_id("u1"), Err(AppError::NotFound(_))));
        assert!(matches!(parse_id(""), Err(AppError::NotFound(_))));
    }
}
