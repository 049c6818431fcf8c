use axum::{Json, extract::{Path, State}, http::StatusCode};

use amparo_db::models::UserRow;
use amparo_types::api::{UpdateUserRequest, UserResponse};

use crate::auth::{self, AppState};
use crate::error::ApiError;
use crate::identity::Identity;
use crate::resources::parse_id;

/// User administration. Requires a credential but is not owner-scoped: any
/// authenticated caller can read and manage any account.
// TODO: restrict this surface to the caller's own account (or a real admin
// role) before exposing it beyond the trusted clients.
pub async fn list_users(
    State(state): State<AppState>,
    Identity(_caller): Identity,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || db.db.list_users())
        .await
        .map_err(anyhow::Error::from)??;

    let users = rows.into_iter().map(to_response).collect::<Result<Vec<_>, _>>()?;
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    Identity(_caller): Identity,
    Path(raw_id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = parse_id(&raw_id)?;

    let db = state.clone();
    let id = id.to_string();
    let row = tokio::task::spawn_blocking(move || db.db.get_user_by_id(&id))
        .await
        .map_err(anyhow::Error::from)??
        .ok_or(ApiError::NotFound)?;

    Ok(Json(to_response(row)?))
}

/// Full replace of name, email, phone and password. The password is always
/// re-hashed; the old hash is unrecoverable afterwards.
pub async fn update_user(
    State(state): State<AppState>,
    Identity(_caller): Identity,
    Path(raw_id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&raw_id)?;
    auth::validate_user_fields(&req.name, &req.email, &req.password)?;

    // Moving to an email another account holds is a conflict, not a write.
    let db = state.clone();
    let (email, id_str) = (req.email.clone(), id.to_string());
    let taken = tokio::task::spawn_blocking(move || db.db.email_taken_by_other(&email, &id_str))
        .await
        .map_err(anyhow::Error::from)??;
    if taken {
        return Err(ApiError::Conflict("email already registered".into()));
    }

    let password_hash = auth::hash_password(&req.password)?;

    let db = state.clone();
    let id_str = id.to_string();
    let update = tokio::task::spawn_blocking(move || {
        db.db.update_user(&id_str, &req.name, &req.email, req.phone.as_deref(), &password_hash)
    })
    .await
    .map_err(anyhow::Error::from)?;

    let updated = match update {
        Ok(updated) => updated,
        Err(err) if amparo_db::is_unique_violation(&err) => {
            return Err(ApiError::Conflict("email already registered".into()));
        }
        Err(err) => return Err(err.into()),
    };

    if !updated {
        return Err(ApiError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Deletes the account only. Records the user owned stay where they are;
/// owner ids are lookup keys, not references.
pub async fn delete_user(
    State(state): State<AppState>,
    Identity(_caller): Identity,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&raw_id)?;

    let db = state.clone();
    let id = id.to_string();
    let deleted = tokio::task::spawn_blocking(move || db.db.delete_user(&id))
        .await
        .map_err(anyhow::Error::from)??;

    if !deleted {
        return Err(ApiError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

fn to_response(row: UserRow) -> Result<UserResponse, ApiError> {
    Ok(UserResponse {
        id: row.id.parse().map_err(anyhow::Error::from)?,
        name: row.name,
        email: row.email,
        phone: row.phone,
    })
}
