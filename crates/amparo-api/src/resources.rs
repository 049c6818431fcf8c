use axum::{Json, extract::{Path, State}, http::{StatusCode, header}, response::IntoResponse};
use chrono::Utc;
use uuid::Uuid;

use amparo_types::models::{ListScope, OwnedResource};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::identity::Identity;

/// Generic CRUD over any owned collection. Written once; the router
/// instantiates it per entity type. Ownership rules live here: records are
/// stamped with the caller's id at creation, and every per-record operation
/// filters on `(id, owner)`, so a foreign record answers exactly like a
/// missing one.
pub async fn create<T: OwnedResource>(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Json(mut record): Json<T>,
) -> Result<impl IntoResponse, ApiError> {
    record.set_id(Uuid::new_v4());
    record.set_owner_id(caller);
    record.stamp_created(Utc::now());
    record.validate().map_err(ApiError::Validation)?;

    let doc = serde_json::to_string(&record).map_err(anyhow::Error::from)?;
    let db = state.clone();
    let (id, owner) = (record.id().to_string(), caller.to_string());
    tokio::task::spawn_blocking(move || db.db.insert_doc(T::COLLECTION, &id, &owner, &doc))
        .await
        .map_err(anyhow::Error::from)??;

    let location = format!("/api/{}/{}", T::COLLECTION, record.id());
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(record)))
}

pub async fn list<T: OwnedResource>(
    State(state): State<AppState>,
    Identity(caller): Identity,
) -> Result<Json<Vec<T>>, ApiError> {
    let db = state.clone();
    let owner = caller.to_string();
    let docs = tokio::task::spawn_blocking(move || match T::LIST_SCOPE {
        ListScope::Owner => db.db.list_docs_for_owner(T::COLLECTION, &owner),
        ListScope::All => db.db.list_all_docs(T::COLLECTION),
    })
    .await
    .map_err(anyhow::Error::from)??;

    let records = docs
        .iter()
        .map(|doc| serde_json::from_str::<T>(doc))
        .collect::<Result<Vec<_>, _>>()
        .map_err(anyhow::Error::from)?;

    Ok(Json(records))
}

pub async fn get<T: OwnedResource>(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(raw_id): Path<String>,
) -> Result<Json<T>, ApiError> {
    let id = parse_id(&raw_id)?;

    let db = state.clone();
    let (id, owner) = (id.to_string(), caller.to_string());
    let doc = tokio::task::spawn_blocking(move || db.db.get_doc(T::COLLECTION, &id, &owner))
        .await
        .map_err(anyhow::Error::from)??
        .ok_or(ApiError::NotFound)?;

    let record = serde_json::from_str(&doc).map_err(anyhow::Error::from)?;
    Ok(Json(record))
}

/// Full replace. The stored record's id and owner always win over whatever
/// the body carries; per-entity stamps decide which timestamps survive.
pub async fn update<T: OwnedResource>(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(raw_id): Path<String>,
    Json(mut record): Json<T>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&raw_id)?;

    let db = state.clone();
    let (id_str, owner) = (id.to_string(), caller.to_string());
    let existing = tokio::task::spawn_blocking(move || db.db.get_doc(T::COLLECTION, &id_str, &owner))
        .await
        .map_err(anyhow::Error::from)??
        .ok_or(ApiError::NotFound)?;
    let existing: T = serde_json::from_str(&existing).map_err(anyhow::Error::from)?;

    record.set_id(id);
    record.set_owner_id(caller);
    record.stamp_replaced(&existing, Utc::now());
    record.validate().map_err(ApiError::Validation)?;

    let doc = serde_json::to_string(&record).map_err(anyhow::Error::from)?;
    let db = state.clone();
    let (id_str, owner) = (id.to_string(), caller.to_string());
    let replaced = tokio::task::spawn_blocking(move || {
        db.db.replace_doc(T::COLLECTION, &id_str, &owner, &doc)
    })
    .await
    .map_err(anyhow::Error::from)??;

    if !replaced {
        // Deleted out from under us between the read and the write.
        return Err(ApiError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove<T: OwnedResource>(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&raw_id)?;

    let db = state.clone();
    let (id, owner) = (id.to_string(), caller.to_string());
    let deleted = tokio::task::spawn_blocking(move || db.db.delete_doc(T::COLLECTION, &id, &owner))
        .await
        .map_err(anyhow::Error::from)??;

    if !deleted {
        return Err(ApiError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Record ids come in as raw path segments; anything that is not a UUID is a
/// validation failure, not a lookup miss.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::Validation(format!("'{}' is not a valid id", raw)))
}
