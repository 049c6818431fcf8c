use axum::Router;
use axum::routing::{get, post};

use amparo_types::models::{
    EmergencyAlert, EmergencyConfig, EmergencyContact, EmergencyMessage, OwnedResource, Pet,
};

use crate::auth::{self, AppState};
use crate::resources;
use crate::users;

/// The complete API surface. Lives in this crate (not the binary) so the
/// integration tests drive the same router production serves.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/autenticacion/registro", post(auth::register))
        .route("/api/autenticacion/login", post(auth::login))
        .route("/api/users", post(auth::register).get(users::list_users))
        .route(
            "/api/users/{id}",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .merge(owned_routes::<EmergencyAlert>())
        .merge(owned_routes::<EmergencyConfig>())
        .merge(owned_routes::<EmergencyContact>())
        .merge(owned_routes::<Pet>())
        .merge(owned_routes::<EmergencyMessage>())
        .with_state(state)
}

fn owned_routes<T: OwnedResource>() -> Router<AppState> {
    let base = format!("/api/{}", T::COLLECTION);
    let item = format!("/api/{}/{{id}}", T::COLLECTION);

    Router::new()
        .route(&base, post(resources::create::<T>).get(resources::list::<T>))
        .route(
            &item,
            get(resources::get::<T>)
                .put(resources::update::<T>)
                .delete(resources::remove::<T>),
        )
}
