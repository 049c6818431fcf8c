pub mod auth;
pub mod error;
pub mod identity;
pub mod resources;
pub mod routes;
pub mod users;
