use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use amparo_api::auth::{AppState, AppStateInner};
use amparo_api::identity::JwtConfig;
use amparo_api::routes::api_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "amparo=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let secret = std::env::var("AMPARO_JWT_SECRET").unwrap_or_default();
    let issuer = std::env::var("AMPARO_JWT_ISSUER").unwrap_or_else(|_| "amparo".into());
    let audience = std::env::var("AMPARO_JWT_AUDIENCE").unwrap_or_else(|_| "amparo-clients".into());
    let expires_minutes: i64 = std::env::var("AMPARO_JWT_EXPIRES_MINUTES")
        .unwrap_or_else(|_| "1440".into())
        .parse()?;
    let db_path = std::env::var("AMPARO_DB_PATH").unwrap_or_else(|_| "amparo.db".into());
    let host = std::env::var("AMPARO_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("AMPARO_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    let jwt = match JwtConfig::new(secret, issuer, audience, expires_minutes) {
        Ok(jwt) => jwt,
        Err(e) => {
            eprintln!("FATAL: AMPARO_JWT_SECRET is unusable: {e}.");
            eprintln!("       Set a random value of at least 32 bytes in your .env and restart.");
            std::process::exit(1);
        }
    };

    // Init database
    let db = amparo_db::Database::open(&PathBuf::from(&db_path))?;

    let state: AppState = Arc::new(AppStateInner { db, jwt });

    let app = api_router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("amparo server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
