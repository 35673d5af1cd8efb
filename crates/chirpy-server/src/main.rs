use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use chirpy_api::auth::AppStateInner;
use chirpy_api::password::{Credentials, PasswordParams};
use chirpy_api::session::SessionConfig;
use chirpy_db::Database;

const DEV_JWT_SECRET: &str = "dev-secret-change-me";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chirpy=debug,chirpy_api=debug,chirpy_db=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        warn!("JWT_SECRET not set, using the development secret");
        DEV_JWT_SECRET.into()
    });
    let polka_key = std::env::var("POLKA_KEY").unwrap_or_else(|_| {
        warn!("POLKA_KEY not set, webhooks will be rejected");
        String::new()
    });
    let db_path = std::env::var("CHIRPY_DB_PATH").unwrap_or_else(|_| "database.json".into());
    let host = std::env::var("CHIRPY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("CHIRPY_PORT")
        .unwrap_or_else(|_| "8080".into())
        .parse()?;

    // Init database
    let db = Arc::new(Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let credentials = Credentials::new(PasswordParams::default())?;
    let state = AppStateInner::new(db, credentials, SessionConfig::new(jwt_secret), polka_key);

    let app = chirpy_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Chirpy server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
