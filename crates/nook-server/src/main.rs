use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, put};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use nook_api::{AppStateInner, messages, rooms, users};
use nook_auth::AdminKeys;
use nook_db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "nook_server=debug,nook_api=debug,nook_auth=debug,nook_db=debug,tower_http=debug"
                        .into()
                }),
        )
        .init();

    // Config
    let host = std::env::var("NOOK_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("NOOK_PORT")
        .unwrap_or_else(|_| "8080".into())
        .parse()?;
    let db_path: PathBuf = std::env::var("NOOK_DB_PATH")
        .unwrap_or_else(|_| "nook.db".into())
        .into();
    let admin_keys = AdminKeys::parse(&std::env::var("NOOK_ADMIN_PUBKEYS").unwrap_or_default());
    let sig_max_age_secs: u64 = std::env::var("NOOK_SIG_MAX_AGE_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(600);
    let static_dir = std::env::var("NOOK_STATIC_DIR").ok();

    if admin_keys.is_empty() {
        warn!("NOOK_ADMIN_PUBKEYS is empty; all room visibility changes will be rejected");
    } else {
        info!("Admin allow-list loaded with {} key(s)", admin_keys.len());
    }
    if sig_max_age_secs == 0 {
        warn!("NOOK_SIG_MAX_AGE_SECS is 0; signed timestamps are accepted at any age");
    }

    // Init database
    let db = Database::open(&db_path)?;

    // Shared state
    let state = Arc::new(AppStateInner {
        db,
        admin_keys,
        sig_max_age_secs,
    });

    // Routes
    let api = Router::new()
        .route("/health", get(nook_api::health))
        .route("/rooms", get(rooms::list_rooms).post(rooms::create_room))
        .route("/rooms/search", get(rooms::search_rooms))
        .route(
            "/rooms/{room}/messages",
            get(messages::get_messages).post(messages::send_message),
        )
        .route("/rooms/{room}/visibility", put(rooms::update_visibility))
        .route("/users", get(users::list_users).post(users::register_user))
        .route("/users/{public_key}", get(users::get_user))
        .route("/users/{public_key}/verified", put(users::set_verified))
        .with_state(state);

    let mut app = Router::new().nest("/api", api);

    // Optional web client, served with an index.html fallback so SPA
    // routes resolve on hard reload.
    if let Some(dir) = static_dir {
        let dir = PathBuf::from(dir);
        info!("Serving static files from {}", dir.display());
        let spa = ServeDir::new(&dir).not_found_service(ServeFile::new(dir.join("index.html")));
        app = app.fallback_service(spa);
    }

    let app = app
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Nook server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
