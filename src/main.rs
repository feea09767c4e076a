use axum::{response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod artifacts;
mod config;
mod db;
mod error;
mod likes;
mod middleware;
mod models;

use config::AppConfig;
use db::{ArtifactRepository, LikeRepository};
use middleware::{FirebaseVerifier, SharedVerifier};

#[derive(Clone)]
pub struct AppState {
    artifact_repo: Arc<ArtifactRepository>,
    like_repo: Arc<LikeRepository>,
    verifier: SharedVerifier,
    enforce_ownership: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relic_api=debug,tower_http=debug,axum=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let db = db::init_db(&config.database_url).await?;
    info!("Database initialized");

    if config.enforce_ownership {
        info!("Ownership checks enabled for update and delete");
    } else {
        tracing::warn!("Ownership checks disabled: any signed-in user may modify any document");
    }

    let state = AppState {
        artifact_repo: Arc::new(ArtifactRepository::new(db.inner().clone())),
        like_repo: Arc::new(LikeRepository::new(db.inner().clone())),
        verifier: Arc::new(FirebaseVerifier::new(&config.firebase_project_id)),
        enforce_ownership: config.enforce_ownership,
    };

    let app = router(state);

    let addr = config.socket_addr();
    info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    let verifier = state.verifier.clone();

    Router::new()
        .route("/health", get(health))
        .merge(artifacts::routes(verifier.clone()))
        .merge(likes::routes(verifier))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}
