use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    middleware,
    routing::{get, patch, post},
    Extension, Json, Router,
};

use crate::db::{parse_id, FEATURED_LIMIT};
use crate::error::ApiError;
use crate::middleware::{require_auth, require_email_match, SharedVerifier, VerifiedIdentity};
use crate::models::{
    Artifact, ArtifactWithLikes, DeleteResult, Extra, InsertResult, NewArtifact, OwnerQuery,
    SearchQuery, UpdateResult,
};
use crate::AppState;

pub fn routes(verifier: SharedVerifier) -> Router<AppState> {
    let public = Router::new()
        .route("/artifacts", get(list_artifacts))
        .route("/featuredArtifacts", get(featured_artifacts));

    let authed = Router::new()
        .route("/artifacts", post(create_artifact))
        .route("/artifact/:id", get(get_artifact).delete(delete_artifact))
        .route("/updateArtifact/:id", patch(update_artifact))
        .route_layer(middleware::from_fn_with_state(verifier.clone(), require_auth));

    let owner = Router::new()
        .route("/myArtifacts", get(my_artifacts))
        .route_layer(middleware::from_fn(require_email_match))
        .route_layer(middleware::from_fn_with_state(verifier, require_auth));

    public.merge(authed).merge(owner)
}

/// GET /artifacts?name=
async fn list_artifacts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Artifact>>, ApiError> {
    let artifacts = state.artifact_repo.list(query.filter()).await?;
    Ok(Json(artifacts))
}

/// GET /artifact/:id
async fn get_artifact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ArtifactWithLikes>, ApiError> {
    let id = parse_id(&id).ok_or(ApiError::InvalidId(id))?;
    state
        .artifact_repo
        .get_with_likes(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Artifact {}", id)))
}

/// GET /featuredArtifacts
/// Most liked artifacts, at most six
async fn featured_artifacts(
    State(state): State<AppState>,
) -> Result<Json<Vec<ArtifactWithLikes>>, ApiError> {
    let featured = state.artifact_repo.featured(FEATURED_LIMIT).await?;
    Ok(Json(featured))
}

/// POST /artifacts
/// The body is stored as sent; `adder_email` is taken from the client.
async fn create_artifact(
    State(state): State<AppState>,
    body: Result<Json<NewArtifact>, JsonRejection>,
) -> Result<Json<InsertResult>, ApiError> {
    let Json(artifact) = body?;
    let id = state.artifact_repo.create(artifact).await?;
    Ok(Json(InsertResult::new(id)))
}

/// GET /myArtifacts?email=
async fn my_artifacts(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Vec<Artifact>>, ApiError> {
    let artifacts = state.artifact_repo.list_by_adder(&query.email).await?;
    Ok(Json(artifacts))
}

/// PATCH /updateArtifact/:id
async fn update_artifact(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path(id): Path<String>,
    body: Result<Json<Extra>, JsonRejection>,
) -> Result<Json<UpdateResult>, ApiError> {
    let Json(patch) = body?;
    let id = parse_id(&id).ok_or(ApiError::InvalidId(id))?;
    check_owner(&state, &id, &identity).await?;

    let result = state.artifact_repo.update(&id, patch).await?;
    Ok(Json(result))
}

/// DELETE /artifact/:id
async fn delete_artifact(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResult>, ApiError> {
    let id = parse_id(&id).ok_or(ApiError::InvalidId(id))?;
    check_owner(&state, &id, &identity).await?;

    let deleted = state.artifact_repo.delete(&id).await?;
    Ok(Json(DeleteResult::new(deleted)))
}

/// With ownership enforcement on, only the recorded adder may modify an
/// artifact. Missing artifacts fall through to the store's zero-count result.
async fn check_owner(
    state: &AppState,
    id: &str,
    identity: &VerifiedIdentity,
) -> Result<(), ApiError> {
    if !state.enforce_ownership {
        return Ok(());
    }
    match state.artifact_repo.find(id).await? {
        Some(artifact) if !artifact.is_owned_by(identity.email.as_deref()) => {
            tracing::warn!("{:?} may not modify artifact {}", identity.email, id);
            Err(ApiError::Forbidden)
        }
        _ => Ok(()),
    }
}
