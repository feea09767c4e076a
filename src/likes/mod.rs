use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    middleware,
    routing::{delete, get, post},
    Extension, Json, Router,
};

use crate::db::parse_id;
use crate::error::ApiError;
use crate::middleware::{require_auth, require_email_match, SharedVerifier, VerifiedIdentity};
use crate::models::{DeleteResult, InsertResult, Like, NewLike, OwnerQuery};
use crate::AppState;

pub fn routes(verifier: SharedVerifier) -> Router<AppState> {
    let authed = Router::new()
        .route("/likes", post(create_like))
        .route("/likes/:id", delete(delete_like))
        .route_layer(middleware::from_fn_with_state(verifier.clone(), require_auth));

    let owner = Router::new()
        .route("/liked", get(liked))
        .route_layer(middleware::from_fn(require_email_match))
        .route_layer(middleware::from_fn_with_state(verifier, require_auth));

    authed.merge(owner)
}

/// GET /liked?email=
async fn liked(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Vec<Like>>, ApiError> {
    let likes = state.like_repo.list_by_user(&query.email).await?;
    Ok(Json(likes))
}

/// POST /likes
/// Stored as sent: no de-duplication and no check that the artifact exists.
async fn create_like(
    State(state): State<AppState>,
    body: Result<Json<NewLike>, JsonRejection>,
) -> Result<Json<InsertResult>, ApiError> {
    let Json(like) = body?;
    let id = state.like_repo.create(like).await?;
    Ok(Json(InsertResult::new(id)))
}

/// DELETE /likes/:id
async fn delete_like(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResult>, ApiError> {
    let id = parse_id(&id).ok_or(ApiError::InvalidId(id))?;

    if state.enforce_ownership {
        if let Some(like) = state.like_repo.find(&id).await? {
            if !like.is_owned_by(identity.email.as_deref()) {
                tracing::warn!("{:?} may not remove like {}", identity.email, id);
                return Err(ApiError::Forbidden);
            }
        }
    }

    let deleted = state.like_repo.delete(&id).await?;
    Ok(Json(DeleteResult::new(deleted)))
}
