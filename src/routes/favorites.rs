use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{delete, get},
};
use futures::{Stream, StreamExt};
use uuid::Uuid;

use crate::{
    dto::favorites::{AddFavoriteRequest, FavoriteIdList, FavoriteListingList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Favorite,
    realtime::RealtimeMessage,
    response::ApiResponse,
    routes::params::Pagination,
    services::favorite_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_favorites).post(add_favorite))
        .route("/ids", get(list_favorite_ids))
        .route("/stream", get(favorites_stream))
        .route("/{listing_id}", delete(remove_favorite))
}

#[utoipa::path(
    get,
    path = "/api/favorites",
    params(Pagination),
    responses(
        (status = 200, description = "Favorited listings, newest first", body = ApiResponse<FavoriteListingList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn list_favorites(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<FavoriteListingList>>> {
    let resp = favorite_service::list_favorites(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/favorites/ids",
    responses(
        (status = 200, description = "All favorited listing ids", body = ApiResponse<FavoriteIdList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn list_favorite_ids(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<FavoriteIdList>>> {
    let resp = favorite_service::list_favorite_ids(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/favorites",
    request_body = AddFavoriteRequest,
    responses(
        (status = 200, description = "Added to favorites", body = ApiResponse<Favorite>),
        (status = 400, description = "Listing not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn add_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddFavoriteRequest>,
) -> AppResult<Json<ApiResponse<Favorite>>> {
    let resp = favorite_service::add_favorite(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/favorites/{listing_id}",
    params(
        ("listing_id" = Uuid, Path, description = "Listing ID")
    ),
    responses(
        (status = 200, description = "Removed from favorites", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Favorite not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn remove_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(listing_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = favorite_service::remove_favorite(&state, &user, listing_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/favorites/stream",
    responses(
        (status = 200, description = "Server-sent `favorite` events, one RealtimeMessage each", body = RealtimeMessage, content_type = "text/event-stream")
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn favorites_stream(
    State(state): State<AppState>,
    user: AuthUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(user_id = %user.user_id, "favorites stream opened");
    let events = state
        .events
        .subscribe_user(user.user_id)
        .filter_map(|message| async move {
            match Event::default().event("favorite").json_data(&message) {
                Ok(event) => Some(Ok(event)),
                Err(err) => {
                    tracing::warn!(error = %err, "failed to encode realtime message");
                    None
                }
            }
        });
    Sse::new(events).keep_alive(KeepAlive::default())
}
