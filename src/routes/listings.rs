use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::listings::{CreateListingRequest, ListingList, UpdateListingRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Listing,
    response::ApiResponse,
    routes::params::{DisplayQuery, ListingQuery},
    services::listing_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_listings).post(create_listing))
        .route(
            "/{id}",
            get(get_listing).put(update_listing).delete(delete_listing),
        )
}

#[utoipa::path(
    get,
    path = "/api/listings",
    params(ListingQuery),
    responses(
        (status = 200, description = "Search listings", body = ApiResponse<ListingList>),
        (status = 400, description = "Invalid filter")
    ),
    tag = "Listings"
)]
pub async fn list_listings(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> AppResult<Json<ApiResponse<ListingList>>> {
    let resp = listing_service::list_listings(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/listings/{id}",
    params(
        ("id" = Uuid, Path, description = "Listing ID"),
        DisplayQuery
    ),
    responses(
        (status = 200, description = "Listing detail", body = ApiResponse<Listing>),
        (status = 404, description = "Listing not found")
    ),
    tag = "Listings"
)]
pub async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(display): Query<DisplayQuery>,
) -> AppResult<Json<ApiResponse<Listing>>> {
    let resp = listing_service::get_listing(&state, id, display.currency).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/listings",
    request_body = CreateListingRequest,
    responses(
        (status = 200, description = "Listing created", body = ApiResponse<Listing>),
        (status = 400, description = "Bad Request"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Listings"
)]
pub async fn create_listing(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateListingRequest>,
) -> AppResult<Json<ApiResponse<Listing>>> {
    let resp = listing_service::create_listing(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/listings/{id}",
    params(
        ("id" = Uuid, Path, description = "Listing ID")
    ),
    request_body = UpdateListingRequest,
    responses(
        (status = 200, description = "Listing updated", body = ApiResponse<Listing>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Listing not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Listings"
)]
pub async fn update_listing(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateListingRequest>,
) -> AppResult<Json<ApiResponse<Listing>>> {
    let resp = listing_service::update_listing(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/listings/{id}",
    params(
        ("id" = Uuid, Path, description = "Listing ID")
    ),
    responses(
        (status = 200, description = "Listing deleted", body = ApiResponse<serde_json::Value>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Listing not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Listings"
)]
pub async fn delete_listing(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = listing_service::delete_listing(&state, &user, id).await?;
    Ok(Json(resp))
}
