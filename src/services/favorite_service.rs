use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::favorites::{AddFavoriteRequest, FavoriteIdList, FavoriteListingList},
    entity::{
        favorites::{ActiveModel, Column, Entity as Favorites, Model as FavoriteModel},
        listings::Entity as Listings,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Favorite,
    realtime::{ChangeKind, FavoriteChange},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::listing_service::listing_from_entity,
    state::AppState,
};

pub async fn list_favorites(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<FavoriteListingList>> {
    let (page, limit, offset) = pagination.normalize();
    let finder = Favorites::find()
        .filter(Column::UserId.eq(user.user_id))
        .order_by_desc(Column::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .find_also_related(Listings)
        .all(&state.orm)
        .await?
        .into_iter()
        .filter_map(|(_, listing)| listing)
        .map(|listing| listing_from_entity(listing, &state.rates, None))
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "OK",
        FavoriteListingList { items },
        Some(meta),
    ))
}

/// Every favorite record of `user_id`, newest first.
pub async fn favorite_records(state: &AppState, user_id: Uuid) -> AppResult<Vec<Favorite>> {
    let records = Favorites::find()
        .filter(Column::UserId.eq(user_id))
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(favorite_from_entity)
        .collect();
    Ok(records)
}

pub async fn list_favorite_ids(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<FavoriteIdList>> {
    let listing_ids = favorite_records(state, user.user_id)
        .await?
        .into_iter()
        .map(|f| f.listing_id)
        .collect();
    Ok(ApiResponse::success(
        "OK",
        FavoriteIdList { listing_ids },
        Some(Meta::empty()),
    ))
}

/// Favorite a listing. Re-adding an existing favorite returns the stored
/// record and publishes nothing.
pub async fn add_favorite(
    state: &AppState,
    user: &AuthUser,
    payload: AddFavoriteRequest,
) -> AppResult<ApiResponse<Favorite>> {
    let listing_id = payload.listing_id;
    if Listings::find_by_id(listing_id)
        .one(&state.orm)
        .await?
        .is_none()
    {
        return Err(AppError::BadRequest("Listing not found".into()));
    }

    if let Some(existing) = find_favorite(state, user.user_id, listing_id).await? {
        return Ok(ApiResponse::success(
            "Added to favorites",
            favorite_from_entity(existing),
            Some(Meta::empty()),
        ));
    }

    let inserted = ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        listing_id: Set(listing_id),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await;

    let favorite = match inserted {
        Ok(model) => favorite_from_entity(model),
        // Lost a race on the (user_id, listing_id) unique key.
        Err(err) => match find_favorite(state, user.user_id, listing_id).await? {
            Some(existing) => {
                return Ok(ApiResponse::success(
                    "Added to favorites",
                    favorite_from_entity(existing),
                    Some(Meta::empty()),
                ));
            }
            None => return Err(err.into()),
        },
    };

    state
        .events
        .emit(FavoriteChange::new(ChangeKind::Insert, favorite.clone()));

    audit::record(
        &state.pool,
        user.user_id,
        "favorite_add",
        "favorites",
        serde_json::json!({ "listing_id": listing_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Added to favorites",
        favorite,
        Some(Meta::empty()),
    ))
}

pub async fn remove_favorite(
    state: &AppState,
    user: &AuthUser,
    listing_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let existing = find_favorite(state, user.user_id, listing_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let result = existing.clone().delete(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    state.events.emit(FavoriteChange::new(
        ChangeKind::Delete,
        favorite_from_entity(existing),
    ));

    audit::record(
        &state.pool,
        user.user_id,
        "favorite_remove",
        "favorites",
        serde_json::json!({ "listing_id": listing_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Removed from favorites",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn find_favorite(
    state: &AppState,
    user_id: Uuid,
    listing_id: Uuid,
) -> AppResult<Option<FavoriteModel>> {
    Ok(Favorites::find()
        .filter(Column::UserId.eq(user_id))
        .filter(Column::ListingId.eq(listing_id))
        .one(&state.orm)
        .await?)
}

fn favorite_from_entity(model: FavoriteModel) -> Favorite {
    Favorite {
        id: model.id,
        listing_id: model.listing_id,
        user_id: model.user_id,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
