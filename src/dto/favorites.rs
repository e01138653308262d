use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Listing;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct AddFavoriteRequest {
    pub listing_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct FavoriteListingList {
    #[schema(value_type = Vec<Listing>)]
    pub items: Vec<Listing>,
}

/// Every favorited listing id of the caller, unpaginated.
#[derive(Debug, Serialize, ToSchema)]
pub struct FavoriteIdList {
    pub listing_ids: Vec<Uuid>,
}
