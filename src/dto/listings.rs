use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{currency::Currency, models::Listing};

/// A price given either as minor units or as text such as `"$1.25M"`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum PriceInput {
    Minor(i64),
    Text(String),
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateListingRequest {
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub location: String,
    pub asking_price: PriceInput,
    pub annual_revenue: Option<PriceInput>,
    /// Currency the prices above are given in; defaults to the base currency.
    pub currency: Option<Currency>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateListingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub asking_price: Option<PriceInput>,
    pub annual_revenue: Option<PriceInput>,
    pub currency: Option<Currency>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ListingList {
    #[schema(value_type = Vec<Listing>)]
    pub items: Vec<Listing>,
}
