use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::currency::Currency;

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    /// Page number, default 1
    pub page: Option<i64>,
    /// Items per page, default 20, max 100
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1).saturating_mul(per_page);
        (page, per_page, offset)
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ListingSortBy {
    #[default]
    CreatedAt,
    AskingPrice,
    Title,
}

/// Search and filter parameters for the listing index.
///
/// Price bounds accept the same text as price inputs (`500k`, `$1.2M`) and
/// are read in the base currency.
#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListingQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Case-insensitive match on title or description
    pub q: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    #[param(inline)]
    pub sort_by: Option<ListingSortBy>,
    #[param(inline)]
    pub sort_order: Option<SortOrder>,
    /// Currency to display prices in
    #[param(inline)]
    pub currency: Option<Currency>,
}

impl ListingQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DisplayQuery {
    #[param(inline)]
    pub currency: Option<Currency>,
}
