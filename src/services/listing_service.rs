use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::dto::listings::{CreateListingRequest, ListingList, PriceInput, UpdateListingRequest};
use crate::{
    audit,
    currency::{Currency, ExchangeRates, parse_amount},
    entity::listings::{ActiveModel, Column, Entity as Listings, Model as ListingModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Listing,
    response::{ApiResponse, Meta},
    routes::params::{ListingQuery, ListingSortBy, SortOrder},
    state::AppState,
};

pub async fn list_listings(
    state: &AppState,
    query: ListingQuery,
) -> AppResult<ApiResponse<ListingList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let base = state.rates.base();
    let mut condition = Condition::all();

    if let Some(search) = non_blank(query.q.as_deref()) {
        let pattern = format!("%{}%", escape_like(search));
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Title).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(category) = non_blank(query.category.as_deref()) {
        condition = condition.add(Expr::col(Column::Category).ilike(escape_like(category)));
    }

    if let Some(location) = non_blank(query.location.as_deref()) {
        let pattern = format!("%{}%", escape_like(location));
        condition = condition.add(Expr::col(Column::Location).ilike(pattern));
    }

    let min_price = non_blank(query.min_price.as_deref())
        .map(|raw| parse_amount(raw, base))
        .transpose()?;
    let max_price = non_blank(query.max_price.as_deref())
        .map(|raw| parse_amount(raw, base))
        .transpose()?;
    if let (Some(min), Some(max)) = (min_price, max_price) {
        if min > max {
            return Err(AppError::BadRequest(
                "min_price must not exceed max_price".into(),
            ));
        }
    }
    if let Some(min) = min_price {
        condition = condition.add(Column::AskingPrice.gte(min));
    }
    if let Some(max) = max_price {
        condition = condition.add(Column::AskingPrice.lte(max));
    }

    let sort_col = match query.sort_by.unwrap_or_default() {
        ListingSortBy::CreatedAt => Column::CreatedAt,
        ListingSortBy::AskingPrice => Column::AskingPrice,
        ListingSortBy::Title => Column::Title,
    };

    let mut finder = Listings::find().filter(condition);
    finder = match query.sort_order.unwrap_or_default() {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|model| listing_from_entity(model, &state.rates, query.currency))
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Listings", ListingList { items }, Some(meta)))
}

pub async fn get_listing(
    state: &AppState,
    id: Uuid,
    display: Option<Currency>,
) -> AppResult<ApiResponse<Listing>> {
    let model = Listings::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let listing = listing_from_entity(model, &state.rates, display)?;
    Ok(ApiResponse::success("Listing", listing, None))
}

pub async fn create_listing(
    state: &AppState,
    user: &AuthUser,
    payload: CreateListingRequest,
) -> AppResult<ApiResponse<Listing>> {
    ensure_admin(user)?;
    let input_currency = payload.currency.unwrap_or(state.rates.base());

    let title = required(payload.title, "title")?;
    let category = required(payload.category, "category")?;
    let location = required(payload.location, "location")?;
    let asking_price = to_base_amount(&state.rates, &payload.asking_price, input_currency)?;
    let annual_revenue = payload
        .annual_revenue
        .as_ref()
        .map(|revenue| to_base_amount(&state.rates, revenue, input_currency))
        .transpose()?;

    let listing = ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(title),
        description: Set(payload.description),
        category: Set(category),
        location: Set(location),
        asking_price: Set(asking_price),
        annual_revenue: Set(annual_revenue),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "listing_create",
        "listings",
        serde_json::json!({ "listing_id": listing.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Listing created",
        listing_from_entity(listing, &state.rates, None)?,
        Some(Meta::empty()),
    ))
}

pub async fn update_listing(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateListingRequest,
) -> AppResult<ApiResponse<Listing>> {
    ensure_admin(user)?;
    let existing = Listings::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let input_currency = payload.currency.unwrap_or(state.rates.base());

    let mut active: ActiveModel = existing.into();
    if let Some(title) = payload.title {
        active.title = Set(required(title, "title")?);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(category) = payload.category {
        active.category = Set(required(category, "category")?);
    }
    if let Some(location) = payload.location {
        active.location = Set(required(location, "location")?);
    }
    if let Some(price) = payload.asking_price.as_ref() {
        active.asking_price = Set(to_base_amount(&state.rates, price, input_currency)?);
    }
    if let Some(revenue) = payload.annual_revenue.as_ref() {
        active.annual_revenue = Set(Some(to_base_amount(&state.rates, revenue, input_currency)?));
    }

    let listing = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "listing_update",
        "listings",
        serde_json::json!({ "listing_id": listing.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        listing_from_entity(listing, &state.rates, None)?,
        Some(Meta::empty()),
    ))
}

pub async fn delete_listing(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Listings::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        user.user_id,
        "listing_delete",
        "listings",
        serde_json::json!({ "listing_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Build the API model, attaching a converted price when `display` is set.
pub fn listing_from_entity(
    model: ListingModel,
    rates: &ExchangeRates,
    display: Option<Currency>,
) -> AppResult<Listing> {
    let display_price = display
        .map(|currency| rates.display(model.asking_price, rates.base(), currency))
        .transpose()?;

    Ok(Listing {
        id: model.id,
        title: model.title,
        description: model.description,
        category: model.category,
        location: model.location,
        asking_price: model.asking_price,
        annual_revenue: model.annual_revenue,
        created_at: model.created_at.with_timezone(&Utc),
        display_price,
    })
}

/// Parse a price in `currency` and convert it to base-currency minor units.
fn to_base_amount(
    rates: &ExchangeRates,
    input: &PriceInput,
    currency: Currency,
) -> AppResult<i64> {
    let amount = match input {
        PriceInput::Minor(minor) if *minor < 0 => {
            return Err(AppError::BadRequest("Prices must not be negative".into()));
        }
        PriceInput::Minor(minor) => *minor,
        PriceInput::Text(text) => parse_amount(text, currency)?,
    };
    Ok(rates.convert(amount, currency, rates.base())?)
}

fn required(value: String, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Escape `ILIKE` metacharacters so user text matches literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
