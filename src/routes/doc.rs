use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    currency::{Currency, PriceDisplay},
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        favorites::{AddFavoriteRequest, FavoriteIdList, FavoriteListingList},
        listings::{CreateListingRequest, ListingList, PriceInput, UpdateListingRequest},
    },
    models::{Favorite, Listing, User},
    realtime::{ChangeKind, RealtimeMessage},
    response::{ApiResponse, Meta},
    routes::{auth, favorites, health, listings, params},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::readiness,
        auth::login,
        auth::register,
        listings::list_listings,
        listings::get_listing,
        listings::create_listing,
        listings::update_listing,
        listings::delete_listing,
        favorites::list_favorites,
        favorites::list_favorite_ids,
        favorites::add_favorite,
        favorites::remove_favorite,
        favorites::favorites_stream
    ),
    components(
        schemas(
            User,
            Listing,
            Favorite,
            Currency,
            PriceDisplay,
            PriceInput,
            ChangeKind,
            RealtimeMessage,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            CreateListingRequest,
            UpdateListingRequest,
            AddFavoriteRequest,
            ListingList,
            FavoriteListingList,
            FavoriteIdList,
            params::Pagination,
            params::ListingQuery,
            params::ListingSortBy,
            params::SortOrder,
            Meta,
            ApiResponse<Listing>,
            ApiResponse<ListingList>,
            ApiResponse<Favorite>,
            ApiResponse<FavoriteListingList>,
            ApiResponse<FavoriteIdList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Auth", description = "Registration and login"),
        (name = "Listings", description = "Browse, search and manage business listings"),
        (name = "Favorites", description = "Saved listings and their realtime feed"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
