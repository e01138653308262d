use async_trait::async_trait;
use uuid::Uuid;

use super::backend::{BackendError, FavoritesBackend, Subscription};
use crate::{
    dto::favorites::AddFavoriteRequest,
    error::AppError,
    middleware::auth::AuthUser,
    models::Favorite,
    services::favorite_service,
    state::AppState,
};

/// [`FavoritesBackend`] that calls the favorites service and event bus of
/// this process directly.
#[derive(Clone)]
pub struct ServiceBackend {
    state: AppState,
}

impl ServiceBackend {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    fn caller(user_id: Uuid) -> AuthUser {
        AuthUser {
            user_id,
            role: "user".to_string(),
        }
    }
}

impl From<AppError> for BackendError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound => BackendError::Rejected(err.to_string()),
            AppError::BadRequest(message) => BackendError::Rejected(message),
            AppError::Unauthorized(_) | AppError::Forbidden => BackendError::Unauthorized,
            other => BackendError::Unavailable(other.to_string()),
        }
    }
}

#[async_trait]
impl FavoritesBackend for ServiceBackend {
    async fn fetch_favorites(&self, user_id: Uuid) -> Result<Vec<Favorite>, BackendError> {
        Ok(favorite_service::favorite_records(&self.state, user_id).await?)
    }

    async fn subscribe(&self, user_id: Uuid) -> Result<Subscription, BackendError> {
        Ok(Subscription::new(self.state.events.subscribe_user(user_id)))
    }

    async fn insert_favorite(&self, user_id: Uuid, listing_id: Uuid) -> Result<(), BackendError> {
        favorite_service::add_favorite(
            &self.state,
            &Self::caller(user_id),
            AddFavoriteRequest { listing_id },
        )
        .await?;
        Ok(())
    }

    async fn delete_favorite(&self, user_id: Uuid, listing_id: Uuid) -> Result<(), BackendError> {
        match favorite_service::remove_favorite(&self.state, &Self::caller(user_id), listing_id)
            .await
        {
            // Already gone is the state the caller asked for.
            Ok(_) | Err(AppError::NotFound) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
