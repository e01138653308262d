use async_trait::async_trait;
use futures::{Stream, StreamExt, stream::BoxStream};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::{models::Favorite, realtime::RealtimeMessage};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Rejected by backend: {0}")]
    Rejected(String),

    #[error("Not authorized")]
    Unauthorized,
}

/// Remote store holding favorite records, with a per-user change feed.
#[async_trait]
pub trait FavoritesBackend: Send + Sync {
    /// All favorite records of `user_id`.
    async fn fetch_favorites(&self, user_id: Uuid) -> Result<Vec<Favorite>, BackendError>;

    /// Open a change feed scoped to `user_id`.
    async fn subscribe(&self, user_id: Uuid) -> Result<Subscription, BackendError>;

    async fn insert_favorite(&self, user_id: Uuid, listing_id: Uuid) -> Result<(), BackendError>;

    async fn delete_favorite(&self, user_id: Uuid, listing_id: Uuid) -> Result<(), BackendError>;
}

/// Handle to an open change feed. Dropping it releases the feed.
pub struct Subscription {
    messages: BoxStream<'static, RealtimeMessage>,
}

impl Subscription {
    pub fn new(messages: impl Stream<Item = RealtimeMessage> + Send + 'static) -> Self {
        Self {
            messages: messages.boxed(),
        }
    }

    pub fn from_receiver(receiver: mpsc::Receiver<RealtimeMessage>) -> Self {
        Self::new(ReceiverStream::new(receiver))
    }

    /// Next message, or `None` once the feed has closed.
    pub async fn next(&mut self) -> Option<RealtimeMessage> {
        self.messages.next().await
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
