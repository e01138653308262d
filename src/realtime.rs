//! In-process change feed for the favorites table.
//!
//! Every committed insert or delete is published on a broadcast channel and
//! fanned out to per-user streams of [`RealtimeMessage`]s. Subscribers that
//! fall behind skip the messages they missed.

use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::{
    StreamExt,
    wrappers::{BroadcastStream, errors::BroadcastStreamRecvError},
};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Favorite;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        }
    }
}

/// A row-level change to one favorite record.
#[derive(Debug, Clone, PartialEq)]
pub struct FavoriteChange {
    pub kind: ChangeKind,
    pub record: Favorite,
    pub committed_at: DateTime<Utc>,
}

impl FavoriteChange {
    pub fn new(kind: ChangeKind, record: Favorite) -> Self {
        Self {
            kind,
            record,
            committed_at: Utc::now(),
        }
    }

    pub fn to_message(&self) -> RealtimeMessage {
        let row = serde_json::to_value(&self.record).ok();
        let (new, old) = match self.kind {
            ChangeKind::Insert | ChangeKind::Update => (row, None),
            ChangeKind::Delete => (None, row),
        };
        RealtimeMessage {
            event_type: self.kind.as_str().to_string(),
            table: "favorites".to_string(),
            new,
            old,
            commit_timestamp: Some(self.committed_at),
        }
    }
}

/// Wire payload pushed to subscribers.
///
/// Kept loosely typed so that consumers validate it before acting on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RealtimeMessage {
    pub event_type: String,
    pub table: String,
    #[schema(value_type = Option<Object>)]
    pub new: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub old: Option<Value>,
    pub commit_timestamp: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct FavoriteEventBus {
    sender: broadcast::Sender<FavoriteChange>,
}

impl FavoriteEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn emit(&self, change: FavoriteChange) {
        tracing::debug!(
            kind = change.kind.as_str(),
            user_id = %change.record.user_id,
            listing_id = %change.record.listing_id,
            "favorite change"
        );
        // No receivers is not an error.
        let _ = self.sender.send(change);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FavoriteChange> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Messages for changes to `user_id`'s favorites only.
    pub fn subscribe_user(&self, user_id: Uuid) -> BoxStream<'static, RealtimeMessage> {
        let stream = BroadcastStream::new(self.sender.subscribe()).filter_map(move |item| {
            match item {
                Ok(change) if change.record.user_id == user_id => Some(change.to_message()),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(%user_id, skipped, "realtime subscriber lagged");
                    None
                }
            }
        });
        Box::pin(stream)
    }
}

impl Default for FavoriteEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
