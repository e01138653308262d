use serde_json::Value;
use uuid::Uuid;

use crate::realtime::RealtimeMessage;

const FAVORITES_TABLE: &str = "favorites";

/// A validated change to the favorited set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FavoriteEvent {
    Insert(Uuid),
    Delete(Uuid),
}

impl FavoriteEvent {
    pub fn listing_id(&self) -> Uuid {
        match self {
            FavoriteEvent::Insert(id) | FavoriteEvent::Delete(id) => *id,
        }
    }

    /// Validate a raw realtime message for `user_id`.
    ///
    /// Returns `None` for other tables, updates, unknown kinds, rows without
    /// a usable `listing_id`, and rows that belong to a different user.
    pub fn from_message(message: &RealtimeMessage, user_id: Uuid) -> Option<Self> {
        if message.table != FAVORITES_TABLE {
            return None;
        }
        let (row, inserted) = match message.event_type.to_ascii_uppercase().as_str() {
            "INSERT" => (message.new.as_ref()?, true),
            "DELETE" => (message.old.as_ref()?, false),
            _ => return None,
        };

        if let Some(owner) = row.get("user_id") {
            if uuid_field(owner) != Some(user_id) {
                return None;
            }
        }

        let listing_id = row.get("listing_id").and_then(uuid_field)?;
        Some(if inserted {
            FavoriteEvent::Insert(listing_id)
        } else {
            FavoriteEvent::Delete(listing_id)
        })
    }
}

fn uuid_field(value: &Value) -> Option<Uuid> {
    value.as_str().and_then(|s| Uuid::parse_str(s).ok())
}
