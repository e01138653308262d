use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use super::event::FavoriteEvent;

/// Local view of one user's favorites.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FavoritesState {
    pub favorited_listing_ids: HashSet<Uuid>,
    /// True only while the initial fetch is outstanding.
    pub is_loading: bool,
    /// Listings with a toggle in flight.
    pub pending: HashMap<Uuid, bool>,
}

impl FavoritesState {
    pub fn is_favorite(&self, listing_id: &Uuid) -> bool {
        self.favorited_listing_ids.contains(listing_id)
    }

    pub fn is_pending(&self, listing_id: &Uuid) -> bool {
        self.pending.get(listing_id).copied().unwrap_or(false)
    }

    pub(crate) fn set_favorite(&mut self, listing_id: Uuid, favorited: bool) {
        if favorited {
            self.favorited_listing_ids.insert(listing_id);
        } else {
            self.favorited_listing_ids.remove(&listing_id);
        }
    }

    /// Merge a realtime event. Set-membership only, so replays are no-ops.
    ///
    /// Returns whether the set changed.
    pub fn apply(&mut self, event: &FavoriteEvent) -> bool {
        match event {
            FavoriteEvent::Insert(id) => self.favorited_listing_ids.insert(*id),
            FavoriteEvent::Delete(id) => self.favorited_listing_ids.remove(id),
        }
    }
}
