use std::{collections::HashSet, sync::Arc};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{
    backend::{BackendError, FavoritesBackend, Subscription},
    event::FavoriteEvent,
    identity::IdentityProvider,
    notify::{Notification, Notifier},
    state::FavoritesState,
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToggleError {
    #[error("Sign in to save favorites")]
    NeedsLogin,

    #[error("A favorite update for listing {0} is already in flight")]
    InFlight(Uuid),

    #[error(transparent)]
    Remote(#[from] BackendError),
}

impl ToggleError {
    pub fn needs_login(&self) -> bool {
        matches!(self, ToggleError::NeedsLogin)
    }
}

/// State of the current binding. `generation` changes on every bind and
/// unbind; work started under an older generation must not touch `state`.
#[derive(Default)]
struct Binding {
    generation: u64,
    user_id: Option<Uuid>,
    state: FavoritesState,
    listener: Option<JoinHandle<()>>,
}

impl Binding {
    fn reset(&mut self, user_id: Option<Uuid>) -> u64 {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        self.generation += 1;
        self.user_id = user_id;
        self.state = FavoritesState {
            is_loading: user_id.is_some(),
            ..FavoritesState::default()
        };
        self.generation
    }
}

type Shared = Arc<Mutex<Binding>>;

struct Inner {
    backend: Arc<dyn FavoritesBackend>,
    identity: Arc<dyn IdentityProvider>,
    notifier: Arc<dyn Notifier>,
    binding: Shared,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.binding.lock().reset(None);
    }
}

/// Keeps one user's favorited listings in sync with the backend.
///
/// Cloning is cheap and every clone shares the same state. The binding is
/// torn down by [`FavoritesSync::unbind`], by a rebind, or when the last
/// clone is dropped.
#[derive(Clone)]
pub struct FavoritesSync {
    inner: Arc<Inner>,
}

impl FavoritesSync {
    pub fn new(
        backend: Arc<dyn FavoritesBackend>,
        identity: Arc<dyn IdentityProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                identity,
                notifier,
                binding: Arc::new(Mutex::new(Binding::default())),
            }),
        }
    }

    /// Bind to `user_id`, discarding whatever was bound before.
    ///
    /// With a user this loads their favorites and then opens the realtime
    /// feed. A failed load is logged and leaves the set empty. With `None`
    /// nothing is fetched and the set stays empty.
    pub async fn bind(&self, user_id: Option<Uuid>) {
        let generation = self.inner.binding.lock().reset(user_id);
        let Some(user_id) = user_id else {
            tracing::debug!("favorites unbound: no signed-in user");
            return;
        };

        let fetched = self.inner.backend.fetch_favorites(user_id).await;
        {
            let mut binding = self.inner.binding.lock();
            if binding.generation != generation {
                tracing::debug!(%user_id, "discarding favorites fetched for a stale binding");
                return;
            }
            binding.state.is_loading = false;
            match fetched {
                Ok(records) => {
                    binding.state.favorited_listing_ids =
                        records.into_iter().map(|r| r.listing_id).collect();
                    tracing::debug!(
                        %user_id,
                        count = binding.state.favorited_listing_ids.len(),
                        "favorites loaded"
                    );
                }
                Err(err) => {
                    tracing::warn!(%user_id, error = %err, "failed to load favorites");
                }
            }
        }

        let subscription = match self.inner.backend.subscribe(user_id).await {
            Ok(subscription) => subscription,
            Err(err) => {
                tracing::warn!(%user_id, error = %err, "failed to open favorites feed");
                return;
            }
        };

        let mut binding = self.inner.binding.lock();
        if binding.generation != generation {
            return;
        }
        let shared = Arc::clone(&self.inner.binding);
        binding.listener = Some(tokio::spawn(listen(shared, generation, user_id, subscription)));
    }

    /// End the binding and release the realtime feed.
    pub fn unbind(&self) {
        self.inner.binding.lock().reset(None);
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.inner.binding.lock().user_id
    }

    pub fn is_favorite(&self, listing_id: Uuid) -> bool {
        self.inner.binding.lock().state.is_favorite(&listing_id)
    }

    pub fn is_loading(&self) -> bool {
        self.inner.binding.lock().state.is_loading
    }

    pub fn is_pending(&self, listing_id: Uuid) -> bool {
        self.inner.binding.lock().state.is_pending(&listing_id)
    }

    pub fn favorites(&self) -> HashSet<Uuid> {
        self.inner.binding.lock().state.favorited_listing_ids.clone()
    }

    pub fn snapshot(&self) -> FavoritesState {
        self.inner.binding.lock().state.clone()
    }

    /// Merge one realtime event into the current state.
    pub fn apply_event(&self, event: FavoriteEvent) -> bool {
        self.inner.binding.lock().state.apply(&event)
    }

    /// Flip the favorite state of `listing_id`.
    ///
    /// The local set changes before the backend is called and is restored
    /// if the backend call fails. Returns the new membership on success. A
    /// second toggle for a listing that already has one in flight is
    /// rejected with [`ToggleError::InFlight`].
    pub async fn toggle_favorite(&self, listing_id: Uuid) -> Result<bool, ToggleError> {
        let Some(user_id) = self.inner.identity.current_identity().await else {
            tracing::debug!(%listing_id, "favorite toggle without a signed-in user");
            return Err(ToggleError::NeedsLogin);
        };

        let (generation, was_favorited) = {
            let mut binding = self.inner.binding.lock();
            if binding.user_id.is_none() {
                tracing::debug!(%listing_id, "favorite toggle on an unbound sync");
                return Err(ToggleError::NeedsLogin);
            }
            if binding.state.is_pending(&listing_id) {
                return Err(ToggleError::InFlight(listing_id));
            }
            let was_favorited = binding.state.is_favorite(&listing_id);
            binding.state.set_favorite(listing_id, !was_favorited);
            binding.state.pending.insert(listing_id, true);
            (binding.generation, was_favorited)
        };
        let _pending = PendingGuard {
            binding: &self.inner.binding,
            generation,
            listing_id,
        };

        let result = if was_favorited {
            self.inner.backend.delete_favorite(user_id, listing_id).await
        } else {
            self.inner.backend.insert_favorite(user_id, listing_id).await
        };

        match result {
            Ok(()) => {
                let favorited = !was_favorited;
                tracing::info!(%user_id, %listing_id, favorited, "favorite toggled");
                if self.is_current(generation) {
                    let notification = if favorited {
                        Notification::success(
                            "Saved to favorites",
                            "The listing was added to your favorites.",
                        )
                    } else {
                        Notification::success(
                            "Removed from favorites",
                            "The listing was removed from your favorites.",
                        )
                    };
                    self.inner.notifier.notify(notification);
                }
                Ok(favorited)
            }
            Err(err) => {
                tracing::warn!(%user_id, %listing_id, error = %err, "favorite toggle failed");
                let reverted = {
                    let mut binding = self.inner.binding.lock();
                    let current = binding.generation == generation;
                    if current {
                        binding.state.set_favorite(listing_id, was_favorited);
                    }
                    current
                };
                if reverted {
                    self.inner
                        .notifier
                        .notify(Notification::error("Something went wrong", err.to_string()));
                }
                Err(ToggleError::Remote(err))
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.binding.lock().generation == generation
    }
}

/// Clears the pending flag however the toggle ends, including cancellation.
struct PendingGuard<'a> {
    binding: &'a Shared,
    generation: u64,
    listing_id: Uuid,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut binding = self.binding.lock();
        if binding.generation == self.generation {
            binding.state.pending.remove(&self.listing_id);
        }
    }
}

async fn listen(shared: Shared, generation: u64, user_id: Uuid, mut subscription: Subscription) {
    while let Some(message) = subscription.next().await {
        let Some(event) = FavoriteEvent::from_message(&message, user_id) else {
            tracing::debug!(
                event_type = %message.event_type,
                "ignoring realtime message"
            );
            continue;
        };

        let mut binding = shared.lock();
        if binding.generation != generation {
            break;
        }
        if binding.state.apply(&event) {
            tracing::debug!(%user_id, listing_id = %event.listing_id(), "realtime favorite change applied");
        }
    }
    tracing::debug!(%user_id, "favorites feed closed");
}
