//! Client-side mirror of one user's favorites.
//!
//! [`FavoritesSync`] keeps a local set of favorited listing ids converged with
//! a remote store through an initial fetch, a realtime change feed, and
//! optimistic toggles that are reverted when the remote mutation fails. The
//! remote store, the caller's identity and the user-facing notification sink
//! are all injected as trait objects.

mod backend;
mod event;
mod favorites;
mod identity;
mod notify;
mod service_backend;
mod state;

pub use backend::{BackendError, FavoritesBackend, Subscription};
pub use event::FavoriteEvent;
pub use favorites::{FavoritesSync, ToggleError};
pub use identity::{BearerIdentity, IdentityProvider};
pub use notify::{Notification, Notifier, Severity, TracingNotifier};
pub use service_backend::ServiceBackend;
pub use state::FavoritesState;
