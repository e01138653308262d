#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use business_marketplace_api::{
    models::Favorite,
    realtime::{ChangeKind, FavoriteChange, RealtimeMessage},
    sync::{
        BackendError, FavoritesBackend, FavoritesSync, IdentityProvider, Notification, Notifier,
        Subscription,
    },
};
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use uuid::Uuid;

/// Holds backend mutations until the test releases them.
#[derive(Clone, Default)]
pub struct Gate {
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

/// In-memory favorites store with failure injection and a per-user feed.
#[derive(Default)]
pub struct FakeBackend {
    records: Mutex<HashMap<Uuid, HashSet<Uuid>>>,
    feeds: Mutex<Vec<(Uuid, mpsc::Sender<RealtimeMessage>)>>,
    fail_fetch: AtomicBool,
    fail_next_mutation: Mutex<Option<BackendError>>,
    gate: Mutex<Option<Gate>>,
    fetch_gate: Mutex<Option<Gate>>,
    echo: AtomicBool,
    pub fetch_calls: AtomicUsize,
    pub subscribe_calls: AtomicUsize,
    pub mutation_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, user_id: Uuid, listing_id: Uuid) {
        self.records.lock().entry(user_id).or_default().insert(listing_id);
    }

    pub fn stored(&self, user_id: Uuid) -> HashSet<Uuid> {
        self.records.lock().get(&user_id).cloned().unwrap_or_default()
    }

    pub fn fail_fetch(&self) {
        self.fail_fetch.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_mutation(&self, err: BackendError) {
        *self.fail_next_mutation.lock() = Some(err);
    }

    /// Echo successful mutations back through the user's feed.
    pub fn echo_mutations(&self) {
        self.echo.store(true, Ordering::SeqCst);
    }

    pub fn arm_gate(&self) -> Gate {
        let gate = Gate::default();
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    /// Hold `fetch_favorites` until the test releases it.
    pub fn arm_fetch_gate(&self) -> Gate {
        let gate = Gate::default();
        *self.fetch_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn open_feeds(&self, user_id: Uuid) -> usize {
        self.feeds
            .lock()
            .iter()
            .filter(|(owner, tx)| *owner == user_id && !tx.is_closed())
            .count()
    }

    pub async fn push(&self, user_id: Uuid, message: RealtimeMessage) {
        let senders: Vec<_> = self
            .feeds
            .lock()
            .iter()
            .filter(|(owner, tx)| *owner == user_id && !tx.is_closed())
            .map(|(_, tx)| tx.clone())
            .collect();
        for tx in senders {
            let _ = tx.send(message.clone()).await;
        }
    }

    async fn mutate(&self, user_id: Uuid, listing_id: Uuid, kind: ChangeKind) -> Result<(), BackendError> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        if let Some(err) = self.fail_next_mutation.lock().take() {
            return Err(err);
        }
        {
            let mut records = self.records.lock();
            let set = records.entry(user_id).or_default();
            match kind {
                ChangeKind::Delete => {
                    set.remove(&listing_id);
                }
                _ => {
                    set.insert(listing_id);
                }
            }
        }
        if self.echo.load(Ordering::SeqCst) {
            self.push(user_id, message(kind, user_id, listing_id)).await;
        }
        Ok(())
    }
}

#[async_trait]
impl FavoritesBackend for FakeBackend {
    async fn fetch_favorites(&self, user_id: Uuid) -> Result<Vec<Favorite>, BackendError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.fetch_gate.lock().clone();
        if let Some(gate) = gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("fetch failed".into()));
        }
        Ok(self
            .stored(user_id)
            .into_iter()
            .map(|listing_id| record(user_id, listing_id))
            .collect())
    }

    async fn subscribe(&self, user_id: Uuid) -> Result<Subscription, BackendError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(32);
        self.feeds.lock().push((user_id, tx));
        Ok(Subscription::from_receiver(rx))
    }

    async fn insert_favorite(&self, user_id: Uuid, listing_id: Uuid) -> Result<(), BackendError> {
        self.mutate(user_id, listing_id, ChangeKind::Insert).await
    }

    async fn delete_favorite(&self, user_id: Uuid, listing_id: Uuid) -> Result<(), BackendError> {
        self.mutate(user_id, listing_id, ChangeKind::Delete).await
    }
}

#[derive(Default)]
pub struct StaticIdentity {
    user: Mutex<Option<Uuid>>,
}

impl StaticIdentity {
    pub fn signed_in(user_id: Uuid) -> Arc<Self> {
        Arc::new(Self {
            user: Mutex::new(Some(user_id)),
        })
    }

    pub fn anonymous() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sign_out(&self) {
        *self.user.lock() = None;
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_identity(&self) -> Option<Uuid> {
        *self.user.lock()
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn titles(&self) -> Vec<String> {
        self.seen.lock().iter().map(|n| n.title.clone()).collect()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.seen.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().push(notification);
    }
}

pub struct Harness {
    pub sync: FavoritesSync,
    pub backend: Arc<FakeBackend>,
    pub identity: Arc<StaticIdentity>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new(identity: Arc<StaticIdentity>) -> Self {
        let backend = FakeBackend::new();
        let notifier = RecordingNotifier::new();
        let sync = FavoritesSync::new(backend.clone(), identity.clone(), notifier.clone());
        Self {
            sync,
            backend,
            identity,
            notifier,
        }
    }
}

pub fn record(user_id: Uuid, listing_id: Uuid) -> Favorite {
    Favorite {
        id: Uuid::new_v4(),
        listing_id,
        user_id,
        created_at: Utc::now(),
    }
}

pub fn message(kind: ChangeKind, user_id: Uuid, listing_id: Uuid) -> RealtimeMessage {
    FavoriteChange::new(kind, record(user_id, listing_id)).to_message()
}

/// Poll `check` until it holds or a second has passed.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}
