mod common;

use std::{
    collections::HashSet,
    sync::{Arc, atomic::Ordering},
};

use business_marketplace_api::{
    realtime::{ChangeKind, RealtimeMessage},
    services::auth_service::issue_token,
    sync::{
        BackendError, BearerIdentity, FavoriteEvent, FavoritesSync, Severity, ToggleError,
    },
};
use chrono::Duration;
use common::{Harness, StaticIdentity, eventually, message};
use uuid::Uuid;

#[tokio::test]
async fn initial_fetch_populates_favorites() {
    let user = Uuid::new_v4();
    let (l1, l2) = (Uuid::new_v4(), Uuid::new_v4());
    let h = Harness::new(StaticIdentity::signed_in(user));
    h.backend.seed(user, l1);

    h.sync.bind(Some(user)).await;

    assert!(h.sync.is_favorite(l1));
    assert!(!h.sync.is_favorite(l2));
    assert!(!h.sync.is_loading());
    assert_eq!(h.sync.user_id(), Some(user));
    assert_eq!(h.backend.subscribe_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.backend.open_feeds(user), 1);

    let snapshot = h.sync.snapshot();
    assert_eq!(snapshot.favorited_listing_ids.len(), 1);
    assert!(snapshot.pending.is_empty());
}

#[tokio::test]
async fn failed_fetch_leaves_favorites_empty() {
    let user = Uuid::new_v4();
    let h = Harness::new(StaticIdentity::signed_in(user));
    h.backend.seed(user, Uuid::new_v4());
    h.backend.fail_fetch();

    h.sync.bind(Some(user)).await;

    assert!(h.sync.favorites().is_empty());
    assert!(!h.sync.is_loading());
    assert!(h.notifier.all().is_empty());
    // The feed is still opened after a failed load.
    assert_eq!(h.backend.open_feeds(user), 1);
}

#[tokio::test]
async fn anonymous_binding_fetches_nothing_and_toggle_needs_login() {
    let listing = Uuid::new_v4();
    let h = Harness::new(StaticIdentity::anonymous());

    h.sync.bind(None).await;
    let before = h.sync.favorites();
    let err = h.sync.toggle_favorite(listing).await.unwrap_err();

    assert_eq!(err, ToggleError::NeedsLogin);
    assert!(err.needs_login());
    assert_eq!(h.sync.favorites(), before);
    assert!(!h.sync.is_pending(listing));
    assert_eq!(h.backend.fetch_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.backend.subscribe_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.backend.mutation_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unbound_sync_rejects_toggles_even_when_signed_in() {
    let user = Uuid::new_v4();
    let listing = Uuid::new_v4();
    let h = Harness::new(StaticIdentity::signed_in(user));

    h.sync.bind(None).await;
    let err = h.sync.toggle_favorite(listing).await.unwrap_err();

    assert_eq!(err, ToggleError::NeedsLogin);
    assert!(h.sync.favorites().is_empty());
    assert!(!h.sync.is_pending(listing));
    assert_eq!(h.backend.mutation_calls.load(Ordering::SeqCst), 0);
    assert!(h.notifier.all().is_empty());

    h.sync.bind(Some(user)).await;
    h.sync.unbind();
    assert!(h.sync.toggle_favorite(listing).await.unwrap_err().needs_login());
    assert!(!h.sync.is_favorite(listing));
    assert_eq!(h.backend.mutation_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn loading_is_reported_while_the_initial_fetch_is_outstanding() {
    let user = Uuid::new_v4();
    let listing = Uuid::new_v4();
    let h = Harness::new(StaticIdentity::signed_in(user));
    h.backend.seed(user, listing);
    let gate = h.backend.arm_fetch_gate();

    let sync = h.sync.clone();
    let bind = tokio::spawn(async move { sync.bind(Some(user)).await });
    gate.started.notified().await;

    assert!(h.sync.is_loading());
    assert!(h.sync.favorites().is_empty());

    gate.release.notify_one();
    bind.await.expect("bind task");

    assert!(!h.sync.is_loading());
    assert!(h.sync.is_favorite(listing));
}

#[tokio::test]
async fn identity_is_rechecked_on_every_toggle() {
    let user = Uuid::new_v4();
    let listing = Uuid::new_v4();
    let h = Harness::new(StaticIdentity::signed_in(user));
    h.sync.bind(Some(user)).await;

    h.identity.sign_out();
    let err = h.sync.toggle_favorite(listing).await.unwrap_err();

    assert!(err.needs_login());
    assert!(!h.sync.is_favorite(listing));
}

#[tokio::test]
async fn toggle_on_is_visible_before_the_backend_answers() {
    let user = Uuid::new_v4();
    let listing = Uuid::new_v4();
    let h = Harness::new(StaticIdentity::signed_in(user));
    h.sync.bind(Some(user)).await;
    let gate = h.backend.arm_gate();

    let sync = h.sync.clone();
    let toggle = tokio::spawn(async move { sync.toggle_favorite(listing).await });
    gate.started.notified().await;

    assert!(h.sync.is_favorite(listing));
    assert!(h.sync.is_pending(listing));

    gate.release.notify_one();
    let result = toggle.await.expect("toggle task");

    assert_eq!(result, Ok(true));
    assert!(h.sync.is_favorite(listing));
    assert!(!h.sync.is_pending(listing));
    assert!(h.backend.stored(user).contains(&listing));
    assert_eq!(h.notifier.titles(), vec!["Saved to favorites".to_string()]);
    assert_eq!(h.notifier.all()[0].severity, Severity::Success);
}

#[tokio::test]
async fn failed_delete_restores_the_favorite() {
    let user = Uuid::new_v4();
    let listing = Uuid::new_v4();
    let h = Harness::new(StaticIdentity::signed_in(user));
    h.backend.seed(user, listing);
    h.sync.bind(Some(user)).await;
    h.backend
        .fail_next_mutation(BackendError::Unavailable("network".into()));
    let gate = h.backend.arm_gate();

    let sync = h.sync.clone();
    let toggle = tokio::spawn(async move { sync.toggle_favorite(listing).await });
    gate.started.notified().await;

    assert!(!h.sync.is_favorite(listing));

    gate.release.notify_one();
    let result = toggle.await.expect("toggle task");

    assert_eq!(
        result,
        Err(ToggleError::Remote(BackendError::Unavailable("network".into())))
    );
    assert!(h.sync.is_favorite(listing));
    assert!(!h.sync.is_pending(listing));

    let notes = h.notifier.all();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].title, "Something went wrong");
    assert_eq!(notes[0].severity, Severity::Error);
    assert!(notes[0].description.contains("network"));
}

#[tokio::test]
async fn failed_insert_restores_absence() {
    let user = Uuid::new_v4();
    let listing = Uuid::new_v4();
    let h = Harness::new(StaticIdentity::signed_in(user));
    h.sync.bind(Some(user)).await;
    h.backend
        .fail_next_mutation(BackendError::Rejected("listing not found".into()));

    let result = h.sync.toggle_favorite(listing).await;

    assert!(matches!(result, Err(ToggleError::Remote(_))));
    assert!(!h.sync.is_favorite(listing));
    assert!(!h.sync.is_pending(listing));
    assert!(h.backend.stored(user).is_empty());
}

#[tokio::test]
async fn successful_delete_notifies_removal() {
    let user = Uuid::new_v4();
    let listing = Uuid::new_v4();
    let h = Harness::new(StaticIdentity::signed_in(user));
    h.backend.seed(user, listing);
    h.sync.bind(Some(user)).await;

    assert_eq!(h.sync.toggle_favorite(listing).await, Ok(false));

    assert!(!h.sync.is_favorite(listing));
    assert!(h.backend.stored(user).is_empty());
    assert_eq!(h.notifier.titles(), vec!["Removed from favorites".to_string()]);
}

#[tokio::test]
async fn realtime_delete_removes_only_that_listing() {
    let user = Uuid::new_v4();
    let (l1, l2) = (Uuid::new_v4(), Uuid::new_v4());
    let h = Harness::new(StaticIdentity::signed_in(user));
    h.backend.seed(user, l1);
    h.backend.seed(user, l2);
    h.sync.bind(Some(user)).await;

    h.backend
        .push(user, message(ChangeKind::Delete, user, l1))
        .await;

    assert!(eventually(|| !h.sync.is_favorite(l1)).await);
    assert_eq!(h.sync.favorites(), [l2].into_iter().collect::<HashSet<_>>());
}

#[tokio::test]
async fn realtime_insert_is_idempotent() {
    let user = Uuid::new_v4();
    let listing = Uuid::new_v4();
    let h = Harness::new(StaticIdentity::signed_in(user));
    h.sync.bind(Some(user)).await;

    h.backend
        .push(user, message(ChangeKind::Insert, user, listing))
        .await;
    h.backend
        .push(user, message(ChangeKind::Insert, user, listing))
        .await;

    assert!(eventually(|| h.sync.is_favorite(listing)).await);
    assert_eq!(h.sync.favorites().len(), 1);
}

#[tokio::test]
async fn applying_events_directly_is_idempotent() {
    let user = Uuid::new_v4();
    let (kept, absent) = (Uuid::new_v4(), Uuid::new_v4());
    let h = Harness::new(StaticIdentity::signed_in(user));
    h.sync.bind(Some(user)).await;

    assert!(h.sync.apply_event(FavoriteEvent::Insert(kept)));
    let once = h.sync.favorites();
    assert!(!h.sync.apply_event(FavoriteEvent::Insert(kept)));
    assert_eq!(h.sync.favorites(), once);

    assert!(!h.sync.apply_event(FavoriteEvent::Delete(absent)));
    assert_eq!(h.sync.favorites(), once);
}

#[tokio::test]
async fn malformed_realtime_messages_are_ignored() {
    let user = Uuid::new_v4();
    let listing = Uuid::new_v4();
    let h = Harness::new(StaticIdentity::signed_in(user));
    h.backend.seed(user, listing);
    h.sync.bind(Some(user)).await;

    let missing_listing = RealtimeMessage {
        event_type: "DELETE".into(),
        table: "favorites".into(),
        new: None,
        old: Some(serde_json::json!({ "user_id": user })),
        commit_timestamp: None,
    };
    let update = RealtimeMessage {
        event_type: "UPDATE".into(),
        ..message(ChangeKind::Delete, user, listing)
    };
    h.backend.push(user, missing_listing).await;
    h.backend.push(user, update).await;
    // A valid marker message proves the earlier ones were processed.
    let marker = Uuid::new_v4();
    h.backend
        .push(user, message(ChangeKind::Insert, user, marker))
        .await;

    assert!(eventually(|| h.sync.is_favorite(marker)).await);
    assert!(h.sync.is_favorite(listing));
    assert!(h.notifier.all().is_empty());
}

#[tokio::test]
async fn echo_of_a_local_toggle_is_harmless() {
    let user = Uuid::new_v4();
    let listing = Uuid::new_v4();
    let h = Harness::new(StaticIdentity::signed_in(user));
    h.backend.echo_mutations();
    h.sync.bind(Some(user)).await;

    assert_eq!(h.sync.toggle_favorite(listing).await, Ok(true));
    let marker = Uuid::new_v4();
    h.backend
        .push(user, message(ChangeKind::Insert, user, marker))
        .await;

    assert!(eventually(|| h.sync.is_favorite(marker)).await);
    assert!(h.sync.is_favorite(listing));
    assert_eq!(h.sync.favorites().len(), 2);
}

#[tokio::test]
async fn second_toggle_on_same_listing_is_rejected_while_pending() {
    let user = Uuid::new_v4();
    let listing = Uuid::new_v4();
    let h = Harness::new(StaticIdentity::signed_in(user));
    h.sync.bind(Some(user)).await;
    let gate = h.backend.arm_gate();

    let sync = h.sync.clone();
    let first = tokio::spawn(async move { sync.toggle_favorite(listing).await });
    gate.started.notified().await;

    assert_eq!(
        h.sync.toggle_favorite(listing).await,
        Err(ToggleError::InFlight(listing))
    );
    assert!(h.sync.is_favorite(listing));

    gate.release.notify_one();
    assert_eq!(first.await.expect("toggle task"), Ok(true));
    assert_eq!(h.backend.mutation_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn toggles_on_different_listings_overlap() {
    let user = Uuid::new_v4();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let h = Harness::new(StaticIdentity::signed_in(user));
    h.sync.bind(Some(user)).await;
    let gate = h.backend.arm_gate();

    let sync = h.sync.clone();
    let first = tokio::spawn(async move { sync.toggle_favorite(a).await });
    gate.started.notified().await;
    let sync = h.sync.clone();
    let second = tokio::spawn(async move { sync.toggle_favorite(b).await });
    gate.started.notified().await;

    assert!(h.sync.is_pending(a));
    assert!(h.sync.is_pending(b));

    gate.release.notify_one();
    gate.release.notify_one();
    assert_eq!(first.await.expect("first"), Ok(true));
    assert_eq!(second.await.expect("second"), Ok(true));
    assert_eq!(h.sync.favorites(), [a, b].into_iter().collect::<HashSet<_>>());
}

#[tokio::test]
async fn unbind_releases_the_feed() {
    let user = Uuid::new_v4();
    let h = Harness::new(StaticIdentity::signed_in(user));
    h.sync.bind(Some(user)).await;
    assert_eq!(h.backend.open_feeds(user), 1);

    h.sync.unbind();

    assert!(eventually(|| h.backend.open_feeds(user) == 0).await);
    assert_eq!(h.sync.user_id(), None);
    assert!(h.sync.favorites().is_empty());
}

#[tokio::test]
async fn dropping_the_last_handle_releases_the_feed() {
    let user = Uuid::new_v4();
    let h = Harness::new(StaticIdentity::signed_in(user));
    h.sync.bind(Some(user)).await;
    let backend = Arc::clone(&h.backend);

    drop(h);

    assert!(eventually(|| backend.open_feeds(user) == 0).await);
}

#[tokio::test]
async fn rebinding_starts_from_a_fresh_cache() {
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let (la, lb) = (Uuid::new_v4(), Uuid::new_v4());
    let h = Harness::new(StaticIdentity::signed_in(alice));
    h.backend.seed(alice, la);
    h.backend.seed(bob, lb);

    h.sync.bind(Some(alice)).await;
    assert!(h.sync.is_favorite(la));

    h.sync.bind(Some(bob)).await;
    assert!(!h.sync.is_favorite(la));
    assert!(h.sync.is_favorite(lb));
    assert!(eventually(|| h.backend.open_feeds(alice) == 0).await);
    assert_eq!(h.backend.open_feeds(bob), 1);
}

#[tokio::test]
async fn toggle_resolving_after_unbind_does_not_touch_state() {
    let user = Uuid::new_v4();
    let listing = Uuid::new_v4();
    let h = Harness::new(StaticIdentity::signed_in(user));
    h.sync.bind(Some(user)).await;
    h.backend
        .fail_next_mutation(BackendError::Unavailable("network".into()));
    let gate = h.backend.arm_gate();

    let sync = h.sync.clone();
    let toggle = tokio::spawn(async move { sync.toggle_favorite(listing).await });
    gate.started.notified().await;

    h.sync.unbind();
    h.sync.apply_event(FavoriteEvent::Insert(listing));
    gate.release.notify_one();

    assert!(matches!(
        toggle.await.expect("toggle task"),
        Err(ToggleError::Remote(_))
    ));
    // The failed toggle belonged to the old binding, so nothing is reverted.
    assert!(h.sync.is_favorite(listing));
    assert!(h.notifier.all().is_empty());
}

#[tokio::test]
async fn bearer_identity_resolves_tokens_at_call_time() {
    let secret = "test-secret";
    let user = Uuid::new_v4();
    let listing = Uuid::new_v4();
    let (token, _) = issue_token(user, "user", secret, Duration::hours(1)).expect("token");

    let identity = Arc::new(BearerIdentity::with_token(secret, format!("Bearer {token}")));
    let h = Harness::new(StaticIdentity::anonymous());
    let sync = FavoritesSync::new(h.backend.clone(), identity.clone(), h.notifier.clone());
    sync.bind(Some(user)).await;

    assert_eq!(sync.toggle_favorite(listing).await, Ok(true));
    assert!(h.backend.stored(user).contains(&listing));

    identity.clear();
    assert!(sync.toggle_favorite(listing).await.unwrap_err().needs_login());

    let forged = BearerIdentity::with_token("other-secret", token);
    let forged_sync = FavoritesSync::new(h.backend.clone(), Arc::new(forged), h.notifier.clone());
    assert!(
        forged_sync
            .toggle_favorite(listing)
            .await
            .unwrap_err()
            .needs_login()
    );
}
