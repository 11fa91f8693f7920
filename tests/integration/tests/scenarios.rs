//! End-to-end scenarios over the in-process store
//!
//! Run with: cargo test -p integration-tests --test scenarios

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use integration_tests::{config_with, eventually, signed_in, unique_user, EventLog, TestNode};
use parking_lot::Mutex;
use social_core::{IdentityProvider, Post};
use social_service::{
    FeedSnapshot, FollowingSnapshot, ServiceError, Subscription, SyncState, ThreadSnapshot,
    ViewEvent, ViewKey,
};

// ============================================================================
// Feed
// ============================================================================

#[tokio::test]
async fn test_post_like_unlike() {
    let node = TestNode::start().unwrap();
    let alice = signed_in("alice");
    let bob = signed_in("bob");
    let as_alice = node.session(&alice);
    let as_bob = node.session(&bob);

    let log: EventLog<FeedSnapshot> = EventLog::new();
    let _feed = as_alice.feed(log.recorder()).unwrap();
    log.wait_for_snapshot(Vec::is_empty).await.unwrap();

    let post = as_alice.post("hello").await.unwrap();
    let posts = log.wait_for_snapshot(|posts| posts.len() == 1).await.unwrap();
    assert_eq!(posts[0].text, "hello");
    assert_eq!(posts[0].like_count(), 0);

    as_bob.like(&post.id).await.unwrap();
    let bob_id = bob.current_user_id().unwrap();
    let posts = log
        .wait_for_snapshot(|posts| posts.first().is_some_and(|p| p.is_liked_by(&bob_id)))
        .await
        .unwrap();
    assert_eq!(posts[0].like_count(), 1);

    as_bob.like(&post.id).await.unwrap();
    log.wait_for_snapshot(|posts| posts.first().is_some_and(|p| p.like_count() == 0))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_concurrent_likes_from_different_users_all_land() {
    let node = TestNode::start().unwrap();
    let author = signed_in("author");
    let post = node.session(&author).post("popular").await.unwrap();

    let likers: Vec<_> = (0..8).map(|_| signed_in("fan")).collect();
    let mut tasks = Vec::new();
    for identity in likers.clone() {
        let ctx = node.ctx.clone();
        let post_id = post.id.clone();
        tasks.push(tokio::spawn(async move {
            let user = identity.current_user_id().unwrap();
            ctx.feed().toggle_like(&user, &post_id).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let post = node.ctx.feed().get_post(&post.id).await.unwrap();
    assert_eq!(post.like_count(), 8);
}

#[tokio::test]
async fn test_delete_by_non_author_leaves_feed_unchanged() {
    let node = TestNode::start().unwrap();
    let alice = signed_in("alice");
    let mallory = signed_in("mallory");

    let post = node.session(&alice).post("mine").await.unwrap();
    let err = node.session(&mallory).delete(&post.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));
    assert_eq!(err.error_code(), "PERMISSION_DENIED");

    let posts = node.ctx.feed().list_posts().await.unwrap();
    assert_eq!(posts, vec![post]);
}

#[tokio::test]
async fn test_feed_orders_newest_first_and_drops_deleted() {
    let node = TestNode::start().unwrap();
    let alice = signed_in("alice");
    let session = node.session(&alice);

    let log: EventLog<FeedSnapshot> = EventLog::new();
    let _feed = session.feed(log.recorder()).unwrap();

    let first = session.post("first").await.unwrap();
    session.post("second").await.unwrap();
    let posts = log.wait_for_snapshot(|posts| posts.len() == 2).await.unwrap();
    let texts: Vec<_> = posts.iter().map(|p: &Post| p.text.as_str()).collect();
    assert_eq!(texts, ["second", "first"]);

    session.delete(&first.id).await.unwrap();
    let posts = log.wait_for_snapshot(|posts| posts.len() == 1).await.unwrap();
    assert_eq!(posts[0].text, "second");
}

// ============================================================================
// Social graph
// ============================================================================

#[tokio::test]
async fn test_follow_unfollow_live() {
    let node = TestNode::start().unwrap();
    let alice = signed_in("alice");
    let session = node.session(&alice);
    let bob = unique_user("bob");

    let log: EventLog<FollowingSnapshot> = EventLog::new();
    let _following = session.following(log.recorder()).unwrap();
    log.wait_for_snapshot(|set| set.is_empty()).await.unwrap();

    session.follow(&bob).await.unwrap();
    session.follow(&bob).await.unwrap();
    let set = log.wait_for_snapshot(|set| set.contains(&bob)).await.unwrap();
    assert_eq!(set.len(), 1);

    session.unfollow(&bob).await.unwrap();
    log.wait_for_snapshot(|set| set.is_empty()).await.unwrap();
    assert!(!session.is_following(&bob).await.unwrap());

    session.unfollow(&bob).await.unwrap();
}

// ============================================================================
// Direct messages
// ============================================================================

#[tokio::test]
async fn test_both_participants_see_the_same_thread() {
    let node = TestNode::start().unwrap();
    let a = signed_in("a");
    let b = signed_in("b");
    let a_id = a.current_user_id().unwrap();
    let b_id = b.current_user_id().unwrap();

    let a_log: EventLog<ThreadSnapshot> = EventLog::new();
    let b_log: EventLog<ThreadSnapshot> = EventLog::new();
    let _a_thread = node.session(&a).thread(&b_id, a_log.recorder()).unwrap();
    let _b_thread = node.session(&b).thread(&a_id, b_log.recorder()).unwrap();

    // One shared view for the two orderings of the pair
    assert_eq!(node.ctx.coordinator().active_views(), 1);

    node.session(&a).message(&b_id, "hi").await.unwrap();
    node.session(&b).message(&a_id, "yo").await.unwrap();

    for log in [&a_log, &b_log] {
        let messages = log.wait_for_snapshot(|m| m.len() == 2).await.unwrap();
        let texts: Vec<_> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["hi", "yo"]);
    }
}

// ============================================================================
// Sync
// ============================================================================

#[tokio::test]
async fn test_transport_drop_keeps_stale_snapshot_then_recovers() {
    let node = TestNode::start().unwrap();
    let alice = signed_in("alice");
    let session = node.session(&alice);

    let log: EventLog<FeedSnapshot> = EventLog::new();
    let _feed = session.feed(log.recorder()).unwrap();
    session.post("before").await.unwrap();
    log.wait_for_snapshot(|posts| posts.len() == 1).await.unwrap();

    node.store.disconnect();
    let stale = log.wait_for(ViewEvent::is_stale).await.unwrap();
    assert_eq!(stale.data().map(|posts| posts.len()), Some(1));
    assert_ne!(node.ctx.coordinator().state(&ViewKey::Feed), Some(SyncState::Live));

    node.store.reconnect();
    let ctx = &node.ctx;
    eventually(|| ctx.coordinator().state(&ViewKey::Feed) == Some(SyncState::Live))
        .await
        .unwrap();

    session.post("after").await.unwrap();
    let posts = log.wait_for_snapshot(|posts| posts.len() == 2).await.unwrap();
    assert_eq!(posts[0].text, "after");
    assert_eq!(node.store.active_watches(), 1);
}

#[tokio::test]
async fn test_exhausted_reconnects_surface_failure() {
    let config = config_with(&[("SYNC_MAX_RECONNECT_ATTEMPTS", "2")]).unwrap();
    let node = TestNode::start_with_config(&config);
    let alice = signed_in("alice");

    let log: EventLog<FeedSnapshot> = EventLog::new();
    let _feed = node.session(&alice).feed(log.recorder()).unwrap();
    log.wait_for_snapshot(Vec::is_empty).await.unwrap();

    node.store.disconnect();
    let failed = log.wait_for(ViewEvent::is_failed).await.unwrap();
    assert!(matches!(failed, ViewEvent::Failed { attempts: 2, last: Some(_) }));
    assert_eq!(
        node.ctx.coordinator().state(&ViewKey::Feed),
        Some(SyncState::Failed)
    );
}

#[tokio::test]
async fn test_shared_listener_released_by_last_cancel() {
    let node = TestNode::start().unwrap();
    let alice = signed_in("alice");
    let session = node.session(&alice);

    let first = session.feed(|_| {}).unwrap();
    let second = session.feed(|_| {}).unwrap();
    let store = node.store.clone();
    eventually(|| store.active_watches() == 1).await.unwrap();

    first.cancel();
    first.cancel();
    assert_eq!(node.store.active_watches(), 1);

    drop(second);
    eventually(|| store.active_watches() == 0).await.unwrap();
    assert_eq!(node.ctx.coordinator().active_views(), 0);
}

#[tokio::test]
async fn test_no_callback_after_cancel() {
    let node = TestNode::start().unwrap();
    let alice = signed_in("alice");
    let session = node.session(&alice);

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let sub = session
        .feed(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    eventually(|| calls.load(Ordering::SeqCst) >= 1).await.unwrap();

    // Keep the view alive so writes still produce snapshots
    let _other = session.feed(|_| {}).unwrap();

    sub.cancel();
    let after_cancel = calls.load(Ordering::SeqCst);
    for i in 0..5 {
        session.post(&format!("post {i}")).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), after_cancel);
}

#[tokio::test]
async fn test_callback_may_cancel_its_own_subscription() {
    let node = TestNode::start().unwrap();
    let alice = signed_in("alice");
    let session = node.session(&alice);

    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let calls = Arc::new(AtomicUsize::new(0));

    let own = Arc::clone(&slot);
    let counter = Arc::clone(&calls);
    let sub = session
        .feed(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(sub) = own.lock().as_ref() {
                sub.cancel();
            }
        })
        .unwrap();
    *slot.lock() = Some(sub);

    // The first delivery cancels; only then does the listener go away
    eventually(|| calls.load(Ordering::SeqCst) >= 1).await.unwrap();
    let store = node.store.clone();
    eventually(|| store.active_watches() == 0).await.unwrap();
    assert_eq!(node.ctx.coordinator().active_views(), 0);

    let seen = calls.load(Ordering::SeqCst);
    assert_eq!(seen, 1);
    session.post("two").await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(calls.load(Ordering::SeqCst), seen);
    assert!(slot.lock().as_ref().is_some_and(|s| !s.is_active()));
}

// ============================================================================
// Timeouts
// ============================================================================

#[tokio::test]
async fn test_slow_write_times_out() {
    let config = config_with(&[("STORE_WRITE_TIMEOUT_MS", "20")]).unwrap();
    let node = TestNode::start_with_config(&config);
    node.store.set_latency(Duration::from_millis(200));

    let alice = signed_in("alice");
    let err = node.session(&alice).post("slow").await.unwrap_err();
    assert!(matches!(err, ServiceError::Timeout { operation: "create_post", .. }));
    assert!(err.is_retryable());
}
