//! Listen/unlisten basics: body contents, readiness gating on the local
//! user's id, pending cleanup.

use crate::common::*;
use serde_json::json;

#[tokio::test]
async fn single_listen_produces_one_create() {
    let mut h = Harness::with_users(&[("alice", "1001"), ("me", "42")]);
    h.eventsub.set_local_username("me").unwrap();
    h.eventsub.listen_mod_actions("alice").unwrap();

    let conn = h.next_conn().await;
    conn.welcome("sess-1", 10);

    let body = h.next_create().await;
    assert_eq!(body["type"], "channel.moderate");
    assert_eq!(body["version"], "2");
    assert_eq!(
        body["condition"],
        json!({ "broadcaster_user_id": "1001", "moderator_user_id": "42" })
    );
    assert_eq!(body["transport"], json!({ "method": "websocket", "session_id": "sess-1" }));

    assert_quiet(&mut h.creates, "further create").await;
    assert!(h.eventsub.is_connected().await.unwrap());
}

#[tokio::test]
async fn shield_stays_pending_until_local_id_arrives() {
    let mut h = Harness::with_users(&[("alice", "1001"), ("me", "42")]);
    h.eventsub.listen_shield("alice").unwrap();

    let conn = h.next_conn().await;
    conn.welcome("sess-1", 10);

    // no local username yet: nothing may be submitted
    assert_quiet(&mut h.creates, "create before local id").await;

    h.eventsub.set_local_username("me").unwrap();
    let mut kinds = vec![
        h.next_create().await["type"].as_str().unwrap().to_owned(),
        h.next_create().await["type"].as_str().unwrap().to_owned(),
    ];
    kinds.sort();
    assert_eq!(kinds, vec!["channel.shield_mode.begin", "channel.shield_mode.end"]);
    assert_quiet(&mut h.creates, "third create").await;
}

#[tokio::test]
async fn unlisten_before_resolution_never_creates() {
    let mut h = Harness::with_users(&[("bob", "2002")]);
    // bob resolves slowly; the unlisten wins the race
    h.api.delay_user("bob", std::time::Duration::from_millis(150));

    h.eventsub.listen_raid("bob").unwrap();
    let conn = h.next_conn().await;
    conn.welcome("sess-1", 10);
    h.eventsub.unlisten_raid("bob").unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    assert_quiet(&mut h.creates, "create for unlistened topic").await;
}

#[tokio::test]
async fn listen_is_idempotent_and_unlisten_deletes() {
    let mut h = Harness::with_users(&[("alice", "1001"), ("me", "42")]);
    h.eventsub.set_local_username("me").unwrap();
    h.eventsub.listen_mod_actions("alice").unwrap();
    h.eventsub.listen_mod_actions("#Alice").unwrap();

    let conn = h.next_conn().await;
    conn.welcome("sess-1", 10);

    let body = h.next_create().await;
    assert_eq!(body["type"], "channel.moderate");
    // the second listen coalesced onto the same topic
    assert_quiet(&mut h.creates, "duplicate create").await;

    h.eventsub.unlisten_mod_actions("alice").unwrap();
    assert_eq!(h.next_delete().await, "sub-1");
    assert_eq!(h.eventsub.topics_text().await.unwrap(), "no topics");
}

#[tokio::test]
async fn notifications_fan_out_to_the_listener() {
    let mut h = Harness::with_users(&[("alice", "1001")]);
    h.eventsub.listen_poll("alice").unwrap();

    let conn = h.next_conn().await;
    conn.welcome("sess-1", 10);
    h.next_create().await;
    h.next_create().await;

    conn.notification("channel.poll.begin", json!({ "title": "soup?" }));
    let (kind, payload) = recv(&mut h.events, "listener event").await;
    assert_eq!(kind, "channel.poll.begin");
    assert!(payload.contains("soup?"));
}

#[tokio::test]
async fn missing_user_keeps_topic_pending() {
    let mut h = Harness::with_users(&[]);
    h.eventsub.listen_points("ghost").unwrap();

    let conn = h.next_conn().await;
    conn.welcome("sess-1", 10);

    assert_quiet(&mut h.creates, "create for unknown user").await;
    let topics = h.eventsub.topics_text().await.unwrap();
    assert!(topics.contains("waiting for ids"), "got: {topics}");
    assert_eq!(h.listener.infos_containing("no such user: ghost"), 1);
}
