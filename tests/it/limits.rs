//! Rate-limit and capacity behavior: one notice per run, no busy retries.

use crate::common::*;
use eventsub_ws::Config;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn rate_limited_create_notifies_once_and_does_not_spin() {
    let mut h = Harness::with_users(&[("alice", "1001")]);
    h.api.rate_limit_next.store(1, Ordering::SeqCst);

    h.eventsub.listen_raid("alice").unwrap();
    let conn = h.next_conn().await;
    conn.welcome("sess-1", 10);

    let body = h.next_create().await;
    assert_eq!(body["type"], "channel.raid");

    // rejected with 429: no automatic retry
    assert_quiet(&mut h.creates, "retry after 429").await;
    assert_eq!(h.listener.infos_containing("eventsub.limit"), 1);

    // the topic is still wanted and the next change retries it
    h.eventsub.listen_poll("alice").unwrap();
    let mut kinds: Vec<String> = Vec::new();
    for _ in 0..3 {
        kinds.push(h.next_create().await["type"].as_str().unwrap().to_owned());
    }
    kinds.sort();
    assert_eq!(kinds, vec!["channel.poll.begin", "channel.poll.end", "channel.raid"]);
    assert_eq!(h.listener.infos_containing("eventsub.limit"), 1);
}

#[tokio::test]
async fn capacity_exhaustion_notifies_once_and_queues() {
    let mut h = {
        let config = Config { cost_budget: 1, max_sessions: 1, ..Config::default() };
        let harness = Harness::new(config);
        harness.api.add_user("c1", "1");
        harness.api.add_user("c2", "2");
        harness
    };

    h.eventsub.listen_raid("c1").unwrap();
    let conn = h.next_conn().await;
    conn.welcome("sess-1", 10);
    let body = h.next_create().await;
    assert_eq!(body["condition"]["from_broadcaster_user_id"], "1");

    // no session may take this one: the cap is one session, budget one
    h.eventsub.listen_raid("c2").unwrap();
    assert_quiet(&mut h.creates, "create beyond capacity").await;
    assert_eq!(h.listener.infos_containing("eventsub.capacity"), 1);

    // further listens queue silently
    h.eventsub.listen_raid("c2").unwrap();
    assert_quiet(&mut h.creates, "create beyond capacity").await;
    assert_eq!(h.listener.infos_containing("eventsub.capacity"), 1);

    // freeing budget lets the queued topic through
    h.eventsub.unlisten_raid("c1").unwrap();
    h.next_delete().await;
    let body = h.next_create().await;
    assert_eq!(body["condition"]["from_broadcaster_user_id"], "2");
}
