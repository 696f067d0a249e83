//! Server-directed reconnect: the replacement session takes over every
//! subscription and no notification is lost in the overlap window.

use crate::common::*;
use eventsub_ws::CloseCause;
use serde_json::json;

#[tokio::test]
async fn reconnect_directive_moves_all_subscriptions() {
    let mut h = Harness::with_users(&[("c1", "1"), ("c2", "2"), ("c3", "3")]);
    for c in ["c1", "c2", "c3"] {
        h.eventsub.listen_raid(c).unwrap();
    }

    let mut conn1 = h.next_conn().await;
    conn1.welcome("sess-1", 10);
    for _ in 0..3 {
        let body = h.next_create().await;
        assert_eq!(body["transport"]["session_id"], "sess-1");
    }

    conn1.reconnect_to("wss://relocate.example/ws");
    let conn2 = h.next_conn().await;
    assert_eq!(conn2.url, "wss://relocate.example/ws");

    // the old connection still delivers during the overlap window
    conn1.notification("channel.raid", json!({ "from_broadcaster_user_login": "c1" }));
    let (kind, payload) = recv(&mut h.events, "overlap notification").await;
    assert_eq!(kind, "channel.raid");
    assert!(payload.contains("c1"));

    conn2.welcome("sess-2", 10);
    let mut channels = Vec::new();
    for _ in 0..3 {
        let body = h.next_create().await;
        assert_eq!(body["type"], "channel.raid");
        assert_eq!(body["transport"]["session_id"], "sess-2");
        channels.push(body["condition"]["from_broadcaster_user_id"].as_str().unwrap().to_owned());
    }
    channels.sort();
    assert_eq!(channels, vec!["1", "2", "3"]);
    assert_quiet(&mut h.creates, "extra create").await;

    // the retired connection is shut down once the replacement is welcomed
    conn1.expect_shutdown().await;
    conn1.closed(CloseCause::Shutdown);

    // still one session, now living on the new id
    let status = h.eventsub.status_text().await.unwrap();
    assert!(status.contains("sess-2"), "got: {status}");
    assert!(!status.contains("sess-1"), "got: {status}");
    assert!(!status.contains("#1"), "got: {status}");
}
