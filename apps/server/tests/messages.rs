mod common;

use std::time::Duration;

use axum::http::StatusCode;
use courier_shared::ids::UserId;
use serde_json::json;

use common::TestApp;

fn encode_query(value: &str) -> String {
    value
        .replace('+', "%2B")
        .replace('/', "%2F")
        .replace('=', "%3D")
}

#[tokio::test]
async fn test_send_message_returns_sent_status() {
    let app = TestApp::new();
    let (alice, bob) = (UserId::new(), UserId::new());
    let id = app.conversation(alice, bob).await;

    let (status, body) = app
        .post(
            alice,
            &format!("/api/conversations/{id}/messages"),
            json!({ "content": "hello" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["content"], "hello");
    assert_eq!(body["status"], "sent");
    assert_eq!(body["message_type"], "text");
    assert_eq!(body["sender_id"], alice.to_string());
    assert_eq!(body["edit_count"], 0);
}

#[tokio::test]
async fn test_send_rejects_invalid_bodies() {
    let app = TestApp::new();
    let (alice, bob) = (UserId::new(), UserId::new());
    let id = app.conversation(alice, bob).await;
    let uri = format!("/api/conversations/{id}/messages");

    for body in [
        json!({ "content": "   " }),
        json!({ "encrypted_content": "abc" }),
        json!({ "content": "x", "encrypted_content": "abc", "iv": "iv" }),
        json!({ "message_type": "image" }),
    ] {
        let (status, _) = app.post(alice, &uri, body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted {body}");
    }
}

#[tokio::test]
async fn test_outsider_cannot_send() {
    let app = TestApp::new();
    let (alice, bob, eve) = (UserId::new(), UserId::new(), UserId::new());
    let id = app.conversation(alice, bob).await;

    let (status, _) = app
        .post(
            eve,
            &format!("/api/conversations/{id}/messages"),
            json!({ "content": "intrusion" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_encrypted_message_keeps_ciphertext_and_iv() {
    let app = TestApp::new();
    let (alice, bob) = (UserId::new(), UserId::new());
    let id = app.conversation(alice, bob).await;

    let (status, sent) = app
        .post(
            alice,
            &format!("/api/conversations/{id}/messages"),
            json!({ "encrypted_content": "Y2lwaGVy", "iv": "aXY=" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, fetched) = app
        .get(bob, &format!("/api/messages/{}", sent["id"].as_str().unwrap()))
        .await;
    assert_eq!(fetched["encrypted_content"], "Y2lwaGVy");
    assert_eq!(fetched["iv"], "aXY=");
}

#[tokio::test]
async fn test_status_moves_forward_only_and_only_for_recipient() {
    let app = TestApp::new();
    let (alice, bob) = (UserId::new(), UserId::new());
    let id = app.conversation(alice, bob).await;
    let message = app.message(alice, &id, "ping").await;
    let uri = format!("/api/messages/{message}/status");

    let (status, _) = app.put(alice, &uri, json!({ "status": "read" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.put(bob, &uri, json!({ "status": "read" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "read");
    assert!(body["read_at"].is_string());

    let (status, body) = app.put(bob, &uri, json!({ "status": "delivered" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "read");
}

#[tokio::test]
async fn test_mark_all_read_updates_only_incoming_messages() {
    let app = TestApp::new();
    let (alice, bob) = (UserId::new(), UserId::new());
    let id = app.conversation(alice, bob).await;
    app.message(alice, &id, "one").await;
    app.message(alice, &id, "two").await;
    let own = app.message(bob, &id, "reply").await;

    let (status, body) = app
        .post(bob, &format!("/api/conversations/{id}/messages/read"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 2);

    let (_, own) = app.get(bob, &format!("/api/messages/{own}")).await;
    assert_eq!(own["status"], "sent");
}

#[tokio::test]
async fn test_history_pages_newest_first_with_cursor() {
    let app = TestApp::new();
    let (alice, bob) = (UserId::new(), UserId::new());
    let id = app.conversation(alice, bob).await;
    for n in 0..5 {
        app.message(alice, &id, &format!("m{n}")).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let (status, first) = app
        .get(bob, &format!("/api/conversations/{id}/messages?limit=3"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let contents: Vec<&str> = first["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["m4", "m3", "m2"]);
    assert_eq!(first["has_more"], true);

    let cursor = encode_query(first["next_cursor"].as_str().unwrap());
    let (_, second) = app
        .get(
            bob,
            &format!("/api/conversations/{id}/messages?limit=3&cursor={cursor}"),
        )
        .await;
    let contents: Vec<&str> = second["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["m1", "m0"]);
    assert_eq!(second["has_more"], false);
    assert!(second["next_cursor"].is_null());
}

#[tokio::test]
async fn test_history_rejects_garbage_cursor() {
    let app = TestApp::new();
    let (alice, bob) = (UserId::new(), UserId::new());
    let id = app.conversation(alice, bob).await;

    let (status, _) = app
        .get(alice, &format!("/api/conversations/{id}/messages?cursor=nope"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_edit_records_history_and_is_sender_only() {
    let app = TestApp::new();
    let (alice, bob) = (UserId::new(), UserId::new());
    let id = app.conversation(alice, bob).await;
    let message = app.message(alice, &id, "first draft").await;
    let uri = format!("/api/messages/{message}");

    let (status, _) = app.patch(bob, &uri, json!({ "content": "hijack" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, edited) = app.patch(alice, &uri, json!({ "content": "second" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["content"], "second");
    assert_eq!(edited["edit_count"], 1);
    assert_eq!(edited["original_content"], "first draft");
    assert!(edited["edited_at"].is_string());

    app.patch(alice, &uri, json!({ "content": "third" })).await;

    let (status, history) = app.get(bob, &format!("{uri}/edits")).await;
    assert_eq!(status, StatusCode::OK);
    let previous: Vec<&str> = history["edits"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["previous_content"].as_str().unwrap())
        .collect();
    assert_eq!(previous.len(), 2);
    assert!(previous.contains(&"first draft"));
    assert!(previous.contains(&"second"));
}

#[tokio::test]
async fn test_delete_hides_message_for_caller_only() {
    let app = TestApp::new();
    let (alice, bob) = (UserId::new(), UserId::new());
    let id = app.conversation(alice, bob).await;
    let message = app.message(alice, &id, "secret").await;

    let (status, _) = app.delete(bob, &format!("/api/messages/{message}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(bob, &format!("/api/messages/{message}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, history) = app
        .get(bob, &format!("/api/conversations/{id}/messages"))
        .await;
    assert!(history["messages"].as_array().unwrap().is_empty());

    let (status, _) = app.get(alice, &format!("/api/messages/{message}")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_reply_carries_preview_of_target() {
    let app = TestApp::new();
    let (alice, bob) = (UserId::new(), UserId::new());
    let id = app.conversation(alice, bob).await;
    let original = app.message(alice, &id, "question?").await;

    let (status, reply) = app
        .post(
            bob,
            &format!("/api/conversations/{id}/messages"),
            json!({ "content": "answer", "reply_to_id": original }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reply["reply_to_id"], original.as_str());
    assert_eq!(reply["reply_to"]["content"], "question?");
}

#[tokio::test]
async fn test_reply_to_message_in_other_conversation_is_rejected() {
    let app = TestApp::new();
    let (alice, bob, carol) = (UserId::new(), UserId::new(), UserId::new());
    let with_bob = app.conversation(alice, bob).await;
    let with_carol = app.conversation(alice, carol).await;
    let elsewhere = app.message(alice, &with_carol, "other thread").await;

    let (status, _) = app
        .post(
            alice,
            &format!("/api/conversations/{with_bob}/messages"),
            json!({ "content": "re", "reply_to_id": elsewhere }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_pin_and_unpin() {
    let app = TestApp::new();
    let (alice, bob) = (UserId::new(), UserId::new());
    let id = app.conversation(alice, bob).await;
    let message = app.message(alice, &id, "remember this").await;
    app.message(alice, &id, "noise").await;

    let (status, pinned) = app
        .put(bob, &format!("/api/messages/{message}/pin"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pinned["is_pinned"], true);
    assert_eq!(pinned["pinned_by"], bob.to_string());

    let (_, list) = app
        .get(alice, &format!("/api/conversations/{id}/messages/pinned"))
        .await;
    let list = list["messages"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], message.as_str());

    let (_, unpinned) = app.delete(alice, &format!("/api/messages/{message}/pin")).await;
    assert_eq!(unpinned["is_pinned"], false);
    assert!(unpinned["pinned_by"].is_null());
}

#[tokio::test]
async fn test_forward_copies_into_target_conversation() {
    let app = TestApp::new();
    let (alice, bob, carol) = (UserId::new(), UserId::new(), UserId::new());
    let with_bob = app.conversation(alice, bob).await;
    let with_carol = app.conversation(alice, carol).await;
    let message = app.message(bob, &with_bob, "pass it on").await;

    let (status, forwarded) = app
        .post(
            alice,
            &format!("/api/messages/{message}/forward"),
            json!({ "conversation_id": with_carol }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(forwarded["conversation_id"], with_carol.as_str());
    assert_eq!(forwarded["sender_id"], alice.to_string());
    assert_eq!(forwarded["content"], "pass it on");
    assert_eq!(forwarded["is_forwarded"], true);
    assert_eq!(forwarded["forwarded_from_id"], message.as_str());

    let (status, _) = app
        .post(
            bob,
            &format!("/api/messages/{message}/forward"),
            json!({ "conversation_id": with_carol }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_search_matches_plaintext_case_insensitively() {
    let app = TestApp::new();
    let (alice, bob, carol) = (UserId::new(), UserId::new(), UserId::new());
    let with_bob = app.conversation(alice, bob).await;
    let with_carol = app.conversation(alice, carol).await;
    app.message(alice, &with_bob, "Lunch tomorrow?").await;
    app.message(carol, &with_carol, "lunch was great").await;
    app.message(carol, &with_carol, "unrelated").await;

    let (status, all) = app.get(alice, "/api/messages/search?q=LUNCH").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["messages"].as_array().unwrap().len(), 2);

    let (_, scoped) = app
        .get(
            alice,
            &format!("/api/conversations/{with_carol}/messages/search?q=lunch"),
        )
        .await;
    let scoped = scoped["messages"].as_array().unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0]["content"], "lunch was great");

    let (_, for_bob) = app.get(bob, "/api/messages/search?q=lunch").await;
    assert_eq!(for_bob["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_search_rejects_blank_query() {
    let app = TestApp::new();
    let (status, _) = app.get(UserId::new(), "/api/messages/search?q=%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
