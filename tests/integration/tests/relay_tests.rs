//! Relay Integration Tests
//!
//! Each test starts its own relay on a loopback port with a fresh storage
//! directory, then drives it with real TCP clients.
//!
//! Run with: cargo test -p integration-tests --test relay_tests

use integration_tests::{fixtures::*, TestServer};
use relay_gateway::handlers::AdminHandler;
use relay_gateway::protocol::{EmojiPayload, FilePayload, Frame, FORCED_LOGOUT};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Frames that carry user traffic rather than presence or listings
fn is_relayed(frame: &Frame) -> bool {
    match frame {
        Frame::Text(text) => !matches!(
            text.message_type(),
            Some("users_list" | "files_list" | "server_message")
        ),
        Frame::Emoji(_) | Frame::File(_) => true,
    }
}

// ============================================================================
// Session Tests
// ============================================================================

#[tokio::test]
async fn test_join_sequence() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("alice").await.unwrap();
    let mut bob = server.connect("bob").await.unwrap();

    let notice = alice.recv_json_type("server_message").await.unwrap();
    assert_eq!(notice["content"], "SERVER: bob 加入了聊天室");

    let users = alice.recv_json_type("users_list").await.unwrap();
    assert_eq!(users, json!({"type": "users_list", "users": ["alice", "bob"]}));

    let files = alice.recv_json_type("files_list").await.unwrap();
    assert_eq!(files, json!({"type": "files_list", "files": []}));

    bob.expect_none(is_relayed).await.unwrap();
    server.wait_for_users(&["alice", "bob"]).await.unwrap();
}

#[tokio::test]
async fn test_empty_username_is_refused() {
    let server = TestServer::start().await.expect("Failed to start server");

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream.write_all(b"  \r\n").await.unwrap();

    let mut buf = [0u8; 64];
    let n = tokio::time::timeout(integration_tests::RECV_TIMEOUT, stream.read(&mut buf))
        .await
        .expect("server should close the connection")
        .unwrap_or(0);
    assert_eq!(n, 0);
    assert!(server.state.registry().is_empty());
}

#[tokio::test]
async fn test_disconnect_announces_departure() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("alice").await.unwrap();
    let bob = server.connect("bob").await.unwrap();

    bob.disconnect().await.unwrap();

    alice.recv_notice("SERVER: bob 已离开聊天室").await.unwrap();
    server.wait_for_users(&["alice"]).await.unwrap();
}

#[tokio::test]
async fn test_concurrent_joins() {
    let server = TestServer::start().await.expect("Failed to start server");

    let mut handles = Vec::new();
    for _ in 0..12 {
        let addr = server.addr;
        handles.push(tokio::spawn(async move {
            integration_tests::TestClient::connect(addr, &unique_username("user")).await
        }));
    }

    let mut clients = Vec::new();
    for handle in handles {
        clients.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(server.state.registry().len(), 12);
    let mut names = server.state.registry().all_usernames();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 12);
}

// ============================================================================
// Chat Tests
// ============================================================================

#[tokio::test]
async fn test_broadcast_message() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("alice").await.unwrap();
    let mut bob = server.connect("bob").await.unwrap();

    alice
        .send_json(&json!({"type": "message", "content": "hi", "to": "所有人"}))
        .await
        .unwrap();

    let message = bob.recv_json_type("message").await.unwrap();
    assert_eq!(message, json!({"type": "message", "from": "alice", "content": "hi"}));

    alice.expect_none(is_relayed).await.unwrap();
}

#[tokio::test]
async fn test_message_without_recipient_goes_to_everyone() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("alice").await.unwrap();
    let mut bob = server.connect("bob").await.unwrap();

    alice
        .send_json(&json!({"type": "message", "content": "legacy"}))
        .await
        .unwrap();

    let message = bob.recv_json_type("message").await.unwrap();
    assert_eq!(message["content"], "legacy");
}

#[tokio::test]
async fn test_private_message() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("alice").await.unwrap();
    let mut bob = server.connect("bob").await.unwrap();
    let mut carol = server.connect("carol").await.unwrap();

    alice
        .send_json(&json!({"type": "message", "content": "psst", "to": "bob"}))
        .await
        .unwrap();

    let message = bob.recv_json_type("private_message").await.unwrap();
    assert_eq!(
        message,
        json!({"type": "private_message", "from": "alice", "content": "psst"})
    );

    carol.expect_none(is_relayed).await.unwrap();
    alice.expect_none(is_relayed).await.unwrap();
}

#[tokio::test]
async fn test_unicast_to_unknown_user_is_a_no_op() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("alice").await.unwrap();
    let mut bob = server.connect("bob").await.unwrap();

    alice
        .send_json(&json!({"type": "message", "content": "hello?", "to": "ghost"}))
        .await
        .unwrap();
    alice
        .send_json(&json!({"type": "game_invite", "to": "ghost"}))
        .await
        .unwrap();

    alice.expect_none(is_relayed).await.unwrap();
    bob.expect_none(is_relayed).await.unwrap();
    alice
        .expect_none(|f| matches!(f, Frame::Text(t) if t.text().contains("rejected")))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_plain_text_is_relayed() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("alice").await.unwrap();
    let mut bob = server.connect("bob").await.unwrap();

    alice.send_raw("hello everyone".as_bytes()).await.unwrap();

    let frame = bob.recv_until(is_relayed).await.unwrap();
    let Frame::Text(text) = frame else {
        panic!("expected text frame");
    };
    assert!(text.json().is_none());
    assert_eq!(text.text(), "hello everyone");
}

#[tokio::test]
async fn test_unknown_type_is_rejected() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("alice").await.unwrap();
    let mut bob = server.connect("bob").await.unwrap();
    alice.settle_join("bob").await.unwrap();

    alice
        .send_json(&json!({"type": "teleport", "to": "bob"}))
        .await
        .unwrap();

    let notice = alice.recv_json_type("server_message").await.unwrap();
    let content = notice["content"].as_str().unwrap();
    assert!(content.starts_with("rejected message: teleport"), "{content}");

    bob.expect_none(is_relayed).await.unwrap();

    // The connection stays usable
    alice
        .send_json(&json!({"type": "message", "content": "still here", "to": "所有人"}))
        .await
        .unwrap();
    assert_eq!(bob.recv_json_type("message").await.unwrap()["content"], "still here");
}

#[tokio::test]
async fn test_closed_recipient_does_not_block_others() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("alice").await.unwrap();
    let mut bob = server.connect("bob").await.unwrap();
    let carol = server.connect("carol").await.unwrap();

    drop(carol);

    alice
        .send_json(&json!({"type": "message", "content": "anyone?", "to": "所有人"}))
        .await
        .unwrap();

    assert_eq!(bob.recv_json_type("message").await.unwrap()["content"], "anyone?");
    server.wait_for_users(&["alice", "bob"]).await.unwrap();
    alice.recv_notice("SERVER: carol 已离开聊天室").await.unwrap();
}

// ============================================================================
// Game Tests
// ============================================================================

#[tokio::test]
async fn test_game_invite_and_response() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("alice").await.unwrap();
    let mut bob = server.connect("bob").await.unwrap();

    alice
        .send_json(&json!({"type": "game_invite", "to": "bob"}))
        .await
        .unwrap();
    let invite = bob.recv_json_type("game_invite").await.unwrap();
    assert_eq!(invite, json!({"type": "game_invite", "from": "alice", "to": "bob"}));

    bob.send_json(&json!({"type": "game_invite_response", "to": "alice", "accepted": true}))
        .await
        .unwrap();
    let response = alice.recv_json_type("game_invite_response").await.unwrap();
    assert_eq!(
        response,
        json!({"type": "game_invite_response", "from": "bob", "to": "alice", "accepted": true})
    );
}

#[tokio::test]
async fn test_game_moves_are_relayed() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("alice").await.unwrap();
    let mut bob = server.connect("bob").await.unwrap();

    alice
        .send_json(&json!({"type": "game_move", "to": "bob", "action": "move", "x": 7, "y": 7}))
        .await
        .unwrap();
    let mv = bob.recv_json_type("game_move").await.unwrap();
    assert_eq!(
        mv,
        json!({"type": "game_move", "from": "alice", "to": "bob", "action": "move", "x": 7, "y": 7})
    );

    bob.send_json(&json!({"type": "game_move", "to": "alice", "action": "draw_request"}))
        .await
        .unwrap();
    let draw = alice.recv_json_type("game_move").await.unwrap();
    assert_eq!(draw["action"], "draw_request");
    assert_eq!(draw["from"], "bob");

    alice
        .send_json(&json!({"type": "game_move", "to": "bob", "action": "draw_response", "accepted": false}))
        .await
        .unwrap();
    let answer = bob.recv_json_type("game_move").await.unwrap();
    assert_eq!(answer["accepted"], false);
}

// ============================================================================
// Attachment Tests
// ============================================================================

#[tokio::test]
async fn test_emoji_relay() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("alice").await.unwrap();
    let mut bob = server.connect("bob").await.unwrap();
    let image = sample_bytes(4096);

    alice
        .send_frame(&Frame::Emoji(EmojiPayload::new("所有人", image.clone())))
        .await
        .unwrap();

    let frame = bob.recv_until(|f| matches!(f, Frame::Emoji(_))).await.unwrap();
    let Frame::Emoji(emoji) = frame else {
        panic!("expected emoji frame");
    };
    assert_eq!(emoji.from.as_deref(), Some("alice"));
    assert_eq!(emoji.image, image);

    alice.expect_none(is_relayed).await.unwrap();
}

#[tokio::test]
async fn test_upload_download_delete() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("alice").await.unwrap();
    let mut bob = server.connect("bob").await.unwrap();
    alice.settle_join("bob").await.unwrap();
    let filename = unique_filename("bin");
    let content = sample_bytes(100_000);

    alice
        .send_frame(&Frame::File(FilePayload::transfer(&filename, "所有人", content.clone())))
        .await
        .unwrap();

    let expected = json!({"type": "files_list", "files": [filename.clone()]});
    assert_eq!(bob.recv_json_type("files_list").await.unwrap(), expected);
    assert_eq!(alice.recv_json_type("files_list").await.unwrap(), expected);
    assert_eq!(std::fs::read(server.storage().join(&filename)).unwrap(), content);

    bob.send_frame(&Frame::File(FilePayload::download_request(
        &filename,
        Some("downloads/copy.bin".to_string()),
    )))
    .await
    .unwrap();

    let frame = bob.recv_until(|f| matches!(f, Frame::File(_))).await.unwrap();
    let Frame::File(file) = frame else {
        panic!("expected file frame");
    };
    assert_eq!(file.filename, filename);
    assert_eq!(file.content, content);
    assert_eq!(file.save_path.as_deref(), Some("downloads/copy.bin"));

    let listing = AdminHandler::delete_file(&server.state, &filename).await.unwrap();
    assert!(listing.is_empty());
    assert_eq!(
        bob.recv_json_type("files_list").await.unwrap(),
        json!({"type": "files_list", "files": []})
    );
    assert!(!server.storage().join(&filename).exists());
}

#[tokio::test]
async fn test_download_missing_file() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("alice").await.unwrap();

    alice
        .send_frame(&Frame::File(FilePayload::download_request("nope.txt", None)))
        .await
        .unwrap();

    alice.recv_notice("file not found: nope.txt").await.unwrap();
}

#[tokio::test]
async fn test_upload_with_path_is_rejected() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("alice").await.unwrap();

    alice
        .send_frame(&Frame::File(FilePayload::transfer("../escape.txt", "所有人", b"x".to_vec())))
        .await
        .unwrap();

    alice.recv_notice("invalid filename: ../escape.txt").await.unwrap();
    assert!(server.state.files().listing().is_empty());
}

#[tokio::test]
async fn test_private_file_is_forwarded_not_stored() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("alice").await.unwrap();
    let mut bob = server.connect("bob").await.unwrap();
    let mut carol = server.connect("carol").await.unwrap();
    let filename = unique_filename("txt");

    alice
        .send_frame(&Frame::File(FilePayload::transfer(&filename, "bob", b"secret".to_vec())))
        .await
        .unwrap();

    let frame = bob.recv_until(|f| matches!(f, Frame::File(_))).await.unwrap();
    let Frame::File(file) = frame else {
        panic!("expected file frame");
    };
    assert_eq!(file.from.as_deref(), Some("alice"));
    assert_eq!(file.content, b"secret");

    carol.expect_none(is_relayed).await.unwrap();
    assert!(!server.storage().join(&filename).exists());
    assert!(server.state.files().listing().is_empty());
}

// ============================================================================
// Admin Tests
// ============================================================================

#[tokio::test]
async fn test_kick() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("alice").await.unwrap();
    let mut bob = server.connect("bob").await.unwrap();

    assert!(AdminHandler::kick(&server.state, "bob").await);

    bob.recv_notice(FORCED_LOGOUT).await.unwrap();
    bob.expect_closed().await.unwrap();

    assert_eq!(server.state.registry().all_usernames(), vec!["alice"]);
    alice
        .recv_until(|f| {
            matches!(f, Frame::Text(t)
                if t.message_type() == Some("users_list")
                    && t.json().is_some_and(|v| v["users"] == json!(["alice"])))
        })
        .await
        .unwrap();
    alice.recv_notice("SERVER: bob 已离开聊天室").await.unwrap();

    assert!(!AdminHandler::kick(&server.state, "bob").await);
}
