//! Forwarding behavior: messages cross the bridge verbatim, in arrival
//! order, exactly once per direction.

use test_helpers::*;

use futures_util::SinkExt;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// Route whose backend appends everything it reads to a file, so tests
/// can observe exactly what reached the backend's stdin
fn sink_route(key: &str, file: &std::path::Path) -> (String, Vec<String>) {
    (
        key.to_string(),
        vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("cat > {}", file.display()),
        ],
    )
}

#[tokio::test]
async fn test_client_messages_reach_backend_in_order() {
    let sink = tempfile::NamedTempFile::new().unwrap();
    let routes = route_table_owned(vec![sink_route("sink", sink.path())]);
    let (_proxy, addr, accept_loop) = start_proxy(routes).await;

    let mut ws = connect(addr, "/sink").await.unwrap();
    for i in 1..=5 {
        send_text(&mut ws, &format!("message {}", i)).await.unwrap();
    }

    let expected = "message 1\nmessage 2\nmessage 3\nmessage 4\nmessage 5\n";
    assert!(
        wait_until(|| {
            std::fs::read_to_string(sink.path()).is_ok_and(|contents| contents == expected)
        })
        .await,
        "backend should receive all messages in order, got {:?}",
        std::fs::read_to_string(sink.path()).unwrap_or_default()
    );

    ws.close(None).await.unwrap();
    accept_loop.abort();
}

#[tokio::test]
async fn test_backend_messages_reach_client_in_order() {
    let routes = route_table(&[("gen", &["sh", "-c", "echo alpha; echo beta; echo gamma"])]);
    let (_proxy, addr, accept_loop) = start_proxy(routes).await;

    let mut ws = connect(addr, "/gen").await.unwrap();
    assert_eq!(recv_text(&mut ws).await.unwrap(), "alpha");
    assert_eq!(recv_text(&mut ws).await.unwrap(), "beta");
    assert_eq!(recv_text(&mut ws).await.unwrap(), "gamma");

    // Clean backend exit closes the socket normally
    let frame = expect_close(&mut ws).await.unwrap();
    if let Some(frame) = frame {
        assert_eq!(frame.code, CloseCode::Normal);
    }
    accept_loop.abort();
}

#[tokio::test]
async fn test_payload_delivered_exactly_once() {
    let sink = tempfile::NamedTempFile::new().unwrap();
    let routes = route_table_owned(vec![sink_route("go", sink.path())]);
    let (proxy, addr, accept_loop) = start_proxy(routes).await;

    let mut ws = connect(addr, "/go").await.unwrap();
    send_text(&mut ws, "{\"id\":1}").await.unwrap();

    assert!(
        wait_until(|| {
            std::fs::read_to_string(sink.path()).is_ok_and(|c| c == "{\"id\":1}\n")
        })
        .await
    );

    // Nothing further arrives after the session ends
    ws.close(None).await.unwrap();
    assert!(wait_until(|| proxy.active_session_count() == 0).await);
    assert_eq!(
        std::fs::read_to_string(sink.path()).unwrap(),
        "{\"id\":1}\n"
    );
    accept_loop.abort();
}

#[tokio::test]
async fn test_echo_roundtrip_preserves_payloads() {
    let (_proxy, addr, accept_loop) = start_proxy(route_table(&[("echo", &["cat"])])).await;

    let mut ws = connect(addr, "/echo").await.unwrap();
    let payloads = [
        "{\"jsonrpc\":\"2.0\",\"method\":\"initialize\",\"id\":0}",
        "plain text",
        "unicode: héllo wörld ∀x",
        "",
    ];
    for payload in payloads {
        send_text(&mut ws, payload).await.unwrap();
        assert_eq!(recv_text(&mut ws).await.unwrap(), payload);
    }

    ws.close(None).await.unwrap();
    accept_loop.abort();
}

#[tokio::test]
async fn test_binary_frame_with_utf8_payload_is_forwarded() {
    let (_proxy, addr, accept_loop) = start_proxy(route_table(&[("echo", &["cat"])])).await;

    let mut ws = connect(addr, "/echo").await.unwrap();
    ws.send(Message::binary(b"{\"id\":2}".to_vec()))
        .await
        .unwrap();
    assert_eq!(recv_text(&mut ws).await.unwrap(), "{\"id\":2}");

    ws.close(None).await.unwrap();
    accept_loop.abort();
}

#[tokio::test]
async fn test_interleaved_traffic_keeps_per_direction_order() {
    let (_proxy, addr, accept_loop) = start_proxy(route_table(&[("echo", &["cat"])])).await;

    let mut ws = connect(addr, "/echo").await.unwrap();
    // Queue several messages before reading anything back; echo order
    // must match send order
    for i in 0..20 {
        send_text(&mut ws, &format!("m{}", i)).await.unwrap();
    }
    for i in 0..20 {
        assert_eq!(recv_text(&mut ws).await.unwrap(), format!("m{}", i));
    }

    ws.close(None).await.unwrap();
    accept_loop.abort();
}
