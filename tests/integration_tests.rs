mod common;

use common::{config, next_entries, received_text, ScriptedOpener};
use rs232term::infrastructure::serial::LoopbackOpener;
use rs232term::{
    display_channel, ConnectError, ConnectionManager, ConnectionState, DisplayEntry, SendError,
};
use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

/// Connection lifecycle tests
#[cfg(test)]
mod integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_disconnect_then_reopen_same_name() {
        let opener = LoopbackOpener::new();
        let (sink, _log) = display_channel();
        let manager = ConnectionManager::new(Arc::new(opener.clone()), sink);

        for _ in 0..3 {
            assert_ok!(manager.connect(config("loop://cycle")).await);
            assert_eq!(manager.state().await, ConnectionState::Open);

            assert_ok!(manager.disconnect().await);
            assert_eq!(manager.state().await, ConnectionState::Closed);
            assert!(!opener.is_in_use("loop://cycle"));
        }
    }

    #[tokio::test]
    async fn test_connect_while_open_keeps_original_handle() {
        let (opener, wire) = ScriptedOpener::new();
        let (sink, _log) = display_channel();
        let manager = ConnectionManager::new(opener, sink);

        assert_ok!(manager.connect(config("/dev/ttyS0")).await);
        let err = manager.connect(config("/dev/ttyS1")).await.unwrap_err();

        assert!(matches!(err, ConnectError::AlreadyOpen));
        assert_eq!(manager.port_name().await.as_deref(), Some("/dev/ttyS0"));
        assert_eq!(wire.opened.load(Ordering::SeqCst), 1);

        manager.disconnect().await.unwrap();
        assert_eq!(wire.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_send_while_closed_writes_nothing() {
        let (opener, wire) = ScriptedOpener::new();
        let (sink, mut log) = display_channel();
        let manager = ConnectionManager::new(opener, sink);

        let err = manager.send("AT\r\n").await.unwrap_err();

        assert!(matches!(err, SendError::NotConnected));
        assert!(wire.written().is_empty());
        assert!(log.drain().is_empty());
    }

    #[tokio::test]
    async fn test_send_after_disconnect_fails_fast() {
        let (opener, wire) = ScriptedOpener::new();
        let (sink, _log) = display_channel();
        let manager = ConnectionManager::new(opener, sink);

        manager.connect(config("/dev/ttyS0")).await.unwrap();
        manager.disconnect().await.unwrap();

        assert!(matches!(manager.send("x").await, Err(SendError::NotConnected)));
        assert!(wire.written().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (opener, wire) = ScriptedOpener::new();
        let (sink, _log) = display_channel();
        let manager = ConnectionManager::new(opener, sink);

        // Closed from the start
        assert_ok!(manager.disconnect().await);

        manager.connect(config("/dev/ttyS0")).await.unwrap();
        assert_ok!(manager.disconnect().await);
        assert_ok!(manager.disconnect().await);
        assert_eq!(manager.state().await, ConnectionState::Closed);
        assert_eq!(wire.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_delivery_after_disconnect() {
        let (opener, wire) = ScriptedOpener::new();
        let (sink, mut log) = display_channel();
        let manager = ConnectionManager::new(opener, sink);

        manager.connect(config("/dev/ttyS0")).await.unwrap();
        wire.push_inbound(Ok(b"before".to_vec()));
        assert_eq!(received_text(&mut log, 6).await, "before");

        manager.disconnect().await.unwrap();
        wire.push_inbound(Ok(b"after".to_vec()));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(log.drain().is_empty());
    }

    #[tokio::test]
    async fn test_independent_connections() {
        let opener = Arc::new(LoopbackOpener::new());
        let (sink_a, mut log_a) = display_channel();
        let (sink_b, mut log_b) = display_channel();
        let a = ConnectionManager::new(opener.clone(), sink_a);
        let b = ConnectionManager::new(opener, sink_b);

        a.connect(config("loop://a")).await.unwrap();
        b.connect(config("loop://b")).await.unwrap();

        a.send("alpha").await.unwrap();
        b.send("beta").await.unwrap();

        assert_eq!(received_text(&mut log_a, 5).await, "alpha");
        assert_eq!(received_text(&mut log_b, 4).await, "beta");

        a.disconnect().await.unwrap();
        b.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_same_name_cannot_be_opened_twice() {
        let opener = Arc::new(LoopbackOpener::new());
        let (sink, _log) = display_channel();
        let first = ConnectionManager::new(opener.clone(), sink.clone());
        let second = ConnectionManager::new(opener, sink);

        first.connect(config("loop://shared")).await.unwrap();
        let err = assert_err!(second.connect(config("loop://shared")).await);
        assert!(matches!(err, ConnectError::OpenFailure { .. }));
        assert_eq!(second.state().await, ConnectionState::Closed);

        first.disconnect().await.unwrap();
        assert_ok!(second.connect(config("loop://shared")).await);
        second.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_receive_failure_does_not_close_connection() {
        let (opener, wire) = ScriptedOpener::new();
        let (sink, mut log) = display_channel();
        let manager = ConnectionManager::new(opener, sink);

        wire.push_inbound(Err(io::Error::new(io::ErrorKind::BrokenPipe, "device removed")));
        manager.connect(config("/dev/ttyS0")).await.unwrap();

        let entries = next_entries(&mut log, 1).await;
        assert!(matches!(&entries[0], DisplayEntry::Diagnostic(text) if text.contains("device removed")));
        assert!(manager.is_open().await);
        assert_eq!(manager.stats().await.receive_failures, 1);

        manager.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_bytes_written_in_order_with_pacing() {
        let (opener, wire) = ScriptedOpener::new();
        let (sink, _log) = display_channel();
        let manager = ConnectionManager::new(opener, sink);

        manager.connect(config("/dev/ttyS0")).await.unwrap();
        manager.send("AT\r\n").await.unwrap();

        assert_eq!(wire.written(), b"AT\r\n");
        let times = wire.write_times();
        for pair in times.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(1));
        }
        assert_eq!(manager.stats().await.bytes_sent, 4);

        manager.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_partial_write_reports_failure() {
        let (opener, wire) = ScriptedOpener::new();
        let (sink, mut log) = display_channel();
        let manager = ConnectionManager::new(opener, sink);

        manager.connect(config("/dev/ttyS0")).await.unwrap();
        *wire.fail_write_at.lock().unwrap() = Some(2);

        let err = manager.send("AT\r\n").await.unwrap_err();
        assert!(matches!(err, SendError::PartialWrite { bytes_sent: 2, .. }));
        assert_eq!(wire.written(), b"AT");

        let entries = next_entries(&mut log, 1).await;
        match &entries[0] {
            DisplayEntry::Diagnostic(text) => {
                assert!(text.starts_with("Failed to SEND AT"));
                assert!(text.contains("write timed out"));
            }
            other => panic!("expected diagnostic, got {other:?}"),
        }

        // Connection stays usable
        *wire.fail_write_at.lock().unwrap() = None;
        assert_ok!(manager.send("Z").await);
        assert!(manager.is_open().await);
        manager.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_failure_reported_in_order() {
        let (opener, wire) = ScriptedOpener::new();
        let (sink, mut log) = display_channel();
        let manager = ConnectionManager::new(opener, sink);

        wire.push_inbound(Ok(b"one ".to_vec()));
        wire.push_inbound(Ok(b"two ".to_vec()));
        wire.push_inbound(Err(io::Error::new(io::ErrorKind::Other, "framing error")));
        wire.push_inbound(Ok(b"four ".to_vec()));
        wire.push_inbound(Ok(b"five".to_vec()));
        manager.connect(config("/dev/ttyS0")).await.unwrap();

        let entries = next_entries(&mut log, 5).await;
        assert_eq!(entries[0], DisplayEntry::Received("one ".to_string()));
        assert_eq!(entries[1], DisplayEntry::Received("two ".to_string()));
        assert!(entries[2].is_diagnostic());
        assert!(entries[2].text().starts_with("Failed to RECEIVE\n"));
        assert!(entries[2].text().contains("framing error"));
        assert_eq!(entries[3], DisplayEntry::Received("four ".to_string()));
        assert_eq!(entries[4], DisplayEntry::Received("five".to_string()));

        let stats = manager.stats().await;
        assert_eq!(stats.bytes_received, 17);
        assert_eq!(stats.receive_failures, 1);

        manager.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_loopback_chunking_preserves_text() {
        for max_chunk in 1..=3 {
            let opener = LoopbackOpener::new().with_max_chunk(max_chunk);
            let (sink, mut log) = display_channel();
            let manager = ConnectionManager::new(Arc::new(opener), sink);

            manager.connect(config("loop://chunks")).await.unwrap();
            let message = "héllo wörld ✓";
            manager.send(message).await.unwrap();

            assert_eq!(received_text(&mut log, message.len()).await, message);
            manager.disconnect().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_receive_delivers_while_send_in_progress() {
        let (sink, mut log) = display_channel();
        let manager = Arc::new(ConnectionManager::new(Arc::new(LoopbackOpener::new()), sink));
        manager.connect(config("loop://duplex")).await.unwrap();

        let message = "x".repeat(300);
        let sender = {
            let manager = Arc::clone(&manager);
            let message = message.clone();
            tokio::spawn(async move { manager.send(message).await })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        let early: String = log.drain().iter().map(|entry| entry.text().to_string()).collect();
        assert!(!sender.is_finished(), "send should still be pacing bytes");
        assert!(!early.is_empty(), "echo should arrive before the send completes");

        assert_ok!(sender.await.unwrap());
        let rest = received_text(&mut log, message.len() - early.len()).await;
        assert_eq!(early + &rest, message);

        manager.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_during_send_lets_it_finish() {
        let (opener, wire) = ScriptedOpener::new();
        let (sink, _log) = display_channel();
        let manager = Arc::new(ConnectionManager::new(opener, sink));
        manager.connect(config("/dev/ttyS0")).await.unwrap();

        let sender = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.send("y".repeat(300)).await })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_ok!(manager.disconnect().await);
        assert_eq!(manager.state().await, ConnectionState::Closed);
        assert!(matches!(manager.send("z").await, Err(SendError::NotConnected)));

        assert_ok!(sender.await.unwrap());
        assert_eq!(wire.written().len(), 300);
        // The send held the last reference and released the port itself
        assert_eq!(wire.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_port_name_freed_after_in_flight_send() {
        let opener = LoopbackOpener::new();
        let (sink, _log) = display_channel();
        let manager = Arc::new(ConnectionManager::new(Arc::new(opener.clone()), sink));
        manager.connect(config("loop://inflight")).await.unwrap();

        let sender = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.send("z".repeat(200)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.disconnect().await.unwrap();

        assert_ok!(sender.await.unwrap());
        assert!(!opener.is_in_use("loop://inflight"));
        assert_ok!(manager.connect(config("loop://inflight")).await);
        manager.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_racing_connect_disconnect_stays_consistent() {
        let opener = LoopbackOpener::new();
        let (sink, _log) = display_channel();
        let manager = Arc::new(ConnectionManager::new(Arc::new(opener.clone()), sink));

        let mut tasks = Vec::new();
        for i in 0..20 {
            let manager = Arc::clone(&manager);
            tasks.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    match manager.connect(config("loop://race")).await {
                        Ok(()) | Err(ConnectError::AlreadyOpen) => {}
                        Err(other) => panic!("unexpected connect error: {other}"),
                    }
                } else {
                    manager.disconnect().await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        if manager.is_open().await {
            assert_eq!(manager.port_name().await.as_deref(), Some("loop://race"));
            assert!(opener.is_in_use("loop://race"));
        } else {
            assert!(manager.port_name().await.is_none());
        }

        manager.disconnect().await.unwrap();
        assert_eq!(manager.state().await, ConnectionState::Closed);
        assert!(!opener.is_in_use("loop://race"));
    }
}
