//! Host/client command channel tests over localhost

use lenslink_peer::{CommandClient, CommandHost, PeerError, PeerEvent};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn next_event(rx: &mut mpsc::Receiver<PeerEvent>) -> PeerEvent {
    timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for peer event")
        .expect("event channel closed unexpectedly")
}

#[tokio::test]
async fn commands_arrive_in_order() {
    let (host_tx, mut host_rx) = mpsc::channel(32);
    let mut host = CommandHost::new();
    let addr = host.start("127.0.0.1:0", host_tx).await.unwrap();

    let (client_tx, mut client_rx) = mpsc::channel(32);
    let mut client = CommandClient::new();
    client.start(&addr.to_string(), client_tx).await.unwrap();

    assert_eq!(next_event(&mut client_rx).await, PeerEvent::Connecting);
    assert_eq!(next_event(&mut client_rx).await, PeerEvent::Connected);

    assert_eq!(next_event(&mut host_rx).await, PeerEvent::InvitationReceived);
    assert_eq!(next_event(&mut host_rx).await, PeerEvent::Connected);

    client.send_command("capture").unwrap();
    client.send_command("zoom in").unwrap();
    client.send_command("zoom out").unwrap();

    assert_eq!(
        next_event(&mut host_rx).await,
        PeerEvent::Command("capture".to_string())
    );
    assert_eq!(
        next_event(&mut host_rx).await,
        PeerEvent::Command("zoom in".to_string())
    );
    assert_eq!(
        next_event(&mut host_rx).await,
        PeerEvent::Command("zoom out".to_string())
    );

    client.stop();
    assert_eq!(next_event(&mut host_rx).await, PeerEvent::Disconnected);
}

#[tokio::test]
async fn send_before_connect_fails_with_not_connected() {
    let client = CommandClient::new();
    match client.send_command("capture") {
        Err(PeerError::NotConnected) => {}
        other => panic!("expected NotConnected, got {:?}", other),
    }
}

#[tokio::test]
async fn connect_failure_reports_disconnected_once() {
    // Port 1 on localhost is almost certainly closed
    let (tx, mut rx) = mpsc::channel(32);
    let mut client = CommandClient::new();
    let result = client.start("127.0.0.1:1", tx).await;
    assert!(result.is_err());

    assert_eq!(next_event(&mut rx).await, PeerEvent::Connecting);
    assert_eq!(next_event(&mut rx).await, PeerEvent::Disconnected);

    // A failed attempt must not leave the channel usable
    assert!(matches!(
        client.send_command("capture"),
        Err(PeerError::NotConnected)
    ));
}

#[tokio::test]
async fn double_stop_notifies_disconnected_once() {
    let (host_tx, mut host_rx) = mpsc::channel(32);
    let mut host = CommandHost::new();
    let addr = host.start("127.0.0.1:0", host_tx).await.unwrap();

    let (client_tx, mut client_rx) = mpsc::channel(32);
    let mut client = CommandClient::new();
    client.start(&addr.to_string(), client_tx).await.unwrap();

    assert_eq!(next_event(&mut client_rx).await, PeerEvent::Connecting);
    assert_eq!(next_event(&mut client_rx).await, PeerEvent::Connected);

    client.stop();
    client.stop();

    let mut disconnects = 0;
    while let Some(event) = client_rx.recv().await {
        if event == PeerEvent::Disconnected {
            disconnects += 1;
        }
    }
    assert_eq!(disconnects, 1);

    // The host side sees exactly one disconnect as well
    assert_eq!(next_event(&mut host_rx).await, PeerEvent::InvitationReceived);
    assert_eq!(next_event(&mut host_rx).await, PeerEvent::Connected);
    assert_eq!(next_event(&mut host_rx).await, PeerEvent::Disconnected);
    host.stop();
    host.stop();
    assert!(timeout(RECV_TIMEOUT, host_rx.recv()).await.unwrap().is_none());
}

#[tokio::test]
async fn host_stop_closes_the_session() {
    let (host_tx, mut host_rx) = mpsc::channel(32);
    let mut host = CommandHost::new();
    let addr = host.start("127.0.0.1:0", host_tx).await.unwrap();

    let (client_tx, mut client_rx) = mpsc::channel(32);
    let mut client = CommandClient::new();
    client.start(&addr.to_string(), client_tx).await.unwrap();

    assert_eq!(next_event(&mut host_rx).await, PeerEvent::InvitationReceived);
    assert_eq!(next_event(&mut host_rx).await, PeerEvent::Connected);

    host.stop();
    assert_eq!(next_event(&mut host_rx).await, PeerEvent::Disconnected);

    // Client eventually observes the closed socket
    assert_eq!(next_event(&mut client_rx).await, PeerEvent::Connecting);
    assert_eq!(next_event(&mut client_rx).await, PeerEvent::Connected);
    assert_eq!(next_event(&mut client_rx).await, PeerEvent::Disconnected);
}
