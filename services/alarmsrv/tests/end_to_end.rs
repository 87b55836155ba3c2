//! Alarm flow over a real TCP listener

use std::sync::Arc;
use std::time::Duration;

use alarmsrv::config::SmsSettings;
use alarmsrv::dispatcher::HttpSmsGateway;
use alarmsrv::{Dispatcher, ExpiryScope, SendStatus};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

mod common;
use common::{frame, send_payload, wait_until, MockSmsGateway, RecordingBus, TestService};

fn sms_gateway(uri: &str) -> Arc<HttpSmsGateway> {
    Arc::new(
        HttpSmsGateway::new(SmsSettings {
            uri: uri.to_string(),
            credentials: "user:pw".to_string(),
            method: "POST".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap(),
    )
}

#[tokio::test]
async fn test_cold_room_alarm_notifies_once_then_rearms_after_grace() {
    let sms = MockSmsGateway::start(&[]).await;
    let bus = Arc::new(RecordingBus::default());
    let dispatcher = Dispatcher::new(vec!["+1555".to_string()])
        .with_bus(bus.clone(), "1")
        .with_sms(sms_gateway(&sms.uri));

    let service = TestService::start(
        Duration::ZERO,
        Duration::from_millis(1500),
        ExpiryScope::new(vec!["S1".to_string()], Vec::new(), false),
        dispatcher,
    )
    .await;

    // first payload: admitted and notified on both channels
    send_payload(service.addr, &frame("S1")).await;
    let store = service.store.clone();
    assert!(
        wait_until(Duration::from_secs(3), || {
            store.get("S1").map(|r| r.send_status) == Some(SendStatus::Sent)
        })
        .await
    );

    let received = sms.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].to, "+1555");
    assert!(received[0].content.contains("Sensor Id: S1"));
    assert_eq!(bus.published(), vec![("S1".to_string(), b"1".to_vec())]);

    // immediate repeat: suppressed, nothing new goes out
    send_payload(service.addr, &frame("S1")).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(sms.count(), 1);
    assert_eq!(bus.published().len(), 1);

    // after the grace period the sensor alarms again
    assert!(wait_until(Duration::from_secs(3), || store.get("S1").is_none()).await);
    send_payload(service.addr, &frame("S1")).await;
    assert!(wait_until(Duration::from_secs(3), || sms.count() == 2).await);
    assert_eq!(bus.published().len(), 2);

    service.stop().await;
}

#[tokio::test]
async fn test_failing_recipient_does_not_block_the_next() {
    let sms = MockSmsGateway::start(&["+1000"]).await;
    let dispatcher = Dispatcher::new(vec!["+1000".to_string(), "+2000".to_string()])
        .with_sms(sms_gateway(&sms.uri));

    let service = TestService::start(
        Duration::ZERO,
        Duration::from_secs(300),
        ExpiryScope::default(),
        dispatcher,
    )
    .await;

    send_payload(service.addr, &frame("S1")).await;
    let store = service.store.clone();
    assert!(
        wait_until(Duration::from_secs(3), || {
            store.get("S1").map(|r| r.send_status) == Some(SendStatus::PartiallySent)
        })
        .await
    );

    let mut recipients: Vec<String> = sms.received().into_iter().map(|s| s.to).collect();
    recipients.sort();
    assert_eq!(recipients, vec!["+1000", "+2000"]);

    service.stop().await;
}

#[tokio::test]
async fn test_global_cooldown_across_sensors() {
    let sms = MockSmsGateway::start(&[]).await;
    let dispatcher = Dispatcher::new(vec!["+1555".to_string()]).with_sms(sms_gateway(&sms.uri));

    let service = TestService::start(
        Duration::from_secs(300),
        Duration::from_secs(300),
        ExpiryScope::default(),
        dispatcher,
    )
    .await;

    send_payload(service.addr, &frame("S1")).await;
    assert!(wait_until(Duration::from_secs(3), || sms.count() == 1).await);

    send_payload(service.addr, &frame("S2")).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(sms.count(), 1);
    assert!(service.store.get("S2").is_none());

    service.stop().await;
}

#[tokio::test]
async fn test_slow_sms_gateway_does_not_stall_ingestion() {
    let sms = MockSmsGateway::start_with_delay(&[], Duration::from_secs(2)).await;
    let dispatcher = Dispatcher::new(vec!["+1555".to_string()]).with_sms(sms_gateway(&sms.uri));

    let service = TestService::start(
        Duration::ZERO,
        Duration::from_secs(300),
        ExpiryScope::default(),
        dispatcher,
    )
    .await;

    send_payload(service.addr, &frame("S1")).await;
    let store = service.store.clone();
    assert!(wait_until(Duration::from_millis(500), || store.get("S1").is_some()).await);

    // S1's SMS is still held by the gateway
    send_payload(service.addr, &frame("S2")).await;
    assert!(wait_until(Duration::from_millis(500), || store.get("S2").is_some()).await);
    assert_eq!(sms.count(), 0);

    assert!(wait_until(Duration::from_secs(5), || sms.count() == 2).await);
    service.stop().await;
}

#[tokio::test]
async fn test_malformed_payload_keeps_connection_open() {
    let bus = Arc::new(RecordingBus::default());
    let dispatcher = Dispatcher::new(Vec::new()).with_bus(bus.clone(), "1");

    let service = TestService::start(
        Duration::ZERO,
        Duration::from_secs(300),
        ExpiryScope::default(),
        dispatcher,
    )
    .await;

    let mut stream = TcpStream::connect(service.addr).await.unwrap();
    stream.write_all(b"{\"alarmType\":\"HighTemp\"}").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(service.store.is_empty());

    stream.write_all(&frame("S7")).await.unwrap();
    assert!(wait_until(Duration::from_secs(3), || bus.published().len() == 1).await);
    assert!(service.store.get("S7").is_some());

    drop(stream);
    service.stop().await;
}

#[tokio::test]
async fn test_many_gateways_in_parallel() {
    let bus = Arc::new(RecordingBus::default());
    let dispatcher = Dispatcher::new(Vec::new()).with_bus(bus.clone(), "1");

    let service = TestService::start(
        Duration::ZERO,
        Duration::from_secs(300),
        ExpiryScope::default(),
        dispatcher,
    )
    .await;

    let sends = (0..10).map(|i| {
        let addr = service.addr;
        tokio::spawn(async move { send_payload(addr, &frame(&format!("S{i}"))).await })
    });
    for send in sends.collect::<Vec<_>>() {
        send.await.unwrap();
    }

    assert!(wait_until(Duration::from_secs(3), || service.store.len() == 10).await);
    assert!(wait_until(Duration::from_secs(3), || bus.published().len() == 10).await);

    service.stop().await;
}
