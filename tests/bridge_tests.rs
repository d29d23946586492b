//! Integration tests for the message bridge
//!
//! Runs the bridge supervisor against the mock device and broker to verify
//! relay behavior in both directions, per-message error isolation, and the
//! retry-forever reconnect policy.

use airlink2mqtt::bridge::MessageBridge;
use airlink2mqtt::broker::{BrokerError, BrokerMessage};
use airlink2mqtt::device::DeviceError;
use airlink2mqtt::protocol::{BridgeTopics, SmsMessage};
use airlink2mqtt::testing::{MockBroker, MockDeviceLink};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Poll a condition until it holds or the deadline expires. The deadline
/// runs on the tokio clock, so paused-time tests that advance the clock past
/// the default must pass a larger one.
macro_rules! eventually {
    ($cond:expr, $msg:expr) => {
        eventually!($cond, $msg, Duration::from_secs(5))
    };
    ($cond:expr, $msg:expr, $deadline:expr) => {
        tokio::time::timeout($deadline, async {
            loop {
                if $cond {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect($msg)
    };
}

fn start_bridge(
    broker: MockBroker,
    device: Arc<MockDeviceLink>,
    prefix: &str,
    reconnect_delay: Duration,
) -> JoinHandle<()> {
    let bridge = MessageBridge::new(broker, BridgeTopics::new(prefix), reconnect_delay);
    tokio::spawn(async move { bridge.run(device.as_ref()).await })
}

fn send_payload(topic: &str, payload: &'static [u8]) -> BrokerMessage {
    BrokerMessage {
        topic: topic.to_string(),
        payload: Bytes::from_static(payload),
    }
}

#[tokio::test]
async fn device_message_is_published_on_receive_topic() {
    let broker = MockBroker::new();
    let (device, device_tx) = MockDeviceLink::new();
    let handle = start_bridge(
        broker.clone(),
        device.clone(),
        "home/modem",
        Duration::from_millis(50),
    );

    eventually!(
        !broker.subscribed_topics().await.is_empty(),
        "bridge never subscribed"
    );
    assert_eq!(
        broker.subscribed_topics().await,
        vec!["home/modem/message/send".to_string()]
    );

    device_tx
        .send(Ok(SmsMessage::inbound("+15551234567", "hi")))
        .unwrap();

    eventually!(
        !broker.published().await.is_empty(),
        "device message was never published"
    );
    let published = broker.published().await;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "home/modem/message/receive");
    let payload: serde_json::Value = serde_json::from_slice(&published[0].1).unwrap();
    assert_eq!(
        payload,
        serde_json::json!({"sender": "+15551234567", "body": "hi"})
    );

    handle.abort();
}

#[tokio::test]
async fn send_topic_publish_reaches_device_once() {
    let broker = MockBroker::new();
    let stream_tx = broker.script_stream().await;
    let (device, _device_tx) = MockDeviceLink::new();
    let handle = start_bridge(
        broker.clone(),
        device.clone(),
        "home/modem",
        Duration::from_millis(50),
    );

    stream_tx
        .send(Ok(send_payload(
            "home/modem/message/send",
            br#"{"recipient":"+15551234567","body":"reply"}"#,
        )))
        .unwrap();

    eventually!(
        !device.sent_messages().await.is_empty(),
        "broker message never reached the device"
    );
    let sent = device.sent_messages().await;
    assert_eq!(sent, vec![SmsMessage::outbound("+15551234567", "reply")]);

    handle.abort();
}

#[tokio::test]
async fn malformed_json_does_not_stop_the_flow() {
    let broker = MockBroker::new();
    let stream_tx = broker.script_stream().await;
    let (device, _device_tx) = MockDeviceLink::new();
    let handle = start_bridge(
        broker.clone(),
        device.clone(),
        "home/modem",
        Duration::from_millis(50),
    );

    stream_tx
        .send(Ok(send_payload("home/modem/message/send", b"{not json")))
        .unwrap();
    stream_tx
        .send(Ok(send_payload(
            "home/modem/message/send",
            br#"["wrong","shape"]"#,
        )))
        .unwrap();
    stream_tx
        .send(Ok(send_payload(
            "home/modem/message/send",
            br#"{"recipient":"+15551234567","body":"ok"}"#,
        )))
        .unwrap();

    eventually!(
        !device.sent_messages().await.is_empty(),
        "flow did not survive malformed payloads"
    );
    let sent = device.sent_messages().await;
    assert_eq!(sent, vec![SmsMessage::outbound("+15551234567", "ok")]);
    // Still on the first session: the malformed payloads were not fatal.
    assert_eq!(broker.connect_attempts(), 1);

    handle.abort();
}

#[tokio::test]
async fn foreign_topic_messages_are_dropped() {
    let broker = MockBroker::new();
    let stream_tx = broker.script_stream().await;
    let (device, _device_tx) = MockDeviceLink::new();
    let handle = start_bridge(
        broker.clone(),
        device.clone(),
        "home/modem",
        Duration::from_millis(50),
    );

    stream_tx
        .send(Ok(send_payload(
            "home/modem/message/receive",
            br#"{"recipient":"+15550000000","body":"echo"}"#,
        )))
        .unwrap();
    stream_tx
        .send(Ok(send_payload(
            "other/prefix/message/send",
            br#"{"recipient":"+15550000000","body":"stray"}"#,
        )))
        .unwrap();
    stream_tx
        .send(Ok(send_payload(
            "home/modem/message/send",
            br#"{"recipient":"+15551234567","body":"real"}"#,
        )))
        .unwrap();

    eventually!(
        !device.sent_messages().await.is_empty(),
        "expected message never arrived"
    );
    let sent = device.sent_messages().await;
    assert_eq!(sent, vec![SmsMessage::outbound("+15551234567", "real")]);

    handle.abort();
}

#[tokio::test]
async fn device_decode_errors_do_not_stop_the_flow() {
    let broker = MockBroker::new();
    let (device, device_tx) = MockDeviceLink::new();
    let handle = start_bridge(
        broker.clone(),
        device.clone(),
        "home/modem",
        Duration::from_millis(50),
    );

    device_tx
        .send(Err(DeviceError::Decode("garbled datagram".to_string())))
        .unwrap();
    device_tx
        .send(Ok(SmsMessage::inbound("+15551234567", "after garbage")))
        .unwrap();

    eventually!(
        !broker.published().await.is_empty(),
        "flow did not survive a decode error"
    );
    let published = broker.published().await;
    assert_eq!(published.len(), 1);
    assert_eq!(broker.connect_attempts(), 1);

    handle.abort();
}

#[tokio::test]
async fn flows_make_independent_progress() {
    let broker = MockBroker::new();
    // The scripted stream never produces anything, so broker-to-device stays
    // suspended the whole time.
    let _stream_tx = broker.script_stream().await;
    let (device, device_tx) = MockDeviceLink::new();
    let handle = start_bridge(
        broker.clone(),
        device.clone(),
        "home/modem",
        Duration::from_millis(50),
    );

    for i in 0..3 {
        device_tx
            .send(Ok(SmsMessage::inbound("+15551234567", format!("msg {i}"))))
            .unwrap();
    }

    eventually!(
        broker.published().await.len() == 3,
        "device-to-broker flow stalled behind the idle broker stream"
    );

    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn supervisor_retries_with_fixed_delay_until_connected() {
    let broker = MockBroker::new();
    broker.fail_next_connects(3);
    let (device, _device_tx) = MockDeviceLink::new();
    let started = tokio::time::Instant::now();
    let handle = start_bridge(
        broker.clone(),
        device.clone(),
        "home/modem",
        Duration::from_secs(5),
    );

    // Three 5s reconnect delays need ~15s of virtual time, so the poll
    // deadline must sit well beyond them on the same clock.
    eventually!(
        !broker.subscribed_topics().await.is_empty(),
        "bridge never connected after simulated failures",
        Duration::from_secs(60)
    );

    // Three failures then one success: exactly four attempts, with the
    // configured delay between each.
    assert_eq!(broker.connect_attempts(), 4);
    assert!(started.elapsed() >= Duration::from_secs(15));

    handle.abort();
}

#[tokio::test]
async fn broker_drop_reconnects_without_restarting_device_stream() {
    let broker = MockBroker::new();
    let first_session = broker.script_stream().await;
    let second_session = broker.script_stream().await;
    let (device, device_tx) = MockDeviceLink::new();
    let handle = start_bridge(
        broker.clone(),
        device.clone(),
        "home/modem",
        Duration::from_millis(20),
    );

    eventually!(broker.connect_attempts() == 1, "first connect missing");

    // Transport failure ends the first session and cancels both flows.
    first_session
        .send(Err(BrokerError::Connection("broker went away".to_string())))
        .unwrap();

    eventually!(
        broker.connect_attempts() == 2,
        "bridge did not reconnect after transport error"
    );
    eventually!(
        broker.subscribed_topics().await.len() == 2,
        "bridge did not resubscribe on the new session"
    );

    // The device stream survived the reconnect: the same channel still
    // feeds the device-to-broker flow.
    device_tx
        .send(Ok(SmsMessage::inbound("+15551234567", "still here")))
        .unwrap();
    eventually!(
        !broker.published().await.is_empty(),
        "device stream was not relayed after reconnect"
    );

    // And the new session's inbound stream reaches the device.
    second_session
        .send(Ok(send_payload(
            "home/modem/message/send",
            br#"{"recipient":"+15551234567","body":"welcome back"}"#,
        )))
        .unwrap();
    eventually!(
        !device.sent_messages().await.is_empty(),
        "second session stream was not relayed"
    );

    handle.abort();
}

#[tokio::test]
async fn publish_failure_is_fatal_and_message_is_not_retried() {
    let broker = MockBroker::new();
    let (device, device_tx) = MockDeviceLink::new();
    let handle = start_bridge(
        broker.clone(),
        device.clone(),
        "home/modem",
        Duration::from_millis(20),
    );

    eventually!(broker.connect_attempts() == 1, "first connect missing");
    broker.fail_publishes(true);

    device_tx
        .send(Ok(SmsMessage::inbound("+15551234567", "lost")))
        .unwrap();

    eventually!(
        broker.connect_attempts() >= 2,
        "publish failure did not end the session"
    );
    broker.fail_publishes(false);

    device_tx
        .send(Ok(SmsMessage::inbound("+15551234567", "delivered")))
        .unwrap();
    eventually!(
        !broker.published().await.is_empty(),
        "bridge did not recover after publish failure"
    );

    // The failed message was dropped, not retried.
    let published = broker.published().await;
    assert_eq!(published.len(), 1);
    let payload: serde_json::Value = serde_json::from_slice(&published[0].1).unwrap();
    assert_eq!(payload["body"], "delivered");

    handle.abort();
}

#[tokio::test]
async fn device_encode_failure_does_not_end_the_session() {
    let broker = MockBroker::new();
    let stream_tx = broker.script_stream().await;
    let (device, _device_tx) = MockDeviceLink::new();
    let handle = start_bridge(
        broker.clone(),
        device.clone(),
        "home/modem",
        Duration::from_millis(50),
    );

    device.fail_sends(true);
    stream_tx
        .send(Ok(send_payload(
            "home/modem/message/send",
            br#"{"recipient":"+15551234567","body":"will fail"}"#,
        )))
        .unwrap();
    eventually!(
        device.failed_send_count() == 1,
        "first send was never attempted"
    );
    device.fail_sends(false);
    stream_tx
        .send(Ok(send_payload(
            "home/modem/message/send",
            br#"{"recipient":"+15551234567","body":"will pass"}"#,
        )))
        .unwrap();

    eventually!(
        !device.sent_messages().await.is_empty(),
        "flow did not survive an encode failure"
    );
    let sent = device.sent_messages().await;
    assert_eq!(sent, vec![SmsMessage::outbound("+15551234567", "will pass")]);
    assert_eq!(broker.connect_attempts(), 1);

    handle.abort();
}
