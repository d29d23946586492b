//! Mock device and broker collaborators
//!
//! [`MockDeviceLink`] is fed through a channel so tests can inject inbound
//! messages and decode errors; [`MockBroker`] records connect attempts,
//! subscriptions and publishes, and lets tests script connect failures and
//! inbound broker traffic (including mid-session transport errors).

use crate::broker::{Broker, BrokerError, BrokerMessage, BrokerPublisher, BrokerStream};
use crate::device::{DeviceError, DeviceLink};
use crate::protocol::SmsMessage;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// One item a test pushes into the mock device's inbound stream.
pub type DeviceItem = Result<SmsMessage, DeviceError>;
/// One item a test pushes into a mock broker stream.
pub type StreamItem = Result<BrokerMessage, BrokerError>;

/// Mock modem link for testing.
pub struct MockDeviceLink {
    inbound: Mutex<mpsc::UnboundedReceiver<DeviceItem>>,
    sent: Mutex<Vec<SmsMessage>>,
    fail_sends: AtomicBool,
    failed_sends: AtomicU32,
}

impl MockDeviceLink {
    /// Returns the link and the sender used to feed its inbound stream.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedSender<DeviceItem>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let link = Arc::new(Self {
            inbound: Mutex::new(rx),
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            failed_sends: AtomicU32::new(0),
        });
        (link, tx)
    }

    /// Make subsequent `send` calls fail with an encode error.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Messages the bridge has handed to the modem so far.
    pub async fn sent_messages(&self) -> Vec<SmsMessage> {
        self.sent.lock().await.clone()
    }

    /// Number of sends that failed with the scripted encode error.
    pub fn failed_send_count(&self) -> u32 {
        self.failed_sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceLink for MockDeviceLink {
    async fn recv(&self) -> Result<SmsMessage, DeviceError> {
        let mut inbound = self.inbound.lock().await;
        match inbound.recv().await {
            Some(item) => item,
            // A closed test channel behaves like an idle modem.
            None => std::future::pending().await,
        }
    }

    async fn send(&self, message: &SmsMessage) -> Result<(), DeviceError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            self.failed_sends.fetch_add(1, Ordering::SeqCst);
            return Err(DeviceError::Encode("mock send failure".to_string()));
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

/// Mock broker for testing. Cheap to clone; all clones share state so tests
/// can keep a handle after moving one into the bridge.
#[derive(Clone)]
pub struct MockBroker {
    inner: Arc<MockBrokerInner>,
}

struct MockBrokerInner {
    connect_failures: AtomicU32,
    connect_attempts: AtomicU32,
    fail_publishes: AtomicBool,
    published: Mutex<Vec<(String, Vec<u8>)>>,
    subscribed: Mutex<Vec<String>>,
    streams: Mutex<VecDeque<mpsc::UnboundedReceiver<StreamItem>>>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MockBrokerInner {
                connect_failures: AtomicU32::new(0),
                connect_attempts: AtomicU32::new(0),
                fail_publishes: AtomicBool::new(false),
                published: Mutex::new(Vec::new()),
                subscribed: Mutex::new(Vec::new()),
                streams: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Refuse the next `n` connect attempts.
    pub fn fail_next_connects(&self, n: u32) {
        self.inner.connect_failures.store(n, Ordering::SeqCst);
    }

    /// Make subsequent publishes fail.
    pub fn fail_publishes(&self, fail: bool) {
        self.inner.fail_publishes.store(fail, Ordering::SeqCst);
    }

    /// Queue the inbound stream for the next successful connect; the
    /// returned sender feeds it. Sessions connected without a queued stream
    /// get one that stays silent forever.
    pub async fn script_stream(&self) -> mpsc::UnboundedSender<StreamItem> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.streams.lock().await.push_back(rx);
        tx
    }

    pub fn connect_attempts(&self) -> u32 {
        self.inner.connect_attempts.load(Ordering::SeqCst)
    }

    pub async fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.inner.published.lock().await.clone()
    }

    pub async fn subscribed_topics(&self) -> Vec<String> {
        self.inner.subscribed.lock().await.clone()
    }
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for MockBroker {
    type Publisher = MockPublisher;
    type Stream = MockStream;

    async fn connect(&self) -> Result<(Self::Publisher, Self::Stream), BrokerError> {
        self.inner.connect_attempts.fetch_add(1, Ordering::SeqCst);

        let remaining = self.inner.connect_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.inner
                .connect_failures
                .store(remaining - 1, Ordering::SeqCst);
            return Err(BrokerError::Connection("mock connect refused".to_string()));
        }

        let stream = match self.inner.streams.lock().await.pop_front() {
            Some(rx) => MockStream {
                rx,
                _keepalive: None,
            },
            None => {
                // Unscripted session: hold the sender so the stream stays
                // open and silent instead of closing immediately.
                let (tx, rx) = mpsc::unbounded_channel();
                MockStream {
                    rx,
                    _keepalive: Some(tx),
                }
            }
        };

        Ok((
            MockPublisher {
                inner: self.inner.clone(),
            },
            stream,
        ))
    }
}

/// Publisher half of a mock session.
#[derive(Clone)]
pub struct MockPublisher {
    inner: Arc<MockBrokerInner>,
}

#[async_trait]
impl BrokerPublisher for MockPublisher {
    async fn subscribe(&self, topic: &str) -> Result<(), BrokerError> {
        self.inner.subscribed.lock().await.push(topic.to_string());
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        if self.inner.fail_publishes.load(Ordering::SeqCst) {
            return Err(BrokerError::Publish("mock publish failure".to_string()));
        }
        self.inner
            .published
            .lock()
            .await
            .push((topic.to_string(), payload));
        Ok(())
    }
}

/// Stream half of a mock session.
pub struct MockStream {
    rx: mpsc::UnboundedReceiver<StreamItem>,
    _keepalive: Option<mpsc::UnboundedSender<StreamItem>>,
}

#[async_trait]
impl BrokerStream for MockStream {
    async fn next_message(&mut self) -> Result<BrokerMessage, BrokerError> {
        match self.rx.recv().await {
            Some(item) => item,
            // Exhausted script: stay silent like an idle broker.
            None => std::future::pending().await,
        }
    }
}
