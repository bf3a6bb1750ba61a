// Outbound event delivery: push channels per session and the MJPEG pull stream

use crate::models::session::ServerEvent;
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Content type of the multipart stream served by [`MjpegSink`]
pub const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Response headers that keep proxies and browsers from caching the stream
pub const NO_CACHE_HEADERS: &[(&str, &str)] = &[
    ("Cache-Control", "no-cache, no-store, must-revalidate"),
    ("Pragma", "no-cache"),
    ("Expires", "0"),
];

const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// Delivery seam for session events.
///
/// `send` is called from the session loop and must never block; a full
/// subscriber simply misses the event.
pub trait EventSink: Send + Sync {
    fn send(&self, session_id: &str, event: &ServerEvent);
}

/// Per-session subscriber table shared by the channel-based sinks
struct Subscribers<T> {
    channels: Mutex<HashMap<String, mpsc::Sender<T>>>,
    capacity: usize,
}

impl<T> Subscribers<T> {
    fn new(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn subscribe(&self, session_id: &str) -> mpsc::Receiver<T> {
        let (tx, rx) = mpsc::channel(self.capacity);
        if let Ok(mut channels) = self.channels.lock() {
            channels.insert(session_id.to_string(), tx);
        }
        rx
    }

    fn deliver(&self, session_id: &str, item: T) {
        let Ok(mut channels) = self.channels.lock() else {
            return;
        };
        let Some(tx) = channels.get(session_id) else {
            return;
        };
        match tx.try_send(item) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::debug!("Subscriber for session {} is full, dropping event", session_id);
            }
            Err(TrySendError::Closed(_)) => {
                channels.remove(session_id);
            }
        }
    }

    fn close(&self, session_id: &str) {
        if let Ok(mut channels) = self.channels.lock() {
            channels.remove(session_id);
        }
    }

    fn len(&self) -> usize {
        self.channels.lock().map(|c| c.len()).unwrap_or(0)
    }
}

// ==============================================================================
// Push Channels
// ==============================================================================

/// Routes events to one channel per session id
#[derive(Clone)]
pub struct EventHub {
    subscribers: Arc<Subscribers<ServerEvent>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(Subscribers::new(capacity)),
        }
    }

    /// Receive all events for a session. Replaces any previous subscription.
    pub fn subscribe(&self, session_id: &str) -> mpsc::Receiver<ServerEvent> {
        self.subscribers.subscribe(session_id)
    }

    pub fn unsubscribe(&self, session_id: &str) {
        self.subscribers.close(session_id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventHub {
    fn send(&self, session_id: &str, event: &ServerEvent) {
        self.subscribers.deliver(session_id, event.clone());
        if matches!(event, ServerEvent::Stopped { .. }) {
            self.subscribers.close(session_id);
        }
    }
}

// ==============================================================================
// MJPEG Pull Stream
// ==============================================================================

/// Frame one JPEG as a multipart part
pub fn mjpeg_part(jpeg: &[u8]) -> Bytes {
    const HEADER: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
    let mut part = BytesMut::with_capacity(HEADER.len() + jpeg.len() + 2);
    part.put_slice(HEADER);
    part.put_slice(jpeg);
    part.put_slice(b"\r\n");
    part.freeze()
}

/// Turns frame events into multipart parts for an HTTP streaming response
#[derive(Clone)]
pub struct MjpegSink {
    subscribers: Arc<Subscribers<Bytes>>,
}

impl MjpegSink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(Subscribers::new(capacity)),
        }
    }

    pub fn subscribe(&self, session_id: &str) -> mpsc::Receiver<Bytes> {
        self.subscribers.subscribe(session_id)
    }
}

impl Default for MjpegSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for MjpegSink {
    fn send(&self, session_id: &str, event: &ServerEvent) {
        match event {
            ServerEvent::Frame(frame) => self.subscribers.deliver(session_id, mjpeg_part(&frame.jpeg)),
            ServerEvent::Stopped { .. } => self.subscribers.close(session_id),
            _ => {}
        }
    }
}

// ==============================================================================
// Composition
// ==============================================================================

/// Forwards every event to each inner sink
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutSink {
    fn send(&self, session_id: &str, event: &ServerEvent) {
        for sink in &self.sinks {
            sink.send(session_id, event);
        }
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn send(&self, _session_id: &str, _event: &ServerEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::capture::SourceKind;
    use crate::models::session::{FrameEvent, StopReason};

    fn frame_event(session_id: &str, jpeg: &'static [u8]) -> ServerEvent {
        ServerEvent::Frame(FrameEvent {
            session_id: session_id.to_string(),
            jpeg: Bytes::from_static(jpeg),
            left_count: 0,
            right_count: 0,
            feedback_text: String::new(),
            fps: 0,
            source: SourceKind::Synthetic,
        })
    }

    fn stopped(session_id: &str) -> ServerEvent {
        ServerEvent::Stopped {
            session_id: session_id.to_string(),
            reason: StopReason::Cancelled,
        }
    }

    #[test]
    fn test_mjpeg_part_framing() {
        let part = mjpeg_part(&[0xFF, 0xD8, 0xFF, 0xD9]);
        let mut expected = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        expected.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xD9]);
        expected.extend_from_slice(b"\r\n");
        assert_eq!(&part[..], &expected[..]);
        assert!(MJPEG_CONTENT_TYPE.ends_with("boundary=frame"));
    }

    #[tokio::test]
    async fn test_hub_routes_by_session() {
        let hub = EventHub::new();
        let mut a = hub.subscribe("a");
        let mut b = hub.subscribe("b");

        hub.send("a", &ServerEvent::error(Some("a"), "for a"));
        hub.send("c", &ServerEvent::error(Some("c"), "nobody listening"));

        assert_eq!(a.recv().await.map(|e| e.name()), Some("error"));
        assert!(b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_hub_drops_subscription_after_stopped() {
        let hub = EventHub::new();
        let mut rx = hub.subscribe("s1");
        hub.send("s1", &stopped("s1"));

        assert_eq!(rx.recv().await.map(|e| e.name()), Some("stopped"));
        assert!(rx.recv().await.is_none());
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_full_subscriber_drops_without_blocking() {
        let hub = EventHub::with_capacity(2);
        let mut rx = hub.subscribe("s1");
        for _ in 0..10 {
            hub.send("s1", &ServerEvent::error(Some("s1"), "x"));
        }

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 2);
    }

    #[tokio::test]
    async fn test_mjpeg_sink_only_streams_frames() {
        let sink = MjpegSink::new();
        let mut rx = sink.subscribe("s1");

        sink.send("s1", &ServerEvent::error(Some("s1"), "ignored"));
        sink.send("s1", &frame_event("s1", &[1, 2, 3]));
        sink.send("s1", &stopped("s1"));

        let part = rx.recv().await.unwrap();
        assert!(part.starts_with(b"--frame\r\n"));
        assert!(part.ends_with(&[1, 2, 3, b'\r', b'\n']));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_fanout_reaches_every_sink() {
        let hub = EventHub::new();
        let mjpeg = MjpegSink::new();
        let fanout = FanoutSink::new(vec![
            Arc::new(hub.clone()) as Arc<dyn EventSink>,
            Arc::new(mjpeg.clone()),
            Arc::new(NullSink),
        ]);
        let mut events = hub.subscribe("s1");
        let mut parts = mjpeg.subscribe("s1");

        fanout.send("s1", &frame_event("s1", &[9]));

        assert_eq!(events.recv().await.map(|e| e.name()), Some("frame"));
        assert!(parts.recv().await.is_some());
    }
}
