// Session status, wire events and health reporting

use crate::models::capture::SourceKind;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize, Serializer};

// ==============================================================================
// Session Status
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub session_id: String,
    pub exercise_id: String,
    pub left_count: u32,
    pub right_count: u32,
    pub fps: u32,
    pub elapsed_secs: f64,
}

/// Why a session worker exited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Cancelled by `stop()`, the sweeper or registry shutdown
    Cancelled,
    /// No client heartbeat within the heartbeat timeout
    HeartbeatTimeout,
    /// Unexpected fault inside the processing loop
    Faulted,
}

impl StopReason {
    pub fn to_string(&self) -> &'static str {
        match self {
            StopReason::Cancelled => "cancelled",
            StopReason::HeartbeatTimeout => "heartbeat_timeout",
            StopReason::Faulted => "faulted",
        }
    }
}

// ==============================================================================
// Wire Events
// ==============================================================================

/// Annotated frame delivered to a client
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameEvent {
    pub session_id: String,
    #[serde(rename = "encodedImage", serialize_with = "serialize_base64")]
    pub jpeg: Bytes,
    pub left_count: u32,
    pub right_count: u32,
    pub feedback_text: String,
    pub fps: u32,
    pub source: SourceKind,
}

fn serialize_base64<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

/// Events pushed from the server to a client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected {
        client_addr: String,
    },
    Started {
        session_id: String,
        exercise_id: String,
    },
    Frame(FrameEvent),
    Stopped {
        session_id: String,
        reason: StopReason,
    },
    Error {
        session_id: Option<String>,
        message: String,
    },
    Status(SessionStatus),
}

impl ServerEvent {
    pub fn error(session_id: Option<&str>, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            session_id: session_id.map(str::to_string),
            message: message.into(),
        }
    }

    /// Event name as seen on the wire
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::Started { .. } => "started",
            ServerEvent::Frame(_) => "frame",
            ServerEvent::Stopped { .. } => "stopped",
            ServerEvent::Error { .. } => "error",
            ServerEvent::Status(_) => "status",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Messages received from a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    Connected,
    Start { exercise_id: String },
    Stop { session_id: String },
    Heartbeat { session_id: String },
    Status { session_id: String },
}

// ==============================================================================
// Health
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub timestamp: i64,
    pub uptime_secs: u64,
    pub active_sessions: usize,
    pub exercise_count: usize,
}
