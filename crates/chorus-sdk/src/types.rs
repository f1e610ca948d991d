// ── Request / response types ──
//
// Shapes exchanged with the SDK's promise-returning operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{MessagePayload, ParticipantPayload};
use crate::id::EntityId;

/// Message body format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    #[default]
    Text,
    Html,
    /// Service-generated notice (topic changed, participant added, ...).
    System,
}

/// Kind of local media device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceKind {
    Camera,
    Microphone,
    Speaker,
}

/// A local media device as enumerated by the calling SDK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub id: EntityId,
    pub name: String,
    pub kind: DeviceKind,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateThreadRequest {
    pub topic: String,
    #[serde(default)]
    pub participants: Vec<ParticipantPayload>,
}

/// Thread metadata returned by create/list operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadInfo {
    pub id: EntityId,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    /// Latest sequence the service has assigned in this thread.
    #[serde(default)]
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Client-generated id. The service echoes it back on the message.
    pub id: EntityId,
    pub content: String,
    #[serde(default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub sender_display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResult {
    pub id: EntityId,
    pub created_on: DateTime<Utc>,
}

/// A history entry: the message plus the sequence it was last modified at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    #[serde(flatten)]
    pub message: MessagePayload,
    pub sequence: u64,
}

/// Cursor into a paged listing. `continuation_token: None` requests the
/// first page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub max_page_size: u32,
    #[serde(default)]
    pub continuation_token: Option<String>,
}

impl PageRequest {
    pub fn first(max_page_size: u32) -> Self {
        Self {
            max_page_size,
            continuation_token: None,
        }
    }

    pub fn next(max_page_size: u32, token: String) -> Self {
        Self {
            max_page_size,
            continuation_token: Some(token),
        }
    }
}

/// One page of a listing. A `None` continuation token marks the last page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub continuation_token: Option<String>,
}

impl<T> Page<T> {
    pub fn is_last(&self) -> bool {
        self.continuation_token.is_none()
    }
}
