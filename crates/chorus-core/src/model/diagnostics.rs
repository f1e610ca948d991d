// ── Per-category error diagnostics ──

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use strum::{AsRefStr, Display, EnumIter};

/// Operation families tracked in [`Diagnostics`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumIter, AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum OperationCategory {
    SendMessage,
    CreateThread,
    DeleteThread,
    ListThreads,
    ListMessages,
    UpdateThread,
    Connect,
    DeviceEnumerate,
    Call,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    Transient,
    Authentication,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticError {
    pub kind: DiagnosticKind,
    pub message: String,
    pub occurred_on: DateTime<Utc>,
}

/// Last error per category. A successful operation clears its entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub latest: IndexMap<OperationCategory, Arc<DiagnosticError>>,
}

impl Diagnostics {
    pub fn get(&self, category: OperationCategory) -> Option<&Arc<DiagnosticError>> {
        self.latest.get(&category)
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}
