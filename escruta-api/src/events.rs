//! WebSocket Event Types
//!
//! Events broadcast to connected clients for real-time updates. Every
//! mutation on the report log (new report, validation change) produces one
//! event, so situation-room dashboards refresh without polling.

use escruta_core::{ReporterId, TableReport};
use serde::{Deserialize, Serialize};

/// WebSocket event types for real-time updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsEvent {
    // ========================================================================
    // REPORT EVENTS
    // ========================================================================
    /// A new table report was recorded.
    ReportRecorded {
        /// The recorded report
        report: TableReport,
    },

    /// A report's validation mark changed.
    ReportValidated {
        /// The report after the change
        report: TableReport,
    },

    // ========================================================================
    // CONNECTION EVENTS
    // ========================================================================
    /// Client connected successfully.
    Connected {
        /// Reporter the connection authenticated as
        reporter_id: ReporterId,
    },

    /// Client disconnected.
    Disconnected {
        /// Reason for disconnection
        reason: String,
    },

    /// An error occurred.
    Error {
        /// Error message
        message: String,
    },
}

impl WsEvent {
    /// Event type name, matching the serialized `type` tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            WsEvent::ReportRecorded { .. } => "ReportRecorded",
            WsEvent::ReportValidated { .. } => "ReportValidated",
            WsEvent::Connected { .. } => "Connected",
            WsEvent::Disconnected { .. } => "Disconnected",
            WsEvent::Error { .. } => "Error",
        }
    }
}
