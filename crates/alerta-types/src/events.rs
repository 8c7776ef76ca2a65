use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Report, ReportStatus, Role};

/// A report lifecycle change. Every successful state-changing report store
/// operation emits exactly one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum NotificationEvent {
    ReportCreated(Report),
    StatusChanged { id: Uuid, status: ReportStatus },
    ReportDeleted { id: Uuid },
}

impl NotificationEvent {
    pub fn report_id(&self) -> Uuid {
        match self {
            Self::ReportCreated(report) => report.id,
            Self::StatusChanged { id, .. } | Self::ReportDeleted { id } => *id,
        }
    }
}

/// Sink for lifecycle events. The report store calls `publish` after a
/// mutation is applied and before its write lock is released, so
/// implementations must not block or call back into the store.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: NotificationEvent);
}

/// Frames sent over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, role: Role },

    /// A citizen filed a new report
    ReportCreated(Report),

    /// An admin moved a report to a new status
    StatusChanged { id: Uuid, status: ReportStatus },

    /// An admin removed a report
    ReportDeleted { id: Uuid },
}

impl From<NotificationEvent> for GatewayEvent {
    fn from(event: NotificationEvent) -> Self {
        match event {
            NotificationEvent::ReportCreated(report) => Self::ReportCreated(report),
            NotificationEvent::StatusChanged { id, status } => Self::StatusChanged { id, status },
            NotificationEvent::ReportDeleted { id } => Self::ReportDeleted { id },
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let id = Uuid::new_v4();
        let event = GatewayEvent::from(NotificationEvent::StatusChanged {
            id,
            status: ReportStatus::Resolved,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "StatusChanged");
        assert_eq!(json["data"]["id"], id.to_string());
        assert_eq!(json["data"]["status"], "resolved");
    }

    #[test]
    fn test_identify_command_parses() {
        let cmd: GatewayCommand =
            serde_json::from_str(r#"{"type":"Identify","data":{"token":"abc"}}"#).unwrap();
        let GatewayCommand::Identify { token } = cmd;
        assert_eq!(token, "abc");
    }
}
