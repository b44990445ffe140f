//! Audit log entries written by review transitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EntityType, SubmissionStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub action: String,
    pub old_status: SubmissionStatus,
    pub new_status: SubmissionStatus,
    pub actor_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub const STATUS_CHANGE: &'static str = "status_change";

    pub fn status_change(
        entity_type: EntityType,
        entity_id: Uuid,
        old_status: SubmissionStatus,
        new_status: SubmissionStatus,
        actor_id: Uuid,
        comments: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_type,
            entity_id,
            action: Self::STATUS_CHANGE.to_string(),
            old_status,
            new_status,
            actor_id,
            comments,
            created_at: at,
        }
    }
}
