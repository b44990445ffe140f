//! Reviewer work list
//!
//! Local state changes only after the review call succeeds: an approved item
//! leaves the queue, a rejected or sent-back one is reclassified in place.
//! A failed call leaves the queue untouched and keeps the platform's message.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use hdims_core::{
    Collection, EntityType, Permission, ReviewDecision, ReviewRequest, Role, SubmissionStatus,
};
use hdims_db::{DbError, Order, Platform, Procedure, Query};

use crate::error::{PortalError, PortalResult};
use crate::session::CurrentUser;

/// One submission in the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: Uuid,
    pub entity_type: EntityType,
    pub facility_id: Uuid,
    pub title: String,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
}

impl QueueItem {
    fn from_row(entity_type: EntityType, row: &Value) -> Option<Self> {
        let text = |key: &str| row.get(key).and_then(Value::as_str);
        let title = match entity_type {
            EntityType::PerformanceData => text("program"),
            EntityType::SchemeTracking => text("scheme_name"),
        };
        Some(Self {
            id: text("id")?.parse().ok()?,
            entity_type,
            facility_id: text("facility_id")?.parse().ok()?,
            title: title.unwrap_or_default().to_string(),
            status: SubmissionStatus::from_str(text("status").unwrap_or("pending"))?,
            created_at: text("created_at")?.parse().ok()?,
        })
    }
}

/// Submissions visible to one reviewer
#[derive(Debug, Clone, Default)]
pub struct ReviewQueue {
    items: Vec<QueueItem>,
    last_error: Option<String>,
}

impl ReviewQueue {
    pub fn new(items: Vec<QueueItem>) -> Self {
        Self {
            items,
            last_error: None,
        }
    }

    /// Load every submission inside the reviewer's assignment, newest first
    pub async fn load(platform: &Platform, user: &CurrentUser) -> PortalResult<Self> {
        user.require(Permission::ReviewSubmissions)?;
        let scope = facility_scope(platform, user).await?;

        let mut items = Vec::new();
        for entity_type in [EntityType::PerformanceData, EntityType::SchemeTracking] {
            let rows = platform
                .store
                .select(
                    entity_type.collection(),
                    &Query::new().order("created_at", Order::Desc),
                )
                .await?
                .data;
            items.extend(
                rows.iter()
                    .filter_map(|row| QueueItem::from_row(entity_type, row))
                    .filter(|item| scope.as_ref().map_or(true, |ids| ids.contains(&item.facility_id))),
            );
        }
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Self::new(items))
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    /// Items still waiting for a decision
    pub fn pending(&self) -> impl Iterator<Item = &QueueItem> {
        self.items.iter().filter(|i| i.status.awaits_review())
    }

    /// Items with a status of `status`
    pub fn with_status(&self, status: SubmissionStatus) -> impl Iterator<Item = &QueueItem> {
        self.items.iter().filter(move |i| i.status == status)
    }

    pub fn get(&self, id: Uuid) -> Option<&QueueItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Message of the last failed decision
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Send a decision and update the queue once it is accepted
    pub async fn decide(
        &mut self,
        platform: &Platform,
        user: &CurrentUser,
        request: ReviewRequest,
    ) -> PortalResult<SubmissionStatus> {
        self.last_error = None;
        if self.get(request.entity_id).is_none() {
            return Err(DbError::not_found(format!(
                "{} is not in the review queue",
                request.entity_id
            ))
            .into());
        }
        if let Err(e) = request.validate() {
            self.last_error = Some(e.to_string());
            return Err(e.into());
        }

        let result = platform
            .rpc
            .rpc(&user.caller(), Procedure::ReviewSubmission, request.to_rpc_params())
            .await;
        if let Err(e) = result {
            warn!(submission_id = %request.entity_id, error = %e, "Review failed");
            self.last_error = Some(e.to_string());
            return Err(e.into());
        }

        let status = request.new_status.target_status();
        match request.new_status {
            ReviewDecision::Approved => self.items.retain(|i| i.id != request.entity_id),
            _ => {
                if let Some(item) = self.items.iter_mut().find(|i| i.id == request.entity_id) {
                    item.status = status;
                }
            }
        }
        info!(
            submission_id = %request.entity_id,
            new_status = %status,
            reviewer_id = %user.profile.id,
            "Queue updated"
        );
        Ok(status)
    }
}

/// Facility ids a reviewer may see; `None` for everything
async fn facility_scope(
    platform: &Platform,
    user: &CurrentUser,
) -> PortalResult<Option<HashSet<Uuid>>> {
    let profile = &user.profile;
    let districts: Vec<Uuid> = match profile.role {
        Role::SuperAdmin => return Ok(None),
        Role::HospitalUser => return Ok(Some(profile.facility_id.into_iter().collect())),
        Role::DistrictAdmin => profile.district_id.into_iter().collect(),
        Role::StateAdmin => {
            let Some(state_id) = profile.state_id else {
                return Ok(Some(HashSet::new()));
            };
            ids_of(
                platform
                    .store
                    .select(
                        Collection::Districts,
                        &Query::new().eq("state_id", state_id.to_string()),
                    )
                    .await?
                    .data,
            )
        }
    };

    let mut facilities = HashSet::new();
    for district_id in districts {
        let rows = platform
            .store
            .select(
                Collection::Facilities,
                &Query::new().eq("district_id", district_id.to_string()),
            )
            .await?
            .data;
        facilities.extend(ids_of(rows));
    }
    Ok(Some(facilities))
}

fn ids_of(rows: Vec<Value>) -> Vec<Uuid> {
    rows.iter()
        .filter_map(|r| r.get("id").and_then(Value::as_str))
        .filter_map(|id| id.parse().ok())
        .collect()
}
