//! Stored procedures of the platform emulator
//!
//! Each procedure runs as the calling user: the caller's profile decides
//! what they may submit, review or aggregate. Submissions and reviews are
//! validated again here, independently of the functions in front.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use hdims_core::validation::{
    guards, validate_analytics_payload, validate_performance_payload, validate_review_payload,
    validate_scheme_payload,
};
use hdims_core::{
    AuditLogEntry, Collection, DistrictRecord, EntityType, FacilityRecord, Permission,
    PerformanceRecord, ReviewState, Role, SchemeRecord, SubmissionStatus, UserProfile,
};

use super::MemoryStore;
use crate::error::{DbError, DbResult};
use crate::facade::{Caller, DataStore, Procedure, RpcBackend};
use crate::query::{Order, Query};

/// Entries in a hospital dashboard's recent list
const RECENT_LIMIT: usize = 5;

/// Procedures over a [`MemoryStore`]
#[derive(Debug, Clone)]
pub struct MemoryProcedures {
    store: MemoryStore,
    /// Held from reading a submission's status until its audit row is written
    review_lock: Arc<Mutex<()>>,
}

impl MemoryProcedures {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            review_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn rows(&self, table: Collection, query: &Query) -> DbResult<Vec<Value>> {
        Ok(self.store.select(table, query).await?.data)
    }

    async fn one<T: serde::de::DeserializeOwned>(&self, table: Collection, id: Uuid) -> DbResult<T> {
        let row = self
            .rows(table, &Query::new().eq("id", id.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(format!("{} {}", table, id)))?;
        Ok(serde_json::from_value(row)?)
    }

    async fn profile(&self, caller: &Caller) -> DbResult<UserProfile> {
        let row = self
            .rows(
                Collection::Profiles,
                &Query::new().eq("id", caller.user_id.to_string()),
            )
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DbError::unauthorized("no profile for caller"))?;
        let profile: UserProfile = serde_json::from_value(row)?;
        if !profile.is_active {
            return Err(DbError::unauthorized("account is inactive"));
        }
        Ok(profile)
    }

    async fn facilities_in_district(&self, district_id: Uuid) -> DbResult<Vec<FacilityRecord>> {
        self.rows(
            Collection::Facilities,
            &Query::new()
                .eq("district_id", district_id.to_string())
                .order("name", Order::Asc),
        )
        .await?
        .into_iter()
        .map(|r| serde_json::from_value(r).map_err(DbError::from))
        .collect()
    }

    async fn districts_in_state(&self, state_id: Uuid) -> DbResult<Vec<DistrictRecord>> {
        self.rows(
            Collection::Districts,
            &Query::new()
                .eq("state_id", state_id.to_string())
                .order("name", Order::Asc),
        )
        .await?
        .into_iter()
        .map(|r| serde_json::from_value(r).map_err(DbError::from))
        .collect()
    }

    async fn facility_ids_in_state(&self, state_id: Uuid) -> DbResult<HashSet<String>> {
        let mut ids = HashSet::new();
        for district in self.districts_in_state(state_id).await? {
            for facility in self.facilities_in_district(district.id).await? {
                ids.insert(facility.id.to_string());
            }
        }
        Ok(ids)
    }

    /// Whether the caller's assignment covers a facility
    async fn ensure_facility_scope(&self, profile: &UserProfile, facility_id: Uuid) -> DbResult<()> {
        let allowed = match profile.role {
            Role::SuperAdmin => true,
            Role::HospitalUser => profile.facility_id == Some(facility_id),
            Role::DistrictAdmin => {
                let facility: FacilityRecord = self.one(Collection::Facilities, facility_id).await?;
                profile.district_id == Some(facility.district_id)
            }
            Role::StateAdmin => {
                let facility: FacilityRecord = self.one(Collection::Facilities, facility_id).await?;
                let district: DistrictRecord =
                    self.one(Collection::Districts, facility.district_id).await?;
                profile.state_id == Some(district.state_id)
            }
        };
        if !allowed {
            return Err(DbError::unauthorized(format!(
                "facility {} is outside the caller's assignment",
                facility_id
            )));
        }
        Ok(())
    }

    async fn ensure_district_scope(&self, profile: &UserProfile, district_id: Uuid) -> DbResult<()> {
        let allowed = match profile.role {
            Role::SuperAdmin => true,
            Role::DistrictAdmin => profile.district_id == Some(district_id),
            Role::StateAdmin => {
                let district: DistrictRecord = self.one(Collection::Districts, district_id).await?;
                profile.state_id == Some(district.state_id)
            }
            Role::HospitalUser => false,
        };
        if !allowed {
            return Err(DbError::unauthorized(format!(
                "district {} is outside the caller's assignment",
                district_id
            )));
        }
        Ok(())
    }

    fn ensure_state_scope(profile: &UserProfile, state_id: Uuid) -> DbResult<()> {
        let allowed = match profile.role {
            Role::SuperAdmin => true,
            Role::StateAdmin => profile.state_id == Some(state_id),
            _ => false,
        };
        if !allowed {
            return Err(DbError::unauthorized(format!(
                "state {} is outside the caller's assignment",
                state_id
            )));
        }
        Ok(())
    }

    /// Submissions of both kinds, optionally restricted to some facilities
    async fn submissions(
        &self,
        facilities: Option<&HashSet<String>>,
    ) -> DbResult<(Vec<Value>, Vec<Value>)> {
        let keep = |rows: Vec<Value>| -> Vec<Value> {
            match facilities {
                None => rows,
                Some(ids) => rows
                    .into_iter()
                    .filter(|r| facility_of(r).map(|f| ids.contains(f)).unwrap_or(false))
                    .collect(),
            }
        };
        let performance = keep(self.store.rows(Collection::PerformanceData).await);
        let scheme = keep(self.store.rows(Collection::SchemeTracking).await);
        Ok((performance, scheme))
    }

    async fn submit_performance(&self, caller: &Caller, params: Value) -> DbResult<Value> {
        let profile = self.profile(caller).await?;
        require(&profile, Permission::SubmitData)?;
        let submission = validate_performance_payload(&params)?;
        self.ensure_facility_scope(&profile, submission.facility_id).await?;

        let record = PerformanceRecord {
            id: Uuid::new_v4(),
            submission,
            submitted_by: Some(caller.user_id),
            created_at: Utc::now(),
            review: ReviewState::default(),
        };
        let row = self
            .store
            .insert(Collection::PerformanceData, serde_json::to_value(&record)?)
            .await?;
        info!(
            submission_id = %record.id,
            facility_id = %record.submission.facility_id,
            "Performance data submitted"
        );
        Ok(row)
    }

    async fn submit_scheme(&self, caller: &Caller, params: Value) -> DbResult<Value> {
        let profile = self.profile(caller).await?;
        require(&profile, Permission::SubmitData)?;
        let submission = validate_scheme_payload(&params)?;
        self.ensure_facility_scope(&profile, submission.facility_id).await?;

        let record = SchemeRecord {
            id: Uuid::new_v4(),
            submission,
            submitted_by: Some(caller.user_id),
            created_at: Utc::now(),
            review: ReviewState::default(),
        };
        let row = self
            .store
            .insert(Collection::SchemeTracking, serde_json::to_value(&record)?)
            .await?;
        info!(
            submission_id = %record.id,
            facility_id = %record.submission.facility_id,
            "Scheme data submitted"
        );
        Ok(row)
    }

    async fn review(&self, caller: &Caller, params: Value) -> DbResult<Value> {
        let profile = self.profile(caller).await?;
        require(&profile, Permission::ReviewSubmissions)?;
        let request = validate_review_payload(&params)?;

        let table = request.entity_type.collection();
        let by_id = Query::new().eq("id", request.entity_id.to_string());
        let _guard = self.review_lock.lock().await;
        let row = self
            .rows(table, &by_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                DbError::not_found(format!("{} {}", request.entity_type, request.entity_id))
            })?;
        let facility_id = facility_of(&row)
            .and_then(|f| Uuid::parse_str(f).ok())
            .ok_or_else(|| DbError::Constraint(format!("{} has no facility", request.entity_id)))?;
        self.ensure_facility_scope(&profile, facility_id).await?;

        let mut state: ReviewState = serde_json::from_value(row)?;
        let now = Utc::now();
        let outcome = state.apply(&request, caller.user_id, now)?;

        if outcome.changed {
            let patch = json!({
                "status": state.status,
                "reviewer_comments": state.reviewer_comments,
                "rejection_reason": state.rejection_reason,
                "reviewed_by": state.reviewed_by,
                "reviewed_at": state.reviewed_at,
            });
            self.store.update(table, patch, &by_id).await?;

            let entry = AuditLogEntry::status_change(
                request.entity_type,
                request.entity_id,
                outcome.previous,
                outcome.current,
                caller.user_id,
                request.comments.clone(),
                now,
            );
            self.store
                .insert(Collection::AuditLogs, serde_json::to_value(&entry)?)
                .await?;
            info!(
                submission_id = %request.entity_id,
                entity_type = %request.entity_type,
                new_status = %outcome.current,
                reviewer_id = %caller.user_id,
                "Submission reviewed"
            );
        } else {
            debug!(submission_id = %request.entity_id, status = %outcome.current, "Review is a no-op");
        }

        Ok(json!({
            "id": request.entity_id,
            "entity_type": request.entity_type,
            "previous_status": outcome.previous,
            "status": outcome.current,
            "changed": outcome.changed,
        }))
    }

    async fn hospital_dashboard(&self, caller: &Caller, params: Value) -> DbResult<Value> {
        let profile = self.profile(caller).await?;
        let facility_id = target_id(&params, "facility_id", profile.facility_id)?;
        self.ensure_facility_scope(&profile, facility_id).await?;

        let ids = HashSet::from([facility_id.to_string()]);
        let (performance, scheme) = self.submissions(Some(&ids)).await?;

        let mut recent: Vec<Value> = performance
            .iter()
            .map(|r| summary(r, EntityType::PerformanceData))
            .chain(scheme.iter().map(|r| summary(r, EntityType::SchemeTracking)))
            .collect();
        Query::new().order("created_at", Order::Desc).sort(&mut recent);
        recent.truncate(RECENT_LIMIT);

        Ok(json!({
            "facility_id": facility_id,
            "performance": status_counts(&performance),
            "scheme": status_counts(&scheme),
            "recent_submissions": recent,
        }))
    }

    async fn district_dashboard(&self, caller: &Caller, params: Value) -> DbResult<Value> {
        let profile = self.profile(caller).await?;
        require(&profile, Permission::ViewAnalytics)?;
        let district_id = target_id(&params, "district_id", profile.district_id)?;
        self.ensure_district_scope(&profile, district_id).await?;

        let facilities = self.facilities_in_district(district_id).await?;
        let ids: HashSet<String> = facilities.iter().map(|f| f.id.to_string()).collect();
        let (performance, scheme) = self.submissions(Some(&ids)).await?;

        let per_facility: Vec<Value> = facilities
            .iter()
            .map(|f| {
                let id = f.id.to_string();
                let mine: Vec<&Value> = performance
                    .iter()
                    .chain(scheme.iter())
                    .filter(|r| facility_of(r) == Some(id.as_str()))
                    .collect();
                json!({
                    "id": f.id,
                    "name": f.name,
                    "facility_type": f.facility_type,
                    "is_active": f.is_active,
                    "submissions": mine.len(),
                    "pending_reviews": mine.iter().filter(|r| awaits_review(r)).count(),
                })
            })
            .collect();

        Ok(json!({
            "district_id": district_id,
            "facility_count": facilities.len(),
            "pending_reviews": pending(&performance) + pending(&scheme),
            "performance": status_counts(&performance),
            "scheme": status_counts(&scheme),
            "facilities": per_facility,
        }))
    }

    async fn state_dashboard(&self, caller: &Caller, params: Value) -> DbResult<Value> {
        let profile = self.profile(caller).await?;
        require(&profile, Permission::ViewAnalytics)?;
        let state_id = target_id(&params, "state_id", profile.state_id)?;
        Self::ensure_state_scope(&profile, state_id)?;

        let districts = self.districts_in_state(state_id).await?;
        let (all_performance, all_scheme) = self.submissions(None).await?;

        let mut facility_count = 0;
        let mut state_ids = HashSet::new();
        let mut per_district = Vec::with_capacity(districts.len());
        for district in &districts {
            let facilities = self.facilities_in_district(district.id).await?;
            let ids: HashSet<String> = facilities.iter().map(|f| f.id.to_string()).collect();
            let pending_reviews = all_performance
                .iter()
                .chain(all_scheme.iter())
                .filter(|r| facility_of(r).map(|f| ids.contains(f)).unwrap_or(false))
                .filter(|r| awaits_review(r))
                .count();
            facility_count += facilities.len();
            per_district.push(json!({
                "id": district.id,
                "name": district.name,
                "is_active": district.is_active,
                "facility_count": facilities.len(),
                "pending_reviews": pending_reviews,
            }));
            state_ids.extend(ids);
        }
        let (performance, scheme) = self.submissions(Some(&state_ids)).await?;

        Ok(json!({
            "state_id": state_id,
            "district_count": districts.len(),
            "facility_count": facility_count,
            "pending_reviews": pending(&performance) + pending(&scheme),
            "performance": status_counts(&performance),
            "scheme": status_counts(&scheme),
            "districts": per_district,
        }))
    }

    async fn superadmin_overview(&self, caller: &Caller) -> DbResult<Value> {
        let profile = self.profile(caller).await?;
        require(&profile, Permission::ManageUsers)?;

        let active_users = self
            .store
            .select(
                Collection::Profiles,
                &Query::new().eq("is_active", true).head(),
            )
            .await?
            .count;
        let (performance, scheme) = self.submissions(None).await?;

        Ok(json!({
            "states": self.store.len(Collection::States).await,
            "districts": self.store.len(Collection::Districts).await,
            "facilities": self.store.len(Collection::Facilities).await,
            "users": self.store.len(Collection::Profiles).await,
            "active_users": active_users,
            "pending_reviews": pending(&performance) + pending(&scheme),
            "performance": status_counts(&performance),
            "scheme": status_counts(&scheme),
        }))
    }

    /// Monthly metric totals over a reporting window
    ///
    /// Rejected records are left out. Hospital users only ever see their own
    /// facility; reviewers default to their assignment.
    async fn performance_trends(&self, caller: &Caller, params: Value) -> DbResult<Value> {
        let profile = self.profile(caller).await?;
        let mut query = validate_analytics_payload(&params)?;

        if profile.role == Role::HospitalUser {
            let own = profile
                .facility_id
                .ok_or_else(|| DbError::unauthorized("no facility assigned"))?;
            query.facility_id = Some(own);
            query.district_id = None;
            query.state_id = None;
        } else {
            require(&profile, Permission::ViewAnalytics)?;
            if query.facility_id.is_none() && query.district_id.is_none() && query.state_id.is_none() {
                match profile.role {
                    Role::DistrictAdmin => query.district_id = profile.district_id,
                    Role::StateAdmin => query.state_id = profile.state_id,
                    _ => {}
                }
            }
        }

        let facilities: Option<HashSet<String>> = if let Some(id) = query.facility_id {
            self.ensure_facility_scope(&profile, id).await?;
            Some(HashSet::from([id.to_string()]))
        } else if let Some(id) = query.district_id {
            self.ensure_district_scope(&profile, id).await?;
            Some(
                self.facilities_in_district(id)
                    .await?
                    .into_iter()
                    .map(|f| f.id.to_string())
                    .collect(),
            )
        } else if let Some(id) = query.state_id {
            Self::ensure_state_scope(&profile, id)?;
            Some(self.facility_ids_in_state(id).await?)
        } else {
            if profile.role != Role::SuperAdmin {
                return Err(DbError::unauthorized(
                    "trends across all locations require the super admin role",
                ));
            }
            None
        };

        let (performance, _) = self.submissions(facilities.as_ref()).await?;
        let mut buckets: BTreeMap<(String, String), (f64, u64)> = BTreeMap::new();
        let mut included = 0usize;
        for row in performance {
            let record: PerformanceRecord = match serde_json::from_value(row) {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed performance row");
                    continue;
                }
            };
            let start = record.submission.reporting_start;
            if record.review.status == SubmissionStatus::Rejected
                || start < query.start_date
                || start > query.end_date
            {
                continue;
            }
            let metrics: Vec<_> = record
                .submission
                .metrics
                .iter()
                .filter(|m| {
                    query
                        .metric_type
                        .as_deref()
                        .map_or(true, |wanted| m.metric_type == wanted)
                })
                .collect();
            if metrics.is_empty() {
                continue;
            }
            included += 1;
            let period = start.format("%Y-%m").to_string();
            for metric in metrics {
                let bucket = buckets
                    .entry((period.clone(), metric.metric_type.clone()))
                    .or_insert((0.0, 0));
                bucket.0 += metric.metric_value;
                bucket.1 += 1;
            }
        }

        let series: Vec<Value> = buckets
            .into_iter()
            .map(|((period, metric_type), (total, count))| {
                json!({
                    "period": period,
                    "metric_type": metric_type,
                    "total_value": total,
                    "submissions": count,
                })
            })
            .collect();

        debug!(count = series.len(), "Performance trends computed");
        Ok(json!({
            "start_date": query.start_date,
            "end_date": query.end_date,
            "facility_id": query.facility_id,
            "district_id": query.district_id,
            "state_id": query.state_id,
            "metric_type": query.metric_type,
            "submissions": included,
            "series": series,
        }))
    }
}

#[async_trait]
impl RpcBackend for MemoryProcedures {
    async fn rpc(&self, caller: &Caller, procedure: Procedure, params: Value) -> DbResult<Value> {
        debug!(procedure = %procedure, caller = %caller.user_id, "RPC call");
        let result = match procedure {
            Procedure::SubmitPerformanceData => self.submit_performance(caller, params).await,
            Procedure::SubmitSchemeData => self.submit_scheme(caller, params).await,
            Procedure::ReviewSubmission => self.review(caller, params).await,
            Procedure::GetHospitalDashboard => self.hospital_dashboard(caller, params).await,
            Procedure::GetDistrictDashboard => self.district_dashboard(caller, params).await,
            Procedure::GetStateDashboard => self.state_dashboard(caller, params).await,
            Procedure::GetSuperadminOverview => self.superadmin_overview(caller).await,
            Procedure::GetPerformanceTrends => self.performance_trends(caller, params).await,
        };
        if let Err(e) = &result {
            warn!(procedure = %procedure, error = %e, "RPC failed");
        }
        result
    }
}

fn require(profile: &UserProfile, permission: Permission) -> DbResult<()> {
    if !profile.can(permission) {
        return Err(DbError::unauthorized(format!(
            "role {} lacks permission {:?}",
            profile.role, permission
        )));
    }
    Ok(())
}

/// Id from params, falling back to the caller's assignment
fn target_id(params: &Value, key: &str, fallback: Option<Uuid>) -> DbResult<Uuid> {
    match params.get(key).and_then(Value::as_str) {
        Some(s) => Ok(guards::validate_uuid(s, key)?),
        None => fallback.ok_or_else(|| DbError::InvalidQuery(format!("{} is required", key))),
    }
}

fn facility_of(row: &Value) -> Option<&str> {
    row.get("facility_id").and_then(Value::as_str)
}

fn status_of(row: &Value) -> Option<SubmissionStatus> {
    row.get("status")
        .and_then(Value::as_str)
        .and_then(SubmissionStatus::from_str)
}

fn awaits_review(row: &Value) -> bool {
    status_of(row).map(|s| s.awaits_review()).unwrap_or(false)
}

fn pending(rows: &[Value]) -> usize {
    rows.iter().filter(|r| awaits_review(r)).count()
}

fn status_counts(rows: &[Value]) -> Value {
    let mut counts: BTreeMap<&'static str, u64> = [
        SubmissionStatus::Pending,
        SubmissionStatus::UnderReview,
        SubmissionStatus::Approved,
        SubmissionStatus::Rejected,
        SubmissionStatus::SentBack,
    ]
    .iter()
    .map(|s| (s.as_str(), 0))
    .collect();
    for status in rows.iter().filter_map(status_of) {
        *counts.entry(status.as_str()).or_default() += 1;
    }
    let mut value = json!(counts);
    value["total"] = json!(rows.len());
    value
}

fn summary(row: &Value, kind: EntityType) -> Value {
    let title = row
        .get("program")
        .or_else(|| row.get("scheme_name"))
        .cloned()
        .unwrap_or(Value::Null);
    json!({
        "id": row.get("id"),
        "entity_type": kind,
        "title": title,
        "status": row.get("status"),
        "created_at": row.get("created_at"),
    })
}
