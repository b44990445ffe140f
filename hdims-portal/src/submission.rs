//! Entry form controllers
//!
//! A controller owns one form, its field errors and an in-flight flag.
//! Editing a field clears that field's error; a submit while another is
//! still running is refused.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use hdims_core::validation::{FieldErrors, PerformanceForm, SchemeForm};
use hdims_core::{
    EntityType, Permission, PerformanceRecord, PerformanceSubmission, ReviewState, Role,
    SchemeRecord, SchemeSubmission,
};
use hdims_db::DataStore;

use crate::error::{PortalError, PortalResult};
use crate::session::CurrentUser;

/// A form that validates into a submission record
pub trait SubmissionForm: Default + Clone + Send {
    type Submission: Send;

    const KIND: EntityType;

    fn set_field(&mut self, field: &str, value: String) -> bool;

    fn validate(&self) -> Result<Self::Submission, FieldErrors>;

    fn set_facility(&mut self, facility_id: Uuid);

    fn facility_of(submission: &Self::Submission) -> Uuid;

    /// New pending record as a row
    fn to_row(
        submission: Self::Submission,
        submitted_by: Uuid,
        now: DateTime<Utc>,
    ) -> serde_json::Result<Value>;
}

impl SubmissionForm for PerformanceForm {
    type Submission = PerformanceSubmission;

    const KIND: EntityType = EntityType::PerformanceData;

    fn set_field(&mut self, field: &str, value: String) -> bool {
        self.set(field, value)
    }

    fn validate(&self) -> Result<PerformanceSubmission, FieldErrors> {
        PerformanceForm::validate(self)
    }

    fn set_facility(&mut self, facility_id: Uuid) {
        self.facility_id = facility_id.to_string();
    }

    fn facility_of(submission: &PerformanceSubmission) -> Uuid {
        submission.facility_id
    }

    fn to_row(
        submission: PerformanceSubmission,
        submitted_by: Uuid,
        now: DateTime<Utc>,
    ) -> serde_json::Result<Value> {
        serde_json::to_value(PerformanceRecord {
            id: Uuid::new_v4(),
            submission,
            submitted_by: Some(submitted_by),
            created_at: now,
            review: ReviewState::default(),
        })
    }
}

impl SubmissionForm for SchemeForm {
    type Submission = SchemeSubmission;

    const KIND: EntityType = EntityType::SchemeTracking;

    fn set_field(&mut self, field: &str, value: String) -> bool {
        self.set(field, value)
    }

    fn validate(&self) -> Result<SchemeSubmission, FieldErrors> {
        SchemeForm::validate(self)
    }

    fn set_facility(&mut self, facility_id: Uuid) {
        self.facility_id = facility_id.to_string();
    }

    fn facility_of(submission: &SchemeSubmission) -> Uuid {
        submission.facility_id
    }

    fn to_row(
        submission: SchemeSubmission,
        submitted_by: Uuid,
        now: DateTime<Utc>,
    ) -> serde_json::Result<Value> {
        serde_json::to_value(SchemeRecord {
            id: Uuid::new_v4(),
            submission,
            submitted_by: Some(submitted_by),
            created_at: now,
            review: ReviewState::default(),
        })
    }
}

struct FormState<F> {
    form: F,
    errors: FieldErrors,
}

/// Clears the in-flight flag when the submit ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Controller for one entry form
pub struct SubmissionController<F: SubmissionForm> {
    state: Mutex<FormState<F>>,
    in_flight: AtomicBool,
}

impl<F: SubmissionForm> Default for SubmissionController<F> {
    fn default() -> Self {
        Self {
            state: Mutex::new(FormState {
                form: F::default(),
                errors: FieldErrors::new(),
            }),
            in_flight: AtomicBool::new(false),
        }
    }
}

impl<F: SubmissionForm> SubmissionController<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Controller with the user's facility filled in
    pub fn for_user(user: &CurrentUser) -> Self {
        let controller = Self::new();
        if let Some(facility_id) = user.profile.facility_id {
            controller.lock().form.set_facility(facility_id);
        }
        controller
    }

    fn lock(&self) -> MutexGuard<'_, FormState<F>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set a text field and clear its error; false for unknown fields
    pub fn set_field(&self, field: &str, value: impl Into<String>) -> bool {
        let mut state = self.lock();
        let known = state.form.set_field(field, value.into());
        if known {
            state.errors.clear(field);
        }
        known
    }

    /// Change `field` through a closure and clear its error
    pub fn edit<R>(&self, field: &str, f: impl FnOnce(&mut F) -> R) -> R {
        let mut state = self.lock();
        let out = f(&mut state.form);
        state.errors.clear(field);
        out
    }

    pub fn form(&self) -> F {
        self.lock().form.clone()
    }

    pub fn errors(&self) -> FieldErrors {
        self.lock().errors.clone()
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Validate and insert; the form resets after a successful insert
    pub async fn submit(&self, store: &dyn DataStore, user: &CurrentUser) -> PortalResult<Value> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PortalError::InFlight);
        }
        let _guard = InFlight(&self.in_flight);

        user.require(Permission::SubmitData)?;

        let submission = {
            let mut state = self.lock();
            match state.form.validate() {
                Ok(submission) => {
                    state.errors = FieldErrors::new();
                    submission
                }
                Err(errors) => {
                    warn!(kind = %F::KIND, count = errors.len(), "Form has invalid fields");
                    state.errors = errors.clone();
                    return Err(PortalError::Form(errors));
                }
            }
        };

        let facility_id = F::facility_of(&submission);
        if user.profile.role == Role::HospitalUser && user.profile.facility_id != Some(facility_id) {
            return Err(PortalError::forbidden(format!(
                "facility {} is not assigned to this account",
                facility_id
            )));
        }

        let row = F::to_row(submission, user.profile.id, Utc::now())?;
        let stored = store.insert(F::KIND.collection(), row).await?;
        info!(
            kind = %F::KIND,
            submission_id = %stored.get("id").and_then(serde_json::Value::as_str).unwrap_or_default(),
            facility_id = %facility_id,
            "Submission stored"
        );

        let mut state = self.lock();
        state.form = F::default();
        if let Some(own) = user.profile.facility_id {
            state.form.set_facility(own);
        }
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MemorySessionStore, SessionContext};
    use async_trait::async_trait;
    use hdims_core::Collection;
    use hdims_db::memory::MemoryStore;
    use hdims_db::{DbResult, MemoryPlatform, NewUser, Query, Selection};
    use std::sync::Arc;
    use std::time::Duration;

    async fn hospital() -> (MemoryPlatform, SessionContext, Uuid) {
        let platform = MemoryPlatform::new();
        let (_, _, facility_id) = platform
            .seed_location("Maharashtra", "Pune", "PHC Hadapsar")
            .await
            .unwrap();
        platform
            .create_user(
                NewUser::new("phc@example.org", "secret123", Role::HospitalUser)
                    .facility(facility_id),
            )
            .await
            .unwrap();
        let mut ctx = SessionContext::new(platform.platform(), Arc::new(MemorySessionStore::new()));
        ctx.sign_in("phc@example.org", "secret123").await.unwrap();
        (platform, ctx, facility_id)
    }

    fn fill_performance(c: &SubmissionController<PerformanceForm>) {
        c.set_field("start_date", "2024-01-01");
        c.set_field("end_date", "2024-01-31");
        c.set_field("program", "Immunization");
        c.set_field("metric_type", "bcg_doses");
        c.set_field("metric_value", "120");
    }

    #[tokio::test]
    async fn test_submit_creates_pending_record() {
        let (platform, ctx, facility_id) = hospital().await;
        let user = ctx.user().unwrap();
        let controller = SubmissionController::<PerformanceForm>::for_user(user);
        fill_performance(&controller);

        let row = controller.submit(&platform.store, user).await.unwrap();
        assert_eq!(row["status"], "pending");
        assert_eq!(row["facility_id"], facility_id.to_string());
        assert_eq!(platform.store.len(Collection::PerformanceData).await, 1);
        // reset, facility kept
        assert_eq!(controller.form().program, "");
        assert_eq!(controller.form().facility_id, facility_id.to_string());
    }

    #[tokio::test]
    async fn test_invalid_form_blocks_submit() {
        let (platform, ctx, _) = hospital().await;
        let user = ctx.user().unwrap();
        let controller = SubmissionController::<PerformanceForm>::for_user(user);
        fill_performance(&controller);
        controller.set_field("metric_value", "-10");
        controller.set_field("end_date", "2023-12-01");

        let err = controller.submit(&platform.store, user).await.unwrap_err();
        assert!(matches!(err, PortalError::Form(_)));
        let errors = controller.errors();
        assert!(errors.contains("metric_value"));
        assert!(errors.contains("end_date"));
        assert_eq!(platform.store.len(Collection::PerformanceData).await, 0);

        controller.set_field("metric_value", "10");
        assert!(!controller.errors().contains("metric_value"));
        assert!(controller.errors().contains("end_date"));
    }

    #[tokio::test]
    async fn test_scheme_submission() {
        let (platform, ctx, _) = hospital().await;
        let user = ctx.user().unwrap();
        let controller = SubmissionController::<SchemeForm>::for_user(user);
        controller.set_field("scheme_name", "Janani Suraksha Yojana");
        controller.set_field("beneficiary_count", "125");
        controller.set_field("funds_allocated", "1000000");
        controller.set_field("funds_utilized", "850000");
        controller.edit("activities", |f| {
            f.activities = vec!["ANC camps".into(), "Cash transfer".into()]
        });

        let row = controller.submit(&platform.store, user).await.unwrap();
        assert_eq!(row["status"], "pending");
        assert_eq!(row["beneficiary_count"], 125);
        assert_eq!(platform.store.len(Collection::SchemeTracking).await, 1);
    }

    #[tokio::test]
    async fn test_other_facility_refused() {
        let (platform, ctx, _) = hospital().await;
        let (_, _, elsewhere) = platform
            .seed_location("Kerala", "Kollam", "CHC Karunagappally")
            .await
            .unwrap();
        let user = ctx.user().unwrap();
        let controller = SubmissionController::<PerformanceForm>::for_user(user);
        fill_performance(&controller);
        controller.set_field("facility_id", elsewhere.to_string());

        let err = controller.submit(&platform.store, user).await.unwrap_err();
        assert!(matches!(err, PortalError::Forbidden(_)));
    }

    /// Store whose inserts take a while
    struct SlowStore(MemoryStore);

    #[async_trait]
    impl DataStore for SlowStore {
        async fn select(&self, table: Collection, query: &Query) -> DbResult<Selection> {
            self.0.select(table, query).await
        }

        async fn insert(&self, table: Collection, row: Value) -> DbResult<Value> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.0.insert(table, row).await
        }

        async fn update(&self, table: Collection, patch: Value, query: &Query) -> DbResult<Vec<Value>> {
            self.0.update(table, patch, query).await
        }

        async fn delete(&self, table: Collection, query: &Query) -> DbResult<Vec<Value>> {
            self.0.delete(table, query).await
        }
    }

    #[tokio::test]
    async fn test_second_submit_refused_while_in_flight() {
        let (platform, ctx, _) = hospital().await;
        let user = ctx.user().unwrap();
        let controller = SubmissionController::<PerformanceForm>::for_user(user);
        fill_performance(&controller);
        let slow = SlowStore(platform.store.clone());

        let (first, second) = tokio::join!(
            controller.submit(&slow, user),
            controller.submit(&slow, user)
        );
        assert!(first.is_ok());
        assert!(matches!(second, Err(PortalError::InFlight)));
        assert!(!controller.is_submitting());
        assert_eq!(platform.store.len(Collection::PerformanceData).await, 1);
    }
}
