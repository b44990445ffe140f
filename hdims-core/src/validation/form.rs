//! Client-side form rules
//!
//! Forms hold raw text exactly as typed. `validate` either yields the typed
//! submission or a full set of per-field errors; nothing partial is ever
//! produced.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::guards::{self, non_blank, MAX_NOTES_LEN};
use crate::types::{Metric, PerformanceSubmission, SchemeSubmission};

/// Per-field error messages, keyed by form field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    /// Drop the error for a field, typically when the user edits it
    pub fn clear(&mut self, field: &str) {
        self.0.remove(field);
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        f.write_str(&parts.join("; "))
    }
}

fn required_text(errors: &mut FieldErrors, field: &str, value: &str, label: &str) -> Option<String> {
    match non_blank(value) {
        Some(v) => Some(v.to_string()),
        None => {
            errors.insert(field, format!("{} is required", label));
            None
        }
    }
}

fn required_uuid(errors: &mut FieldErrors, field: &str, value: &str, label: &str) -> Option<Uuid> {
    let text = required_text(errors, field, value, label)?;
    match guards::validate_uuid(&text, field) {
        Ok(id) => Some(id),
        Err(_) => {
            errors.insert(field, format!("{} is not a valid selection", label));
            None
        }
    }
}

fn required_date(
    errors: &mut FieldErrors,
    field: &str,
    value: &str,
    label: &str,
) -> Option<chrono::NaiveDate> {
    let text = required_text(errors, field, value, label)?;
    match guards::parse_date(&text, field) {
        Ok(d) => Some(d),
        Err(_) => {
            errors.insert(field, format!("{} must be a valid date", label));
            None
        }
    }
}

fn optional_date(
    errors: &mut FieldErrors,
    field: &str,
    value: &str,
    label: &str,
) -> Option<chrono::NaiveDate> {
    non_blank(value)?;
    required_date(errors, field, value, label)
}

fn required_amount(errors: &mut FieldErrors, field: &str, value: &str, label: &str) -> Option<f64> {
    let text = required_text(errors, field, value, label)?;
    match text.parse::<f64>().ok().and_then(|v| guards::ensure_non_negative(v, field).ok()) {
        Some(v) => Some(v),
        None => {
            errors.insert(field, format!("{} must be a non-negative number", label));
            None
        }
    }
}

fn required_count(errors: &mut FieldErrors, field: &str, value: &str, label: &str) -> Option<u64> {
    let amount = required_amount(errors, field, value, label)?;
    if amount.fract() != 0.0 || amount > u64::MAX as f64 {
        errors.insert(field, format!("{} must be a whole number", label));
        return None;
    }
    Some(amount as u64)
}

fn check_period(
    errors: &mut FieldErrors,
    start: Option<chrono::NaiveDate>,
    end: Option<chrono::NaiveDate>,
) {
    if let (Some(start), Some(end)) = (start, end) {
        if guards::ensure_date_order(start, end, "start_date", "end_date").is_err() {
            errors.insert("end_date", "End date cannot be before start date");
        }
    }
}

fn optional_notes(errors: &mut FieldErrors, value: &str) -> Option<String> {
    let notes = non_blank(value)?;
    if guards::ensure_max_len(notes, "notes", MAX_NOTES_LEN).is_err() {
        errors.insert(
            "notes",
            format!("Notes must be {} characters or fewer", MAX_NOTES_LEN),
        );
        return None;
    }
    Some(notes.to_string())
}

/// Performance-data entry form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceForm {
    pub facility_id: String,
    pub start_date: String,
    pub end_date: String,
    pub program: String,
    pub metric_type: String,
    pub metric_value: String,
    pub unit: String,
    pub notes: String,
    #[serde(default)]
    pub doc_ids: Vec<Uuid>,
}

impl PerformanceForm {
    /// Field names in display order
    pub const FIELDS: [&'static str; 8] = [
        "facility_id",
        "start_date",
        "end_date",
        "program",
        "metric_type",
        "metric_value",
        "unit",
        "notes",
    ];

    /// Overwrite one field by name; returns false for unknown fields
    pub fn set(&mut self, field: &str, value: impl Into<String>) -> bool {
        let slot = match field {
            "facility_id" => &mut self.facility_id,
            "start_date" => &mut self.start_date,
            "end_date" => &mut self.end_date,
            "program" => &mut self.program,
            "metric_type" => &mut self.metric_type,
            "metric_value" => &mut self.metric_value,
            "unit" => &mut self.unit,
            "notes" => &mut self.notes,
            _ => return false,
        };
        *slot = value.into();
        true
    }

    pub fn validate(&self) -> Result<PerformanceSubmission, FieldErrors> {
        let mut errors = FieldErrors::new();

        let facility_id = required_uuid(&mut errors, "facility_id", &self.facility_id, "Facility");
        let start = required_date(&mut errors, "start_date", &self.start_date, "Start date");
        let end = required_date(&mut errors, "end_date", &self.end_date, "End date");
        check_period(&mut errors, start, end);
        let program = required_text(&mut errors, "program", &self.program, "Program");
        let metric_type = required_text(&mut errors, "metric_type", &self.metric_type, "Metric type");
        let metric_value =
            required_amount(&mut errors, "metric_value", &self.metric_value, "Metric value");
        let notes = optional_notes(&mut errors, &self.notes);

        let unit = non_blank(&self.unit).map(str::to_string);
        let doc_ids = self.doc_ids.clone();
        errors.into_result(|| PerformanceSubmission {
            facility_id: facility_id.unwrap_or_default(),
            program: program.unwrap_or_default(),
            reporting_start: start.unwrap_or_default(),
            reporting_end: end.unwrap_or_default(),
            metrics: vec![Metric {
                metric_type: metric_type.unwrap_or_default(),
                metric_value: metric_value.unwrap_or_default(),
                unit,
            }],
            notes,
            doc_ids,
        })
    }
}

/// Scheme-tracking entry form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemeForm {
    pub facility_id: String,
    pub scheme_name: String,
    pub start_date: String,
    pub end_date: String,
    pub beneficiary_count: String,
    pub funds_allocated: String,
    pub funds_utilized: String,
    #[serde(default)]
    pub activities: Vec<String>,
    pub notes: String,
    #[serde(default)]
    pub doc_ids: Vec<Uuid>,
}

impl SchemeForm {
    pub const FIELDS: [&'static str; 9] = [
        "facility_id",
        "scheme_name",
        "start_date",
        "end_date",
        "beneficiary_count",
        "funds_allocated",
        "funds_utilized",
        "activities",
        "notes",
    ];

    /// Overwrite one text field by name; returns false for unknown fields
    pub fn set(&mut self, field: &str, value: impl Into<String>) -> bool {
        let slot = match field {
            "facility_id" => &mut self.facility_id,
            "scheme_name" => &mut self.scheme_name,
            "start_date" => &mut self.start_date,
            "end_date" => &mut self.end_date,
            "beneficiary_count" => &mut self.beneficiary_count,
            "funds_allocated" => &mut self.funds_allocated,
            "funds_utilized" => &mut self.funds_utilized,
            "notes" => &mut self.notes,
            _ => return false,
        };
        *slot = value.into();
        true
    }

    pub fn validate(&self) -> Result<SchemeSubmission, FieldErrors> {
        let mut errors = FieldErrors::new();

        let facility_id = required_uuid(&mut errors, "facility_id", &self.facility_id, "Facility");
        let scheme_name = required_text(&mut errors, "scheme_name", &self.scheme_name, "Scheme name");
        let start = optional_date(&mut errors, "start_date", &self.start_date, "Start date");
        let end = optional_date(&mut errors, "end_date", &self.end_date, "End date");
        check_period(&mut errors, start, end);
        let beneficiary_count = required_count(
            &mut errors,
            "beneficiary_count",
            &self.beneficiary_count,
            "Beneficiary count",
        );
        let funds_allocated = required_amount(
            &mut errors,
            "funds_allocated",
            &self.funds_allocated,
            "Funds allocated",
        );
        let funds_utilized = required_amount(
            &mut errors,
            "funds_utilized",
            &self.funds_utilized,
            "Funds utilized",
        );

        let activities: Vec<String> = self
            .activities
            .iter()
            .filter_map(|a| non_blank(a).map(str::to_string))
            .collect();
        if activities.is_empty() {
            errors.insert("activities", "At least one activity is required");
        }
        let notes = optional_notes(&mut errors, &self.notes);

        let doc_ids = self.doc_ids.clone();
        errors.into_result(|| SchemeSubmission {
            facility_id: facility_id.unwrap_or_default(),
            scheme_name: scheme_name.unwrap_or_default(),
            reporting_start: start,
            reporting_end: end,
            beneficiary_count: beneficiary_count.unwrap_or_default(),
            funds_allocated: funds_allocated.unwrap_or_default(),
            funds_utilized: funds_utilized.unwrap_or_default(),
            activities,
            notes,
            doc_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const FACILITY: &str = "550e8400-e29b-41d4-a716-446655440000";

    fn performance_form() -> PerformanceForm {
        PerformanceForm {
            facility_id: FACILITY.into(),
            start_date: "2024-01-01".into(),
            end_date: "2024-01-31".into(),
            program: "Maternal Health".into(),
            metric_type: "institutional_deliveries".into(),
            metric_value: "58".into(),
            ..Default::default()
        }
    }

    fn scheme_form() -> SchemeForm {
        SchemeForm {
            facility_id: FACILITY.into(),
            scheme_name: "Janani Suraksha Yojana".into(),
            beneficiary_count: "125".into(),
            funds_allocated: "1000000".into(),
            funds_utilized: "850000".into(),
            activities: vec!["Awareness camp".into(), "Cash transfer".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_performance_form() {
        let submission = performance_form().validate().unwrap();
        assert_eq!(submission.metrics.len(), 1);
        assert_eq!(submission.metrics[0].metric_value, 58.0);
        assert_eq!(
            submission.reporting_end,
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
        );
        assert!(submission.notes.is_none());
    }

    #[test]
    fn test_missing_fields_all_reported() {
        let errors = PerformanceForm::default().validate().unwrap_err();
        for field in ["facility_id", "start_date", "end_date", "program", "metric_type", "metric_value"] {
            assert!(errors.contains(field), "missing error for {}", field);
        }
        assert!(!errors.contains("notes"));
        assert!(!errors.contains("unit"));
    }

    #[test]
    fn test_end_before_start_flags_end_date() {
        let mut form = performance_form();
        form.end_date = "2023-12-31".into();
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("end_date"), Some("End date cannot be before start date"));
    }

    #[test]
    fn test_negative_metric_value_blocks_submit() {
        let mut form = performance_form();
        form.metric_value = "-10".into();
        let errors = form.validate().unwrap_err();
        assert_eq!(
            errors.get("metric_value"),
            Some("Metric value must be a non-negative number")
        );
    }

    #[test]
    fn test_non_numeric_metric_value() {
        let mut form = performance_form();
        form.metric_value = "lots".into();
        assert!(form.validate().unwrap_err().contains("metric_value"));
    }

    #[test]
    fn test_notes_length_cap() {
        let mut form = performance_form();
        form.notes = "x".repeat(MAX_NOTES_LEN);
        assert!(form.validate().is_ok());
        form.notes = "x".repeat(MAX_NOTES_LEN + 1);
        assert!(form.validate().unwrap_err().contains("notes"));
    }

    #[test]
    fn test_set_field() {
        let mut form = PerformanceForm::default();
        assert!(form.set("program", "TB Control"));
        assert_eq!(form.program, "TB Control");
        assert!(!form.set("status", "approved"));
    }

    #[test]
    fn test_valid_scheme_form() {
        let submission = scheme_form().validate().unwrap();
        assert_eq!(submission.beneficiary_count, 125);
        assert_eq!(submission.funds_utilized, 850_000.0);
        assert_eq!(submission.activities.len(), 2);
        assert!(submission.reporting_start.is_none());
    }

    #[test]
    fn test_scheme_requires_activity() {
        let mut form = scheme_form();
        form.activities = vec!["  ".into()];
        let errors = form.validate().unwrap_err();
        assert!(errors.contains("activities"));
    }

    #[test]
    fn test_scheme_fractional_beneficiaries() {
        let mut form = scheme_form();
        form.beneficiary_count = "12.5".into();
        assert_eq!(
            form.validate().unwrap_err().get("beneficiary_count"),
            Some("Beneficiary count must be a whole number")
        );
    }

    #[test]
    fn test_scheme_negative_funds() {
        let mut form = scheme_form();
        form.funds_utilized = "-1".into();
        assert!(form.validate().unwrap_err().contains("funds_utilized"));
    }

    #[test]
    fn test_scheme_optional_period_still_ordered() {
        let mut form = scheme_form();
        form.start_date = "2024-04-01".into();
        form.end_date = "2024-03-01".into();
        assert!(form.validate().unwrap_err().contains("end_date"));
    }

    #[test]
    fn test_clear_field_error() {
        let mut errors = PerformanceForm::default().validate().unwrap_err();
        let before = errors.len();
        errors.clear("program");
        assert_eq!(errors.len(), before - 1);
        assert!(!errors.contains("program"));
    }
}
