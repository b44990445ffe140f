//! Trust-boundary payload validation
//!
//! The serverless functions cannot trust what the dashboard sends. Every
//! payload is checked here, on the raw JSON, before anything is forwarded to
//! a stored procedure. Checks run in a fixed order: object shape, required
//! fields, identifiers, types and ranges, dates.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::guards::{self, MAX_NOTES_LEN};
use crate::error::{ReviewError, ReviewResult, ValidationError, ValidationResult};
use crate::review::{ReviewDecision, ReviewRequest};
use crate::types::{EntityType, Metric, PerformanceSubmission, SchemeSubmission};

/// Required fields for `submit_performance_data`
pub const PERFORMANCE_REQUIRED: [&str; 5] = [
    "facility_id",
    "program",
    "reporting_start",
    "reporting_end",
    "metrics",
];

/// Required fields for `submit_scheme_data`
pub const SCHEME_REQUIRED: [&str; 6] = [
    "facility_id",
    "scheme_name",
    "beneficiary_count",
    "funds_allocated",
    "funds_utilized",
    "activities",
];

/// Required fields for `review_submission`
pub const REVIEW_REQUIRED: [&str; 3] = ["entity_type", "entity_id", "new_status"];

/// Required fields for `get_performance_trends`
pub const ANALYTICS_REQUIRED: [&str; 2] = ["start_date", "end_date"];

/// Borrowed view over a JSON object payload
struct Payload<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Payload<'a> {
    fn new(value: &'a Value) -> ValidationResult<Self> {
        value
            .as_object()
            .map(|map| Self { map })
            .ok_or(ValidationError::NotAnObject)
    }

    /// Value of a field, treating JSON `null` as absent
    fn get(&self, field: &str) -> Option<&'a Value> {
        self.map.get(field).filter(|v| !v.is_null())
    }

    /// Report every absent field at once
    fn require(&self, fields: &[&str]) -> ValidationResult<()> {
        let missing: Vec<String> = fields
            .iter()
            .filter(|f| match self.get(f) {
                None => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .map(|f| f.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::MissingFields(missing))
        }
    }

    fn string(&self, field: &str) -> ValidationResult<&'a str> {
        match self.get(field) {
            Some(Value::String(s)) => Ok(s.trim()),
            Some(_) => Err(invalid_type(field, "string")),
            None => Err(ValidationError::missing(field)),
        }
    }

    fn optional_string(&self, field: &str) -> ValidationResult<Option<&'a str>> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(guards::non_blank(s)),
            Some(_) => Err(invalid_type(field, "string")),
        }
    }

    fn uuid(&self, field: &str) -> ValidationResult<Uuid> {
        guards::validate_uuid(self.string(field)?, field)
    }

    fn optional_uuid(&self, field: &str) -> ValidationResult<Option<Uuid>> {
        self.optional_string(field)?
            .map(|s| guards::validate_uuid(s, field))
            .transpose()
    }

    fn amount(&self, field: &str) -> ValidationResult<f64> {
        match self.get(field) {
            Some(v) => number(v, field),
            None => Err(ValidationError::missing(field)),
        }
    }

    fn count(&self, field: &str) -> ValidationResult<u64> {
        let value = self.amount(field)?;
        if value.fract() != 0.0 || value > u64::MAX as f64 {
            return Err(invalid_type(field, "whole number"));
        }
        Ok(value as u64)
    }

    fn date(&self, field: &str) -> ValidationResult<NaiveDate> {
        guards::parse_date(self.string(field)?, field)
    }

    fn optional_date(&self, field: &str) -> ValidationResult<Option<NaiveDate>> {
        self.optional_string(field)?
            .map(|s| guards::parse_date(s, field))
            .transpose()
    }

    fn array(&self, field: &str) -> ValidationResult<&'a Vec<Value>> {
        match self.get(field) {
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(invalid_type(field, "array")),
            None => Err(ValidationError::missing(field)),
        }
    }

    fn optional_array(&self, field: &str) -> ValidationResult<Option<&'a Vec<Value>>> {
        match self.get(field) {
            None => Ok(None),
            Some(_) => self.array(field).map(Some),
        }
    }

    fn notes(&self) -> ValidationResult<Option<String>> {
        let notes = self.optional_string("notes")?;
        if let Some(text) = notes {
            guards::ensure_max_len(text, "notes", MAX_NOTES_LEN)?;
        }
        Ok(notes.map(str::to_string))
    }

    fn doc_ids(&self) -> ValidationResult<Vec<Uuid>> {
        let Some(items) = self.optional_array("doc_ids")? else {
            return Ok(Vec::new());
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let field = format!("doc_ids[{}]", i);
                match item {
                    Value::String(s) => guards::validate_uuid(s, &field),
                    _ => Err(invalid_type(&field, "UUID string")),
                }
            })
            .collect()
    }
}

fn invalid_type(field: &str, expected: &'static str) -> ValidationError {
    ValidationError::InvalidType {
        field: field.to_string(),
        expected,
    }
}

/// JSON number, finite and non-negative. Numeric strings are not accepted.
fn number(value: &Value, field: &str) -> ValidationResult<f64> {
    let n = value.as_f64().ok_or_else(|| invalid_type(field, "number"))?;
    guards::ensure_non_negative(n, field)
}

fn metrics(items: &[Value]) -> ValidationResult<Vec<Metric>> {
    if items.is_empty() {
        return Err(ValidationError::TooFew {
            field: "metrics".to_string(),
            min: 1,
        });
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let field = format!("metrics[{}]", i);
            let obj = item.as_object().ok_or_else(|| invalid_type(&field, "object"))?;
            let metric_type = match obj.get("metric_type") {
                Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
                Some(Value::String(_)) | None | Some(Value::Null) => {
                    return Err(ValidationError::missing(&format!("{}.metric_type", field)))
                }
                Some(_) => return Err(invalid_type(&format!("{}.metric_type", field), "string")),
            };
            let value_field = format!("{}.metric_value", field);
            let metric_value = match obj.get("metric_value") {
                Some(v) if !v.is_null() => number(v, &value_field)?,
                _ => return Err(ValidationError::missing(&value_field)),
            };
            let unit = match obj.get("unit") {
                Some(Value::String(s)) => guards::non_blank(s).map(str::to_string),
                None | Some(Value::Null) => None,
                Some(_) => return Err(invalid_type(&format!("{}.unit", field), "string")),
            };
            Ok(Metric {
                metric_type,
                metric_value,
                unit,
            })
        })
        .collect()
}

fn activities(items: &[Value]) -> ValidationResult<Vec<String>> {
    let list = items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            Value::String(_) => Err(ValidationError::missing(&format!("activities[{}]", i))),
            _ => Err(invalid_type(&format!("activities[{}]", i), "string")),
        })
        .collect::<ValidationResult<Vec<_>>>()?;
    if list.is_empty() {
        return Err(ValidationError::TooFew {
            field: "activities".to_string(),
            min: 1,
        });
    }
    Ok(list)
}

/// Validate a `submit_performance_data` payload
pub fn validate_performance_payload(value: &Value) -> ValidationResult<PerformanceSubmission> {
    let payload = Payload::new(value)?;
    payload.require(&PERFORMANCE_REQUIRED)?;

    let facility_id = payload.uuid("facility_id")?;
    let doc_ids = payload.doc_ids()?;
    let program = payload.string("program")?.to_string();
    let metrics = metrics(payload.array("metrics")?)?;
    let notes = payload.notes()?;

    let reporting_start = payload.date("reporting_start")?;
    let reporting_end = payload.date("reporting_end")?;
    guards::ensure_date_order(reporting_start, reporting_end, "reporting_start", "reporting_end")?;

    Ok(PerformanceSubmission {
        facility_id,
        program,
        reporting_start,
        reporting_end,
        metrics,
        notes,
        doc_ids,
    })
}

/// Validate a `submit_scheme_data` payload
pub fn validate_scheme_payload(value: &Value) -> ValidationResult<SchemeSubmission> {
    let payload = Payload::new(value)?;
    payload.require(&SCHEME_REQUIRED)?;

    let facility_id = payload.uuid("facility_id")?;
    let doc_ids = payload.doc_ids()?;
    let scheme_name = payload.string("scheme_name")?.to_string();
    let beneficiary_count = payload.count("beneficiary_count")?;
    let funds_allocated = payload.amount("funds_allocated")?;
    let funds_utilized = payload.amount("funds_utilized")?;
    let activities = activities(payload.array("activities")?)?;
    let notes = payload.notes()?;

    let reporting_start = payload.optional_date("reporting_start")?;
    let reporting_end = payload.optional_date("reporting_end")?;
    if let (Some(start), Some(end)) = (reporting_start, reporting_end) {
        guards::ensure_date_order(start, end, "reporting_start", "reporting_end")?;
    }

    Ok(SchemeSubmission {
        facility_id,
        scheme_name,
        reporting_start,
        reporting_end,
        beneficiary_count,
        funds_allocated,
        funds_utilized,
        activities,
        notes,
        doc_ids,
    })
}

/// Validate a `review_submission` payload
pub fn validate_review_payload(value: &Value) -> ReviewResult<ReviewRequest> {
    let payload = Payload::new(value)?;
    payload.require(&REVIEW_REQUIRED)?;

    let entity_type = EntityType::parse(payload.string("entity_type")?)?;
    let entity_id = payload.uuid("entity_id")?;
    let new_status = ReviewDecision::parse(payload.string("new_status")?)?;
    let comments = payload.optional_string("comments")?.map(str::to_string);
    let rejection_reason = payload
        .optional_string("rejection_reason")?
        .map(str::to_string);
    if let Some(text) = &comments {
        guards::ensure_max_len(text, "comments", MAX_NOTES_LEN).map_err(ReviewError::from)?;
    }
    if let Some(text) = &rejection_reason {
        guards::ensure_max_len(text, "rejection_reason", MAX_NOTES_LEN)
            .map_err(ReviewError::from)?;
    }

    let request = ReviewRequest {
        entity_type,
        entity_id,
        new_status,
        comments,
        rejection_reason,
    };
    request.validate()?;
    Ok(request)
}

/// Parameters for the performance analytics function
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facility_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_type: Option<String>,
}

/// Validate a `get_performance_trends` payload
pub fn validate_analytics_payload(value: &Value) -> ValidationResult<AnalyticsQuery> {
    let payload = Payload::new(value)?;
    payload.require(&ANALYTICS_REQUIRED)?;

    let facility_id = payload.optional_uuid("facility_id")?;
    let district_id = payload.optional_uuid("district_id")?;
    let state_id = payload.optional_uuid("state_id")?;
    let metric_type = payload.optional_string("metric_type")?.map(str::to_string);

    let start_date = payload.date("start_date")?;
    let end_date = payload.date("end_date")?;
    guards::ensure_date_order(start_date, end_date, "start_date", "end_date")?;

    Ok(AnalyticsQuery {
        start_date,
        end_date,
        facility_id,
        district_id,
        state_id,
        metric_type,
    })
}
