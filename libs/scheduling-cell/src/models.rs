// libs/scheduling-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==============================================================================
// CORE SCHEDULING MODELS
// ==============================================================================

/// A scheduled encounter between a patient and a provider for a service at a
/// location and day. Rows are soft-deleted through the voided flag and never
/// physically removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub appointment_id: i32,
    pub patient_id: i32,
    pub provider_id: Option<i32>,
    pub location_id: Option<i32>,
    pub service_id: Option<i32>,
    pub appointment_state_id: Option<i32>,
    pub appointment_date: NaiveDate,
    pub attended: bool,
    pub note: Option<String>,
    pub reason_obs_id: Option<i32>,
    pub next_visit_obs_id: Option<i32>,
    pub encounter_id: Option<i32>,
    pub voided: bool,
    pub void_reason: Option<String>,
    pub voided_by: Option<i32>,
    pub voided_date: Option<DateTime<Utc>>,
    pub creator: Option<i32>,
    pub created_date: Option<DateTime<Utc>>,
}

/// Lifecycle status lookup row (scheduled, completed, cancelled, ...).
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentState {
    pub appointment_state_id: i32,
    pub description: String,
}

/// An offered clinical service, optionally linked to a coded concept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub service_id: i32,
    pub name: String,
    pub concept_id: Option<i32>,
}

/// Binding of a provider (person) to a service. Soft-deletable through its
/// own voided flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceProvider {
    pub service_provider_id: i32,
    pub service_id: i32,
    pub provider_id: i32,
    pub voided: bool,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: i32,
    pub provider_id: Option<i32>,
    pub location_id: Option<i32>,
    pub service_id: Option<i32>,
    pub appointment_state_id: Option<i32>,
    pub appointment_date: NaiveDate,
    pub note: Option<String>,
    pub reason_obs_id: Option<i32>,
    pub next_visit_obs_id: Option<i32>,
    pub encounter_id: Option<i32>,
    pub creator: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub provider_id: Option<i32>,
    pub location_id: Option<i32>,
    pub service_id: Option<i32>,
    pub appointment_state_id: Option<i32>,
    pub appointment_date: Option<NaiveDate>,
    pub attended: Option<bool>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub concept_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateServiceProviderRequest {
    pub service_id: i32,
    pub provider_id: i32,
}

// ==============================================================================
// FILTER QUERY MODELS
// ==============================================================================

/// Multi-criteria appointment search. Absent fields impose no predicate.
///
/// `user_id` is the provider's *user* identifier; it is resolved to a person
/// identifier through the directory before filtering, and the predicate is
/// skipped when no such user or person link exists.
///
/// `attended` keeps the legacy widening: `Some(false)` matches unattended
/// rows only, while `Some(true)` matches both attended and unattended rows.
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub patient_id: Option<i32>,
    pub user_id: Option<i32>,
    pub location_id: Option<i32>,
    pub from_date: Option<NaiveDate>,
    pub attended: Option<bool>,
    pub to_date: Option<NaiveDate>,
    pub state_id: Option<i32>,
    pub service_id: Option<i32>,
}

/// Fixed cap applied when no filter is supplied at all.
pub const DEFAULT_FILTER_LIMIT: i64 = 50;

// ==============================================================================
// HYDRATED RESULT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationRef {
    pub location_id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonRef {
    pub person_id: i32,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationRef {
    pub obs_id: i32,
    pub value_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncounterRef {
    pub encounter_id: i32,
    pub encounter_date: Option<NaiveDate>,
}

/// An appointment row with its references resolved through the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentDetail {
    pub appointment: Appointment,
    pub provider: Option<PersonRef>,
    pub location: Option<LocationRef>,
    pub reason: Option<ObservationRef>,
    pub next_visit: Option<ObservationRef>,
    pub encounter: Option<EncounterRef>,
    pub creator: Option<PersonRef>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulingError {
    #[error("Record not found")]
    NotFound,

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for SchedulingError {
    fn from(err: anyhow::Error) -> Self {
        SchedulingError::Database(err.to_string())
    }
}

/// Parse a `YYYY-MM-DD` day string, rejecting anything else with a
/// descriptive error.
pub fn parse_day(value: &str) -> Result<NaiveDate, SchedulingError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| SchedulingError::InvalidDate(format!("{}: {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parse_day_accepts_iso_dates() {
        let day = parse_day("2024-01-31").unwrap();
        assert_eq!(day, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
    }

    #[test]
    fn parse_day_rejects_garbage_with_context() {
        let err = parse_day("31/01/2024").unwrap_err();
        assert_matches!(err, SchedulingError::InvalidDate(msg) if msg.contains("31/01/2024"));
    }

    #[test]
    fn empty_filter_has_no_criteria() {
        let filter = AppointmentFilter::default();
        assert!(filter.patient_id.is_none());
        assert!(filter.attended.is_none());
    }
}
