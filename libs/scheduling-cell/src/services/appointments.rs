// libs/scheduling-cell/src/services/appointments.rs
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_database::{Direction, Op, PostgrestClient, TableQuery};

use crate::models::{
    Appointment, AppointmentDetail, AppointmentFilter, CreateAppointmentRequest,
    EncounterRef, LocationRef, ObservationRef, PersonRef, SchedulingError,
    UpdateAppointmentRequest, DEFAULT_FILTER_LIMIT,
};
use crate::services::directory::DirectoryLookup;

/// Persistence access for appointment rows: CRUD, soft delete, the
/// multi-criteria filter query and waiting-list hydration.
pub struct AppointmentService {
    store: Arc<PostgrestClient>,
    directory: Arc<dyn DirectoryLookup>,
}

#[derive(Debug, Deserialize)]
struct AppointmentIdRow {
    appointment_id: i32,
}

impl AppointmentService {
    pub fn new(store: Arc<PostgrestClient>, directory: Arc<dyn DirectoryLookup>) -> Self {
        Self { store, directory }
    }

    // ==========================================================================
    // FILTER QUERY
    // ==========================================================================

    /// Find identifiers of matching non-voided appointments, newest first,
    /// capped at `limit`.
    ///
    /// With no filter at all the query falls back to the default view: every
    /// non-voided, unattended appointment scheduled on or after today, capped
    /// at the fixed limit of 50 (the caller's limit is ignored).
    pub async fn find_appointment_ids(
        &self,
        filter: Option<AppointmentFilter>,
        limit: i64,
    ) -> Result<Vec<i32>, SchedulingError> {
        let Some(filter) = filter else {
            return self.default_appointment_ids().await;
        };

        if limit <= 0 {
            debug!("Non-positive limit {}, returning empty result", limit);
            return Ok(Vec::new());
        }

        let mut query = TableQuery::new("appointments").select("appointment_id");

        if let Some(patient_id) = filter.patient_id {
            query = query.filter("patient_id", Op::Eq, patient_id);
        }

        if let Some(user_id) = filter.user_id {
            match self.directory.person_id_for_user(user_id).await? {
                Some(person_id) => {
                    query = query.filter("provider_id", Op::Eq, person_id);
                }
                None => {
                    debug!("User {} has no person link, skipping provider filter", user_id);
                }
            }
        }

        if let Some(location_id) = filter.location_id {
            query = query.filter("location_id", Op::Eq, location_id);
        }

        if let Some(from_date) = filter.from_date {
            query = query.filter("appointment_date", Op::Gte, from_date);
        }

        if let Some(attended) = filter.attended {
            // Legacy widening: filtering on attended=true means "include
            // attended", which matches both values, so no predicate at all.
            if !attended {
                query = query.filter("attended", Op::Eq, false);
            }
        }

        if let Some(to_date) = filter.to_date {
            query = query.filter("appointment_date", Op::Lte, to_date);
        }

        if let Some(state_id) = filter.state_id {
            query = query.filter("appointment_state_id", Op::Eq, state_id);
        }

        if let Some(service_id) = filter.service_id {
            query = query.filter("service_id", Op::Eq, service_id);
        }

        let query = query
            .filter("voided", Op::Eq, false)
            .order_by("appointment_date", Direction::Desc)
            .limit(limit);

        let rows: Vec<AppointmentIdRow> =
            self.store.request(Method::GET, &query.path(), None).await?;

        Ok(rows.into_iter().map(|r| r.appointment_id).collect())
    }

    async fn default_appointment_ids(&self) -> Result<Vec<i32>, SchedulingError> {
        debug!("No filter supplied, returning default future-unattended view");

        let query = TableQuery::new("appointments")
            .select("appointment_id")
            .filter("attended", Op::Eq, false)
            .filter("voided", Op::Eq, false)
            .filter("appointment_date", Op::Gte, Utc::now().date_naive())
            .order_by("appointment_date", Direction::Desc)
            .limit(DEFAULT_FILTER_LIMIT);

        let rows: Vec<AppointmentIdRow> =
            self.store.request(Method::GET, &query.path(), None).await?;

        Ok(rows.into_iter().map(|r| r.appointment_id).collect())
    }

    // ==========================================================================
    // CRUD
    // ==========================================================================

    pub async fn get_appointment(&self, appointment_id: i32) -> Result<Appointment, SchedulingError> {
        debug!("Fetching appointment {}", appointment_id);

        let query = TableQuery::new("appointments")
            .filter("appointment_id", Op::Eq, appointment_id)
            .limit(1);

        let rows: Vec<Appointment> = self.store.request(Method::GET, &query.path(), None).await?;

        rows.into_iter().next().ok_or(SchedulingError::NotFound)
    }

    /// Every appointment row, voided included. Administrative view.
    pub async fn get_all_appointments(&self) -> Result<Vec<Appointment>, SchedulingError> {
        let query = TableQuery::new("appointments");
        let rows: Vec<Appointment> = self.store.request(Method::GET, &query.path(), None).await?;
        Ok(rows)
    }

    /// Every non-voided appointment row.
    pub async fn active_appointments(&self) -> Result<Vec<Appointment>, SchedulingError> {
        let query = TableQuery::new("appointments").filter("voided", Op::Eq, false);
        let rows: Vec<Appointment> = self.store.request(Method::GET, &query.path(), None).await?;
        Ok(rows)
    }

    pub async fn last_appointment_id(&self) -> Result<Option<i32>, SchedulingError> {
        let query = TableQuery::new("appointments")
            .select("appointment_id")
            .order_by("appointment_id", Direction::Desc)
            .limit(1);

        let rows: Vec<AppointmentIdRow> =
            self.store.request(Method::GET, &query.path(), None).await?;

        Ok(rows.into_iter().next().map(|r| r.appointment_id))
    }

    pub async fn save_appointment(
        &self,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Creating appointment for patient {}", request.patient_id);

        let body = json!({
            "patient_id": request.patient_id,
            "provider_id": request.provider_id,
            "location_id": request.location_id,
            "service_id": request.service_id,
            "appointment_state_id": request.appointment_state_id,
            "appointment_date": request.appointment_date,
            "attended": false,
            "note": request.note,
            "reason_obs_id": request.reason_obs_id,
            "next_visit_obs_id": request.next_visit_obs_id,
            "encounter_id": request.encounter_id,
            "voided": false,
            "creator": request.creator,
            "created_date": Utc::now().to_rfc3339(),
        });

        let rows: Vec<Appointment> = self
            .store
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(body),
                Some(PostgrestClient::return_representation()),
            )
            .await?;

        let appointment = rows
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::Database("Failed to create appointment".to_string()))?;

        info!("Appointment {} created", appointment.appointment_id);
        Ok(appointment)
    }

    pub async fn update_appointment(
        &self,
        appointment_id: i32,
        request: UpdateAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Updating appointment {}", appointment_id);

        // Patch only the provided fields
        let mut update_data = serde_json::Map::new();
        if let Some(provider_id) = request.provider_id {
            update_data.insert("provider_id".to_string(), json!(provider_id));
        }
        if let Some(location_id) = request.location_id {
            update_data.insert("location_id".to_string(), json!(location_id));
        }
        if let Some(service_id) = request.service_id {
            update_data.insert("service_id".to_string(), json!(service_id));
        }
        if let Some(state_id) = request.appointment_state_id {
            update_data.insert("appointment_state_id".to_string(), json!(state_id));
        }
        if let Some(appointment_date) = request.appointment_date {
            update_data.insert("appointment_date".to_string(), json!(appointment_date));
        }
        if let Some(attended) = request.attended {
            update_data.insert("attended".to_string(), json!(attended));
        }
        if let Some(note) = request.note {
            update_data.insert("note".to_string(), json!(note));
        }

        self.patch_appointment(appointment_id, Value::Object(update_data))
            .await
    }

    /// Move an appointment into a new lifecycle state.
    pub async fn update_state(
        &self,
        appointment_id: i32,
        state_id: i32,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Updating appointment {} to state {}", appointment_id, state_id);

        self.patch_appointment(appointment_id, json!({ "appointment_state_id": state_id }))
            .await
    }

    /// Soft delete: flag the row as voided with its void metadata. The row is
    /// retained and drops out of every active query.
    pub async fn cancel_appointment(
        &self,
        appointment_id: i32,
        reason: &str,
        voided_by: Option<i32>,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Voiding appointment {}: {}", appointment_id, reason);

        let body = json!({
            "voided": true,
            "void_reason": reason,
            "voided_by": voided_by,
            "voided_date": Utc::now().to_rfc3339(),
        });

        let appointment = self.patch_appointment(appointment_id, body).await?;

        info!("Appointment {} voided", appointment_id);
        Ok(appointment)
    }

    async fn patch_appointment(
        &self,
        appointment_id: i32,
        body: Value,
    ) -> Result<Appointment, SchedulingError> {
        let query = TableQuery::new("appointments").filter("appointment_id", Op::Eq, appointment_id);

        let rows: Vec<Appointment> = self
            .store
            .request_with_headers(
                Method::PATCH,
                &query.path(),
                Some(body),
                Some(PostgrestClient::return_representation()),
            )
            .await?;

        rows.into_iter().next().ok_or(SchedulingError::NotFound)
    }

    // ==========================================================================
    // WAITING LIST
    // ==========================================================================

    /// Non-voided, unattended appointments for a patient on a given day in a
    /// given state, with their references resolved.
    pub async fn waiting_appointments(
        &self,
        patient_id: i32,
        state_id: i32,
        day: NaiveDate,
    ) -> Result<Vec<AppointmentDetail>, SchedulingError> {
        debug!("Fetching waiting appointments for patient {} on {}", patient_id, day);

        let query = TableQuery::new("appointments")
            .filter("patient_id", Op::Eq, patient_id)
            .filter("appointment_state_id", Op::Eq, state_id)
            .filter("appointment_date", Op::Eq, day)
            .filter("attended", Op::Eq, false)
            .filter("voided", Op::Eq, false);

        let rows: Vec<Appointment> = self.store.request(Method::GET, &query.path(), None).await?;

        self.hydrate(rows).await
    }

    /// Resolve every reference once per distinct identifier, then assemble
    /// the detail records. Avoids a directory round trip per row.
    async fn hydrate(
        &self,
        rows: Vec<Appointment>,
    ) -> Result<Vec<AppointmentDetail>, SchedulingError> {
        let mut person_ids = BTreeSet::new();
        let mut location_ids = BTreeSet::new();
        let mut obs_ids = BTreeSet::new();
        let mut encounter_ids = BTreeSet::new();

        for row in &rows {
            person_ids.extend(row.provider_id);
            person_ids.extend(row.creator);
            location_ids.extend(row.location_id);
            obs_ids.extend(row.reason_obs_id);
            obs_ids.extend(row.next_visit_obs_id);
            encounter_ids.extend(row.encounter_id);
        }

        let persons = self.resolve_persons(&person_ids).await?;
        let locations = self.resolve_locations(&location_ids).await?;
        let observations = self.resolve_observations(&obs_ids).await?;
        let encounters = self.resolve_encounters(&encounter_ids).await?;

        let details = rows
            .into_iter()
            .map(|appointment| {
                let provider = appointment.provider_id.and_then(|id| persons.get(&id).cloned());
                let creator = appointment.creator.and_then(|id| persons.get(&id).cloned());
                let location = appointment.location_id.and_then(|id| locations.get(&id).cloned());
                let reason = appointment
                    .reason_obs_id
                    .and_then(|id| observations.get(&id).cloned());
                let next_visit = appointment
                    .next_visit_obs_id
                    .and_then(|id| observations.get(&id).cloned());
                let encounter = appointment
                    .encounter_id
                    .and_then(|id| encounters.get(&id).cloned());

                AppointmentDetail {
                    appointment,
                    provider,
                    location,
                    reason,
                    next_visit,
                    encounter,
                    creator,
                }
            })
            .collect();

        Ok(details)
    }

    async fn resolve_persons(
        &self,
        ids: &BTreeSet<i32>,
    ) -> Result<HashMap<i32, PersonRef>, SchedulingError> {
        let lookups = ids.iter().map(|&id| {
            let directory = Arc::clone(&self.directory);
            async move { (id, directory.person(id).await) }
        });

        let mut resolved = HashMap::new();
        for (id, result) in join_all(lookups).await {
            if let Some(person) = result? {
                resolved.insert(id, person);
            }
        }
        Ok(resolved)
    }

    async fn resolve_locations(
        &self,
        ids: &BTreeSet<i32>,
    ) -> Result<HashMap<i32, LocationRef>, SchedulingError> {
        let lookups = ids.iter().map(|&id| {
            let directory = Arc::clone(&self.directory);
            async move { (id, directory.location(id).await) }
        });

        let mut resolved = HashMap::new();
        for (id, result) in join_all(lookups).await {
            if let Some(location) = result? {
                resolved.insert(id, location);
            }
        }
        Ok(resolved)
    }

    async fn resolve_observations(
        &self,
        ids: &BTreeSet<i32>,
    ) -> Result<HashMap<i32, ObservationRef>, SchedulingError> {
        let lookups = ids.iter().map(|&id| {
            let directory = Arc::clone(&self.directory);
            async move { (id, directory.observation(id).await) }
        });

        let mut resolved = HashMap::new();
        for (id, result) in join_all(lookups).await {
            if let Some(observation) = result? {
                resolved.insert(id, observation);
            }
        }
        Ok(resolved)
    }

    async fn resolve_encounters(
        &self,
        ids: &BTreeSet<i32>,
    ) -> Result<HashMap<i32, EncounterRef>, SchedulingError> {
        let lookups = ids.iter().map(|&id| {
            let directory = Arc::clone(&self.directory);
            async move { (id, directory.encounter(id).await) }
        });

        let mut resolved = HashMap::new();
        for (id, result) in join_all(lookups).await {
            if let Some(encounter) = result? {
                resolved.insert(id, encounter);
            }
        }
        Ok(resolved)
    }
}
