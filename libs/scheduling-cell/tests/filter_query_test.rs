use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scheduling_cell::models::{AppointmentFilter, SchedulingError};
use scheduling_cell::models::{EncounterRef, LocationRef, ObservationRef, PersonRef};
use scheduling_cell::services::{AppointmentService, DirectoryLookup};
use shared_config::AppConfig;
use shared_database::PostgrestClient;

struct StubDirectory {
    person_for_user: HashMap<i32, i32>,
}

impl StubDirectory {
    fn empty() -> Self {
        Self {
            person_for_user: HashMap::new(),
        }
    }

    fn with_user(user_id: i32, person_id: i32) -> Self {
        let mut person_for_user = HashMap::new();
        person_for_user.insert(user_id, person_id);
        Self { person_for_user }
    }
}

#[async_trait]
impl DirectoryLookup for StubDirectory {
    async fn person_id_for_user(&self, user_id: i32) -> Result<Option<i32>, SchedulingError> {
        Ok(self.person_for_user.get(&user_id).copied())
    }

    async fn person(&self, person_id: i32) -> Result<Option<PersonRef>, SchedulingError> {
        Ok(Some(PersonRef {
            person_id,
            display_name: None,
        }))
    }

    async fn location(&self, _location_id: i32) -> Result<Option<LocationRef>, SchedulingError> {
        Ok(None)
    }

    async fn observation(&self, _obs_id: i32) -> Result<Option<ObservationRef>, SchedulingError> {
        Ok(None)
    }

    async fn encounter(&self, _encounter_id: i32) -> Result<Option<EncounterRef>, SchedulingError> {
        Ok(None)
    }
}

fn service_against(mock_server: &MockServer, directory: StubDirectory) -> AppointmentService {
    let config = AppConfig {
        emr_store_url: mock_server.uri(),
        emr_service_key: "test-key".to_string(),
    };
    AppointmentService::new(Arc::new(PostgrestClient::new(&config)), Arc::new(directory))
}

#[tokio::test]
async fn no_filter_returns_default_future_unattended_view() {
    let mock_server = MockServer::start().await;
    let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("attended", "eq.false"))
        .and(query_param("voided", "eq.false"))
        .and(query_param("appointment_date", format!("gte.{}", today)))
        .and(query_param("limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "appointment_id": 12 },
            { "appointment_id": 9 }
        ])))
        .mount(&mock_server)
        .await;

    let service = service_against(&mock_server, StubDirectory::empty());

    // Caller limit is ignored on the default path
    let ids = service.find_appointment_ids(None, 7).await.unwrap();
    assert_eq!(ids, vec![12, 9]);
}

#[tokio::test]
async fn combined_criteria_build_bound_predicates() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("patient_id", "eq.7"))
        .and(query_param("attended", "eq.false"))
        .and(query_param("voided", "eq.false"))
        .and(query_param("order", "appointment_date.desc"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "appointment_id": 31 },
            { "appointment_id": 18 },
            { "appointment_id": 4 }
        ])))
        .mount(&mock_server)
        .await;

    let service = service_against(&mock_server, StubDirectory::empty());

    let filter = AppointmentFilter {
        patient_id: Some(7),
        from_date: Some(chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
        attended: Some(false),
        to_date: Some(chrono::NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()),
        ..Default::default()
    };

    let ids = service.find_appointment_ids(Some(filter), 10).await.unwrap();
    assert_eq!(ids, vec![31, 18, 4]);

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let query = requests[0].url.query().unwrap();
    assert!(query.contains("appointment_date=gte.2024-01-01"));
    assert!(query.contains("appointment_date=lte.2024-01-31"));
}

#[tokio::test]
async fn include_attended_widens_to_both_values() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = service_against(&mock_server, StubDirectory::empty());

    let filter = AppointmentFilter {
        attended: Some(true),
        ..Default::default()
    };
    service.find_appointment_ids(Some(filter), 5).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let query = requests[0].url.query().unwrap();
    // No attended predicate at all; voided exclusion stays
    assert!(!query.contains("attended"));
    assert!(query.contains("voided=eq.false"));
}

#[tokio::test]
async fn provider_filter_resolves_user_to_person() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("provider_id", "eq.501"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "appointment_id": 77 }
        ])))
        .mount(&mock_server)
        .await;

    let service = service_against(&mock_server, StubDirectory::with_user(42, 501));

    let filter = AppointmentFilter {
        user_id: Some(42),
        ..Default::default()
    };
    let ids = service.find_appointment_ids(Some(filter), 20).await.unwrap();
    assert_eq!(ids, vec![77]);
}

#[tokio::test]
async fn unknown_provider_user_is_skipped_not_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "appointment_id": 3 }
        ])))
        .mount(&mock_server)
        .await;

    let service = service_against(&mock_server, StubDirectory::empty());

    let filter = AppointmentFilter {
        patient_id: Some(7),
        user_id: Some(999),
        ..Default::default()
    };
    let ids = service.find_appointment_ids(Some(filter), 20).await.unwrap();
    assert_eq!(ids, vec![3]);

    // Same query as if the provider criterion had been omitted entirely
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let query = requests[0].url.query().unwrap();
    assert!(!query.contains("provider_id"));
    assert!(query.contains("patient_id=eq.7"));
}

#[tokio::test]
async fn non_positive_limit_yields_empty_without_a_request() {
    let mock_server = MockServer::start().await;
    let service = service_against(&mock_server, StubDirectory::empty());

    let ids = service
        .find_appointment_ids(Some(AppointmentFilter::default()), 0)
        .await
        .unwrap();
    assert!(ids.is_empty());

    let ids = service
        .find_appointment_ids(Some(AppointmentFilter::default()), -5)
        .await
        .unwrap();
    assert!(ids.is_empty());

    assert!(mock_server.received_requests().await.unwrap().is_empty());
}
