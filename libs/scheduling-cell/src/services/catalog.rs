// libs/scheduling-cell/src/services/catalog.rs
use std::sync::Arc;

use futures::future::join_all;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use shared_database::{Op, PostgrestClient, TableQuery};

use crate::models::{
    AppointmentState, CreateServiceProviderRequest, CreateServiceRequest, SchedulingError,
    Service, ServiceProvider,
};

/// Persistence access for the scheduling reference data: appointment states,
/// services and service-provider bindings.
pub struct CatalogService {
    store: Arc<PostgrestClient>,
}

#[derive(Debug, Deserialize)]
struct ProviderIdRow {
    provider_id: i32,
}

impl CatalogService {
    pub fn new(store: Arc<PostgrestClient>) -> Self {
        Self { store }
    }

    // ==========================================================================
    // APPOINTMENT STATES
    // ==========================================================================

    pub async fn appointment_states(&self) -> Result<Vec<AppointmentState>, SchedulingError> {
        let query = TableQuery::new("appointment_states");
        let rows: Vec<AppointmentState> =
            self.store.request(Method::GET, &query.path(), None).await?;
        Ok(rows)
    }

    /// Exact match on the state description.
    pub async fn appointment_state_by_name(
        &self,
        name: &str,
    ) -> Result<AppointmentState, SchedulingError> {
        debug!("Looking up appointment state '{}'", name);

        let query = TableQuery::new("appointment_states")
            .filter("description", Op::Eq, name)
            .limit(1);

        let rows: Vec<AppointmentState> =
            self.store.request(Method::GET, &query.path(), None).await?;

        rows.into_iter().next().ok_or(SchedulingError::NotFound)
    }

    // ==========================================================================
    // SERVICES
    // ==========================================================================

    pub async fn services(&self) -> Result<Vec<Service>, SchedulingError> {
        let query = TableQuery::new("services");
        let rows: Vec<Service> = self.store.request(Method::GET, &query.path(), None).await?;
        Ok(rows)
    }

    pub async fn service_by_id(&self, service_id: i32) -> Result<Service, SchedulingError> {
        let query = TableQuery::new("services")
            .filter("service_id", Op::Eq, service_id)
            .limit(1);

        let rows: Vec<Service> = self.store.request(Method::GET, &query.path(), None).await?;

        rows.into_iter().next().ok_or(SchedulingError::NotFound)
    }

    pub async fn service_by_concept(
        &self,
        concept_id: i32,
    ) -> Result<Option<Service>, SchedulingError> {
        let query = TableQuery::new("services")
            .filter("concept_id", Op::Eq, concept_id)
            .limit(1);

        let rows: Vec<Service> = self.store.request(Method::GET, &query.path(), None).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn save_service(
        &self,
        request: CreateServiceRequest,
    ) -> Result<Service, SchedulingError> {
        debug!("Creating service '{}'", request.name);

        let body = json!({
            "name": request.name,
            "concept_id": request.concept_id,
        });

        let rows: Vec<Service> = self
            .store
            .request_with_headers(
                Method::POST,
                "/rest/v1/services",
                Some(body),
                Some(PostgrestClient::return_representation()),
            )
            .await?;

        let service = rows
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::Database("Failed to create service".to_string()))?;

        info!("Service {} created", service.service_id);
        Ok(service)
    }

    pub async fn update_service(&self, service: &Service) -> Result<Service, SchedulingError> {
        let query = TableQuery::new("services").filter("service_id", Op::Eq, service.service_id);

        let body = json!({
            "name": service.name,
            "concept_id": service.concept_id,
        });

        let rows: Vec<Service> = self
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
    // SERVICE PROVIDERS
    // ==========================================================================

    /// All active provider bindings.
    pub async fn service_providers(&self) -> Result<Vec<ServiceProvider>, SchedulingError> {
        let query = TableQuery::new("service_providers").filter("voided", Op::Eq, false);
        let rows: Vec<ServiceProvider> =
            self.store.request(Method::GET, &query.path(), None).await?;
        Ok(rows)
    }

    pub async fn service_provider_by_id(
        &self,
        service_provider_id: i32,
    ) -> Result<ServiceProvider, SchedulingError> {
        let query = TableQuery::new("service_providers")
            .filter("service_provider_id", Op::Eq, service_provider_id)
            .limit(1);

        let rows: Vec<ServiceProvider> =
            self.store.request(Method::GET, &query.path(), None).await?;

        rows.into_iter().next().ok_or(SchedulingError::NotFound)
    }

    pub async fn save_service_provider(
        &self,
        request: CreateServiceProviderRequest,
    ) -> Result<ServiceProvider, SchedulingError> {
        debug!(
            "Binding provider {} to service {}",
            request.provider_id, request.service_id
        );

        let body = json!({
            "service_id": request.service_id,
            "provider_id": request.provider_id,
            "voided": false,
        });

        let rows: Vec<ServiceProvider> = self
            .store
            .request_with_headers(
                Method::POST,
                "/rest/v1/service_providers",
                Some(body),
                Some(PostgrestClient::return_representation()),
            )
            .await?;

        rows.into_iter().next().ok_or_else(|| {
            SchedulingError::Database("Failed to create service provider".to_string())
        })
    }

    pub async fn update_service_provider(
        &self,
        binding: &ServiceProvider,
    ) -> Result<ServiceProvider, SchedulingError> {
        let query = TableQuery::new("service_providers")
            .filter("service_provider_id", Op::Eq, binding.service_provider_id);

        let body = json!({
            "service_id": binding.service_id,
            "provider_id": binding.provider_id,
            "voided": binding.voided,
        });

        let rows: Vec<ServiceProvider> = self
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

    /// Person identifiers of the providers actively bound to a service.
    pub async fn provider_ids_by_service(
        &self,
        service_id: i32,
    ) -> Result<Vec<i32>, SchedulingError> {
        let query = TableQuery::new("service_providers")
            .select("provider_id")
            .filter("voided", Op::Eq, false)
            .filter("service_id", Op::Eq, service_id);

        let rows: Vec<ProviderIdRow> =
            self.store.request(Method::GET, &query.path(), None).await?;

        Ok(rows.into_iter().map(|r| r.provider_id).collect())
    }

    /// The first service a provider is actively bound to, if any.
    pub async fn service_by_provider(
        &self,
        provider_id: i32,
    ) -> Result<Option<Service>, SchedulingError> {
        let bindings = self.bindings_for_provider(provider_id).await?;

        match bindings.first() {
            Some(binding) => Ok(Some(self.service_by_id(binding.service_id).await?)),
            None => Ok(None),
        }
    }

    /// Every service a provider is actively bound to.
    pub async fn services_by_provider(
        &self,
        provider_id: i32,
    ) -> Result<Vec<Service>, SchedulingError> {
        let bindings = self.bindings_for_provider(provider_id).await?;

        let lookups = bindings
            .into_iter()
            .map(|binding| self.service_by_id(binding.service_id));

        join_all(lookups).await.into_iter().collect()
    }

    async fn bindings_for_provider(
        &self,
        provider_id: i32,
    ) -> Result<Vec<ServiceProvider>, SchedulingError> {
        let query = TableQuery::new("service_providers")
            .filter("voided", Op::Eq, false)
            .filter("provider_id", Op::Eq, provider_id);

        let rows: Vec<ServiceProvider> =
            self.store.request(Method::GET, &query.path(), None).await?;
        Ok(rows)
    }
}
