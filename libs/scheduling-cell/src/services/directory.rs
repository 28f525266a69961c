// libs/scheduling-cell/src/services/directory.rs
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use shared_database::{Op, PostgrestClient, TableQuery};

use crate::models::{EncounterRef, LocationRef, ObservationRef, PersonRef, SchedulingError};

/// Boundary to the wider EMR: reference resolution for users, persons,
/// locations, observations and encounters. Kept behind a trait so tests can
/// substitute a stub directory.
#[async_trait]
pub trait DirectoryLookup: Send + Sync {
    /// Resolve a user identifier to the person behind it. `Ok(None)` when the
    /// user does not exist or carries no person link.
    async fn person_id_for_user(&self, user_id: i32) -> Result<Option<i32>, SchedulingError>;

    async fn person(&self, person_id: i32) -> Result<Option<PersonRef>, SchedulingError>;

    async fn location(&self, location_id: i32) -> Result<Option<LocationRef>, SchedulingError>;

    async fn observation(&self, obs_id: i32) -> Result<Option<ObservationRef>, SchedulingError>;

    async fn encounter(&self, encounter_id: i32) -> Result<Option<EncounterRef>, SchedulingError>;
}

pub struct DirectoryService {
    store: Arc<PostgrestClient>,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    person_id: Option<i32>,
}

impl DirectoryService {
    pub fn new(store: Arc<PostgrestClient>) -> Self {
        Self { store }
    }

    async fn fetch_one<T>(&self, query: TableQuery) -> Result<Option<T>, SchedulingError>
    where
        T: DeserializeOwned,
    {
        let rows: Vec<T> = self.store.request(Method::GET, &query.path(), None).await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl DirectoryLookup for DirectoryService {
    async fn person_id_for_user(&self, user_id: i32) -> Result<Option<i32>, SchedulingError> {
        debug!("Resolving person for user {}", user_id);

        let row: Option<UserRow> = self
            .fetch_one(
                TableQuery::new("users")
                    .select("person_id")
                    .filter("user_id", Op::Eq, user_id)
                    .limit(1),
            )
            .await?;

        Ok(row.and_then(|r| r.person_id))
    }

    async fn person(&self, person_id: i32) -> Result<Option<PersonRef>, SchedulingError> {
        self.fetch_one(
            TableQuery::new("persons")
                .filter("person_id", Op::Eq, person_id)
                .limit(1),
        )
        .await
    }

    async fn location(&self, location_id: i32) -> Result<Option<LocationRef>, SchedulingError> {
        self.fetch_one(
            TableQuery::new("locations")
                .filter("location_id", Op::Eq, location_id)
                .limit(1),
        )
        .await
    }

    async fn observation(&self, obs_id: i32) -> Result<Option<ObservationRef>, SchedulingError> {
        self.fetch_one(
            TableQuery::new("observations")
                .filter("obs_id", Op::Eq, obs_id)
                .limit(1),
        )
        .await
    }

    async fn encounter(&self, encounter_id: i32) -> Result<Option<EncounterRef>, SchedulingError> {
        self.fetch_one(
            TableQuery::new("encounters")
                .filter("encounter_id", Op::Eq, encounter_id)
                .limit(1),
        )
        .await
    }
}
