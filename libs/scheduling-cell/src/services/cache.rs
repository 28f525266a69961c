// libs/scheduling-cell/src/services/cache.rs
use tracing::info;

use crate::models::{Appointment, SchedulingError};
use crate::services::appointments::AppointmentService;

/// Caller-owned snapshot of the active appointment list.
///
/// Replaces the legacy process-wide singleton: the cache is an explicit value
/// whose lifecycle (request scope or longer) belongs to its owner, and
/// `refresh` reloads unconditionally instead of only when the cache happens
/// to be empty.
#[derive(Debug, Default)]
pub struct AppointmentCache {
    appointments: Vec<Appointment>,
}

impl AppointmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reload the snapshot with every non-voided appointment. Returns the
    /// number of cached rows.
    pub async fn refresh(
        &mut self,
        service: &AppointmentService,
    ) -> Result<usize, SchedulingError> {
        self.appointments = service.active_appointments().await?;
        info!("Appointment cache refreshed with {} rows", self.appointments.len());
        Ok(self.appointments.len())
    }

    pub fn appointments(&self) -> &[Appointment] {
        &self.appointments
    }

    pub fn get(&self, appointment_id: i32) -> Option<&Appointment> {
        self.appointments
            .iter()
            .find(|a| a.appointment_id == appointment_id)
    }

    pub fn len(&self) -> usize {
        self.appointments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.appointments.is_empty()
    }
}
