//! Liveness check.

use crate::health::{HealthCheck, HealthStatus, HealthStatusType};

/// Always healthy: the server is up if it can answer.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeneralHealthCheck;

impl HealthCheck for GeneralHealthCheck {
    fn name(&self) -> &str {
        "General"
    }

    fn run_check(&self) -> HealthStatus {
        HealthStatus::new(self.name(), HealthStatusType::Healthy)
    }
}
