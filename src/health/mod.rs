//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! GET /_health
//!     → run every registered HealthCheck (in registration order)
//!     → HealthReport: overall status = worst individual status
//!     → serialized as JSON by the regular dispatch path
//! ```
//!
//! # Design Decisions
//! - Checks are synchronous and run per request; no background probing
//! - The endpoint is an ordinary endpoint, so middlewares and services apply

pub mod general;

use std::sync::Arc;

use serde::Serialize;

use crate::http::{ContentType, Method};
use crate::pipeline::Endpoint;

pub use general::GeneralHealthCheck;

/// Route of the built-in health endpoint.
pub const HEALTH_ROUTE: &str = "/_health";

/// Severity of a health status; ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum HealthStatusType {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub name: String,
    pub status_type: HealthStatusType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthStatus {
    pub fn new(name: impl Into<String>, status_type: HealthStatusType) -> Self {
        Self {
            name: name.into(),
            status_type,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// A named check of some part of the application.
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &str;

    fn run_check(&self) -> HealthStatus;
}

/// Summary of all checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status_type: HealthStatusType,
    pub checks: Vec<HealthStatus>,
}

impl HealthReport {
    pub fn run(checks: &[Arc<dyn HealthCheck>]) -> Self {
        let checks: Vec<HealthStatus> = checks.iter().map(|check| check.run_check()).collect();
        let status_type = checks
            .iter()
            .map(|status| status.status_type)
            .max()
            .unwrap_or(HealthStatusType::Healthy);

        Self { status_type, checks }
    }
}

/// A JSON endpoint at [`HEALTH_ROUTE`] reporting on `checks`.
pub fn health_endpoint(checks: Vec<Arc<dyn HealthCheck>>) -> Endpoint {
    Endpoint::builder(Method::Get, HEALTH_ROUTE)
        .name("health")
        .content_type(ContentType::Json)
        .authentication(false)
        .handler(move |_, _| {
            let report = HealthReport::run(&checks);
            Ok(serde_json::to_value(report)?)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str, HealthStatusType);

    impl HealthCheck for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn run_check(&self) -> HealthStatus {
            HealthStatus::new(self.0, self.1)
        }
    }

    #[test]
    fn report_takes_worst_status() {
        let checks: Vec<Arc<dyn HealthCheck>> = vec![
            Arc::new(GeneralHealthCheck),
            Arc::new(Fixed("cache", HealthStatusType::Degraded)),
        ];

        let report = HealthReport::run(&checks);
        assert_eq!(report.status_type, HealthStatusType::Degraded);
        assert_eq!(report.checks.len(), 2);
        assert_eq!(report.checks[0].name, "General");
    }

    #[test]
    fn empty_report_is_healthy() {
        assert_eq!(HealthReport::run(&[]).status_type, HealthStatusType::Healthy);
    }

    #[test]
    fn report_serializes_without_empty_messages() {
        let report = HealthReport::run(&[Arc::new(GeneralHealthCheck) as Arc<dyn HealthCheck>]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status_type": "Healthy",
                "checks": [{ "name": "General", "status_type": "Healthy" }]
            })
        );
    }
}
