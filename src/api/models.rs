//! Response bodies of the layout's own endpoints.
//!
//! Proxied responses are passed through untouched and have no model here.

use serde::{Deserialize, Serialize};

use crate::observability::MetricsSnapshot;
use crate::podlet::PodletState;

/// Path parameters of `/podium-resource/{podlet}/{resource}[/{*rest}]`
#[derive(Debug, Deserialize)]
pub struct ResourcePath {
    pub podlet: String,
    pub resource: String,
    #[serde(default)]
    pub rest: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct PodletHealth {
    pub name: String,
    pub state: PodletState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Mounted proxy paths
    pub routes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub podlets: Vec<PodletHealth>,
    pub metrics: MetricsSnapshot,
    pub version: String,
}
