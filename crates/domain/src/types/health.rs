//! Endpoint health states

use serde::{Deserialize, Serialize};

use crate::impl_domain_enum_conversions;

/// Liveness state of an endpoint as inferred from observed outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HealthState {
    #[default]
    Healthy,
    Suspect,
    Unhealthy,
}

impl_domain_enum_conversions!(HealthState {
    Healthy => "Healthy",
    Suspect => "Suspect",
    Unhealthy => "Unhealthy",
});
