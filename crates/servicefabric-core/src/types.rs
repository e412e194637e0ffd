//! Core Service Fabric domain types.
//!
//! Enumerations shared by several resource models. Wire values the client does not
//! recognise decode to `Unknown` instead of failing the whole response.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Deserialise a field that the gateway may send as `null`, using its default instead.
///
/// # Errors
///
/// Returns the deserialiser's error when a non-null value does not fit `T`.
pub fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Aggregated health of a cluster entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthState {
    /// Invalid health state
    Invalid,
    /// Healthy
    Ok,
    /// Degraded but functional
    Warning,
    /// Unhealthy
    Error,
    /// Unknown or unrecognised health state
    #[default]
    #[serde(other)]
    Unknown,
}

impl HealthState {
    /// Returns the health state as it appears on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Invalid => "Invalid",
            Self::Ok => "Ok",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Unknown => "Unknown",
        }
    }

    /// Returns true when the state is a definite evaluation (`Ok`, `Warning` or `Error`).
    #[must_use]
    pub const fn is_evaluated(&self) -> bool {
        matches!(self, Self::Ok | Self::Warning | Self::Error)
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a service, partition or replica.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceKind {
    /// Invalid service kind
    Invalid,
    /// Stateless service (runs instances)
    Stateless,
    /// Stateful service (runs replicas)
    Stateful,
    /// Unknown or unrecognised service kind
    #[default]
    #[serde(other)]
    Unknown,
}

impl ServiceKind {
    /// Returns the service kind as it appears on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Invalid => "Invalid",
            Self::Stateless => "Stateless",
            Self::Stateful => "Stateful",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_state_deserialize() {
        let state: HealthState = serde_json::from_str("\"Warning\"").unwrap();
        assert_eq!(state, HealthState::Warning);

        let state: HealthState = serde_json::from_str("\"SomethingNew\"").unwrap();
        assert_eq!(state, HealthState::Unknown);
    }

    #[test]
    fn test_health_state_evaluated() {
        assert!(HealthState::Ok.is_evaluated());
        assert!(HealthState::Error.is_evaluated());
        assert!(!HealthState::Invalid.is_evaluated());
        assert!(!HealthState::Unknown.is_evaluated());
    }

    #[test]
    fn test_service_kind_round_trip_names() {
        let kind: ServiceKind = serde_json::from_str("\"Stateful\"").unwrap();
        assert_eq!(kind, ServiceKind::Stateful);
        assert_eq!(kind.to_string(), "Stateful");
        assert_eq!(ServiceKind::default(), ServiceKind::Unknown);
    }
}
