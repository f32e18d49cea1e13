/// Mesh controller versions and the features keyed on them
use k8s_openapi::api::core::v1::Pod;
use std::fmt;

use crate::check::CheckError;
use crate::k8s::PodExt;

pub const VERSION_LABEL: &str = "app.kubernetes.io/version";

/// Controller release line, normalised to `vMAJOR.MINOR`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ControllerVersion(String);

impl ControllerVersion {
    /// Normalise `v0.9.2`, `0.9`, or `v0.10.0-rc.1` to their release line
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().trim_start_matches('v');
        let mut parts = trimmed.split(['.', '-', '+']);
        let major: u32 = parts.next()?.parse().ok()?;
        let minor: u32 = parts.next()?.parse().ok()?;
        Some(Self(format!("v{}.{}", major, minor)))
    }

    /// Version of a controller pod, from its version label or its image tag
    pub fn of_pod(pod: &Pod) -> Option<Self> {
        if let Some(version) = pod.label(VERSION_LABEL).and_then(Self::parse) {
            return Some(version);
        }
        pod.containers()
            .iter()
            .filter_map(|c| c.image.as_deref())
            .filter_map(|image| image.rsplit_once(':').map(|(_, tag)| tag))
            .find_map(Self::parse)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControllerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Release lines the checks know how to interpret
pub const SUPPORTED_VERSIONS: &[&str] = &[
    "v0.5", "v0.6", "v0.7", "v0.8", "v0.9", "v0.10", "v0.11",
];

const OUTBOUND_LISTENER_NAMES: &[(&str, &str)] = &[
    ("v0.5", "outbound-listener"),
    ("v0.6", "outbound-listener"),
    ("v0.7", "outbound-listener"),
    ("v0.8", "outbound-listener"),
    ("v0.9", "outbound-listener"),
    ("v0.10", "outbound-listener"),
    ("v0.11", "outbound-listener"),
];

const INBOUND_LISTENER_NAMES: &[(&str, &str)] = &[
    ("v0.5", "inbound-listener"),
    ("v0.6", "inbound-listener"),
    ("v0.7", "inbound-listener"),
    ("v0.8", "inbound-listener"),
    ("v0.9", "inbound-listener"),
    ("v0.10", "inbound-listener"),
    ("v0.11", "inbound-listener"),
];

const TRAFFIC_TARGET_VERSIONS: &[(&str, &str)] = &[
    ("v0.5", "v1alpha2"),
    ("v0.6", "v1alpha3"),
    ("v0.7", "v1alpha3"),
    ("v0.8", "v1alpha3"),
    ("v0.9", "v1alpha3"),
    ("v0.10", "v1alpha3"),
    ("v0.11", "v1alpha3"),
];

const ROUTE_CONFIG_NAMES: &[(&str, &str, &str)] = &[
    ("v0.5", "RDS_Outbound", "RDS_Inbound"),
    ("v0.6", "RDS_Outbound", "RDS_Inbound"),
    ("v0.7", "RDS_Outbound", "RDS_Inbound"),
    ("v0.8", "RDS_Outbound", "RDS_Inbound"),
    ("v0.9", "rds-outbound", "rds-inbound"),
    ("v0.10", "rds-outbound", "rds-inbound"),
    ("v0.11", "rds-outbound", "rds-inbound"),
];

fn lookup(table: &[(&str, &'static str)], version: &str) -> Result<&'static str, CheckError> {
    table
        .iter()
        .find(|(v, _)| *v == version)
        .map(|(_, value)| *value)
        .ok_or_else(|| CheckError::UnrecognizedVersion {
            version: version.to_string(),
        })
}

/// Direction of traffic a listener handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => f.write_str("inbound"),
            Direction::Outbound => f.write_str("outbound"),
        }
    }
}

pub fn listener_name(version: &str, direction: Direction) -> Result<&'static str, CheckError> {
    match direction {
        Direction::Inbound => lookup(INBOUND_LISTENER_NAMES, version),
        Direction::Outbound => lookup(OUTBOUND_LISTENER_NAMES, version),
    }
}

/// Name of the route configuration serving one direction
pub fn route_config_name(version: &str, direction: Direction) -> Result<&'static str, CheckError> {
    ROUTE_CONFIG_NAMES
        .iter()
        .find(|(v, _, _)| *v == version)
        .map(|(_, outbound, inbound)| match direction {
            Direction::Outbound => *outbound,
            Direction::Inbound => *inbound,
        })
        .ok_or_else(|| CheckError::UnrecognizedVersion {
            version: version.to_string(),
        })
}

pub fn traffic_target_version(version: &str) -> Result<&'static str, CheckError> {
    lookup(TRAFFIC_TARGET_VERSIONS, version)
}

pub fn is_supported(version: &str) -> bool {
    SUPPORTED_VERSIONS.contains(&version)
}
