/// Errors carried by failed check outcomes
use thiserror::Error;

/// Error attached to a `Fail` outcome
///
/// Most variants are sentinels so callers and tests can match on the exact
/// condition that was detected. Anything a check cannot classify is wrapped
/// in `Upstream`.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("not implemented")]
    NotImplemented,

    #[error("no Envoy config getter is available for this check")]
    NoConfigGetter,

    #[error("no destination endpoints")]
    NoDestinationEndpoints,

    #[error("endpoint not found: {ip}")]
    EndpointNotFound { ip: String },

    #[error("dynamic warming secrets not empty: {}", names.join(", "))]
    DynamicWarmingSecretsNotEmpty { names: Vec<String> },

    #[error("unrecognized version: {version}")]
    UnrecognizedVersion { version: String },

    #[error(
        "cluster not found: expected [{}], found [{}]",
        expected.join(", "),
        found.join(", ")
    )]
    ClusterNotFound {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("listener not found: {name}")]
    ListenerNotFound { name: String },

    #[error(
        "route configuration {route_config} has no virtual host for any of [{}]",
        domains.join(", ")
    )]
    RouteDomainNotFound {
        route_config: String,
        domains: Vec<String>,
    },

    #[error("no services select pod {pod}")]
    NoServicesForPod { pod: String },

    #[error("pod {pod} has no Envoy sidecar container")]
    SidecarMissing { pod: String },

    #[error("pod {pod} is missing the proxy UUID label")]
    ProxyUuidMissing { pod: String },

    #[error("namespace {namespace} is not monitored by mesh {mesh}")]
    NamespaceNotMonitored { namespace: String, mesh: String },

    #[error("sidecar injection is not enabled for {target}")]
    InjectionDisabled { target: String },

    #[error("namespaces are monitored by different meshes: {source_mesh} and {destination_mesh}")]
    MeshMismatch {
        source_mesh: String,
        destination_mesh: String,
    },

    #[error("no traffic target allows {source_account} to reach {destination_account}")]
    NoTrafficTarget {
        source_account: String,
        destination_account: String,
    },

    #[error("traffic target {name} uses API version {found}, controller supports {expected}")]
    TrafficTargetVersion {
        name: String,
        found: String,
        expected: String,
    },

    #[error("pod {pod} is not ready: {reason}")]
    PodNotReady { pod: String, reason: String },

    #[error("egress is disabled in the mesh configuration")]
    EgressDisabled,

    #[error("no ingress backend references service {service}")]
    NoIngressBackend { service: String },

    #[error("{component} is unavailable: {reason}")]
    ComponentUnavailable { component: String, reason: String },

    #[error("custom resource definition not installed: {name}")]
    CrdMissing { name: String },

    #[error("probe returned HTTP status {status}")]
    ProbeStatus { status: u16 },

    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

impl CheckError {
    /// True for the sentinel raised by unbuilt suggestions and fixes
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, CheckError::NotImplemented)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_not_found_lists_both_sides() {
        let err = CheckError::ClusterNotFound {
            expected: vec!["ns1/svc-a".to_string()],
            found: vec!["ns1/svc-b".to_string(), "passthrough-outbound".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("cluster not found: expected [ns1/svc-a]"));
        assert!(msg.contains("found [ns1/svc-b, passthrough-outbound]"));
    }

    #[test]
    fn test_upstream_is_transparent() {
        let err: CheckError = anyhow::anyhow!("connection refused").into();
        assert_eq!(err.to_string(), "connection refused");
        assert!(!err.is_not_implemented());
        assert!(CheckError::NotImplemented.is_not_implemented());
    }
}
