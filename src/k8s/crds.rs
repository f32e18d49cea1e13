/// SMI and OSM custom resources
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

/// Version component of an `apiVersion` such as `access.smi-spec.io/v1alpha3`
pub fn api_version_of(api_version: &str) -> &str {
    api_version
        .rsplit_once('/')
        .map(|(_, version)| version)
        .unwrap_or(api_version)
}

/// Reference to a service account, used by traffic targets and ingress backends
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRef {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl IdentityRef {
    /// True when this reference names the given service account
    pub fn is_service_account(&self, namespace: &str, name: &str, default_ns: &str) -> bool {
        self.kind == "ServiceAccount"
            && self.name == name
            && self.namespace.as_deref().unwrap_or(default_ns) == namespace
    }
}

/// `access.smi-spec.io` TrafficTarget
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficTarget {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: TrafficTargetSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrafficTargetSpec {
    #[serde(default)]
    pub destination: IdentityRef,
    #[serde(default)]
    pub sources: Vec<IdentityRef>,
    #[serde(default)]
    pub rules: Vec<TrafficTargetRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrafficTargetRule {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub matches: Vec<String>,
}

/// `split.smi-spec.io` TrafficSplit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficSplit {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: TrafficSplitSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrafficSplitSpec {
    /// Root service clients address
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub backends: Vec<TrafficSplitBackend>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrafficSplitBackend {
    pub service: String,
    #[serde(default)]
    pub weight: i64,
}

impl TrafficSplit {
    /// True when the split routes to or through `service`
    pub fn involves(&self, service: &str) -> bool {
        self.spec.service == service || self.spec.backends.iter().any(|b| b.service == service)
    }
}

/// `policy.openservicemesh.io` IngressBackend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressBackend {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: IngressBackendSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngressBackendSpec {
    #[serde(default)]
    pub backends: Vec<BackendRef>,
    #[serde(default)]
    pub sources: Vec<IdentityRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendRef {
    pub name: String,
    #[serde(default)]
    pub port: Option<BackendPort>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendPort {
    pub number: i32,
    #[serde(default)]
    pub protocol: Option<String>,
}

/// `config.openservicemesh.io` MeshConfig
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshConfig {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: MeshConfigSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshConfigSpec {
    #[serde(default)]
    pub traffic: TrafficSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficSpec {
    #[serde(default)]
    pub enable_egress: bool,
    #[serde(default)]
    pub enable_permissive_traffic_policy_mode: bool,
}
