/// Envoy admin `config_dump` model
///
/// Only the fields the checks read are modelled. Every section defaults to
/// empty so partial dumps (for example without EDS) still parse.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const TYPE_KEY: &str = "@type";

/// Parsed sidecar configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigDump {
    pub bootstrap: BootstrapDump,
    pub clusters: ClustersDump,
    pub listeners: ListenersDump,
    pub routes: RoutesDump,
    pub secrets: SecretsDump,
    pub endpoints: EndpointsDump,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapDump {
    #[serde(default)]
    pub bootstrap: Bootstrap,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bootstrap {
    #[serde(default)]
    pub node: Option<Node>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClustersDump {
    #[serde(default)]
    pub static_clusters: Vec<ClusterEntry>,
    #[serde(default)]
    pub dynamic_active_clusters: Vec<ClusterEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterEntry {
    #[serde(default)]
    pub cluster: NamedResource,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamedResource {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListenersDump {
    #[serde(default)]
    pub dynamic_listeners: Vec<DynamicListener>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DynamicListener {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub active_state: Option<ListenerState>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListenerState {
    #[serde(default)]
    pub listener: NamedResource,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutesDump {
    #[serde(default)]
    pub static_route_configs: Vec<RouteConfigEntry>,
    #[serde(default)]
    pub dynamic_route_configs: Vec<RouteConfigEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteConfigEntry {
    #[serde(default)]
    pub route_config: RouteConfiguration,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteConfiguration {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub virtual_hosts: Vec<VirtualHost>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VirtualHost {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretsDump {
    #[serde(default)]
    pub dynamic_active_secrets: Vec<NamedResource>,
    #[serde(default)]
    pub dynamic_warming_secrets: Vec<NamedResource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointsDump {
    #[serde(default)]
    pub dynamic_endpoint_configs: Vec<EndpointConfigEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointConfigEntry {
    #[serde(default)]
    pub endpoint_config: ClusterLoadAssignment,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterLoadAssignment {
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub endpoints: Vec<LocalityLbEndpoints>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalityLbEndpoints {
    #[serde(default)]
    pub lb_endpoints: Vec<LbEndpoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LbEndpoint {
    #[serde(default)]
    pub endpoint: Option<Endpoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default)]
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub socket_address: Option<SocketAddress>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SocketAddress {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub port_value: u32,
}

impl LbEndpoint {
    pub fn ip(&self) -> Option<&str> {
        self.endpoint
            .as_ref()?
            .address
            .as_ref()?
            .socket_address
            .as_ref()
            .map(|s| s.address.as_str())
    }
}

impl ClusterLoadAssignment {
    pub fn lb_endpoints(&self) -> impl Iterator<Item = &LbEndpoint> {
        self.endpoints.iter().flat_map(|e| e.lb_endpoints.iter())
    }
}

#[derive(Deserialize)]
struct RawDump {
    #[serde(default)]
    configs: Vec<Value>,
}

fn section<T: serde::de::DeserializeOwned>(entry: Value, kind: &str) -> Result<T> {
    serde_json::from_value(entry).with_context(|| format!("Failed to parse {} section", kind))
}

impl ConfigDump {
    /// Parse the JSON document served by `/config_dump`
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawDump = serde_json::from_str(json).context("Invalid config_dump document")?;
        let mut dump = ConfigDump::default();

        for entry in raw.configs {
            let type_url = entry
                .get(TYPE_KEY)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let kind = type_url.rsplit('.').next().unwrap_or_default();

            match kind {
                "BootstrapConfigDump" => dump.bootstrap = section(entry, kind)?,
                "ClustersConfigDump" => dump.clusters = section(entry, kind)?,
                "ListenersConfigDump" => dump.listeners = section(entry, kind)?,
                "RoutesConfigDump" => dump.routes = section(entry, kind)?,
                "SecretsConfigDump" => dump.secrets = section(entry, kind)?,
                "EndpointsConfigDump" => dump.endpoints = section(entry, kind)?,
                _ => debug!("ignoring config_dump entry {}", type_url),
            }
        }

        Ok(dump)
    }

    pub fn node_id(&self) -> Option<&str> {
        self.bootstrap.bootstrap.node.as_ref().map(|n| n.id.as_str())
    }

    pub fn cluster_names(&self) -> Vec<&str> {
        self.clusters
            .static_clusters
            .iter()
            .chain(self.clusters.dynamic_active_clusters.iter())
            .map(|c| c.cluster.name.as_str())
            .collect()
    }

    /// Names of listeners with an active state
    pub fn active_listener_names(&self) -> Vec<&str> {
        self.listeners
            .dynamic_listeners
            .iter()
            .filter_map(|l| l.active_state.as_ref().map(|s| s.listener.name.as_str()))
            .collect()
    }

    pub fn route_config(&self, name: &str) -> Option<&RouteConfiguration> {
        self.routes
            .static_route_configs
            .iter()
            .chain(self.routes.dynamic_route_configs.iter())
            .map(|r| &r.route_config)
            .find(|r| r.name == name)
    }

    pub fn load_assignments(&self) -> impl Iterator<Item = &ClusterLoadAssignment> {
        self.endpoints
            .dynamic_endpoint_configs
            .iter()
            .map(|e| &e.endpoint_config)
    }

    pub fn warming_secret_names(&self) -> Vec<&str> {
        self.secrets
            .dynamic_warming_secrets
            .iter()
            .map(|s| s.name.as_str())
            .collect()
    }
}
