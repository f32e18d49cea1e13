/// Typed access to the cluster resources the checks read
use anyhow::{Context, Result};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Event, Namespace, Pod, Service};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::client::{ClusterApi, ListQuery};
use super::crds::{IngressBackend, MeshConfig, TrafficSplit, TrafficTarget};

pub const PODS: &str = "pods";
pub const NAMESPACES: &str = "namespaces";
pub const SERVICES: &str = "services";
pub const EVENTS: &str = "events";
pub const DEPLOYMENTS: &str = "deployments";
pub const CRDS: &str = "customresourcedefinitions";
pub const MESH_CONFIGS: &str = "meshconfigs.config.openservicemesh.io";
pub const TRAFFIC_TARGETS: &str = "traffictargets.access.smi-spec.io";
pub const TRAFFIC_SPLITS: &str = "trafficsplits.split.smi-spec.io";
pub const HTTP_ROUTE_GROUPS: &str = "httproutegroups.specs.smi-spec.io";
pub const INGRESS_BACKENDS: &str = "ingressbackends.policy.openservicemesh.io";

/// A pod addressed as `namespace/name`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PodRef {
    pub namespace: String,
    pub name: String,
}

impl PodRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl FromStr for PodRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((namespace, name))
                if !namespace.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(namespace, name))
            }
            _ => anyhow::bail!("Invalid pod reference '{}': expected namespace/name", s),
        }
    }
}

impl fmt::Display for PodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// True when every selector pair is present in `labels`. An empty selector selects nothing.
pub fn selector_matches(
    selector: &BTreeMap<String, String>,
    labels: &BTreeMap<String, String>,
) -> bool {
    !selector.is_empty()
        && selector
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
}

/// Typed facade over a [`ClusterApi`]
#[derive(Clone)]
pub struct Cluster {
    api: Arc<dyn ClusterApi>,
}

impl Cluster {
    pub fn new(api: Arc<dyn ClusterApi>) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &dyn ClusterApi {
        self.api.as_ref()
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        kind: &str,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<T> {
        let value = self.api.get(kind, namespace, name).await?;
        serde_json::from_value(value).with_context(|| format!("Failed to decode {} {}", kind, name))
    }

    pub async fn list<T: DeserializeOwned>(&self, kind: &str, query: &ListQuery) -> Result<Vec<T>> {
        self.api
            .list(kind, query)
            .await?
            .into_iter()
            .map(|value| {
                serde_json::from_value(value).with_context(|| format!("Failed to decode {}", kind))
            })
            .collect()
    }

    pub async fn pod(&self, pod: &PodRef) -> Result<Pod> {
        self.get(PODS, Some(&pod.namespace), &pod.name)
            .await
            .with_context(|| format!("Failed to get pod {}", pod))
    }

    pub async fn pods(&self, query: &ListQuery) -> Result<Vec<Pod>> {
        self.list(PODS, query).await
    }

    pub async fn namespace(&self, name: &str) -> Result<Namespace> {
        self.get(NAMESPACES, None, name)
            .await
            .with_context(|| format!("Failed to get namespace {}", name))
    }

    pub async fn namespaces(&self, label_selector: &str) -> Result<Vec<Namespace>> {
        self.list(NAMESPACES, &ListQuery::all().labels(label_selector))
            .await
    }

    /// Services in the pod's namespace whose selector matches the pod
    pub async fn services_selecting(&self, pod: &Pod) -> Result<Vec<Service>> {
        let namespace = pod.metadata.namespace.clone().unwrap_or_default();
        let empty = BTreeMap::new();
        let labels = pod.metadata.labels.as_ref().unwrap_or(&empty);

        let services: Vec<Service> = self
            .list(SERVICES, &ListQuery::namespaced(namespace))
            .await?;
        Ok(services
            .into_iter()
            .filter(|svc| {
                svc.spec
                    .as_ref()
                    .and_then(|spec| spec.selector.as_ref())
                    .is_some_and(|selector| selector_matches(selector, labels))
            })
            .collect())
    }

    pub async fn deployment(&self, namespace: &str, name: &str) -> Result<Deployment> {
        self.get(DEPLOYMENTS, Some(namespace), name)
            .await
            .with_context(|| format!("Failed to get deployment {}/{}", namespace, name))
    }

    pub async fn events(&self, query: &ListQuery) -> Result<Vec<Event>> {
        self.list(EVENTS, query).await
    }

    pub async fn mesh_config(&self, namespace: &str, name: &str) -> Result<MeshConfig> {
        self.get(MESH_CONFIGS, Some(namespace), name)
            .await
            .with_context(|| format!("Failed to get MeshConfig {}/{}", namespace, name))
    }

    pub async fn traffic_targets(&self, namespace: &str) -> Result<Vec<TrafficTarget>> {
        self.list(TRAFFIC_TARGETS, &ListQuery::namespaced(namespace))
            .await
    }

    pub async fn traffic_splits(&self, namespace: &str) -> Result<Vec<TrafficSplit>> {
        self.list(TRAFFIC_SPLITS, &ListQuery::namespaced(namespace))
            .await
    }

    pub async fn ingress_backends(&self, namespace: &str) -> Result<Vec<IngressBackend>> {
        self.list(INGRESS_BACKENDS, &ListQuery::namespaced(namespace))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::fake::FakeCluster;
    use serde_json::json;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_pod_ref_parsing() {
        let pod: PodRef = "ns1/web-0".parse().unwrap();
        assert_eq!(pod, PodRef::new("ns1", "web-0"));
        assert_eq!(pod.to_string(), "ns1/web-0");

        assert!("web-0".parse::<PodRef>().is_err());
        assert!("/web-0".parse::<PodRef>().is_err());
        assert!("ns1/".parse::<PodRef>().is_err());
        assert!("a/b/c".parse::<PodRef>().is_err());
    }

    #[test]
    fn test_selector_matching() {
        let pod_labels = labels(&[("app", "web"), ("version", "v1")]);

        assert!(selector_matches(&labels(&[("app", "web")]), &pod_labels));
        assert!(!selector_matches(
            &labels(&[("app", "web"), ("tier", "front")]),
            &pod_labels
        ));
        assert!(!selector_matches(&labels(&[("app", "api")]), &pod_labels));
        assert!(!selector_matches(&BTreeMap::new(), &pod_labels));
    }

    #[tokio::test]
    async fn test_services_selecting() {
        let fake = FakeCluster::new()
            .with(
                PODS,
                json!({"metadata": {"name": "web-0", "namespace": "ns1", "labels": {"app": "web"}}}),
            )
            .with(
                SERVICES,
                json!({"metadata": {"name": "svc-a", "namespace": "ns1"}, "spec": {"selector": {"app": "web"}}}),
            )
            .with(
                SERVICES,
                json!({"metadata": {"name": "svc-b", "namespace": "ns1"}, "spec": {"selector": {"app": "api"}}}),
            )
            .with(
                SERVICES,
                json!({"metadata": {"name": "svc-c", "namespace": "ns2"}, "spec": {"selector": {"app": "web"}}}),
            );
        let cluster = fake.cluster();

        let pod = cluster.pod(&PodRef::new("ns1", "web-0")).await.unwrap();
        let services = cluster.services_selecting(&pod).await.unwrap();
        let names: Vec<_> = services
            .iter()
            .filter_map(|s| s.metadata.name.as_deref())
            .collect();
        assert_eq!(names, vec!["svc-a"]);
    }

    #[tokio::test]
    async fn test_missing_pod_is_error() {
        let cluster = FakeCluster::new().cluster();
        let err = cluster.pod(&PodRef::new("ns1", "ghost")).await.unwrap_err();
        assert!(crate::k8s::client::is_not_found(&err));
        assert!(format!("{:#}", err).contains("ns1/ghost"));
    }
}
