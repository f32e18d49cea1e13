/// Mesh-wide configuration checks
use async_trait::async_trait;

use super::namespace::{injection_setting, is_enabled};
use super::Mesh;
use crate::check::{Check, CheckError, Outcome};
use crate::k8s::{Cluster, PodRef};

/// MeshConfig resource exists and parses
pub struct MeshConfigPresent {
    cluster: Cluster,
    mesh: Mesh,
}

impl MeshConfigPresent {
    pub fn new(cluster: Cluster, mesh: Mesh) -> Self {
        Self { cluster, mesh }
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let config = self.mesh.mesh_config(&self.cluster).await?;
        let traffic = &config.spec.traffic;
        Ok(Outcome::pass_with(format!(
            "permissive mode: {}, egress: {}",
            traffic.enable_permissive_traffic_policy_mode, traffic.enable_egress
        )))
    }
}

#[async_trait]
impl Check for MeshConfigPresent {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        format!(
            "Checking whether MeshConfig {}/{} exists",
            self.mesh.namespace, self.mesh.mesh_config_name
        )
    }
}

/// Egress to destinations outside the mesh is enabled
pub struct EgressEnabled {
    cluster: Cluster,
    mesh: Mesh,
}

impl EgressEnabled {
    pub fn new(cluster: Cluster, mesh: Mesh) -> Self {
        Self { cluster, mesh }
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let config = self.mesh.mesh_config(&self.cluster).await?;
        if config.spec.traffic.enable_egress {
            Ok(Outcome::pass())
        } else {
            Err(CheckError::EgressDisabled)
        }
    }
}

#[async_trait]
impl Check for EgressEnabled {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        "Checking whether egress is enabled in the mesh".to_string()
    }

    fn suggestion(&self) -> Result<String, CheckError> {
        Ok(format!(
            "kubectl patch meshconfig {} -n {} --type=merge -p '{{\"spec\":{{\"traffic\":{{\"enableEgress\":true}}}}}}'",
            self.mesh.mesh_config_name, self.mesh.namespace
        ))
    }
}

/// An IngressBackend routes ingress traffic to one of the destination pod's services
pub struct IngressBackendExists {
    cluster: Cluster,
    destination: PodRef,
}

impl IngressBackendExists {
    pub fn new(cluster: Cluster, destination: PodRef) -> Self {
        Self {
            cluster,
            destination,
        }
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let pod = self.cluster.pod(&self.destination).await?;
        let services = self.cluster.services_selecting(&pod).await?;
        let names: Vec<&str> = services
            .iter()
            .filter_map(|svc| svc.metadata.name.as_deref())
            .collect();
        if names.is_empty() {
            return Err(CheckError::NoServicesForPod {
                pod: self.destination.to_string(),
            });
        }

        let backends = self
            .cluster
            .ingress_backends(&self.destination.namespace)
            .await?;
        let found = backends.iter().find_map(|backend| {
            backend
                .spec
                .backends
                .iter()
                .find(|b| names.contains(&b.name.as_str()))
                .map(|b| (backend.metadata.name.as_deref().unwrap_or_default(), &b.name))
        });

        match found {
            Some((backend, service)) => Ok(Outcome::pass_with(format!(
                "service {} is backed by ingress backend {}",
                service, backend
            ))),
            None => Err(CheckError::NoIngressBackend {
                service: names.join(", "),
            }),
        }
    }
}

#[async_trait]
impl Check for IngressBackendExists {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        format!(
            "Checking whether an ingress backend routes to {}",
            self.destination
        )
    }
}

/// Every namespace monitored by the mesh has sidecar injection enabled
pub struct MonitoredNamespacesInjected {
    cluster: Cluster,
    mesh: Mesh,
}

impl MonitoredNamespacesInjected {
    pub fn new(cluster: Cluster, mesh: Mesh) -> Self {
        Self { cluster, mesh }
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let namespaces = self
            .cluster
            .namespaces(&self.mesh.monitored_selector())
            .await?;
        if namespaces.is_empty() {
            return Ok(Outcome::info(format!(
                "no namespaces are monitored by mesh {}",
                self.mesh.name
            )));
        }

        let disabled: Vec<&str> = namespaces
            .iter()
            .filter(|ns| !injection_setting(ns).is_some_and(is_enabled))
            .filter_map(|ns| ns.metadata.name.as_deref())
            .collect();

        if disabled.is_empty() {
            Ok(Outcome::pass_with(format!(
                "{} monitored namespaces",
                namespaces.len()
            )))
        } else {
            Err(CheckError::InjectionDisabled {
                target: format!("namespaces {}", disabled.join(", ")),
            })
        }
    }
}

#[async_trait]
impl Check for MonitoredNamespacesInjected {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        format!(
            "Checking sidecar injection across namespaces monitored by {}",
            self.mesh.name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::OutcomeType;
    use crate::checks::fixtures::*;
    use crate::k8s::fake::FakeCluster;
    use crate::k8s::resources::{INGRESS_BACKENDS, MESH_CONFIGS, NAMESPACES};
    use serde_json::json;

    #[tokio::test]
    async fn test_mesh_config_present() {
        let cluster = two_pod_cluster("v0.9.0").cluster();
        let outcome = MeshConfigPresent::new(cluster, mesh()).run().await.unwrap();
        assert_eq!(outcome.long_diagnostics(), "permissive mode: false, egress: false");

        let outcome = MeshConfigPresent::new(FakeCluster::new().cluster(), mesh())
            .run()
            .await
            .unwrap();
        assert!(outcome
            .error()
            .unwrap()
            .to_string()
            .contains("osm-system/osm-mesh-config"));
    }

    #[tokio::test]
    async fn test_egress() {
        let cluster = two_pod_cluster("v0.9.0").cluster();
        let check = EgressEnabled::new(cluster, mesh());
        let outcome = check.run().await.unwrap();
        assert!(matches!(outcome.error(), Some(CheckError::EgressDisabled)));
        assert!(check.suggestion().unwrap().contains("enableEgress"));

        let cluster = FakeCluster::new()
            .with(MESH_CONFIGS, mesh_config(false, true))
            .cluster();
        let outcome = EgressEnabled::new(cluster, mesh()).run().await.unwrap();
        assert_eq!(outcome.outcome_type(), OutcomeType::Pass);
    }

    #[tokio::test]
    async fn test_ingress_backend() {
        let backend = json!({
            "metadata": {"name": "api-ingress", "namespace": "ns1"},
            "spec": {
                "backends": [{"name": "svc-a", "port": {"number": 80, "protocol": "http"}}],
                "sources": [{"kind": "Service", "name": "ingress-nginx", "namespace": "ingress"}]
            }
        });
        let cluster = two_pod_cluster("v0.9.0").with(INGRESS_BACKENDS, backend).cluster();
        let outcome = IngressBackendExists::new(cluster, PodRef::new("ns1", "api-0"))
            .run()
            .await
            .unwrap();
        assert_eq!(
            outcome.long_diagnostics(),
            "service svc-a is backed by ingress backend api-ingress"
        );

        let cluster = two_pod_cluster("v0.9.0").cluster();
        let outcome = IngressBackendExists::new(cluster, PodRef::new("ns1", "api-0"))
            .run()
            .await
            .unwrap();
        assert_eq!(
            outcome.error().unwrap().to_string(),
            "no ingress backend references service svc-a"
        );
    }

    #[tokio::test]
    async fn test_monitored_namespaces_injected() {
        let cluster = two_pod_cluster("v0.9.0").cluster();
        let outcome = MonitoredNamespacesInjected::new(cluster, mesh())
            .run()
            .await
            .unwrap();
        assert_eq!(outcome.long_diagnostics(), "2 monitored namespaces");

        let cluster = two_pod_cluster("v0.9.0")
            .with(NAMESPACES, monitored_namespace("ns3", "osm", false))
            .with(NAMESPACES, monitored_namespace("ns4", "other", false))
            .cluster();
        let outcome = MonitoredNamespacesInjected::new(cluster, mesh())
            .run()
            .await
            .unwrap();
        assert_eq!(
            outcome.error().unwrap().to_string(),
            "sidecar injection is not enabled for namespaces ns3"
        );

        let outcome = MonitoredNamespacesInjected::new(FakeCluster::new().cluster(), mesh())
            .run()
            .await
            .unwrap();
        assert_eq!(outcome.outcome_type(), OutcomeType::Info);
    }
}
