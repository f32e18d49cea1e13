/// Concrete diagnostics
pub mod control_plane;
pub mod envoy;
pub mod events;
pub mod mesh;
pub mod namespace;
pub mod pod;
pub mod probe;
pub mod smi;

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Pod;

use crate::config::DoctorConfig;
use crate::k8s::crds::MeshConfig;
use crate::k8s::{Cluster, ListQuery, PodExt};
use crate::version::ControllerVersion;

/// Mesh identity shared by the checks of one invocation
#[derive(Debug, Clone)]
pub struct Mesh {
    pub namespace: String,
    pub name: String,
    pub controller_name: String,
    pub mesh_config_name: String,
}

impl From<&DoctorConfig> for Mesh {
    fn from(config: &DoctorConfig) -> Self {
        Self {
            namespace: config.mesh_namespace.clone(),
            name: config.mesh_name.clone(),
            controller_name: config.controller_name.clone(),
            mesh_config_name: config.mesh_config_name.clone(),
        }
    }
}

impl Mesh {
    /// Label selector matching the controller's pods
    pub fn controller_selector(&self) -> String {
        format!("app={}", self.controller_name)
    }

    /// Label selector matching the namespaces this mesh monitors
    pub fn monitored_selector(&self) -> String {
        format!("{}={}", namespace::MONITORED_BY_LABEL, self.name)
    }

    pub async fn controller_pods(&self, cluster: &Cluster) -> Result<Vec<Pod>> {
        cluster
            .pods(&ListQuery::namespaced(&self.namespace).labels(self.controller_selector()))
            .await
    }

    /// Release line of the running controller
    pub async fn controller_version(&self, cluster: &Cluster) -> Result<ControllerVersion> {
        let pods = self.controller_pods(cluster).await?;
        pods.iter()
            .find_map(ControllerVersion::of_pod)
            .with_context(|| {
                format!(
                    "Could not determine {} version in namespace {}",
                    self.controller_name, self.namespace
                )
            })
    }

    pub async fn mesh_config(&self, cluster: &Cluster) -> Result<MeshConfig> {
        cluster
            .mesh_config(&self.namespace, &self.mesh_config_name)
            .await
    }
}

/// `namespace/service` names of the services selecting a pod
pub async fn service_names_for(cluster: &Cluster, pod: &Pod) -> Result<Vec<String>> {
    let namespace = pod.pod_ref().namespace;
    let services = cluster.services_selecting(pod).await?;
    Ok(services
        .iter()
        .filter_map(|svc| svc.metadata.name.as_deref())
        .map(|name| format!("{}/{}", namespace, name))
        .collect())
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::k8s::PodRef;

    #[tokio::test]
    async fn test_controller_version_lookup() {
        let cluster = two_pod_cluster("v0.9.2").cluster();
        let version = mesh().controller_version(&cluster).await.unwrap();
        assert_eq!(version.as_str(), "v0.9");
    }

    #[test]
    fn test_selectors() {
        assert_eq!(mesh().controller_selector(), "app=osm-controller");
        assert_eq!(
            mesh().monitored_selector(),
            "openservicemesh.io/monitored-by=osm"
        );
    }

    #[tokio::test]
    async fn test_controller_version_missing() {
        let cluster = crate::k8s::fake::FakeCluster::new().cluster();
        let err = mesh().controller_version(&cluster).await.unwrap_err();
        assert!(err.to_string().contains("osm-controller"));
    }

    #[tokio::test]
    async fn test_service_names_for_pod() {
        let cluster = two_pod_cluster("v0.9.0").cluster();
        let pod = cluster.pod(&PodRef::new("ns1", "api-0")).await.unwrap();
        assert_eq!(
            service_names_for(&cluster, &pod).await.unwrap(),
            vec!["ns1/svc-a"]
        );
    }
}
