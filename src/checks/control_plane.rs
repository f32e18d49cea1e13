/// Control plane health
use async_trait::async_trait;

use super::Mesh;
use crate::check::{Check, CheckError, Outcome};
use crate::k8s::{Cluster, PodExt};
use crate::version;

/// A control plane deployment has all desired replicas available
pub struct DeploymentAvailable {
    cluster: Cluster,
    namespace: String,
    name: String,
}

impl DeploymentAvailable {
    pub fn new(cluster: Cluster, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            cluster,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let deployment = self.cluster.deployment(&self.namespace, &self.name).await?;
        let desired = deployment
            .spec
            .as_ref()
            .and_then(|spec| spec.replicas)
            .unwrap_or(1);
        let available = deployment
            .status
            .as_ref()
            .and_then(|status| status.available_replicas)
            .unwrap_or(0);

        let summary = format!("{}/{} replicas available", available, desired);
        if available >= desired {
            Ok(Outcome::pass_with(summary))
        } else {
            Err(CheckError::ComponentUnavailable {
                component: self.name.clone(),
                reason: summary,
            })
        }
    }
}

#[async_trait]
impl Check for DeploymentAvailable {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        format!(
            "Checking whether deployment {}/{} is available",
            self.namespace, self.name
        )
    }

    fn suggestion(&self) -> Result<String, CheckError> {
        Ok(format!(
            "kubectl describe deployment -n {} {}",
            self.namespace, self.name
        ))
    }
}

/// Controller pods are running and ready
pub struct ControllerPodsReady {
    cluster: Cluster,
    mesh: Mesh,
}

impl ControllerPodsReady {
    pub fn new(cluster: Cluster, mesh: Mesh) -> Self {
        Self { cluster, mesh }
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let pods = self.mesh.controller_pods(&self.cluster).await?;
        let unavailable = |reason: String| CheckError::ComponentUnavailable {
            component: self.mesh.controller_name.clone(),
            reason,
        };

        if pods.is_empty() {
            return Err(unavailable(format!(
                "no pods match {} in namespace {}",
                self.mesh.controller_selector(),
                self.mesh.namespace
            )));
        }

        for pod in &pods {
            if let Err(reason) = pod.readiness() {
                return Err(unavailable(format!("pod {}: {}", pod.pod_ref(), reason)));
            }
        }

        Ok(Outcome::pass_with(format!("{} pods ready", pods.len())))
    }
}

#[async_trait]
impl Check for ControllerPodsReady {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        format!("Checking whether {} pods are ready", self.mesh.controller_name)
    }
}

/// Running controller is a release the other checks can interpret
pub struct ControllerVersionSupported {
    cluster: Cluster,
    mesh: Mesh,
}

impl ControllerVersionSupported {
    pub fn new(cluster: Cluster, mesh: Mesh) -> Self {
        Self { cluster, mesh }
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let version = self.mesh.controller_version(&self.cluster).await?;
        if version::is_supported(version.as_str()) {
            Ok(Outcome::pass_with(version.to_string()))
        } else {
            Err(CheckError::UnrecognizedVersion {
                version: version.to_string(),
            })
        }
    }
}

#[async_trait]
impl Check for ControllerVersionSupported {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        format!(
            "Checking whether the {} version is supported",
            self.mesh.controller_name
        )
    }

    fn suggestion(&self) -> Result<String, CheckError> {
        Ok(format!(
            "Supported releases: {}",
            version::SUPPORTED_VERSIONS.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::OutcomeType;
    use crate::checks::fixtures::*;
    use crate::k8s::fake::FakeCluster;
    use crate::k8s::resources::{DEPLOYMENTS, PODS};
    use serde_json::{json, Value};

    fn deployment(name: &str, replicas: Option<i32>, available: i32) -> Value {
        let mut spec = json!({"selector": {"matchLabels": {"app": name}}, "template": {}});
        if let Some(replicas) = replicas {
            spec["replicas"] = json!(replicas);
        }
        json!({
            "metadata": {"name": name, "namespace": "osm-system"},
            "spec": spec,
            "status": {"availableReplicas": available}
        })
    }

    #[tokio::test]
    async fn test_deployment_availability() {
        let cluster = FakeCluster::new()
            .with(DEPLOYMENTS, deployment("osm-controller", Some(2), 2))
            .with(DEPLOYMENTS, deployment("osm-injector", Some(2), 1))
            .with(DEPLOYMENTS, deployment("osm-bootstrap", None, 1))
            .cluster();

        let outcome = DeploymentAvailable::new(cluster.clone(), "osm-system", "osm-controller")
            .run()
            .await
            .unwrap();
        assert_eq!(outcome.long_diagnostics(), "2/2 replicas available");

        let outcome = DeploymentAvailable::new(cluster.clone(), "osm-system", "osm-injector")
            .run()
            .await
            .unwrap();
        assert_eq!(
            outcome.error().unwrap().to_string(),
            "osm-injector is unavailable: 1/2 replicas available"
        );

        let outcome = DeploymentAvailable::new(cluster.clone(), "osm-system", "osm-bootstrap")
            .run()
            .await
            .unwrap();
        assert_eq!(outcome.outcome_type(), OutcomeType::Pass);

        let outcome = DeploymentAvailable::new(cluster, "osm-system", "missing")
            .run()
            .await
            .unwrap();
        assert!(matches!(outcome.error(), Some(CheckError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_controller_pods_ready() {
        let cluster = two_pod_cluster("v0.9.0").cluster();
        let outcome = ControllerPodsReady::new(cluster, mesh()).run().await.unwrap();
        assert_eq!(outcome.long_diagnostics(), "1 pods ready");

        let outcome = ControllerPodsReady::new(FakeCluster::new().cluster(), mesh())
            .run()
            .await
            .unwrap();
        assert!(outcome
            .error()
            .unwrap()
            .to_string()
            .contains("no pods match app=osm-controller"));

        let mut crashing = controller_pod("v0.9.0");
        crashing["status"]["containerStatuses"][0]["ready"] = json!(false);
        let cluster = FakeCluster::new().with(PODS, crashing).cluster();
        let outcome = ControllerPodsReady::new(cluster, mesh()).run().await.unwrap();
        assert!(matches!(outcome.error(), Some(CheckError::ComponentUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_controller_version_supported() {
        let outcome = ControllerVersionSupported::new(two_pod_cluster("v0.11.1").cluster(), mesh())
            .run()
            .await
            .unwrap();
        assert_eq!(outcome.long_diagnostics(), "v0.11");

        let check = ControllerVersionSupported::new(two_pod_cluster("v1.2.0").cluster(), mesh());
        let outcome = check.run().await.unwrap();
        assert!(matches!(
            outcome.error(),
            Some(CheckError::UnrecognizedVersion { version }) if version == "v1.2"
        ));
        assert!(check.suggestion().unwrap().contains("v0.5"));
    }
}
