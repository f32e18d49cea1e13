/// Per-pod mesh membership checks
use async_trait::async_trait;

use crate::check::{Check, CheckError, Outcome};
use crate::k8s::pods::PROXY_UUID_LABEL;
use crate::k8s::{Cluster, PodExt, PodRef};

/// Pod runs an Envoy sidecar container
pub struct SidecarPresent {
    cluster: Cluster,
    pod: PodRef,
}

impl SidecarPresent {
    pub fn new(cluster: Cluster, pod: PodRef) -> Self {
        Self { cluster, pod }
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let pod = self.cluster.pod(&self.pod).await?;
        if pod.has_sidecar() {
            Ok(Outcome::pass())
        } else {
            Err(CheckError::SidecarMissing {
                pod: self.pod.to_string(),
            })
        }
    }
}

#[async_trait]
impl Check for SidecarPresent {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        format!("Checking whether pod {} has an Envoy sidecar", self.pod)
    }

    fn suggestion(&self) -> Result<String, CheckError> {
        Ok(format!(
            "Enable sidecar injection for namespace {} and restart the pod so the sidecar is injected",
            self.pod.namespace
        ))
    }
}

/// Pod carries the proxy UUID label the control plane uses to identify it
pub struct ProxyUuidLabel {
    cluster: Cluster,
    pod: PodRef,
}

impl ProxyUuidLabel {
    pub fn new(cluster: Cluster, pod: PodRef) -> Self {
        Self { cluster, pod }
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let pod = self.cluster.pod(&self.pod).await?;
        match pod.label(PROXY_UUID_LABEL) {
            Some(uuid) if !uuid.is_empty() => Ok(Outcome::pass()),
            _ => Err(CheckError::ProxyUuidMissing {
                pod: self.pod.to_string(),
            }),
        }
    }
}

#[async_trait]
impl Check for ProxyUuidLabel {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        format!(
            "Checking whether pod {} has the {} label",
            self.pod, PROXY_UUID_LABEL
        )
    }
}

/// Pod is running with all app containers ready
pub struct PodReady {
    cluster: Cluster,
    pod: PodRef,
}

impl PodReady {
    pub fn new(cluster: Cluster, pod: PodRef) -> Self {
        Self { cluster, pod }
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let pod = self.cluster.pod(&self.pod).await?;
        pod.readiness()
            .map(|()| Outcome::pass())
            .map_err(|reason| CheckError::PodNotReady {
                pod: self.pod.to_string(),
                reason,
            })
    }
}

#[async_trait]
impl Check for PodReady {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        format!("Checking whether pod {} is running and ready", self.pod)
    }

    fn suggestion(&self) -> Result<String, CheckError> {
        Ok(format!(
            "Inspect the pod with: kubectl describe pod -n {} {}",
            self.pod.namespace, self.pod.name
        ))
    }
}
