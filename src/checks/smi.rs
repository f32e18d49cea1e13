/// SMI traffic policy checks
use async_trait::async_trait;
use tracing::debug;

use super::Mesh;
use crate::check::{Check, CheckError, Outcome};
use crate::k8s::client::is_not_found;
use crate::k8s::crds::{api_version_of, TrafficTarget};
use crate::k8s::resources::{CRDS, HTTP_ROUTE_GROUPS, TRAFFIC_SPLITS, TRAFFIC_TARGETS};
use crate::k8s::{Cluster, PodExt, PodRef};
use crate::version;

/// Traffic from the source pod to the destination pod is allowed by policy
pub struct TrafficPolicy {
    cluster: Cluster,
    mesh: Mesh,
    source: PodRef,
    destination: PodRef,
}

impl TrafficPolicy {
    pub fn new(cluster: Cluster, mesh: Mesh, source: PodRef, destination: PodRef) -> Self {
        Self {
            cluster,
            mesh,
            source,
            destination,
        }
    }

    fn allows(target: &TrafficTarget, source: (&str, &str), destination: (&str, &str)) -> bool {
        let target_ns = target.metadata.namespace.as_deref().unwrap_or(destination.0);
        target
            .spec
            .destination
            .is_service_account(destination.0, destination.1, target_ns)
            && target
                .spec
                .sources
                .iter()
                .any(|s| s.is_service_account(source.0, source.1, target_ns))
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let mesh_config = self.mesh.mesh_config(&self.cluster).await?;
        if mesh_config.spec.traffic.enable_permissive_traffic_policy_mode {
            return Ok(Outcome::pass_with("permissive traffic policy mode is enabled"));
        }

        let source = self.cluster.pod(&self.source).await?;
        let destination = self.cluster.pod(&self.destination).await?;
        let source_account = (self.source.namespace.as_str(), source.service_account());
        let destination_account = (self.destination.namespace.as_str(), destination.service_account());

        let version = self.mesh.controller_version(&self.cluster).await?;
        let expected = version::traffic_target_version(version.as_str())?;

        let targets = self.cluster.traffic_targets(&self.destination.namespace).await?;
        let matching: Vec<&TrafficTarget> = targets
            .iter()
            .filter(|t| Self::allows(t, source_account, destination_account))
            .collect();
        debug!(
            "{} of {} traffic targets in {} match",
            matching.len(),
            targets.len(),
            self.destination.namespace
        );

        if let Some(target) = matching
            .iter()
            .find(|t| api_version_of(&t.api_version) == expected)
        {
            let name = target.metadata.name.as_deref().unwrap_or_default();
            return Ok(Outcome::pass_with(format!("allowed by traffic target {}", name)));
        }

        match matching.first() {
            Some(target) => Err(CheckError::TrafficTargetVersion {
                name: target.metadata.name.clone().unwrap_or_default(),
                found: api_version_of(&target.api_version).to_string(),
                expected: expected.to_string(),
            }),
            None => Err(CheckError::NoTrafficTarget {
                source_account: format!("{}/{}", source_account.0, source_account.1),
                destination_account: format!("{}/{}", destination_account.0, destination_account.1),
            }),
        }
    }
}

#[async_trait]
impl Check for TrafficPolicy {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        format!(
            "Checking whether a traffic policy allows {} to reach {}",
            self.source, self.destination
        )
    }

    fn suggestion(&self) -> Result<String, CheckError> {
        Ok(format!(
            "Create a TrafficTarget in namespace {} whose sources include the service account of {}",
            self.destination.namespace, self.source
        ))
    }
}

/// Lists traffic splits that route to the destination pod's services
pub struct TrafficSplits {
    cluster: Cluster,
    destination: PodRef,
}

impl TrafficSplits {
    pub fn new(cluster: Cluster, destination: PodRef) -> Self {
        Self {
            cluster,
            destination,
        }
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let destination = self.cluster.pod(&self.destination).await?;
        let services = self.cluster.services_selecting(&destination).await?;
        let names: Vec<&str> = services
            .iter()
            .filter_map(|svc| svc.metadata.name.as_deref())
            .collect();

        let splits = self.cluster.traffic_splits(&self.destination.namespace).await?;
        let lines: Vec<String> = splits
            .iter()
            .filter(|split| names.iter().any(|name| split.involves(name)))
            .map(|split| {
                let backends: Vec<String> = split
                    .spec
                    .backends
                    .iter()
                    .map(|b| format!("{}={}", b.service, b.weight))
                    .collect();
                format!(
                    "{}: {} -> {}",
                    split.metadata.name.as_deref().unwrap_or_default(),
                    split.spec.service,
                    backends.join(", ")
                )
            })
            .collect();

        if lines.is_empty() {
            Ok(Outcome::pass())
        } else {
            Ok(Outcome::info(lines.join("\n")))
        }
    }
}

#[async_trait]
impl Check for TrafficSplits {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        format!("Checking traffic splits involving {}", self.destination)
    }
}

/// SMI custom resource definitions the mesh relies on
pub const SMI_CRDS: &[&str] = &[TRAFFIC_TARGETS, TRAFFIC_SPLITS, HTTP_ROUTE_GROUPS];

pub struct SmiCrdsInstalled {
    cluster: Cluster,
}

impl SmiCrdsInstalled {
    pub fn new(cluster: Cluster) -> Self {
        Self { cluster }
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let mut missing = Vec::new();
        for name in SMI_CRDS {
            match self.cluster.api().get(CRDS, None, name).await {
                Ok(_) => {}
                Err(e) if is_not_found(&e) => missing.push(*name),
                Err(e) => return Err(e.into()),
            }
        }

        if missing.is_empty() {
            Ok(Outcome::pass())
        } else {
            Err(CheckError::CrdMissing {
                name: missing.join(", "),
            })
        }
    }
}

#[async_trait]
impl Check for SmiCrdsInstalled {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        "Checking whether the SMI custom resource definitions are installed".to_string()
    }

    fn suggestion(&self) -> Result<String, CheckError> {
        Ok("Reinstall the mesh control plane, which installs the SMI CRDs".to_string())
    }
}
