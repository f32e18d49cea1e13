/// Checks against a sidecar's Envoy configuration dump
use async_trait::async_trait;
use tracing::debug;

use super::{service_names_for, Mesh};
use crate::check::{Check, CheckError, Outcome};
use crate::envoy::config_dump::LbEndpoint;
use crate::envoy::{ConfigDump, SharedGetter};
use crate::k8s::{Cluster, PodExt, PodRef};
use crate::version::{self, Direction};

/// `svc.ns` itself, or followed by a domain suffix or a port
fn domain_matches(domain: &str, service_domain: &str) -> bool {
    domain
        .strip_prefix(service_domain)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.') || rest.starts_with(':'))
}

async fn load_config(getter: &SharedGetter) -> Result<ConfigDump, CheckError> {
    let getter = getter.as_ref().ok_or(CheckError::NoConfigGetter)?;
    let dump = getter.get_config().await?;
    debug!(
        "config dump for {} (node {}): {} clusters, {} listeners",
        getter.pod(),
        dump.node_id().unwrap_or("unknown"),
        dump.cluster_names().len(),
        dump.active_listener_names().len()
    );
    Ok(dump)
}

/// Sidecar knows an Envoy cluster for every service backing the destination pod
pub struct HasCluster {
    cluster: Cluster,
    pod: PodRef,
    destination: PodRef,
    getter: SharedGetter,
}

impl HasCluster {
    pub fn new(cluster: Cluster, pod: PodRef, destination: PodRef, getter: SharedGetter) -> Self {
        Self {
            cluster,
            pod,
            destination,
            getter,
        }
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let dump = load_config(&self.getter).await?;
        let destination = self.cluster.pod(&self.destination).await?;

        let expected = service_names_for(&self.cluster, &destination).await?;
        if expected.is_empty() {
            return Err(CheckError::NoServicesForPod {
                pod: self.destination.to_string(),
            });
        }

        let found = dump.cluster_names();
        if expected.iter().all(|name| found.contains(&name.as_str())) {
            Ok(Outcome::pass())
        } else {
            Err(CheckError::ClusterNotFound {
                expected,
                found: found.into_iter().map(str::to_string).collect(),
            })
        }
    }
}

#[async_trait]
impl Check for HasCluster {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        format!(
            "Checking whether {} is configured with the Envoy cluster for {}",
            self.pod, self.destination
        )
    }

    fn suggestion(&self) -> Result<String, CheckError> {
        Ok(format!(
            "Verify a traffic policy allows {} to reach {} and check the controller logs",
            self.pod, self.destination
        ))
    }
}

/// Sidecar has the listener the running controller programs for a direction
pub struct HasListener {
    cluster: Cluster,
    mesh: Mesh,
    pod: PodRef,
    getter: SharedGetter,
    direction: Direction,
}

impl HasListener {
    pub fn new(
        cluster: Cluster,
        mesh: Mesh,
        pod: PodRef,
        getter: SharedGetter,
        direction: Direction,
    ) -> Self {
        Self {
            cluster,
            mesh,
            pod,
            getter,
            direction,
        }
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let version = self.mesh.controller_version(&self.cluster).await?;
        let name = version::listener_name(version.as_str(), self.direction)?;

        let dump = load_config(&self.getter).await?;
        if dump.active_listener_names().contains(&name) {
            Ok(Outcome::pass())
        } else {
            Err(CheckError::ListenerNotFound {
                name: name.to_string(),
            })
        }
    }
}

#[async_trait]
impl Check for HasListener {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        format!(
            "Checking whether {} has an {} listener",
            self.pod, self.direction
        )
    }
}

/// No secrets are stuck warming in the sidecar
pub struct NoDynamicWarmingSecrets {
    pod: PodRef,
    getter: SharedGetter,
}

impl NoDynamicWarmingSecrets {
    pub fn new(pod: PodRef, getter: SharedGetter) -> Self {
        Self { pod, getter }
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let dump = load_config(&self.getter).await?;
        let names = dump.warming_secret_names();
        if names.is_empty() {
            Ok(Outcome::pass())
        } else {
            Err(CheckError::DynamicWarmingSecretsNotEmpty {
                names: names.into_iter().map(str::to_string).collect(),
            })
        }
    }
}

#[async_trait]
impl Check for NoDynamicWarmingSecrets {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        format!("Checking whether {} has no warming secrets", self.pod)
    }

    fn suggestion(&self) -> Result<String, CheckError> {
        Ok("Warming secrets usually mean certificate issuance is failing; check the osm-controller logs".to_string())
    }
}

/// Sidecar has at least one endpoint to send traffic to
pub struct HasDestinationEndpoints {
    pod: PodRef,
    getter: SharedGetter,
}

impl HasDestinationEndpoints {
    pub fn new(pod: PodRef, getter: SharedGetter) -> Self {
        Self { pod, getter }
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let dump = load_config(&self.getter).await?;
        let count = dump
            .load_assignments()
            .map(|cla| cla.lb_endpoints().count())
            .sum::<usize>();

        if count == 0 {
            Err(CheckError::NoDestinationEndpoints)
        } else {
            Ok(Outcome::pass_with(format!("{} endpoints", count)))
        }
    }
}

#[async_trait]
impl Check for HasDestinationEndpoints {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        format!("Checking whether {} has destination endpoints", self.pod)
    }
}

/// Sidecar has an endpoint for the destination pod's IP
pub struct HasSpecificEndpoint {
    cluster: Cluster,
    pod: PodRef,
    destination: PodRef,
    getter: SharedGetter,
}

impl HasSpecificEndpoint {
    pub fn new(cluster: Cluster, pod: PodRef, destination: PodRef, getter: SharedGetter) -> Self {
        Self {
            cluster,
            pod,
            destination,
            getter,
        }
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let dump = load_config(&self.getter).await?;
        let destination = self.cluster.pod(&self.destination).await?;
        let ip = destination
            .pod_ip()
            .ok_or_else(|| anyhow::anyhow!("Pod {} has no IP address", self.destination))?;

        let present = dump
            .load_assignments()
            .flat_map(|cla| cla.lb_endpoints())
            .filter_map(LbEndpoint::ip)
            .any(|endpoint| endpoint == ip);

        if present {
            Ok(Outcome::pass())
        } else {
            Err(CheckError::EndpointNotFound { ip: ip.to_string() })
        }
    }
}

#[async_trait]
impl Check for HasSpecificEndpoint {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        format!(
            "Checking whether {} has an endpoint for {}",
            self.pod, self.destination
        )
    }
}

/// Outbound route configuration has a virtual host for the destination's services
pub struct HasOutboundRouteDomain {
    cluster: Cluster,
    mesh: Mesh,
    pod: PodRef,
    destination: PodRef,
    getter: SharedGetter,
}

impl HasOutboundRouteDomain {
    pub fn new(
        cluster: Cluster,
        mesh: Mesh,
        pod: PodRef,
        destination: PodRef,
        getter: SharedGetter,
    ) -> Self {
        Self {
            cluster,
            mesh,
            pod,
            destination,
            getter,
        }
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let version = self.mesh.controller_version(&self.cluster).await?;
        let route_config = version::route_config_name(version.as_str(), Direction::Outbound)?;

        let dump = load_config(&self.getter).await?;
        let destination = self.cluster.pod(&self.destination).await?;
        let services = self.cluster.services_selecting(&destination).await?;
        let domains: Vec<String> = services
            .iter()
            .filter_map(|svc| svc.metadata.name.as_deref())
            .map(|name| format!("{}.{}", name, self.destination.namespace))
            .collect();
        if domains.is_empty() {
            return Err(CheckError::NoServicesForPod {
                pod: self.destination.to_string(),
            });
        }

        let found = dump.route_config(route_config).is_some_and(|config| {
            config
                .virtual_hosts
                .iter()
                .flat_map(|host| host.domains.iter())
                .any(|domain| domains.iter().any(|d| domain_matches(domain, d)))
        });

        if found {
            Ok(Outcome::pass())
        } else {
            Err(CheckError::RouteDomainNotFound {
                route_config: route_config.to_string(),
                domains,
            })
        }
    }
}

#[async_trait]
impl Check for HasOutboundRouteDomain {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        format!(
            "Checking whether {} has an outbound route to {}",
            self.pod, self.destination
        )
    }
}
