/// Check lists for each diagnostic command
use std::sync::Arc;
use url::Url;

use crate::check::{guarded, Check, Dependencies};
use crate::checks::control_plane::{ControllerPodsReady, ControllerVersionSupported, DeploymentAvailable};
use crate::checks::envoy::{
    HasCluster, HasDestinationEndpoints, HasListener, HasOutboundRouteDomain, HasSpecificEndpoint,
    NoDynamicWarmingSecrets,
};
use crate::checks::events::WarningEvents;
use crate::checks::mesh::{EgressEnabled, IngressBackendExists, MeshConfigPresent, MonitoredNamespacesInjected};
use crate::checks::namespace::{NamespaceMonitored, SameMesh, SidecarInjection};
use crate::checks::pod::{PodReady, ProxyUuidLabel, SidecarPresent};
use crate::checks::probe::HttpProbe;
use crate::checks::smi::{SmiCrdsInstalled, TrafficPolicy, TrafficSplits};
use crate::checks::Mesh;
use crate::config::DoctorConfig;
use crate::envoy::SharedGetter;
use crate::k8s::{Cluster, PodRef};
use crate::version::Direction;

/// Everything a suite needs to build its checks
pub struct Suite {
    cluster: Cluster,
    mesh: Mesh,
    components: Vec<String>,
    deps: Arc<Dependencies>,
}

impl Suite {
    pub fn new(cluster: Cluster, config: &DoctorConfig, deps: Arc<Dependencies>) -> Self {
        Self {
            cluster,
            mesh: Mesh::from(config),
            components: vec![
                config.controller_name.clone(),
                config.injector_name.clone(),
                config.bootstrap_name.clone(),
            ],
            deps,
        }
    }

    fn guard<C: Check + 'static>(&self, check: C) -> Box<dyn Check> {
        guarded(check, &self.deps)
    }

    fn pod_checks(&self, pod: &PodRef) -> Vec<Box<dyn Check>> {
        vec![
            self.guard(SidecarPresent::new(self.cluster.clone(), pod.clone())),
            self.guard(ProxyUuidLabel::new(self.cluster.clone(), pod.clone())),
            self.guard(PodReady::new(self.cluster.clone(), pod.clone())),
            self.guard(WarningEvents::for_object(
                self.cluster.clone(),
                &pod.namespace,
                &pod.name,
            )),
        ]
    }

    fn namespace_checks(&self, pod: &PodRef) -> Vec<Box<dyn Check>> {
        vec![
            self.guard(NamespaceMonitored::new(
                self.cluster.clone(),
                &pod.namespace,
                &self.mesh.name,
            )),
            self.guard(SidecarInjection::for_pod(self.cluster.clone(), pod.clone())),
        ]
    }

    /// Meshed pod to meshed pod connectivity
    pub fn pod_to_pod(
        &self,
        source: &PodRef,
        destination: &PodRef,
        source_getter: SharedGetter,
        destination_getter: SharedGetter,
    ) -> Vec<Box<dyn Check>> {
        let cluster = &self.cluster;
        let mut checks = self.pod_checks(source);
        checks.extend(self.pod_checks(destination));
        checks.extend(self.namespace_checks(source));
        checks.extend(self.namespace_checks(destination));
        checks.extend([
            self.guard(SameMesh::new(
                cluster.clone(),
                &source.namespace,
                &destination.namespace,
            )),
            self.guard(TrafficPolicy::new(
                cluster.clone(),
                self.mesh.clone(),
                source.clone(),
                destination.clone(),
            )),
            self.guard(TrafficSplits::new(cluster.clone(), destination.clone())),
            self.guard(HasListener::new(
                cluster.clone(),
                self.mesh.clone(),
                source.clone(),
                source_getter.clone(),
                Direction::Outbound,
            )),
            self.guard(HasCluster::new(
                cluster.clone(),
                source.clone(),
                destination.clone(),
                source_getter.clone(),
            )),
            self.guard(HasOutboundRouteDomain::new(
                cluster.clone(),
                self.mesh.clone(),
                source.clone(),
                destination.clone(),
                source_getter.clone(),
            )),
            self.guard(HasDestinationEndpoints::new(
                source.clone(),
                source_getter.clone(),
            )),
            self.guard(HasSpecificEndpoint::new(
                cluster.clone(),
                source.clone(),
                destination.clone(),
                source_getter.clone(),
            )),
            self.guard(HasListener::new(
                cluster.clone(),
                self.mesh.clone(),
                destination.clone(),
                destination_getter.clone(),
                Direction::Inbound,
            )),
            self.guard(NoDynamicWarmingSecrets::new(source.clone(), source_getter)),
            self.guard(NoDynamicWarmingSecrets::new(
                destination.clone(),
                destination_getter,
            )),
        ]);
        checks
    }

    /// Meshed pod to an external URL
    pub fn pod_to_url(&self, source: &PodRef, url: &Url, getter: SharedGetter) -> Vec<Box<dyn Check>> {
        let cluster = &self.cluster;
        let mut checks = vec![
            self.guard(SidecarPresent::new(cluster.clone(), source.clone())),
            self.guard(PodReady::new(cluster.clone(), source.clone())),
            self.guard(NamespaceMonitored::new(
                cluster.clone(),
                &source.namespace,
                &self.mesh.name,
            )),
            self.guard(EgressEnabled::new(cluster.clone(), self.mesh.clone())),
        ];
        checks.extend([
            self.guard(HasListener::new(
                cluster.clone(),
                self.mesh.clone(),
                source.clone(),
                getter.clone(),
                Direction::Outbound,
            )),
            self.guard(NoDynamicWarmingSecrets::new(source.clone(), getter)),
            self.guard(HttpProbe::new(cluster.clone(), source.clone(), url.clone())),
        ]);
        checks
    }

    /// Health of the control plane components
    pub fn control_plane(&self) -> Vec<Box<dyn Check>> {
        let cluster = &self.cluster;
        let mut checks: Vec<Box<dyn Check>> = self
            .components
            .iter()
            .map(|name| {
                self.guard(DeploymentAvailable::new(
                    cluster.clone(),
                    &self.mesh.namespace,
                    name,
                ))
            })
            .collect();
        checks.extend([
            self.guard(ControllerPodsReady::new(cluster.clone(), self.mesh.clone())),
            self.guard(ControllerVersionSupported::new(cluster.clone(), self.mesh.clone())),
            self.guard(MeshConfigPresent::new(cluster.clone(), self.mesh.clone())),
            self.guard(WarningEvents::in_namespace(cluster.clone(), &self.mesh.namespace)),
        ]);
        checks
    }

    /// Ingress traffic to a meshed pod
    pub fn ingress_to_pod(&self, destination: &PodRef, getter: SharedGetter) -> Vec<Box<dyn Check>> {
        let cluster = &self.cluster;
        vec![
            self.guard(SidecarPresent::new(cluster.clone(), destination.clone())),
            self.guard(PodReady::new(cluster.clone(), destination.clone())),
            self.guard(NamespaceMonitored::new(
                cluster.clone(),
                &destination.namespace,
                &self.mesh.name,
            )),
            self.guard(IngressBackendExists::new(cluster.clone(), destination.clone())),
            self.guard(HasListener::new(
                cluster.clone(),
                self.mesh.clone(),
                destination.clone(),
                getter.clone(),
                Direction::Inbound,
            )),
            self.guard(NoDynamicWarmingSecrets::new(destination.clone(), getter)),
        ]
    }

    /// Static validation of mesh-wide configuration
    pub fn validate(&self) -> Vec<Box<dyn Check>> {
        let cluster = &self.cluster;
        vec![
            self.guard(SmiCrdsInstalled::new(cluster.clone())),
            self.guard(MeshConfigPresent::new(cluster.clone(), self.mesh.clone())),
            self.guard(MonitoredNamespacesInjected::new(cluster.clone(), self.mesh.clone())),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{OutcomeType, Runner, DEP_CLUSTER, DEP_KUBECTL};
    use crate::checks::fixtures::two_pod_cluster;
    use crate::envoy::testing::StaticConfig;
    use crate::envoy::ConfigDump;

    fn suite(deps: Dependencies) -> Suite {
        Suite::new(
            two_pod_cluster("v0.9.0").cluster(),
            &DoctorConfig::default(),
            Arc::new(deps),
        )
    }

    fn ready() -> Dependencies {
        let mut deps = Dependencies::new();
        deps.satisfied(DEP_KUBECTL);
        deps.satisfied(DEP_CLUSTER);
        deps
    }

    fn pods() -> (PodRef, PodRef) {
        (PodRef::new("ns2", "web-0"), PodRef::new("ns1", "api-0"))
    }

    #[test]
    fn test_pod_to_pod_order() {
        let (source, destination) = pods();
        let checks = suite(ready()).pod_to_pod(&source, &destination, None, None);
        assert_eq!(checks.len(), 23);
        assert_eq!(
            checks[0].description(),
            "Checking whether pod ns2/web-0 has an Envoy sidecar"
        );
        assert_eq!(
            checks[4].description(),
            "Checking whether pod ns1/api-0 has an Envoy sidecar"
        );
        assert_eq!(
            checks[22].description(),
            "Checking whether ns1/api-0 has no warming secrets"
        );
    }

    #[test]
    fn test_suite_lengths() {
        let (source, destination) = pods();
        let suite = suite(ready());
        let url = Url::parse("http://example.com").unwrap();
        assert_eq!(suite.pod_to_url(&source, &url, None).len(), 7);
        assert_eq!(suite.control_plane().len(), 7);
        assert_eq!(suite.ingress_to_pod(&destination, None).len(), 6);
        assert_eq!(suite.validate().len(), 3);
    }

    #[tokio::test]
    async fn test_unmet_dependencies_skip_everything() {
        let mut deps = Dependencies::new();
        deps.satisfied(DEP_KUBECTL);
        deps.unsatisfied(DEP_CLUSTER, "connection refused");

        let records = Runner::run(suite(deps).control_plane()).await;
        assert_eq!(records.len(), 7);
        for record in &records {
            assert_eq!(record.status, OutcomeType::Skip);
            assert_eq!(record.diagnostics, "cluster unavailable: connection refused");
        }
    }

    #[tokio::test]
    async fn test_pod_to_pod_runs_end_to_end() {
        let (source, destination) = pods();
        let getter = StaticConfig::shared(ConfigDump::default());
        let records = Runner::run(suite(ready()).pod_to_pod(
            &source,
            &destination,
            getter.clone(),
            getter,
        ))
        .await;

        assert_eq!(records.len(), 23);
        assert_eq!(records[0].status, OutcomeType::Pass);
        // an empty dump has no listener for the source
        let listener = records
            .iter()
            .find(|r| r.description == "Checking whether ns2/web-0 has an outbound listener")
            .unwrap();
        assert_eq!(listener.status, OutcomeType::Fail);
    }
}
