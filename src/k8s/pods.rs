/// Pod inspection helpers
use k8s_openapi::api::core::v1::{Container, Pod};

use super::resources::PodRef;

/// Name of the Envoy sidecar container injected by the mesh
pub const ENVOY_CONTAINER: &str = "envoy";

/// Label carrying the sidecar's proxy UUID
pub const PROXY_UUID_LABEL: &str = "osm-proxy-uuid";

/// Read-only views over a pod
pub trait PodExt {
    fn pod_ref(&self) -> PodRef;
    fn containers(&self) -> &[Container];
    fn has_container(&self, name: &str) -> bool;
    fn label(&self, key: &str) -> Option<&str>;
    fn annotation(&self, key: &str) -> Option<&str>;
    fn pod_ip(&self) -> Option<&str>;
    fn service_account(&self) -> &str;

    /// First non-sidecar container, the target for exec probes
    fn app_container(&self) -> Option<&str>;

    /// Running with every app container ready; `Err` holds the reason
    fn readiness(&self) -> Result<(), String>;

    fn has_sidecar(&self) -> bool {
        self.has_container(ENVOY_CONTAINER)
    }
}

impl PodExt for Pod {
    fn pod_ref(&self) -> PodRef {
        PodRef::new(
            self.metadata.namespace.clone().unwrap_or_default(),
            self.metadata.name.clone().unwrap_or_default(),
        )
    }

    fn containers(&self) -> &[Container] {
        self.spec
            .as_ref()
            .map(|spec| spec.containers.as_slice())
            .unwrap_or_default()
    }

    fn has_container(&self, name: &str) -> bool {
        self.containers().iter().any(|c| c.name == name)
    }

    fn label(&self, key: &str) -> Option<&str> {
        self.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(key))
            .map(String::as_str)
    }

    fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(key))
            .map(String::as_str)
    }

    fn pod_ip(&self) -> Option<&str> {
        self.status.as_ref().and_then(|status| status.pod_ip.as_deref())
    }

    fn service_account(&self) -> &str {
        self.spec
            .as_ref()
            .and_then(|spec| spec.service_account_name.as_deref())
            .unwrap_or("default")
    }

    fn app_container(&self) -> Option<&str> {
        self.containers()
            .iter()
            .map(|c| c.name.as_str())
            .find(|name| *name != ENVOY_CONTAINER)
    }

    fn readiness(&self) -> Result<(), String> {
        let status = self.status.as_ref().ok_or("pod has no status")?;
        let phase = status.phase.as_deref().unwrap_or("Unknown");
        if phase != "Running" {
            return Err(format!("phase is {}", phase));
        }

        // Init containers have completed by the time the pod runs; they are not counted.
        let expected = self.containers().len();
        let ready = status
            .container_statuses
            .as_ref()
            .map(|statuses| statuses.iter().filter(|s| s.ready).count())
            .unwrap_or(0);

        if ready < expected {
            return Err(format!("{}/{} containers ready", ready, expected));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pod(value: serde_json::Value) -> Pod {
        serde_json::from_value(value).unwrap()
    }

    fn meshed_pod(ready: [bool; 2]) -> Pod {
        pod(json!({
            "metadata": {
                "name": "web-0",
                "namespace": "ns1",
                "labels": {"app": "web", "osm-proxy-uuid": "1234"}
            },
            "spec": {
                "serviceAccountName": "web",
                "initContainers": [{"name": "osm-init"}],
                "containers": [{"name": "web"}, {"name": "envoy"}]
            },
            "status": {
                "phase": "Running",
                "podIP": "10.0.0.5",
                "initContainerStatuses": [
                    {"name": "osm-init", "ready": false, "restartCount": 0, "image": "i", "imageID": ""}
                ],
                "containerStatuses": [
                    {"name": "web", "ready": ready[0], "restartCount": 0, "image": "i", "imageID": ""},
                    {"name": "envoy", "ready": ready[1], "restartCount": 0, "image": "i", "imageID": ""}
                ]
            }
        }))
    }

    #[test]
    fn test_pod_accessors() {
        let pod = meshed_pod([true, true]);
        assert_eq!(pod.pod_ref(), PodRef::new("ns1", "web-0"));
        assert!(pod.has_sidecar());
        assert_eq!(pod.label(PROXY_UUID_LABEL), Some("1234"));
        assert_eq!(pod.pod_ip(), Some("10.0.0.5"));
        assert_eq!(pod.service_account(), "web");
        assert_eq!(pod.app_container(), Some("web"));
        assert!(pod.annotation("missing").is_none());
    }

    #[test]
    fn test_readiness_ignores_init_containers() {
        assert!(meshed_pod([true, true]).readiness().is_ok());
        assert_eq!(
            meshed_pod([true, false]).readiness().unwrap_err(),
            "1/2 containers ready"
        );
    }

    #[test]
    fn test_readiness_requires_running_phase() {
        let pending = pod(json!({
            "metadata": {"name": "web-1", "namespace": "ns1"},
            "spec": {"containers": [{"name": "web"}]},
            "status": {"phase": "Pending"}
        }));
        assert_eq!(pending.readiness().unwrap_err(), "phase is Pending");
    }

    #[test]
    fn test_defaults_for_sparse_pod() {
        let sparse = pod(json!({"metadata": {"name": "bare"}}));
        assert_eq!(sparse.service_account(), "default");
        assert!(!sparse.has_sidecar());
        assert!(sparse.readiness().is_err());
    }
}
