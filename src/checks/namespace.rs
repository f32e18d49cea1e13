/// Namespace membership in the mesh
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;

use crate::check::{Check, CheckError, Outcome};
use crate::k8s::{Cluster, PodExt, PodRef};

pub const MONITORED_BY_LABEL: &str = "openservicemesh.io/monitored-by";
pub const INJECTION_ANNOTATION: &str = "openservicemesh.io/sidecar-injection";

fn monitored_by(namespace: &Namespace) -> Option<&str> {
    namespace
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(MONITORED_BY_LABEL))
        .map(String::as_str)
}

/// Value of the injection annotation on a namespace, if any
pub fn injection_setting(namespace: &Namespace) -> Option<&str> {
    namespace
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(INJECTION_ANNOTATION))
        .map(String::as_str)
}

pub(crate) fn is_enabled(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "enabled" | "yes" | "true")
}

/// Namespace is labelled as monitored by the expected mesh
pub struct NamespaceMonitored {
    cluster: Cluster,
    namespace: String,
    mesh_name: String,
}

impl NamespaceMonitored {
    pub fn new(cluster: Cluster, namespace: impl Into<String>, mesh_name: impl Into<String>) -> Self {
        Self {
            cluster,
            namespace: namespace.into(),
            mesh_name: mesh_name.into(),
        }
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let namespace = self.cluster.namespace(&self.namespace).await?;
        if monitored_by(&namespace) == Some(self.mesh_name.as_str()) {
            Ok(Outcome::pass())
        } else {
            Err(CheckError::NamespaceNotMonitored {
                namespace: self.namespace.clone(),
                mesh: self.mesh_name.clone(),
            })
        }
    }
}

#[async_trait]
impl Check for NamespaceMonitored {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        format!(
            "Checking whether namespace {} is monitored by mesh {}",
            self.namespace, self.mesh_name
        )
    }

    fn suggestion(&self) -> Result<String, CheckError> {
        Ok(format!(
            "Add the namespace to the mesh: osm namespace add {} --mesh-name {}",
            self.namespace, self.mesh_name
        ))
    }
}

/// Sidecar injection is enabled for a pod's namespace, unless the pod overrides it
pub struct SidecarInjection {
    cluster: Cluster,
    pod: PodRef,
}

impl SidecarInjection {
    pub fn for_pod(cluster: Cluster, pod: PodRef) -> Self {
        Self { cluster, pod }
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let pod = self.cluster.pod(&self.pod).await?;
        if let Some(value) = pod.annotation(INJECTION_ANNOTATION) {
            return if is_enabled(value) {
                Ok(Outcome::pass_with("enabled by pod annotation"))
            } else {
                Err(CheckError::InjectionDisabled {
                    target: format!("pod {}", self.pod),
                })
            };
        }

        let namespace = self.cluster.namespace(&self.pod.namespace).await?;
        match injection_setting(&namespace) {
            Some(value) if is_enabled(value) => Ok(Outcome::pass()),
            _ => Err(CheckError::InjectionDisabled {
                target: format!("namespace {}", self.pod.namespace),
            }),
        }
    }
}

#[async_trait]
impl Check for SidecarInjection {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        format!("Checking whether sidecar injection is enabled for pod {}", self.pod)
    }

    fn suggestion(&self) -> Result<String, CheckError> {
        Ok(format!(
            "Annotate the namespace: kubectl annotate namespace {} {}=enabled",
            self.pod.namespace, INJECTION_ANNOTATION
        ))
    }
}

/// Source and destination namespaces belong to the same mesh
pub struct SameMesh {
    cluster: Cluster,
    source: String,
    destination: String,
}

impl SameMesh {
    pub fn new(cluster: Cluster, source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            cluster,
            source: source.into(),
            destination: destination.into(),
        }
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let source = self.cluster.namespace(&self.source).await?;
        let destination = self.cluster.namespace(&self.destination).await?;

        let source_mesh = monitored_by(&source).unwrap_or_default();
        let destination_mesh = monitored_by(&destination).unwrap_or_default();

        if !source_mesh.is_empty() && source_mesh == destination_mesh {
            Ok(Outcome::pass_with(format!("both in mesh {}", source_mesh)))
        } else {
            Err(CheckError::MeshMismatch {
                source_mesh: display_mesh(source_mesh),
                destination_mesh: display_mesh(destination_mesh),
            })
        }
    }
}

fn display_mesh(mesh: &str) -> String {
    if mesh.is_empty() {
        "<none>".to_string()
    } else {
        mesh.to_string()
    }
}

#[async_trait]
impl Check for SameMesh {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        format!(
            "Checking whether namespaces {} and {} are in the same mesh",
            self.source, self.destination
        )
    }
}
