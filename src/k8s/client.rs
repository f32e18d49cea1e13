/// Kubernetes API access through kubectl
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use crate::utils::command::{check_tool_installed, CommandBuilder};

/// Errors the cluster client classifies itself
#[derive(Debug, Error)]
pub enum KubeError {
    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },
}

/// Returns true when the error chain contains a not-found response
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| matches!(cause.downcast_ref::<KubeError>(), Some(KubeError::NotFound { .. })))
}

/// Selectors for a list request
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub namespace: Option<String>,
    pub label_selector: Option<String>,
    pub field_selector: Option<String>,
}

impl ListQuery {
    /// All namespaces
    pub fn all() -> Self {
        Self::default()
    }

    pub fn namespaced(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    pub fn labels(mut self, selector: impl Into<String>) -> Self {
        self.label_selector = Some(selector.into());
        self
    }

    pub fn fields(mut self, selector: impl Into<String>) -> Self {
        self.field_selector = Some(selector.into());
        self
    }
}

/// Generic read access to cluster resources
///
/// Resources are exchanged as raw JSON; typed access lives in
/// [`crate::k8s::resources::Cluster`].
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Fetch one resource. Cluster-scoped kinds pass `None` as namespace.
    async fn get(&self, kind: &str, namespace: Option<&str>, name: &str) -> Result<Value>;

    /// List resources of a kind
    async fn list(&self, kind: &str, query: &ListQuery) -> Result<Vec<Value>>;

    /// Run a command inside a pod container and return its stdout
    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        command: &[String],
    ) -> Result<String>;

    /// Fetch the logs of a pod container
    async fn logs(&self, namespace: &str, pod: &str, container: Option<&str>) -> Result<String>;
}

#[derive(Deserialize)]
struct ItemList {
    #[serde(default)]
    items: Vec<Value>,
}

/// `ClusterApi` backed by the kubectl binary
#[derive(Debug, Clone)]
pub struct Kubectl {
    binary: PathBuf,
    kubeconfig: Option<PathBuf>,
    context: Option<String>,
}

impl Default for Kubectl {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl Kubectl {
    pub fn new(kubeconfig: Option<PathBuf>, context: Option<String>) -> Self {
        Self {
            binary: PathBuf::from("kubectl"),
            kubeconfig,
            context,
        }
    }

    /// Run `binary` instead of the kubectl found on PATH
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Check if kubectl is installed
    pub async fn check_installed(&self) -> Result<()> {
        check_tool_installed(
            &self.binary.to_string_lossy(),
            &["version", "--client"],
            "https://kubernetes.io/docs/tasks/tools/",
        )
        .await
    }

    /// Base kubectl invocation with kubeconfig and context applied
    pub fn command(&self) -> CommandBuilder {
        let mut builder = CommandBuilder::new(&self.binary);
        if let Some(path) = &self.kubeconfig {
            builder = builder.kubeconfig(path);
        }
        builder.opt_arg("--context", self.context.as_deref())
    }

    /// Verify the API server answers
    pub async fn ping(&self) -> Result<()> {
        self.command()
            .args(["get", "--raw", "/readyz"])
            .context("Kubernetes API server is not reachable")
            .run()
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl ClusterApi for Kubectl {
    async fn get(&self, kind: &str, namespace: Option<&str>, name: &str) -> Result<Value> {
        let output = self
            .command()
            .args(["get", kind, name, "-o", "json"])
            .opt_arg("-n", namespace)
            .output()
            .await?;

        if !output.success {
            if output.stderr.contains("NotFound") || output.stderr.contains("not found") {
                return Err(KubeError::NotFound {
                    kind: kind.to_string(),
                    name: name.to_string(),
                }
                .into());
            }
            anyhow::bail!("Failed to get {} {}: {}", kind, name, output.stderr.trim());
        }

        serde_json::from_str(&output.stdout)
            .with_context(|| format!("Failed to parse {} {}", kind, name))
    }

    async fn list(&self, kind: &str, query: &ListQuery) -> Result<Vec<Value>> {
        let mut builder = self.command().args(["get", kind, "-o", "json"]);
        builder = match &query.namespace {
            Some(namespace) => builder.arg("-n").arg(namespace),
            None => builder.arg("--all-namespaces"),
        };
        let stdout = builder
            .opt_arg("-l", query.label_selector.as_deref())
            .opt_arg("--field-selector", query.field_selector.as_deref())
            .context(format!("Failed to list {}", kind))
            .run()
            .await?;

        let list: ItemList = serde_json::from_str(&stdout)
            .with_context(|| format!("Failed to parse {} list", kind))?;
        debug!("listed {} {}", list.items.len(), kind);
        Ok(list.items)
    }

    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        command: &[String],
    ) -> Result<String> {
        self.command()
            .args(["exec", "-n", namespace, pod])
            .opt_arg("-c", container)
            .arg("--")
            .args(command)
            .context(format!("Failed to exec in pod {}/{}", namespace, pod))
            .run()
            .await
    }

    async fn logs(&self, namespace: &str, pod: &str, container: Option<&str>) -> Result<String> {
        self.command()
            .args(["logs", "-n", namespace, pod])
            .opt_arg("-c", container)
            .context(format!("Failed to get logs for pod {}/{}", namespace, pod))
            .run()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_check_kubectl() {
        // Informational: kubectl is usually absent in test environments
        let result = Kubectl::default().check_installed().await;
        if result.is_err() {
            println!("kubectl not installed (expected in test environment)");
        }
    }

    #[test]
    fn test_not_found_survives_context() {
        let err: anyhow::Error = KubeError::NotFound {
            kind: "pods".to_string(),
            name: "web".to_string(),
        }
        .into();
        let err = err.context("loading destination pod");
        assert!(is_not_found(&err));
        assert!(!is_not_found(&anyhow::anyhow!("timeout")));
    }

    #[test]
    fn test_list_query_builder() {
        let query = ListQuery::namespaced("osm-system")
            .labels("app=osm-controller")
            .fields("type=Warning");
        assert_eq!(query.namespace.as_deref(), Some("osm-system"));
        assert_eq!(query.label_selector.as_deref(), Some("app=osm-controller"));
        assert_eq!(query.field_selector.as_deref(), Some("type=Warning"));
        assert!(ListQuery::all().namespace.is_none());
    }

    #[tokio::test]
    async fn test_custom_binary_is_checked() {
        let kubectl = Kubectl::default().with_binary("/nonexistent/kubectl");
        let err = kubectl.check_installed().await.unwrap_err();
        assert!(err.to_string().starts_with("/nonexistent/kubectl is not installed"));
    }
}
