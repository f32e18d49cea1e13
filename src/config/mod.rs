/// Configuration management for osm-doctor
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable selecting the control plane namespace
pub const MESH_NAMESPACE_ENV: &str = "OSM_NAMESPACE";

/// Diagnostic settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DoctorConfig {
    /// Namespace the control plane is installed in
    pub mesh_namespace: String,

    /// Mesh name namespaces are labelled with
    pub mesh_name: String,

    /// Control plane deployment names
    pub controller_name: String,
    pub injector_name: String,
    pub bootstrap_name: String,

    /// Name of the MeshConfig resource in the mesh namespace
    pub mesh_config_name: String,

    /// Envoy admin port inside meshed pods
    pub envoy_admin_port: u16,

    /// Upper bound for sidecar admin requests, in seconds
    pub admin_timeout_secs: u64,

    /// kubectl binary to run
    pub kubectl_path: PathBuf,

    /// Kubeconfig path (falls back to KUBECONFIG / ~/.kube/config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kube_context: Option<String>,
}

impl Default for DoctorConfig {
    fn default() -> Self {
        Self {
            mesh_namespace: "osm-system".to_string(),
            mesh_name: "osm".to_string(),
            controller_name: "osm-controller".to_string(),
            injector_name: "osm-injector".to_string(),
            bootstrap_name: "osm-bootstrap".to_string(),
            mesh_config_name: "osm-mesh-config".to_string(),
            envoy_admin_port: 15000,
            admin_timeout_secs: 30,
            kubectl_path: PathBuf::from("kubectl"),
            kubeconfig: None,
            kube_context: None,
        }
    }
}

impl DoctorConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: DoctorConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise defaults; then apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(namespace) = lookup(MESH_NAMESPACE_ENV).filter(|ns| !ns.is_empty()) {
            self.mesh_namespace = namespace;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.mesh_namespace.is_empty() {
            anyhow::bail!("mesh_namespace cannot be empty");
        }

        if self.mesh_name.is_empty() {
            anyhow::bail!("mesh_name cannot be empty");
        }

        if self.envoy_admin_port == 0 {
            anyhow::bail!("envoy_admin_port must be non-zero");
        }

        if self.admin_timeout_secs == 0 {
            anyhow::bail!("admin_timeout_secs must be non-zero");
        }

        Ok(())
    }

    pub fn admin_timeout(&self) -> Duration {
        Duration::from_secs(self.admin_timeout_secs)
    }

    /// Generate an example configuration file
    pub fn example() -> Self {
        Self {
            kube_context: Some("my-cluster".to_string()),
            ..Self::default()
        }
    }
}
