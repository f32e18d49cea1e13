/// Support bundle collection
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

use crate::checks::Mesh;
use crate::envoy::ConfigGetter;
use crate::k8s::{Cluster, ListQuery, PodExt, PodRef};

/// Sidecars read at the same time
const DUMP_CONCURRENCY: usize = 4;

/// Builds a config getter for a meshed pod
pub type GetterFactory = Box<dyn Fn(&PodRef) -> Result<Arc<dyn ConfigGetter>> + Send + Sync>;

/// Index written as `summary.json` at the bundle root
#[derive(Debug, Serialize, Deserialize)]
pub struct BundleSummary {
    pub created_at: DateTime<Utc>,
    pub mesh_namespace: String,
    pub mesh_name: String,
    pub controller_version: Option<String>,
    pub controller_logs: Vec<String>,
    pub config_dumps: Vec<String>,
    pub errors: Vec<String>,
}

pub struct Collector {
    cluster: Cluster,
    mesh: Mesh,
    getters: GetterFactory,
}

impl Collector {
    pub fn new(cluster: Cluster, mesh: Mesh, getters: GetterFactory) -> Self {
        Self {
            cluster,
            mesh,
            getters,
        }
    }

    /// Write a timestamped bundle under `output` and return its directory
    pub async fn collect(&self, output: &Path) -> Result<PathBuf> {
        let created_at = Utc::now();
        let dir = output.join(format!("osm-doctor-{}", created_at.format("%Y%m%d-%H%M%S")));
        for sub in ["logs", "config_dumps"] {
            fs::create_dir_all(dir.join(sub))
                .await
                .with_context(|| format!("Failed to create {}", dir.join(sub).display()))?;
        }

        let mut summary = BundleSummary {
            created_at,
            mesh_namespace: self.mesh.namespace.clone(),
            mesh_name: self.mesh.name.clone(),
            controller_version: None,
            controller_logs: Vec::new(),
            config_dumps: Vec::new(),
            errors: Vec::new(),
        };

        match self.mesh.controller_version(&self.cluster).await {
            Ok(version) => summary.controller_version = Some(version.to_string()),
            Err(e) => summary.errors.push(format!("{:#}", e)),
        }

        self.collect_logs(&dir, &mut summary).await?;
        self.collect_config_dumps(&dir, &mut summary).await?;

        let json = serde_json::to_string_pretty(&summary)?;
        fs::write(dir.join("summary.json"), json)
            .await
            .context("Failed to write summary.json")?;

        info!(
            "Bundle written to {} ({} logs, {} config dumps, {} errors)",
            dir.display(),
            summary.controller_logs.len(),
            summary.config_dumps.len(),
            summary.errors.len()
        );
        Ok(dir)
    }

    async fn collect_logs(&self, dir: &Path, summary: &mut BundleSummary) -> Result<()> {
        let pods = self.mesh.controller_pods(&self.cluster).await?;
        for pod in &pods {
            let pod = pod.pod_ref();
            match self
                .cluster
                .api()
                .logs(&pod.namespace, &pod.name, None)
                .await
            {
                Ok(logs) => {
                    let file = format!("{}.log", pod.name);
                    fs::write(dir.join("logs").join(&file), logs)
                        .await
                        .with_context(|| format!("Failed to write logs for {}", pod))?;
                    summary.controller_logs.push(file);
                }
                Err(e) => {
                    warn!("Could not read logs of {}: {:#}", pod, e);
                    summary.errors.push(format!("{:#}", e));
                }
            }
        }
        Ok(())
    }

    /// Sidecar pods in every namespace the mesh monitors
    async fn meshed_pods(&self) -> Result<Vec<PodRef>> {
        let namespaces = self
            .cluster
            .namespaces(&self.mesh.monitored_selector())
            .await?;

        let mut meshed = Vec::new();
        for namespace in namespaces.iter().filter_map(|ns| ns.metadata.name.as_deref()) {
            let pods = self.cluster.pods(&ListQuery::namespaced(namespace)).await?;
            meshed.extend(pods.iter().filter(|p| p.has_sidecar()).map(|p| p.pod_ref()));
        }
        Ok(meshed)
    }

    async fn dump_one(&self, dir: &Path, pod: &PodRef) -> Result<String> {
        let getter = (self.getters)(pod)?;
        let json = getter.raw_config().await?;
        let file = format!("{}_{}.json", pod.namespace, pod.name);
        fs::write(dir.join("config_dumps").join(&file), json)
            .await
            .with_context(|| format!("Failed to write config dump for {}", pod))?;
        Ok(file)
    }

    async fn collect_config_dumps(&self, dir: &Path, summary: &mut BundleSummary) -> Result<()> {
        let pods = self.meshed_pods().await?;
        info!("Collecting config dumps from {} sidecars", pods.len());

        let results: Vec<(PodRef, Result<String>)> = stream::iter(pods)
            .map(|pod| async move {
                let result = self.dump_one(dir, &pod).await;
                (pod, result)
            })
            .buffer_unordered(DUMP_CONCURRENCY)
            .collect()
            .await;

        for (pod, result) in results {
            match result {
                Ok(file) => summary.config_dumps.push(file),
                Err(e) => {
                    warn!("Could not dump config of {}: {:#}", pod, e);
                    summary.errors.push(format!("{}: {:#}", pod, e));
                }
            }
        }
        summary.config_dumps.sort();
        Ok(())
    }
}
