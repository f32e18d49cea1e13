/// Envoy admin interface client
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::ConfigGetter;
use crate::k8s::{Kubectl, PodRef, PortForward};
use crate::utils::polling::PollingConfig;

/// Reads a sidecar's configuration through a port-forward to its admin port
#[derive(Clone)]
pub struct AdminConfigGetter {
    kubectl: Kubectl,
    pod: PodRef,
    admin_port: u16,
    timeout: Duration,
    client: Client,
}

impl AdminConfigGetter {
    pub fn new(kubectl: Kubectl, pod: PodRef, admin_port: u16, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            kubectl,
            pod,
            admin_port,
            timeout,
            client,
        })
    }

    async fn fetch(&self, base: &str, path: &str) -> Result<String> {
        let url = format!("{}{}", base, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach Envoy admin for {}", self.pod))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Envoy admin {} returned {}: {}", path, status, body.trim());
        }

        response
            .text()
            .await
            .context("Failed to read Envoy admin response")
    }
}

#[async_trait]
impl ConfigGetter for AdminConfigGetter {
    /// `config_dump` including EDS, read through a fresh port-forward
    async fn raw_config(&self) -> Result<String> {
        let forward =
            PortForward::open(&self.kubectl, &self.pod, self.admin_port, self.timeout).await?;
        let base = format!("http://127.0.0.1:{}", forward.local_port());

        PollingConfig::new(
            self.timeout,
            Duration::from_millis(250),
            format!("Waiting for Envoy admin on {}", self.pod),
        )
        .poll_until_ok(|| async { self.fetch(&base, "/ready").await.map(|_| true) })
        .await?;

        self.fetch(&base, "/config_dump?include_eds").await
    }

    fn pod(&self) -> &PodRef {
        &self.pod
    }
}
