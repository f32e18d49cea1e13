/// HTTP reachability probe run from inside a meshed pod
use anyhow::Context;
use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::check::{Check, CheckError, Outcome};
use crate::k8s::{Cluster, PodExt, PodRef};

const PROBE_TIMEOUT_SECS: u32 = 10;

/// Requests `url` with curl from the source pod's app container
pub struct HttpProbe {
    cluster: Cluster,
    source: PodRef,
    url: Url,
}

impl HttpProbe {
    pub fn new(cluster: Cluster, source: PodRef, url: Url) -> Self {
        Self {
            cluster,
            source,
            url,
        }
    }

    fn command(&self) -> Vec<String> {
        vec![
            "curl".to_string(),
            "-s".to_string(),
            "-o".to_string(),
            "/dev/null".to_string(),
            "-w".to_string(),
            "%{http_code}".to_string(),
            "--max-time".to_string(),
            PROBE_TIMEOUT_SECS.to_string(),
            self.url.to_string(),
        ]
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let pod = self.cluster.pod(&self.source).await?;
        let container = pod.app_container();
        debug!("probing {} from {} ({:?})", self.url, self.source, container);

        let stdout = self
            .cluster
            .api()
            .exec(&self.source.namespace, &self.source.name, container, &self.command())
            .await?;
        let status: u16 = stdout
            .trim()
            .parse()
            .with_context(|| format!("Unexpected curl output '{}'", stdout.trim()))?;

        if status == 0 || status >= 400 {
            Err(CheckError::ProbeStatus { status })
        } else {
            Ok(Outcome::info(format!("HTTP {}", status)))
        }
    }
}

#[async_trait]
impl Check for HttpProbe {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        format!("Probing {} from {}", self.url, self.source)
    }

    fn suggestion(&self) -> Result<String, CheckError> {
        Ok("Check that egress is enabled and that an egress policy allows this destination".to_string())
    }
}
