/// Envoy sidecar configuration access
pub mod admin;
pub mod config_dump;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::k8s::PodRef;

pub use admin::AdminConfigGetter;
pub use config_dump::ConfigDump;

/// Source of a sidecar's configuration dump
#[async_trait]
pub trait ConfigGetter: Send + Sync {
    /// Unparsed `config_dump` JSON
    async fn raw_config(&self) -> Result<String>;

    async fn get_config(&self) -> Result<ConfigDump> {
        let json = self.raw_config().await?;
        ConfigDump::from_json(&json)
            .with_context(|| format!("Failed to parse Envoy config of {}", self.pod()))
    }

    /// Pod whose sidecar this getter reads
    fn pod(&self) -> &PodRef;
}

/// Shared handle to a getter; `None` when the pod has no sidecar to read from
pub type SharedGetter = Option<Arc<dyn ConfigGetter>>;
