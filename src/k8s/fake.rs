/// In-memory `ClusterApi` for tests
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

use super::client::{ClusterApi, KubeError, Kubectl, ListQuery};
use super::resources::Cluster;

#[derive(Default, Clone)]
pub struct FakeCluster {
    objects: Vec<(String, Value)>,
    exec_output: HashMap<String, Result<String, String>>,
    logs: HashMap<String, String>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource of `kind`
    pub fn with(mut self, kind: &str, object: Value) -> Self {
        self.objects.push((kind.to_string(), object));
        self
    }

    /// Canned stdout for any exec into `namespace/pod`
    pub fn with_exec(mut self, pod: &str, output: Result<&str, &str>) -> Self {
        self.exec_output.insert(
            pod.to_string(),
            output.map(str::to_string).map_err(str::to_string),
        );
        self
    }

    pub fn with_logs(mut self, pod: &str, logs: &str) -> Self {
        self.logs.insert(pod.to_string(), logs.to_string());
        self
    }

    pub fn cluster(self) -> Cluster {
        Cluster::new(Arc::new(self))
    }

    fn field<'a>(object: &'a Value, path: &str) -> Option<&'a Value> {
        path.split('.').try_fold(object, |value, key| value.get(key))
    }

    fn matches_selector(object: &Value, root: &str, selector: Option<&str>) -> bool {
        let Some(selector) = selector else {
            return true;
        };
        selector
            .split(',')
            .filter(|term| !term.is_empty())
            .all(|term| match term.split_once('=') {
                Some((key, expected)) => {
                    let value = if root.is_empty() {
                        Self::field(object, key)
                    } else {
                        Self::field(object, root).and_then(|labels| labels.get(key))
                    };
                    value.and_then(Value::as_str) == Some(expected)
                }
                None => Self::field(object, root)
                    .and_then(|labels| labels.get(term))
                    .is_some(),
            })
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn get(&self, kind: &str, namespace: Option<&str>, name: &str) -> Result<Value> {
        self.objects
            .iter()
            .filter(|(k, _)| k == kind)
            .map(|(_, object)| object)
            .find(|object| {
                Self::field(object, "metadata.name").and_then(Value::as_str) == Some(name)
                    && Self::field(object, "metadata.namespace").and_then(Value::as_str)
                        == namespace
            })
            .cloned()
            .ok_or_else(|| {
                KubeError::NotFound {
                    kind: kind.to_string(),
                    name: name.to_string(),
                }
                .into()
            })
    }

    async fn list(&self, kind: &str, query: &ListQuery) -> Result<Vec<Value>> {
        Ok(self
            .objects
            .iter()
            .filter(|(k, _)| k == kind)
            .map(|(_, object)| object)
            .filter(|object| match &query.namespace {
                Some(ns) => {
                    Self::field(object, "metadata.namespace").and_then(Value::as_str)
                        == Some(ns.as_str())
                }
                None => true,
            })
            .filter(|object| {
                Self::matches_selector(object, "metadata.labels", query.label_selector.as_deref())
            })
            .filter(|object| Self::matches_selector(object, "", query.field_selector.as_deref()))
            .cloned()
            .collect())
    }

    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        _container: Option<&str>,
        _command: &[String],
    ) -> Result<String> {
        match self.exec_output.get(&format!("{}/{}", namespace, pod)) {
            Some(Ok(stdout)) => Ok(stdout.clone()),
            Some(Err(stderr)) => anyhow::bail!("{}", stderr),
            None => anyhow::bail!("exec into {}/{} not configured", namespace, pod),
        }
    }

    async fn logs(&self, namespace: &str, pod: &str, _container: Option<&str>) -> Result<String> {
        Ok(self
            .logs
            .get(&format!("{}/{}", namespace, pod))
            .cloned()
            .unwrap_or_default())
    }
}

/// A `Kubectl` whose binary is a shell script with `body`, written into `dir`
pub fn scripted_kubectl(dir: &Path, body: &str) -> Kubectl {
    let path = dir.join("kubectl");
    std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    Kubectl::default().with_binary(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_list_filters() {
        let fake = FakeCluster::new()
            .with(
                "pods",
                json!({"metadata": {"name": "a", "namespace": "ns1", "labels": {"app": "web"}}}),
            )
            .with(
                "pods",
                json!({"metadata": {"name": "b", "namespace": "ns1", "labels": {"app": "api"}}}),
            )
            .with(
                "events",
                json!({"metadata": {"name": "e", "namespace": "ns1"}, "type": "Warning"}),
            );

        let web = fake
            .list("pods", &ListQuery::namespaced("ns1").labels("app=web"))
            .await
            .unwrap();
        assert_eq!(web.len(), 1);

        let warnings = fake
            .list("events", &ListQuery::all().fields("type=Warning"))
            .await
            .unwrap();
        assert_eq!(warnings.len(), 1);

        let other_ns = fake.list("pods", &ListQuery::namespaced("ns2")).await.unwrap();
        assert!(other_ns.is_empty());
    }
}
