/// Warning events reported by Kubernetes
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Event;

use crate::check::{Check, CheckError, Outcome};
use crate::k8s::{Cluster, ListQuery};

/// Events listed in the diagnostics before truncating
const MAX_LISTED: usize = 10;

fn describe(event: &Event) -> String {
    let object = event
        .involved_object
        .name
        .as_deref()
        .unwrap_or("<unknown>");
    let reason = event.reason.as_deref().unwrap_or("");
    let message = event.message.as_deref().unwrap_or("").trim();
    match event.count {
        Some(count) if count > 1 => format!("{} {}: {} (x{})", object, reason, message, count),
        _ => format!("{} {}: {}", object, reason, message),
    }
}

/// Lists Warning events in a namespace, optionally for one object
pub struct WarningEvents {
    cluster: Cluster,
    namespace: String,
    involved: Option<String>,
}

impl WarningEvents {
    pub fn in_namespace(cluster: Cluster, namespace: impl Into<String>) -> Self {
        Self {
            cluster,
            namespace: namespace.into(),
            involved: None,
        }
    }

    pub fn for_object(cluster: Cluster, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            cluster,
            namespace: namespace.into(),
            involved: Some(name.into()),
        }
    }

    fn field_selector(&self) -> String {
        match &self.involved {
            Some(name) => format!("type=Warning,involvedObject.name={}", name),
            None => "type=Warning".to_string(),
        }
    }

    async fn evaluate(&self) -> Result<Outcome, CheckError> {
        let query = ListQuery::namespaced(&self.namespace).fields(self.field_selector());
        let events = self.cluster.events(&query).await?;
        if events.is_empty() {
            return Ok(Outcome::pass());
        }

        let mut lines: Vec<String> = events.iter().take(MAX_LISTED).map(describe).collect();
        if events.len() > MAX_LISTED {
            lines.push(format!("... and {} more", events.len() - MAX_LISTED));
        }
        Ok(Outcome::info(lines.join("\n")))
    }
}

#[async_trait]
impl Check for WarningEvents {
    async fn run(&self) -> Option<Outcome> {
        Some(self.evaluate().await.into())
    }

    fn description(&self) -> String {
        match &self.involved {
            Some(name) => format!(
                "Checking for warning events on {}/{}",
                self.namespace, name
            ),
            None => format!("Checking for warning events in namespace {}", self.namespace),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::OutcomeType;
    use crate::k8s::fake::FakeCluster;
    use crate::k8s::resources::EVENTS;
    use serde_json::{json, Value};

    fn event(name: &str, object: &str, kind: &str, reason: &str, count: i32) -> Value {
        json!({
            "metadata": {"name": name, "namespace": "ns1"},
            "involvedObject": {"kind": "Pod", "name": object, "namespace": "ns1"},
            "type": kind,
            "reason": reason,
            "message": format!("{} happened", reason),
            "count": count
        })
    }

    #[tokio::test]
    async fn test_no_warnings_passes() {
        let cluster = FakeCluster::new()
            .with(EVENTS, event("e1", "api-0", "Normal", "Pulled", 1))
            .cluster();
        let outcome = WarningEvents::in_namespace(cluster, "ns1").run().await.unwrap();
        assert_eq!(outcome.outcome_type(), OutcomeType::Pass);
    }

    #[tokio::test]
    async fn test_warnings_are_info() {
        let cluster = FakeCluster::new()
            .with(EVENTS, event("e1", "api-0", "Warning", "BackOff", 4))
            .with(EVENTS, event("e2", "web-0", "Warning", "Unhealthy", 1))
            .cluster();

        let outcome = WarningEvents::for_object(cluster.clone(), "ns1", "api-0")
            .run()
            .await
            .unwrap();
        assert_eq!(outcome.outcome_type(), OutcomeType::Info);
        assert_eq!(outcome.long_diagnostics(), "api-0 BackOff: BackOff happened (x4)");

        let outcome = WarningEvents::in_namespace(cluster, "ns1").run().await.unwrap();
        assert_eq!(outcome.long_diagnostics().lines().count(), 2);
    }

    #[tokio::test]
    async fn test_long_lists_are_truncated() {
        let fake = (0..12).fold(FakeCluster::new(), |fake, i| {
            fake.with(EVENTS, event(&format!("e{}", i), "api-0", "Warning", "BackOff", 1))
        });
        let outcome = WarningEvents::in_namespace(fake.cluster(), "ns1")
            .run()
            .await
            .unwrap();
        let diagnostics = outcome.long_diagnostics();
        assert_eq!(diagnostics.lines().count(), MAX_LISTED + 1);
        assert!(diagnostics.ends_with("... and 2 more"));
    }
}
