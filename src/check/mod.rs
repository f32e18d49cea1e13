/// Check execution framework
pub mod error;
pub mod outcome;
pub mod runner;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

pub use error::CheckError;
pub use outcome::{Outcome, OutcomeType};
pub use runner::{PrintableRecord, RunSummary, Runner};

/// A unit of diagnostic work against the mesh or cluster
#[async_trait]
pub trait Check: Send + Sync {
    /// Perform the diagnostic. `None` is reported as `Unknown`.
    ///
    /// Failures are returned as `Outcome::Fail`, never raised.
    async fn run(&self) -> Option<Outcome>;

    /// What is being checked. Must not perform I/O.
    fn description(&self) -> String;

    /// Remediation hint for a failed run
    fn suggestion(&self) -> Result<String, CheckError> {
        Err(CheckError::NotImplemented)
    }

    /// Attempt automatic remediation
    fn fix_it(&self) -> Result<(), CheckError> {
        Err(CheckError::NotImplemented)
    }
}

/// Well-known dependency names
pub const DEP_KUBECTL: &str = "kubectl";
pub const DEP_CLUSTER: &str = "cluster";

/// Status of the prerequisites for one command invocation
#[derive(Debug, Default, Clone)]
pub struct Dependencies {
    status: BTreeMap<String, Result<(), String>>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn satisfied(&mut self, name: impl Into<String>) {
        self.status.insert(name.into(), Ok(()));
    }

    pub fn unsatisfied(&mut self, name: impl Into<String>, reason: impl Into<String>) {
        self.status.insert(name.into(), Err(reason.into()));
    }

    /// Record a dependency from the result of probing it
    pub fn record(&mut self, name: impl Into<String>, result: &anyhow::Result<()>) {
        match result {
            Ok(()) => self.satisfied(name),
            Err(e) => self.unsatisfied(name, format!("{:#}", e)),
        }
    }

    /// Why a dependency is not met. Unrecorded dependencies count as met.
    pub fn missing_reason(&self, name: &str) -> Option<&str> {
        match self.status.get(name) {
            Some(Err(reason)) => Some(reason),
            _ => None,
        }
    }

    pub fn is_satisfied(&self, name: &str) -> bool {
        self.missing_reason(name).is_none()
    }
}

/// Skips the wrapped check when any of its dependencies is unmet
pub struct Requires<C> {
    inner: C,
    needs: Vec<&'static str>,
    deps: Arc<Dependencies>,
}

impl<C: Check> Requires<C> {
    pub fn new(inner: C, needs: Vec<&'static str>, deps: Arc<Dependencies>) -> Self {
        Self { inner, needs, deps }
    }
}

#[async_trait]
impl<C: Check> Check for Requires<C> {
    async fn run(&self) -> Option<Outcome> {
        for name in &self.needs {
            if let Some(reason) = self.deps.missing_reason(name) {
                return Some(Outcome::skip(format!("{} unavailable: {}", name, reason)));
            }
        }
        self.inner.run().await
    }

    fn description(&self) -> String {
        self.inner.description()
    }

    fn suggestion(&self) -> Result<String, CheckError> {
        self.inner.suggestion()
    }

    fn fix_it(&self) -> Result<(), CheckError> {
        self.inner.fix_it()
    }
}

/// Box a check that needs kubectl and a reachable cluster
pub fn guarded<C: Check + 'static>(check: C, deps: &Arc<Dependencies>) -> Box<dyn Check> {
    Box::new(Requires::new(
        check,
        vec![DEP_KUBECTL, DEP_CLUSTER],
        Arc::clone(deps),
    ))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Check returning a canned outcome and counting its runs
    pub struct Canned {
        pub name: &'static str,
        pub outcome: fn() -> Option<Outcome>,
        pub runs: Arc<AtomicUsize>,
    }

    impl Canned {
        pub fn new(name: &'static str, outcome: fn() -> Option<Outcome>) -> Self {
            Self {
                name,
                outcome,
                runs: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Check for Canned {
        async fn run(&self) -> Option<Outcome> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }

        fn description(&self) -> String {
            self.name.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Canned;
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_defaults_are_not_implemented() {
        let check = Canned::new("noop", || Some(Outcome::pass()));
        assert!(check.suggestion().unwrap_err().is_not_implemented());
        assert!(check.fix_it().unwrap_err().is_not_implemented());
    }

    #[test]
    fn test_dependencies_record() {
        let mut deps = Dependencies::new();
        deps.record(DEP_KUBECTL, &Ok(()));
        deps.record(DEP_CLUSTER, &Err(anyhow::anyhow!("connection refused")));

        assert!(deps.is_satisfied(DEP_KUBECTL));
        assert!(!deps.is_satisfied(DEP_CLUSTER));
        assert_eq!(deps.missing_reason(DEP_CLUSTER), Some("connection refused"));
        assert!(deps.is_satisfied("never-recorded"));
    }

    #[tokio::test]
    async fn test_requires_skips_without_running_inner() {
        let mut deps = Dependencies::new();
        deps.unsatisfied(DEP_CLUSTER, "no kubeconfig");
        let inner = Canned::new("inner", || Some(Outcome::pass()));
        let runs = Arc::clone(&inner.runs);

        let check = Requires::new(inner, vec![DEP_CLUSTER], Arc::new(deps));
        let outcome = check.run().await.unwrap();

        assert_eq!(outcome.outcome_type(), OutcomeType::Skip);
        assert!(outcome.long_diagnostics().contains("no kubeconfig"));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(check.description(), "inner");
    }

    #[tokio::test]
    async fn test_requires_delegates_when_satisfied() {
        let mut deps = Dependencies::new();
        deps.satisfied(DEP_CLUSTER);
        let check = Requires::new(
            Canned::new("inner", || Some(Outcome::info("hello"))),
            vec![DEP_CLUSTER],
            Arc::new(deps),
        );

        let outcome = check.run().await.unwrap();
        assert_eq!(outcome.long_diagnostics(), "hello");
    }
}
