/// Sequential check runner
use tracing::debug;

use super::error::CheckError;
use super::outcome::{Outcome, OutcomeType};
use super::Check;

/// Flattened result of one check, ready for printing
#[derive(Debug)]
pub struct PrintableRecord {
    pub description: String,
    pub status: OutcomeType,
    pub diagnostics: String,
    pub suggestion: Option<String>,
    pub error: Option<CheckError>,
}

impl PrintableRecord {
    fn new(check: &dyn Check, outcome: Outcome) -> Self {
        let suggestion = if outcome.is_fail() {
            check.suggestion().ok()
        } else {
            None
        };
        let (status, diagnostics, error) = outcome.into_parts();

        Self {
            description: check.description(),
            status,
            diagnostics,
            suggestion,
            error,
        }
    }
}

/// Executes checks one after another, in order
pub struct Runner;

impl Runner {
    /// Run every check and return one record per check, in input order
    pub async fn run(checks: Vec<Box<dyn Check>>) -> Vec<PrintableRecord> {
        let mut records = Vec::with_capacity(checks.len());

        for check in checks {
            let outcome = check.run().await.unwrap_or(Outcome::Unknown);
            debug!(
                "{} -> {}",
                check.description(),
                outcome.short_status()
            );
            records.push(PrintableRecord::new(check.as_ref(), outcome));
        }

        records
    }
}

/// Counts over a finished run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_records(records: &[PrintableRecord]) -> Self {
        let mut summary = RunSummary {
            total: records.len(),
            ..Default::default()
        };
        for record in records {
            match record.status {
                OutcomeType::Pass => summary.passed += 1,
                OutcomeType::Fail => summary.failed += 1,
                _ => {}
            }
        }
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::testing::Canned;
    use async_trait::async_trait;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    struct Suggests;

    #[async_trait]
    impl Check for Suggests {
        async fn run(&self) -> Option<Outcome> {
            Some(Outcome::fail(CheckError::EgressDisabled))
        }

        fn description(&self) -> String {
            "egress".to_string()
        }

        fn suggestion(&self) -> Result<String, CheckError> {
            Ok("enable egress".to_string())
        }
    }

    #[tokio::test]
    async fn test_order_and_length_preserved() {
        let checks: Vec<Box<dyn Check>> = vec![
            Box::new(Canned::new("first", || Some(Outcome::pass()))),
            Box::new(Canned::new("second", || {
                Some(Outcome::fail(CheckError::NoDestinationEndpoints))
            })),
            Box::new(Canned::new("third", || Some(Outcome::skip("not needed")))),
            Box::new(Canned::new("fourth", || Some(Outcome::info("fyi")))),
        ];

        let records = Runner::run(checks).await;
        let names: Vec<_> = records.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third", "fourth"]);

        let statuses: Vec<_> = records.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                OutcomeType::Pass,
                OutcomeType::Fail,
                OutcomeType::Skip,
                OutcomeType::Info
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_outcome_is_unknown() {
        let checks: Vec<Box<dyn Check>> = vec![Box::new(Canned::new("silent", || None))];
        let records = Runner::run(checks).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, OutcomeType::Unknown);
        assert_eq!(records[0].diagnostics, "");
        assert!(records[0].error.is_none());
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_checks() {
        let failing = Canned::new("failing", || {
            Some(Outcome::fail(anyhow::anyhow!("api server unreachable")))
        });
        let passing = Canned::new("passing", || Some(Outcome::pass()));
        let passing_runs = Arc::clone(&passing.runs);

        let checks: Vec<Box<dyn Check>> = vec![Box::new(failing), Box::new(passing)];
        let records = Runner::run(checks).await;

        assert_eq!(passing_runs.load(Ordering::SeqCst), 1);
        assert_eq!(records[0].status, OutcomeType::Fail);
        assert_eq!(
            records[0].error.as_ref().map(|e| e.to_string()).as_deref(),
            Some("api server unreachable")
        );
        assert_eq!(records[1].status, OutcomeType::Pass);
    }

    #[tokio::test]
    async fn test_suggestion_attached_to_failures_only() {
        let checks: Vec<Box<dyn Check>> = vec![
            Box::new(Suggests),
            Box::new(Canned::new("no suggestion", || {
                Some(Outcome::fail(CheckError::NoDestinationEndpoints))
            })),
        ];
        let records = Runner::run(checks).await;

        assert_eq!(records[0].suggestion.as_deref(), Some("enable egress"));
        assert!(records[1].suggestion.is_none());
    }

    #[tokio::test]
    async fn test_summary_counts() {
        let checks: Vec<Box<dyn Check>> = vec![
            Box::new(Canned::new("a", || Some(Outcome::pass()))),
            Box::new(Canned::new("b", || {
                Some(Outcome::fail(CheckError::EgressDisabled))
            })),
            Box::new(Canned::new("c", || None)),
        ];
        let records = Runner::run(checks).await;

        let summary = RunSummary::from_records(&records);
        assert_eq!(
            summary,
            RunSummary {
                total: 3,
                passed: 1,
                failed: 1
            }
        );
        assert!(summary.has_failures());
    }
}
