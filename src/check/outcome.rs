/// Typed results of running a check
use std::fmt;

use super::error::CheckError;

/// Kind of outcome, used for rendering and summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeType {
    Pass,
    Fail,
    Info,
    Skip,
    Unknown,
}

impl OutcomeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeType::Pass => "Pass",
            OutcomeType::Fail => "Fail",
            OutcomeType::Info => "Info",
            OutcomeType::Skip => "Skip",
            OutcomeType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for OutcomeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single check execution
#[derive(Debug)]
pub enum Outcome {
    /// Check succeeded
    Pass { message: Option<String> },

    /// Check detected a problem, or could not run
    Fail { error: CheckError },

    /// Neither pass nor fail, just information for the operator
    Info { diagnostics: String },

    /// Check was intentionally not executed
    Skip { reason: String },

    /// No outcome was produced
    Unknown,
}

impl Outcome {
    pub fn pass() -> Self {
        Outcome::Pass { message: None }
    }

    pub fn pass_with(message: impl Into<String>) -> Self {
        Outcome::Pass {
            message: Some(message.into()),
        }
    }

    pub fn fail(error: impl Into<CheckError>) -> Self {
        Outcome::Fail {
            error: error.into(),
        }
    }

    pub fn info(diagnostics: impl Into<String>) -> Self {
        Outcome::Info {
            diagnostics: diagnostics.into(),
        }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Outcome::Skip {
            reason: reason.into(),
        }
    }

    pub fn outcome_type(&self) -> OutcomeType {
        match self {
            Outcome::Pass { .. } => OutcomeType::Pass,
            Outcome::Fail { .. } => OutcomeType::Fail,
            Outcome::Info { .. } => OutcomeType::Info,
            Outcome::Skip { .. } => OutcomeType::Skip,
            Outcome::Unknown => OutcomeType::Unknown,
        }
    }

    pub fn short_status(&self) -> &'static str {
        self.outcome_type().as_str()
    }

    /// Long-form text, empty when the variant carries none
    pub fn long_diagnostics(&self) -> &str {
        match self {
            Outcome::Pass { message } => message.as_deref().unwrap_or(""),
            Outcome::Info { diagnostics } => diagnostics,
            Outcome::Skip { reason } => reason,
            Outcome::Fail { .. } | Outcome::Unknown => "",
        }
    }

    pub fn error(&self) -> Option<&CheckError> {
        match self {
            Outcome::Fail { error } => Some(error),
            _ => None,
        }
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Outcome::Fail { .. })
    }

    /// Split into the pieces a printable record keeps
    pub(crate) fn into_parts(self) -> (OutcomeType, String, Option<CheckError>) {
        let outcome_type = self.outcome_type();
        match self {
            Outcome::Pass { message } => (outcome_type, message.unwrap_or_default(), None),
            Outcome::Fail { error } => (outcome_type, String::new(), Some(error)),
            Outcome::Info { diagnostics } => (outcome_type, diagnostics, None),
            Outcome::Skip { reason } => (outcome_type, reason, None),
            Outcome::Unknown => (outcome_type, String::new(), None),
        }
    }
}

impl From<Result<Outcome, CheckError>> for Outcome {
    fn from(result: Result<Outcome, CheckError>) -> Self {
        result.unwrap_or_else(Outcome::fail)
    }
}
