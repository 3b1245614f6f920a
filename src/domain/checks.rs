//! Core domain models for checklist results and run reports
//!
//! Architecture: Rich Domain Models - results are immutable values, reports fold over them
//! - CheckResult is produced once per rule evaluation and never mutated afterwards
//! - ModuleReport derives its counts from its results instead of threading counters
//! - RunReport aggregates module reports into the final progress summary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single checklist item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Requirement satisfied
    Pass,
    /// Requirement missing or disabled
    Fail,
    /// Advisory gap, never affects the totals
    Warn,
    /// Informational note, never affects the totals
    Info,
}

impl Outcome {
    /// Whether this outcome counts toward the passed or failed totals
    pub fn is_tallied(self) -> bool {
        matches!(self, Self::Pass | Self::Fail)
    }

    /// Tag used in the console report
    pub fn tag(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Warn => "WARN",
            Self::Info => "INFO",
        }
    }

    /// Lowercase name for machine-readable output
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Warn => "warn",
            Self::Info => "info",
        }
    }
}

/// Result of evaluating one rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Identifier of the rule that produced this result
    pub rule_id: String,
    /// Outcome of the evaluation
    pub outcome: Outcome,
    /// Human-readable detail line
    pub detail: String,
}

impl CheckResult {
    pub fn new(rule_id: impl Into<String>, outcome: Outcome, detail: impl Into<String>) -> Self {
        Self { rule_id: rule_id.into(), outcome, detail: detail.into() }
    }

    pub fn pass(rule_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(rule_id, Outcome::Pass, detail)
    }

    pub fn fail(rule_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(rule_id, Outcome::Fail, detail)
    }

    pub fn warn(rule_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(rule_id, Outcome::Warn, detail)
    }

    pub fn info(rule_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(rule_id, Outcome::Info, detail)
    }
}

/// Passed/failed tally, built by folding over results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub passed: usize,
    pub failed: usize,
    pub warnings: usize,
}

impl Tally {
    /// Fold a sequence of outcomes into a tally
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        outcomes.into_iter().fold(Self::default(), |tally, outcome| tally.with(outcome))
    }

    /// Return a new tally including one more outcome
    pub fn with(self, outcome: Outcome) -> Self {
        match outcome {
            Outcome::Pass => Self { passed: self.passed + 1, ..self },
            Outcome::Fail => Self { failed: self.failed + 1, ..self },
            Outcome::Warn => Self { warnings: self.warnings + 1, ..self },
            Outcome::Info => self,
        }
    }

    /// Combine two tallies
    pub fn combine(self, other: Self) -> Self {
        Self {
            passed: self.passed + other.passed,
            failed: self.failed + other.failed,
            warnings: self.warnings + other.warnings,
        }
    }

    /// Number of tallied checks (warnings and info excluded)
    pub fn total(&self) -> usize {
        self.passed + self.failed
    }
}

/// Results of evaluating one module's rule set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleReport {
    /// Module name (e.g. "backend")
    pub module_name: String,
    /// Section title for the console report
    pub title: String,
    /// Results in rule declaration order
    pub results: Vec<CheckResult>,
    pub passed_count: usize,
    pub failed_count: usize,
}

impl ModuleReport {
    /// Build a report; the counts are derived from the results
    pub fn new(
        module_name: impl Into<String>,
        title: impl Into<String>,
        results: Vec<CheckResult>,
    ) -> Self {
        let tally = Tally::from_outcomes(results.iter().map(|r| r.outcome));
        Self {
            module_name: module_name.into(),
            title: title.into(),
            results,
            passed_count: tally.passed,
            failed_count: tally.failed,
        }
    }

    pub fn tally(&self) -> Tally {
        Tally::from_outcomes(self.results.iter().map(|r| r.outcome))
    }

    pub fn find(&self, rule_id: &str) -> Option<&CheckResult> {
        self.results.iter().find(|r| r.rule_id == rule_id)
    }
}

/// Summary statistics across every module of a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub warnings: usize,
    /// Percentage of tallied checks that passed (0.0 when nothing was checked)
    pub percentage: f64,
    /// Timestamp when the run finished
    pub checked_at: DateTime<Utc>,
}

/// Complete report for one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub modules: Vec<ModuleReport>,
    pub summary: RunSummary,
}

impl RunReport {
    /// Aggregate module reports into a run report
    pub fn from_modules(modules: Vec<ModuleReport>) -> Self {
        let tally = modules.iter().map(ModuleReport::tally).fold(Tally::default(), Tally::combine);
        let total = tally.total();
        let percentage =
            if total == 0 { 0.0 } else { tally.passed as f64 / total as f64 * 100.0 };

        Self {
            modules,
            summary: RunSummary {
                total,
                passed: tally.passed,
                failed: tally.failed,
                warnings: tally.warnings,
                percentage,
                checked_at: Utc::now(),
            },
        }
    }

    /// Whether any module has a failed check
    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    /// Whether every tallied check passed
    pub fn is_complete(&self) -> bool {
        self.summary.total > 0 && self.summary.failed == 0
    }

    /// Process exit code for this run
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            1
        } else {
            0
        }
    }
}

/// Error types that can occur outside rule evaluation
#[derive(Debug, thiserror::Error)]
pub enum CheckerError {
    /// Configuration file could not be loaded, parsed or validated
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// File could not be read or accessed
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Pattern compilation failed
    #[error("Pattern error: {message}")]
    Pattern { message: String },

    /// Module selection or run setup failed
    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl CheckerError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create a pattern error
    pub fn pattern(message: impl Into<String>) -> Self {
        Self::Pattern { message: message.into() }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }
}

/// Result type for checker operations
pub type CheckerResult<T> = Result<T, CheckerError>;
