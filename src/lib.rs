//! tf-checkpoint - progress checker for the Terraform remote state challenge
//!
//! Architecture: Clean Architecture - Library interface serves as the application layer
//! - Pure domain results separated from file system and process concerns
//! - File access and external validation are injected capabilities
//! - Module selection and aggregation live here, presentation lives in `report`

pub mod analyzer;
pub mod config;
pub mod domain;
pub mod patterns;
pub mod report;
pub mod validator;

// Re-export main types for convenient access
pub use domain::checks::{
    CheckResult, CheckerError, CheckerResult, ModuleReport, Outcome, RunReport, RunSummary, Tally,
};

pub use config::{CheckKind, CheckerConfig, GateConfig, ModuleConfig, RuleConfig, ValidatorConfig};

pub use analyzer::{EvaluationOptions, Evaluator, FileReader, FsReader, MemoryReader};

pub use patterns::{occurs_uncommented, Pattern};

pub use report::{OutputFormat, ReportFormatter, ReportOptions};

pub use validator::{SyntaxValidator, TerraformValidator, ValidationOutcome};

use std::path::{Path, PathBuf};

/// Main checker providing high-level run operations
pub struct Checker {
    config: CheckerConfig,
    evaluators: Vec<Evaluator>,
    report_formatter: ReportFormatter,
}

impl Checker {
    /// Create a new checker with the given configuration
    pub fn new_with_config(config: CheckerConfig) -> CheckerResult<Self> {
        config.validate()?;

        let evaluators = config
            .modules
            .iter()
            .map(|module| {
                Evaluator::new(module, &config.comment_marker).map_err(|e| {
                    CheckerError::config(format!(
                        "Failed to compile rules of module '{}': {}",
                        module.name, e
                    ))
                })
            })
            .collect::<CheckerResult<Vec<_>>>()?;

        let report_formatter = ReportFormatter::new(ReportOptions {
            title: config.title.clone(),
            ..Default::default()
        });

        Ok(Self { config, evaluators, report_formatter })
    }

    /// Create a checker with the built-in challenge checklist
    pub fn new() -> CheckerResult<Self> {
        Self::new_with_config(CheckerConfig::default())
    }

    /// Set custom report formatter
    pub fn with_report_formatter(mut self, formatter: ReportFormatter) -> Self {
        self.report_formatter = formatter;
        self
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Resolve module names into the evaluators to run, in run order
    ///
    /// An empty selection means every selectable module in configuration order.
    /// Repeated names run once, and companion modules follow the module they run with.
    pub fn plan(&self, selection: &[String]) -> CheckerResult<Vec<&Evaluator>> {
        let names: Vec<&str> = if selection.is_empty() {
            self.config.selectable_modules().map(|m| m.name.as_str()).collect()
        } else {
            let mut names: Vec<&str> = Vec::new();
            for name in selection {
                let selectable = self.config.module(name).is_some_and(ModuleConfig::is_selectable);
                if !selectable {
                    let available: Vec<_> =
                        self.config.selectable_modules().map(|m| m.name.as_str()).collect();
                    return Err(CheckerError::validation(format!(
                        "Unknown module '{}'. Available modules: {}",
                        name,
                        available.join(", ")
                    )));
                }
                if !names.contains(&name.as_str()) {
                    names.push(name.as_str());
                }
            }
            names
        };

        let mut planned = Vec::new();
        for name in names {
            planned.extend(self.evaluator(name));
            for companion in self.config.companions_of(name) {
                planned.extend(self.evaluator(&companion.name));
            }
        }
        Ok(planned)
    }

    /// Evaluate the selected modules one after another
    pub async fn run<R, V>(
        &self,
        root: &Path,
        selection: &[String],
        reader: &R,
        validator: &V,
        options: &EvaluationOptions,
    ) -> CheckerResult<RunReport>
    where
        R: FileReader + ?Sized,
        V: SyntaxValidator,
    {
        let plan = self.plan(selection)?;
        tracing::debug!(
            "Checking {} module(s) under {}: {}",
            plan.len(),
            root.display(),
            plan.iter().map(|e| e.name()).collect::<Vec<_>>().join(", ")
        );

        let mut modules = Vec::with_capacity(plan.len());
        for evaluator in plan {
            modules.push(evaluator.evaluate(root, reader, validator, options).await);
        }

        Ok(RunReport::from_modules(modules))
    }

    /// Run against the real file system with the configured terraform validator
    pub async fn check_root(
        &self,
        root: &Path,
        selection: &[String],
        options: &EvaluationOptions,
    ) -> CheckerResult<RunReport> {
        let validator = TerraformValidator::new(self.config.validator.clone());
        self.run(root, selection, &FsReader, &validator, options).await
    }

    /// Format a run report for output
    pub fn format_report(&self, report: &RunReport, format: OutputFormat) -> CheckerResult<String> {
        self.report_formatter.format_report(report, format)
    }

    fn evaluator(&self, name: &str) -> Option<&Evaluator> {
        self.evaluators.iter().find(|e| e.name() == name)
    }
}

/// Pick the challenge root starting from `start`
///
/// `start` wins when it contains any module directory; otherwise its parent is used
/// when that contains one, so the checker also works from inside a module directory.
pub fn locate_root(start: &Path, config: &CheckerConfig) -> PathBuf {
    let has_modules = |dir: &Path| config.modules.iter().any(|m| dir.join(&m.directory).is_dir());

    if has_modules(start) {
        return start.to_path_buf();
    }
    match start.parent() {
        Some(parent) if has_modules(parent) => parent.to_path_buf(),
        _ => start.to_path_buf(),
    }
}
