//! Checklist evaluation for a single module
//!
//! CDD Principle: Domain Services - the evaluator turns a rule table into check results
//! - Patterns are compiled once when the evaluator is built
//! - Every rule is evaluated independently; a problem with one file never stops the others
//! - The external validator only runs when every required file is present

pub mod reader;

use crate::config::{CheckKind, GateConfig, ModuleConfig, RuleConfig, VALIDATION_RULE_ID};
use crate::domain::checks::{CheckResult, CheckerError, CheckerResult, ModuleReport, Outcome};
use crate::patterns::{occurs_uncommented, presence, Pattern, Presence};
use crate::validator::SyntaxValidator;
use std::path::Path;

pub use reader::{FileReader, FsReader, MemoryReader};

/// Options for customizing evaluation behavior
#[derive(Debug, Clone)]
pub struct EvaluationOptions {
    /// Whether the terminal external validation check may run
    pub run_validator: bool,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self { run_validator: true }
    }
}

/// How a compiled rule decides whether it holds
#[derive(Debug)]
enum Matcher {
    /// Pattern must be active (outside comments)
    Active(Pattern),
    /// Any pattern anywhere in the file
    AnyOf(Vec<Pattern>),
}

#[derive(Debug)]
struct CompiledRule {
    rule: RuleConfig,
    matcher: Matcher,
}

#[derive(Debug)]
struct CompiledGate {
    gate: GateConfig,
    pattern: Pattern,
}

/// Evaluator for one module's rule table
#[derive(Debug)]
pub struct Evaluator {
    module: ModuleConfig,
    comment_marker: String,
    rules: Vec<CompiledRule>,
    gate: Option<CompiledGate>,
}

impl Evaluator {
    /// Compile a module's rules
    pub fn new(module: &ModuleConfig, comment_marker: &str) -> CheckerResult<Self> {
        let rules = module
            .rules
            .iter()
            .map(|rule| compile_rule(rule, &module.name))
            .collect::<CheckerResult<Vec<_>>>()?;

        let gate = module
            .gate
            .as_ref()
            .map(|gate| {
                Pattern::compile(&gate.pattern, gate.regex)
                    .map(|pattern| CompiledGate { gate: gate.clone(), pattern })
            })
            .transpose()?;

        Ok(Self { module: module.clone(), comment_marker: comment_marker.to_string(), rules, gate })
    }

    pub fn name(&self) -> &str {
        &self.module.name
    }

    /// Evaluate every rule against the module directory under `root`
    pub async fn evaluate<R, V>(
        &self,
        root: &Path,
        reader: &R,
        validator: &V,
        options: &EvaluationOptions,
    ) -> ModuleReport
    where
        R: FileReader + ?Sized,
        V: SyntaxValidator,
    {
        let directory = root.join(&self.module.directory);
        tracing::debug!("Evaluating module '{}' in {}", self.module.name, directory.display());

        let mut results = Vec::new();

        if let Some(gate) = &self.gate {
            let gate_result = self.check_gate(gate, &directory, reader);
            let open = gate_result.outcome == Outcome::Pass;
            results.push(gate_result);
            if !open {
                return self.report(results);
            }
        }

        let mut all_present = true;
        for file in &self.module.required_files {
            let present = reader.exists(&directory.join(file));
            all_present &= present;
            results.push(if present {
                CheckResult::pass(file_rule_id(file), format!("File {file} exists"))
            } else {
                CheckResult::fail(file_rule_id(file), format!("File {file} is missing"))
            });
        }

        results.extend(self.rules.iter().map(|rule| self.check_rule(rule, &directory, reader)));

        if self.module.validate && options.run_validator && all_present {
            let outcome = validator.validate(&directory).await;
            let detail = format!("{} validation: {}", validator.name(), outcome.message);
            results.push(if outcome.ok {
                CheckResult::pass(VALIDATION_RULE_ID, detail)
            } else {
                CheckResult::fail(VALIDATION_RULE_ID, detail)
            });
        }

        self.report(results)
    }

    fn report(&self, results: Vec<CheckResult>) -> ModuleReport {
        ModuleReport::new(&self.module.name, &self.module.title, results)
    }

    fn check_gate<R: FileReader + ?Sized>(
        &self,
        gate: &CompiledGate,
        directory: &Path,
        reader: &R,
    ) -> CheckResult {
        let content = reader.read(&directory.join(&gate.gate.file));
        let id = format!("{}_declared", self.module.name);

        match presence(content.as_deref(), &gate.pattern, &self.comment_marker) {
            Presence::Active => CheckResult::pass(id, &gate.gate.active),
            Presence::CommentedOut => CheckResult::warn(id, &gate.gate.commented),
            Presence::Absent => CheckResult::info(id, &gate.gate.absent),
        }
    }

    fn check_rule<R: FileReader + ?Sized>(
        &self,
        compiled: &CompiledRule,
        directory: &Path,
        reader: &R,
    ) -> CheckResult {
        let rule = &compiled.rule;
        let holds = reader.read(&directory.join(rule.check.file())).is_some_and(|content| {
            match &compiled.matcher {
                Matcher::Active(pattern) => {
                    occurs_uncommented(&content, pattern, &self.comment_marker)
                }
                Matcher::AnyOf(patterns) => patterns.iter().any(|p| p.is_match(&content)),
            }
        });

        tracing::debug!("Rule '{}' in module '{}' holds: {}", rule.id, self.module.name, holds);

        if holds {
            CheckResult::pass(&rule.id, &rule.description)
        } else if rule.advisory {
            CheckResult::warn(&rule.id, rule.failure_detail())
        } else {
            CheckResult::fail(&rule.id, rule.failure_detail())
        }
    }
}

/// Rule id of a required-file check
pub fn file_rule_id(file: &str) -> String {
    format!("file:{file}")
}

fn compile_rule(rule: &RuleConfig, module: &str) -> CheckerResult<CompiledRule> {
    let matcher = match &rule.check {
        CheckKind::Pattern { pattern, regex, .. } => {
            Matcher::Active(Pattern::compile(pattern, *regex)?)
        }
        CheckKind::Output { name, .. } => {
            Matcher::Active(Pattern::literal(format!(r#"output "{name}""#)))
        }
        CheckKind::Contains { any_of, .. } => {
            Matcher::AnyOf(any_of.iter().map(|s| Pattern::literal(s.as_str())).collect())
        }
    };

    if let Matcher::AnyOf(patterns) = &matcher {
        if patterns.is_empty() {
            return Err(CheckerError::config(format!(
                "Rule '{}' in module '{}' has no substrings to look for",
                rule.id, module
            )));
        }
    }

    Ok(CompiledRule { rule: rule.clone(), matcher })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckerConfig;
    use crate::validator::ValidationOutcome;
    use std::cell::Cell;
    use std::path::PathBuf;

    /// Validator double that records how often it was asked
    struct FakeValidator {
        outcome: ValidationOutcome,
        calls: Cell<usize>,
    }

    impl FakeValidator {
        fn accepting() -> Self {
            Self {
                outcome: ValidationOutcome::valid("Configuration is valid"),
                calls: Cell::new(0),
            }
        }

        fn rejecting(message: &str) -> Self {
            Self { outcome: ValidationOutcome::invalid(message), calls: Cell::new(0) }
        }
    }

    impl SyntaxValidator for FakeValidator {
        fn name(&self) -> &str {
            "Terraform"
        }

        async fn validate(&self, _directory: &Path) -> ValidationOutcome {
            self.calls.set(self.calls.get() + 1);
            self.outcome.clone()
        }
    }

    fn evaluator(name: &str) -> Evaluator {
        let config = CheckerConfig::default();
        Evaluator::new(config.module(name).unwrap(), &config.comment_marker).unwrap()
    }

    fn root() -> PathBuf {
        PathBuf::from("challenge")
    }

    fn complete_backend() -> MemoryReader {
        MemoryReader::new()
            .with_file("challenge/backend/main.tf", "terraform {}\n")
            .with_file("challenge/backend/variables.tf", "variable \"bucket_name\" {}\n")
            .with_file(
                "challenge/backend/s3.tf",
                r#"resource "aws_s3_bucket" "state" {}
resource "aws_s3_bucket_versioning" "state" {}
resource "aws_s3_bucket_server_side_encryption_configuration" "state" {}
resource "aws_s3_bucket_public_access_block" "state" {}
"#,
            )
            .with_file(
                "challenge/backend/dynamodb.tf",
                "resource \"aws_dynamodb_table\" \"lock\" {\n  hash_key = \"LockID\"\n}\n",
            )
            .with_file(
                "challenge/backend/outputs.tf",
                "output \"s3_bucket_name\" {}\noutput \"dynamodb_table_name\" {}\n",
            )
    }

    #[tokio::test]
    async fn test_empty_module_fails_everything_and_skips_validation() {
        let validator = FakeValidator::accepting();
        let report = evaluator("backend")
            .evaluate(&root(), &MemoryReader::new(), &validator, &EvaluationOptions::default())
            .await;

        assert_eq!(report.passed_count, 0);
        assert_eq!(report.failed_count, report.results.len());
        assert_eq!(report.results.len(), 13);
        assert!(report.find(VALIDATION_RULE_ID).is_none());
        assert_eq!(validator.calls.get(), 0);
    }

    #[tokio::test]
    async fn test_complete_module_passes() {
        let validator = FakeValidator::accepting();
        let report = evaluator("backend")
            .evaluate(&root(), &complete_backend(), &validator, &EvaluationOptions::default())
            .await;

        assert_eq!(report.failed_count, 0);
        assert_eq!(report.passed_count, 14);
        assert_eq!(
            report.find(VALIDATION_RULE_ID).unwrap().detail,
            "Terraform validation: Configuration is valid"
        );
        assert_eq!(validator.calls.get(), 1);
    }

    #[tokio::test]
    async fn test_validator_failure_is_recorded_verbatim() {
        let validator = FakeValidator::rejecting("terraform init failed: no provider");
        let report = evaluator("backend")
            .evaluate(&root(), &complete_backend(), &validator, &EvaluationOptions::default())
            .await;

        let result = report.find(VALIDATION_RULE_ID).unwrap();
        assert_eq!(result.outcome, Outcome::Fail);
        assert_eq!(result.detail, "Terraform validation: terraform init failed: no provider");
        assert_eq!(report.failed_count, 1);
    }

    #[tokio::test]
    async fn test_validation_can_be_skipped() {
        let validator = FakeValidator::accepting();
        let options = EvaluationOptions { run_validator: false };
        let report =
            evaluator("backend").evaluate(&root(), &complete_backend(), &validator, &options).await;

        assert!(report.find(VALIDATION_RULE_ID).is_none());
        assert_eq!(validator.calls.get(), 0);
    }

    #[tokio::test]
    async fn test_commented_declaration_fails_like_absent_one() {
        let mut reader = complete_backend();
        reader.insert(
            "challenge/backend/s3.tf",
            r#"resource "aws_s3_bucket" "state" {}
# resource "aws_s3_bucket_versioning" "state" {
#   versioning_configuration { status = "Enabled" }
# }
"#,
        );
        let validator = FakeValidator::accepting();
        let report = evaluator("backend")
            .evaluate(&root(), &reader, &validator, &EvaluationOptions::default())
            .await;

        let versioning = report.find("s3_versioning").unwrap();
        assert_eq!(versioning.outcome, Outcome::Fail);
        assert_eq!(
            versioning.detail,
            "Versioning enabled - uncomment/add aws_s3_bucket_versioning"
        );
        assert_eq!(report.find("s3_encryption").unwrap().outcome, Outcome::Fail);
        assert_eq!(report.find("s3_bucket").unwrap().outcome, Outcome::Pass);
    }

    #[tokio::test]
    async fn test_missing_file_fails_each_rule_targeting_it() {
        let reader = MemoryReader::new().with_file("challenge/backend/main.tf", "terraform {}\n");
        let validator = FakeValidator::accepting();
        let report = evaluator("backend")
            .evaluate(&root(), &reader, &validator, &EvaluationOptions::default())
            .await;

        for id in ["s3_bucket", "s3_versioning", "s3_encryption", "s3_public_access_block"] {
            assert_eq!(report.find(id).unwrap().outcome, Outcome::Fail, "rule {id}");
        }
        assert_eq!(report.find("file:main.tf").unwrap().outcome, Outcome::Pass);
        assert!(report.find(VALIDATION_RULE_ID).is_none());
    }

    #[tokio::test]
    async fn test_raw_contains_matches_inside_comments() {
        let mut reader = complete_backend();
        reader.insert(
            "challenge/backend/dynamodb.tf",
            "resource \"aws_dynamodb_table\" \"lock\" {\n  # hash_key = \"LockID\"\n}\n",
        );
        let report = evaluator("backend")
            .evaluate(&root(), &reader, &FakeValidator::accepting(), &EvaluationOptions::default())
            .await;

        assert_eq!(report.find("lock_id").unwrap().outcome, Outcome::Pass);
    }

    #[tokio::test]
    async fn test_advisory_rule_warns_without_failing() {
        let reader = MemoryReader::new()
            .with_file("challenge/iam/main.tf", "")
            .with_file("challenge/iam/variables.tf", "")
            .with_file(
                "challenge/iam/users.tf",
                "aws_iam_user\naws_iam_access_key\naws_iam_user_policy_attachment\n",
            )
            .with_file(
                "challenge/iam/policies.tf",
                "aws_iam_policy\n\"s3:GetObject\"\n\"dynamodb:PutItem\"\n",
            )
            .with_file(
                "challenge/iam/outputs.tf",
                "output \"access_key_id\" {}\noutput \"secret_access_key\" {}\n",
            );
        let report = evaluator("iam")
            .evaluate(&root(), &reader, &FakeValidator::accepting(), &EvaluationOptions::default())
            .await;

        let sensitive = report.find("sensitive_secret").unwrap();
        assert_eq!(sensitive.outcome, Outcome::Warn);
        assert_eq!(
            sensitive.detail,
            "Consider adding sensitive = true to secret_access_key output"
        );
        assert_eq!(report.failed_count, 0);
        assert_eq!(report.passed_count, report.results.len() - 1);
    }

    #[tokio::test]
    async fn test_compute_security_group_alternatives() {
        let base = |ec2: &str| {
            MemoryReader::new().with_file("challenge/compute/ec2.tf", ec2.to_string())
        };
        let evaluator = evaluator("compute");
        let options = EvaluationOptions::default();
        let validator = FakeValidator::accepting();

        let with_vpc = base("vpc_security_group_ids = []");
        let with_classic = base("security_groups = []");
        let without = base("ami = data.aws_ami.x.id");

        let with_vpc = evaluator.evaluate(&root(), &with_vpc, &validator, &options).await;
        let with_classic = evaluator.evaluate(&root(), &with_classic, &validator, &options).await;
        let without = evaluator.evaluate(&root(), &without, &validator, &options).await;

        assert_eq!(with_vpc.find("ec2_security_group").unwrap().outcome, Outcome::Pass);
        assert_eq!(with_classic.find("ec2_security_group").unwrap().outcome, Outcome::Pass);
        assert_eq!(without.find("ec2_security_group").unwrap().outcome, Outcome::Fail);
    }

    #[tokio::test]
    async fn test_remote_state_gate() {
        let evaluator = evaluator("remote_state");
        let validator = FakeValidator::accepting();
        let options = EvaluationOptions::default();
        let main_tf = |content: &str| {
            MemoryReader::new().with_file("challenge/compute/main.tf", content.to_string())
        };

        let absent = main_tf("provider \"aws\" {}\n");
        let absent = evaluator.evaluate(&root(), &absent, &validator, &options).await;
        assert_eq!(absent.results.len(), 1);
        assert_eq!(absent.results[0].outcome, Outcome::Info);
        assert_eq!((absent.passed_count, absent.failed_count), (0, 0));

        let commented = main_tf("terraform {\n  # backend \"s3\" {\n  # }\n}\n");
        let commented = evaluator.evaluate(&root(), &commented, &validator, &options).await;
        assert_eq!(commented.results.len(), 1);
        assert_eq!(commented.results[0].outcome, Outcome::Warn);
        assert_eq!((commented.passed_count, commented.failed_count), (0, 0));

        let active = evaluator
            .evaluate(
                &root(),
                &main_tf(
                    r#"terraform {
  backend "s3" {
    bucket         = "state"
    key            = "compute/terraform.tfstate"
    region         = "us-east-1"
    dynamodb_table = "locks"
    encrypt        = true
  }
}
"#,
                ),
                &validator,
                &options,
            )
            .await;
        assert_eq!(active.results.len(), 6);
        assert_eq!(active.passed_count, 6);
        assert!(active.results[1..].iter().all(|r| r.detail.starts_with("Backend ")));
        assert_eq!(validator.calls.get(), 0);
    }

    #[tokio::test]
    async fn test_remote_state_missing_attributes_fail() {
        let reader = MemoryReader::new().with_file(
            "challenge/compute/main.tf",
            r#"terraform {
  backend "s3" {
    bucket = "state"
  }
}
"#,
        );
        let report = evaluator("remote_state")
            .evaluate(&root(), &reader, &FakeValidator::accepting(), &EvaluationOptions::default())
            .await;

        assert_eq!(report.find("backend_bucket").unwrap().outcome, Outcome::Pass);
        assert_eq!(report.find("backend_encrypt").unwrap().detail, "Backend encrypt missing");
        // "key", "region" and "dynamodb_table" do not occur in the file
        assert_eq!(report.failed_count, 4);
    }

    #[tokio::test]
    async fn test_evaluation_is_deterministic() {
        let evaluator = evaluator("backend");
        let reader = complete_backend();
        let validator = FakeValidator::accepting();
        let options = EvaluationOptions::default();

        let first = evaluator.evaluate(&root(), &reader, &validator, &options).await;
        let second = evaluator.evaluate(&root(), &reader, &validator, &options).await;

        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_contains_rule_is_rejected() {
        let module = ModuleConfig::new("x", "X")
            .rule(RuleConfig::contains("empty", "main.tf", &[], "Nothing to find"));
        assert!(Evaluator::new(&module, "#").is_err());
    }
}
