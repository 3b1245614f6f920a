//! Configuration loading and management for tf-checkpoint
//!
//! Architecture: Anti-Corruption Layer - Configuration translates external YAML formats
//! - Raw YAML structures are converted to clean rule tables
//! - The challenge checklist is embedded as the default configuration
//! - A YAML file can replace the tables for a different exercise

use crate::domain::checks::{CheckerError, CheckerResult};
use crate::patterns::{Pattern, DEFAULT_COMMENT_MARKER};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File names probed in the challenge root when no `--config` is given
pub const DEFAULT_CONFIG_FILES: &[&str] =
    &["tf_checkpoint.yaml", "tf_checkpoint.yml", ".tf_checkpoint.yaml"];

/// Rule id of the terminal external validation check
pub const VALIDATION_RULE_ID: &str = "terraform_validate";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerConfig {
    /// Configuration format version
    pub version: String,
    /// Report header
    #[serde(default = "default_title")]
    pub title: String,
    /// Line prefix that marks a comment in the checked files
    #[serde(default = "default_comment_marker")]
    pub comment_marker: String,
    /// External validator invocation
    #[serde(default)]
    pub validator: ValidatorConfig,
    /// Modules in their default run order
    pub modules: Vec<ModuleConfig>,
}

/// How the external validator is invoked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Executable looked up on PATH
    pub program: String,
    /// Arguments of the initialization phase
    pub init_args: Vec<String>,
    /// Arguments of the validation phase
    pub validate_args: Vec<String>,
    pub init_timeout_secs: u64,
    pub validate_timeout_secs: u64,
}

impl ValidatorConfig {
    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs)
    }

    pub fn validate_timeout(&self) -> Duration {
        Duration::from_secs(self.validate_timeout_secs)
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            program: "terraform".to_string(),
            init_args: vec!["init".to_string(), "-backend=false".to_string()],
            validate_args: vec!["validate".to_string()],
            init_timeout_secs: 60,
            validate_timeout_secs: 30,
        }
    }
}

/// One checked module (a directory plus its rule list)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Name used on the command line
    pub name: String,
    /// Section heading in the report, printed as "Checking <title>"
    pub title: String,
    /// Directory relative to the challenge root
    pub directory: PathBuf,
    /// Files that must exist, checked first and in order
    #[serde(default)]
    pub required_files: Vec<String>,
    /// Presence rules, in declaration order
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    /// Whether to run the external validator once every required file exists
    #[serde(default)]
    pub validate: bool,
    /// Optional declaration that must be active before the rules run
    #[serde(default)]
    pub gate: Option<GateConfig>,
    /// Run immediately after the named module instead of being selectable
    #[serde(default)]
    pub runs_with: Option<String>,
}

impl ModuleConfig {
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            directory: PathBuf::from(&name),
            name,
            title: title.into(),
            required_files: Vec::new(),
            rules: Vec::new(),
            validate: false,
            gate: None,
            runs_with: None,
        }
    }

    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn required_files(mut self, files: &[&str]) -> Self {
        self.required_files = files.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn rule(mut self, rule: RuleConfig) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(mut self, rules: impl IntoIterator<Item = RuleConfig>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn with_validation(mut self) -> Self {
        self.validate = true;
        self
    }

    pub fn gate(mut self, gate: GateConfig) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn runs_with(mut self, module: impl Into<String>) -> Self {
        self.runs_with = Some(module.into());
        self
    }

    /// Whether the module can be named on the command line
    pub fn is_selectable(&self) -> bool {
        self.runs_with.is_none()
    }
}

/// Individual checklist rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Unique identifier within the module
    pub id: String,
    /// What to look for
    pub check: CheckKind,
    /// Text reported when the rule holds
    pub description: String,
    /// Text reported when it does not (derived from the check when absent)
    #[serde(default)]
    pub failure: Option<String>,
    /// Advisory rules report Warn instead of Fail
    #[serde(default)]
    pub advisory: bool,
}

/// Types of checks a rule can perform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckKind {
    /// Pattern must occur on a non-comment line
    Pattern {
        file: String,
        pattern: String,
        #[serde(default)]
        regex: bool,
    },
    /// `output "<name>"` block header must occur on a non-comment line
    Output { file: String, name: String },
    /// Any of the substrings must occur anywhere in the file
    Contains { file: String, any_of: Vec<String> },
}

impl CheckKind {
    /// File the check reads, relative to the module directory
    pub fn file(&self) -> &str {
        match self {
            Self::Pattern { file, .. }
            | Self::Output { file, .. }
            | Self::Contains { file, .. } => file,
        }
    }
}

impl RuleConfig {
    fn new(id: impl Into<String>, check: CheckKind, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            check,
            description: description.into(),
            failure: None,
            advisory: false,
        }
    }

    /// Literal pattern that must be active in `file`
    pub fn pattern(
        id: impl Into<String>,
        file: impl Into<String>,
        pattern: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let check = CheckKind::Pattern { file: file.into(), pattern: pattern.into(), regex: false };
        Self::new(id, check, description)
    }

    /// Regex pattern that must be active in `file`
    pub fn regex(
        id: impl Into<String>,
        file: impl Into<String>,
        pattern: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let check = CheckKind::Pattern { file: file.into(), pattern: pattern.into(), regex: true };
        Self::new(id, check, description)
    }

    /// Named output block that must be active in `file`
    pub fn output(
        id: impl Into<String>,
        file: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::new(id, CheckKind::Output { file: file.into(), name: name.into() }, description)
    }

    /// Raw substring check, comments included
    pub fn contains(
        id: impl Into<String>,
        file: impl Into<String>,
        any_of: &[&str],
        description: impl Into<String>,
    ) -> Self {
        let any_of = any_of.iter().map(|s| s.to_string()).collect();
        Self::new(id, CheckKind::Contains { file: file.into(), any_of }, description)
    }

    /// Override the failure text
    pub fn failure(mut self, failure: impl Into<String>) -> Self {
        self.failure = Some(failure.into());
        self
    }

    /// Mark the rule as advisory
    pub fn advisory(mut self) -> Self {
        self.advisory = true;
        self
    }

    /// Text reported when the rule does not hold
    pub fn failure_detail(&self) -> String {
        if let Some(failure) = &self.failure {
            return failure.clone();
        }
        match &self.check {
            CheckKind::Pattern { pattern, .. } => {
                format!("{} - uncomment/add {}", self.description, pattern)
            }
            CheckKind::Output { .. } => format!("{} - uncomment output block", self.description),
            CheckKind::Contains { any_of, .. } => {
                format!("{} - add {}", self.description, any_of.join(" or "))
            }
        }
    }
}

/// Declaration that gates a module's rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    pub file: String,
    pub pattern: String,
    #[serde(default)]
    pub regex: bool,
    /// Reported as Pass when the declaration is active
    pub active: String,
    /// Reported as Warn when it only appears in comments
    pub commented: String,
    /// Reported as Info when it is absent
    pub absent: String,
}

impl CheckerConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> CheckerResult<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            CheckerError::config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            CheckerError::config(format!(
                "Failed to parse config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from string content
    pub fn load_from_str(content: &str) -> CheckerResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| CheckerError::config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Find a default configuration file in `root`
    pub fn find_in(root: &Path) -> Option<PathBuf> {
        DEFAULT_CONFIG_FILES.iter().map(|name| root.join(name)).find(|path| path.is_file())
    }

    /// The remote state challenge checklist
    pub fn with_defaults() -> Self {
        Self {
            version: "1.0".to_string(),
            title: default_title(),
            comment_marker: default_comment_marker(),
            validator: ValidatorConfig::default(),
            modules: vec![
                backend_module(),
                iam_module(),
                compute_module(),
                remote_state_module(),
            ],
        }
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> CheckerResult<()> {
        if self.version != "1.0" {
            return Err(CheckerError::config(format!(
                "Unsupported configuration version: {}. Supported versions: 1.0",
                self.version
            )));
        }

        if self.comment_marker.trim().is_empty() {
            return Err(CheckerError::config("Comment marker must not be empty"));
        }

        if self.validator.program.trim().is_empty() {
            return Err(CheckerError::config("Validator program must not be empty"));
        }
        if self.validator.init_timeout_secs == 0 || self.validator.validate_timeout_secs == 0 {
            return Err(CheckerError::config("Validator timeouts must be greater than zero"));
        }

        let mut names = HashSet::new();
        for module in &self.modules {
            if module.name.trim().is_empty() {
                return Err(CheckerError::config("Module name must not be empty"));
            }
            if !names.insert(module.name.as_str()) {
                return Err(CheckerError::config(format!(
                    "Duplicate module name '{}'",
                    module.name
                )));
            }
            validate_module(module)?;
        }

        for module in &self.modules {
            if let Some(parent) = &module.runs_with {
                let runs_with_selectable =
                    self.module(parent).map(ModuleConfig::is_selectable).unwrap_or(false);
                if !runs_with_selectable {
                    return Err(CheckerError::config(format!(
                        "Module '{}' runs with '{}', which is not a selectable module",
                        module.name, parent
                    )));
                }
            }
        }

        Ok(())
    }

    /// Look up a module by name
    pub fn module(&self, name: &str) -> Option<&ModuleConfig> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Modules that can be named on the command line, in default order
    pub fn selectable_modules(&self) -> impl Iterator<Item = &ModuleConfig> {
        self.modules.iter().filter(|m| m.is_selectable())
    }

    /// Modules that run right after `name`
    pub fn companions_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ModuleConfig> {
        self.modules.iter().filter(move |m| m.runs_with.as_deref() == Some(name))
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> CheckerResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| CheckerError::config(format!("Failed to serialize config: {e}")))
    }
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn validate_module(module: &ModuleConfig) -> CheckerResult<()> {
    let mut ids = HashSet::new();
    for rule in &module.rules {
        if !ids.insert(rule.id.as_str()) {
            return Err(CheckerError::config(format!(
                "Duplicate rule ID '{}' in module '{}'",
                rule.id, module.name
            )));
        }

        match &rule.check {
            CheckKind::Pattern { pattern, regex, .. } => {
                Pattern::compile(pattern, *regex).map_err(|e| {
                    CheckerError::config(format!("Invalid pattern in rule '{}': {}", rule.id, e))
                })?;
            }
            CheckKind::Contains { any_of, .. } if any_of.is_empty() => {
                return Err(CheckerError::config(format!(
                    "Rule '{}' in module '{}' has no substrings to look for",
                    rule.id, module.name
                )));
            }
            _ => {}
        }
    }

    if let Some(gate) = &module.gate {
        Pattern::compile(&gate.pattern, gate.regex).map_err(|e| {
            CheckerError::config(format!("Invalid gate pattern in module '{}': {}", module.name, e))
        })?;
    }

    Ok(())
}

fn default_title() -> String {
    "Terraform Remote State Challenge".to_string()
}

fn default_comment_marker() -> String {
    DEFAULT_COMMENT_MARKER.to_string()
}

fn backend_module() -> ModuleConfig {
    ModuleConfig::new("backend", "Backend Module")
        .required_files(&["main.tf", "variables.tf", "s3.tf", "dynamodb.tf", "outputs.tf"])
        .rules([
            RuleConfig::pattern(
                "s3_bucket",
                "s3.tf",
                "aws_s3_bucket",
                "S3 bucket resource defined",
            ),
            RuleConfig::pattern(
                "s3_versioning",
                "s3.tf",
                "aws_s3_bucket_versioning",
                "Versioning enabled",
            ),
            RuleConfig::pattern(
                "s3_encryption",
                "s3.tf",
                "aws_s3_bucket_server_side_encryption_configuration",
                "Encryption configured",
            ),
            RuleConfig::pattern(
                "s3_public_access_block",
                "s3.tf",
                "aws_s3_bucket_public_access_block",
                "Public access blocked",
            ),
            RuleConfig::pattern(
                "dynamodb_table",
                "dynamodb.tf",
                "aws_dynamodb_table",
                "DynamoDB table resource defined",
            )
            .failure("DynamoDB table resource missing"),
            RuleConfig::contains(
                "lock_id",
                "dynamodb.tf",
                &["LockID"],
                "LockID hash key configured",
            )
            .failure("LockID hash key missing (must be exactly 'LockID')"),
            RuleConfig::output(
                "output_s3_bucket_name",
                "outputs.tf",
                "s3_bucket_name",
                "S3 bucket name output",
            ),
            RuleConfig::output(
                "output_dynamodb_table_name",
                "outputs.tf",
                "dynamodb_table_name",
                "DynamoDB table name output",
            ),
        ])
        .with_validation()
}

fn iam_module() -> ModuleConfig {
    ModuleConfig::new("iam", "IAM Module")
        .required_files(&["main.tf", "variables.tf", "users.tf", "policies.tf", "outputs.tf"])
        .rules([
            RuleConfig::pattern(
                "iam_user",
                "users.tf",
                "aws_iam_user",
                "IAM user resource defined",
            ),
            RuleConfig::pattern(
                "iam_access_key",
                "users.tf",
                "aws_iam_access_key",
                "Access key resource defined",
            ),
            RuleConfig::pattern(
                "iam_policy_attachment",
                "users.tf",
                "aws_iam_user_policy_attachment",
                "Policy attachment defined",
            ),
            RuleConfig::pattern(
                "iam_policy",
                "policies.tf",
                "aws_iam_policy",
                "IAM policy resource defined",
            )
            .failure("IAM policy resource missing"),
            RuleConfig::contains(
                "s3_permissions",
                "policies.tf",
                &["s3:"],
                "S3 permissions configured",
            )
            .failure("S3 permissions missing in policy"),
            RuleConfig::contains(
                "dynamodb_permissions",
                "policies.tf",
                &["dynamodb:"],
                "DynamoDB permissions configured",
            )
            .failure("DynamoDB permissions missing in policy"),
            RuleConfig::output(
                "output_access_key_id",
                "outputs.tf",
                "access_key_id",
                "Access Key ID output",
            ),
            RuleConfig::output(
                "output_secret_access_key",
                "outputs.tf",
                "secret_access_key",
                "Secret Access Key output",
            ),
            RuleConfig::contains(
                "sensitive_secret",
                "outputs.tf",
                &["sensitive"],
                "Sensitive flag on secret key",
            )
            .failure("Consider adding sensitive = true to secret_access_key output")
            .advisory(),
        ])
        .with_validation()
}

fn compute_module() -> ModuleConfig {
    ModuleConfig::new("compute", "Compute Module")
        .required_files(&[
            "main.tf",
            "variables.tf",
            "ssh-key.tf",
            "security.tf",
            "ec2.tf",
            "outputs.tf",
        ])
        .rules([
            RuleConfig::pattern(
                "tls_private_key",
                "ssh-key.tf",
                "tls_private_key",
                "TLS private key resource defined",
            ),
            RuleConfig::pattern(
                "aws_key_pair",
                "ssh-key.tf",
                "aws_key_pair",
                "AWS key pair resource defined",
            ),
            RuleConfig::pattern(
                "private_key_file",
                "ssh-key.tf",
                "local_file",
                "Local file for private key defined",
            ),
            RuleConfig::pattern(
                "security_group",
                "security.tf",
                "aws_security_group",
                "Security group resource defined",
            )
            .failure("Security group resource missing"),
            RuleConfig::contains("ssh_port", "security.tf", &["22"], "SSH port 22 configured")
                .failure("SSH port 22 not found in security group"),
            RuleConfig::pattern(
                "ec2_instance",
                "ec2.tf",
                "aws_instance",
                "EC2 instance resource defined",
            )
            .failure("EC2 instance resource defined - uncomment/add the resource"),
            RuleConfig::pattern(
                "ami_data_source",
                "ec2.tf",
                r#"data "aws_ami""#,
                "AMI data source defined",
            )
            .failure("AMI data source defined - uncomment/add the resource"),
            RuleConfig::contains(
                "ec2_key_name",
                "ec2.tf",
                &["key_name"],
                "EC2 instance uses key pair",
            )
            .failure("EC2 instance missing key_name attribute"),
            RuleConfig::contains(
                "ec2_security_group",
                "ec2.tf",
                &["vpc_security_group_ids", "security_groups"],
                "EC2 instance uses security group",
            )
            .failure("EC2 instance missing security group configuration"),
            RuleConfig::output(
                "output_instance_id",
                "outputs.tf",
                "instance_id",
                "Instance ID output",
            ),
            RuleConfig::output(
                "output_instance_public_ip",
                "outputs.tf",
                "instance_public_ip",
                "Public IP output",
            ),
            RuleConfig::output(
                "output_ssh_command",
                "outputs.tf",
                "ssh_command",
                "SSH command output",
            ),
        ])
        .with_validation()
}

fn remote_state_module() -> ModuleConfig {
    let attributes = ["bucket", "key", "region", "dynamodb_table", "encrypt"].map(|attr| {
        RuleConfig::contains(
            format!("backend_{attr}"),
            "main.tf",
            &[attr],
            format!("Backend {attr} configured"),
        )
        .failure(format!("Backend {attr} missing"))
    });

    ModuleConfig::new("remote_state", "Remote State Configuration")
        .directory("compute")
        .gate(GateConfig {
            file: "main.tf".to_string(),
            pattern: r#"backend "s3""#.to_string(),
            regex: false,
            active: "S3 backend configured in compute module".to_string(),
            commented: "S3 backend is defined but commented out (OK for LocalStack testing)"
                .to_string(),
            absent: "S3 backend not configured yet (optional for LocalStack testing)".to_string(),
        })
        .rules(attributes)
        .runs_with("compute")
}
