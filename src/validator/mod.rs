//! External syntax validation through the terraform CLI
//!
//! Architecture: Anti-Corruption Layer - the external tool is an opaque collaborator
//! - Only the exit status and stderr text of the tool are consumed
//! - Every failure mode (missing binary, non-zero exit, timeout) becomes a ValidationOutcome
//! - The SyntaxValidator trait lets tests substitute a fake without spawning processes

use crate::config::ValidatorConfig;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// Upper bound on the diagnostic text kept from the tool
const MAX_DIAGNOSTIC_BYTES: usize = 4096;

/// Result of validating one directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub ok: bool,
    pub message: String,
}

impl ValidationOutcome {
    pub fn valid(message: impl Into<String>) -> Self {
        Self { ok: true, message: message.into() }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self { ok: false, message: message.into() }
    }
}

/// Capability to syntax-check a configuration directory within a bounded time
#[allow(async_fn_in_trait)]
pub trait SyntaxValidator {
    /// Name used in report lines ("Terraform validation: ...")
    fn name(&self) -> &str;

    /// Validate the directory; never fails, every problem is folded into the outcome
    async fn validate(&self, directory: &Path) -> ValidationOutcome;
}

/// Runs `terraform init -backend=false` then `terraform validate`
#[derive(Debug, Clone)]
pub struct TerraformValidator {
    config: ValidatorConfig,
    display_name: String,
}

impl TerraformValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        let display_name = capitalize(&config.program);
        Self { config, display_name }
    }

    /// Run one phase of the protocol
    async fn run_phase(
        &self,
        directory: &Path,
        args: &[String],
        timeout: Duration,
    ) -> Result<(), ValidationOutcome> {
        let phase = format!("{} {}", self.config.program, args.first().map_or("", String::as_str));
        tracing::debug!("Running '{}' in {} (timeout {:?})", phase, directory.display(), timeout);

        let child = Command::new(&self.config.program)
            .args(args)
            .current_dir(directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_failure(e))?;

        // Dropping the child on timeout kills it
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::warn!("Waiting for '{}' failed: {}", phase, e);
                return Err(ValidationOutcome::invalid(e.to_string()));
            }
            Err(_) => {
                tracing::warn!("'{}' timed out after {:?}", phase, timeout);
                return Err(ValidationOutcome::invalid(format!(
                    "{} command timed out",
                    self.display_name
                )));
            }
        };

        if output.status.success() {
            Ok(())
        } else {
            Err(ValidationOutcome::invalid(format!(
                "{} failed: {}",
                phase.trim_end(),
                diagnostics(&output)
            )))
        }
    }

    fn spawn_failure(&self, error: io::Error) -> ValidationOutcome {
        if error.kind() == io::ErrorKind::NotFound {
            tracing::warn!("'{}' not found on PATH", self.config.program);
            ValidationOutcome::invalid(format!(
                "{name} not found. Please install {name}.",
                name = self.display_name
            ))
        } else {
            tracing::warn!("Failed to spawn '{}': {}", self.config.program, error);
            ValidationOutcome::invalid(error.to_string())
        }
    }
}

impl Default for TerraformValidator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default())
    }
}

impl SyntaxValidator for TerraformValidator {
    fn name(&self) -> &str {
        &self.display_name
    }

    async fn validate(&self, directory: &Path) -> ValidationOutcome {
        if let Err(outcome) =
            self.run_phase(directory, &self.config.init_args, self.config.init_timeout()).await
        {
            return outcome;
        }
        if let Err(outcome) = self
            .run_phase(directory, &self.config.validate_args, self.config.validate_timeout())
            .await
        {
            return outcome;
        }
        ValidationOutcome::valid("Configuration is valid")
    }
}

/// Stderr text of a finished process, capped
fn diagnostics(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if text.len() > MAX_DIAGNOSTIC_BYTES {
        let mut cut = MAX_DIAGNOSTIC_BYTES;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    text
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
