//! Report generation with multiple output formats
//!
//! CDD Principle: Anti-Corruption Layer - Formatters translate domain objects to external formats
//! - RunReport (domain) is converted to console, JSON or JUnit representations
//! - Each formatter encapsulates the rules for its specific output format
//! - Colors are a presentation detail and can be disabled at runtime or compile time

use crate::domain::checks::{CheckerError, CheckerResult, ModuleReport, Outcome, RunReport};
use serde_json::Value as JsonValue;
use std::io::Write;

const HEADER_WIDTH: usize = 60;
const SECTION_WIDTH: usize = 50;
const PROGRESS_BAR_WIDTH: usize = 40;

/// Supported output formats for run reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Sectioned console report with a progress summary
    Human,
    /// JSON format for programmatic consumption
    Json,
    /// JUnit XML format for CI grading
    Junit,
}

/// Options for customizing report output
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Whether to use colored output (for human format)
    pub use_colors: bool,
    /// Heading printed above the module sections
    pub title: String,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self { use_colors: true, title: "Terraform Remote State Challenge".to_string() }
    }
}

#[derive(Debug, Clone, Copy)]
enum Tone {
    Green,
    Red,
    Yellow,
    Blue,
    Cyan,
}

/// Main report formatter that dispatches to specific formatters
#[derive(Debug, Clone, Default)]
pub struct ReportFormatter {
    options: ReportOptions,
}

impl ReportFormatter {
    /// Create a new report formatter with options
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    /// Format a run report in the specified format
    pub fn format_report(&self, report: &RunReport, format: OutputFormat) -> CheckerResult<String> {
        match format {
            OutputFormat::Human => Ok(self.format_human(report)),
            OutputFormat::Json => self.format_json(report),
            OutputFormat::Junit => Ok(self.format_junit(report)),
        }
    }

    /// Write a formatted report to a writer
    pub fn write_report<W: Write>(
        &self,
        report: &RunReport,
        format: OutputFormat,
        mut writer: W,
    ) -> CheckerResult<()> {
        let formatted = self.format_report(report, format)?;
        writer.write_all(formatted.as_bytes())?;
        Ok(())
    }

    /// Format report as the sectioned console checklist
    fn format_human(&self, report: &RunReport) -> String {
        let mut output = self.header(&self.options.title);
        output.push_str(&self.line(Outcome::Info, "Checking your progress..."));

        for module in &report.modules {
            output.push_str(&self.format_module(module));
        }

        output.push_str(&self.format_summary(report));
        output
    }

    fn format_module(&self, module: &ModuleReport) -> String {
        let rule = "-".repeat(SECTION_WIDTH);
        let mut output = String::new();
        output.push('\n');
        output.push_str(&self.paint(&rule, Tone::Cyan));
        output.push('\n');
        output.push_str(&self.paint(&format!("Checking {}", module.title), Tone::Cyan));
        output.push('\n');
        output.push_str(&self.paint(&rule, Tone::Cyan));
        output.push('\n');

        for result in &module.results {
            output.push_str(&self.line(result.outcome, &result.detail));
        }
        output
    }

    /// Format the summary section
    fn format_summary(&self, report: &RunReport) -> String {
        let summary = &report.summary;
        let mut output = self.header("CHALLENGE PROGRESS SUMMARY");

        if summary.total == 0 {
            output.push_str(&self.line(Outcome::Info, "No checks performed"));
            return output;
        }

        output.push_str(&format!("\n  Total Checks: {}\n", summary.total));
        output.push_str(&format!(
            "  {}\n",
            self.paint(&format!("Passed: {}", summary.passed), Tone::Green)
        ));
        output.push_str(&format!(
            "  {}\n",
            self.paint(&format!("Failed: {}", summary.failed), Tone::Red)
        ));
        if summary.warnings > 0 {
            output.push_str(&format!(
                "  {}\n",
                self.paint(&format!("Warnings: {}", summary.warnings), Tone::Yellow)
            ));
        }
        output.push_str(&format!("\n  Progress: {:.1}%\n", summary.percentage));
        output.push_str(&format!("\n  [{}]\n", progress_bar(summary.percentage)));

        if report.is_complete() {
            output.push_str(&format!(
                "\n  {}\n",
                self.paint("Congratulations! All checks passed!", Tone::Green)
            ));
            output.push_str(&format!(
                "  {}\n",
                self.paint("Your Terraform configuration is complete.", Tone::Green)
            ));
            output.push_str("\n  Next steps:\n");
            output.push_str("  1. Test with LocalStack: docker-compose up -d\n");
            output.push_str("  2. Deploy to real AWS (if ready)\n");
            output.push_str("  3. Push to GitHub to trigger grading\n");
        } else if summary.percentage >= 75.0 {
            output.push_str(&format!(
                "\n  {}\n",
                self.paint("Almost there! Just a few more items to complete.", Tone::Yellow)
            ));
        } else if summary.percentage >= 50.0 {
            output.push_str(&format!(
                "\n  {}\n",
                self.paint("Good progress! Keep going!", Tone::Yellow)
            ));
        } else {
            output.push_str(&format!(
                "\n  {}\n",
                self.paint("Getting started. Check the README for guidance.", Tone::Blue)
            ));
        }

        output
    }

    /// Format report in JSON format
    fn format_json(&self, report: &RunReport) -> CheckerResult<String> {
        let modules: Vec<JsonValue> = report
            .modules
            .iter()
            .map(|module| {
                let results: Vec<JsonValue> = module
                    .results
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "rule_id": r.rule_id,
                            "outcome": r.outcome.as_str(),
                            "detail": r.detail,
                        })
                    })
                    .collect();

                serde_json::json!({
                    "name": module.module_name,
                    "title": module.title,
                    "passed": module.passed_count,
                    "failed": module.failed_count,
                    "results": results,
                })
            })
            .collect();

        let json_report = serde_json::json!({
            "modules": modules,
            "summary": {
                "total": report.summary.total,
                "passed": report.summary.passed,
                "failed": report.summary.failed,
                "warnings": report.summary.warnings,
                "percentage": report.summary.percentage,
                "checked_at": report.summary.checked_at.to_rfc3339(),
            },
            "success": !report.has_failures(),
        });

        serde_json::to_string_pretty(&json_report)
            .map_err(|e| CheckerError::config(format!("JSON serialization failed: {e}")))
    }

    /// Format report in JUnit XML format, one test suite per module
    fn format_junit(&self, report: &RunReport) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&format!(
            "<testsuites name=\"tf-checkpoint\" tests=\"{}\" failures=\"{}\">\n",
            report.modules.iter().map(|m| m.results.len()).sum::<usize>(),
            report.summary.failed
        ));

        for module in &report.modules {
            let skipped = module.results.iter().filter(|r| !r.outcome.is_tallied()).count();
            xml.push_str(&format!(
                "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" skipped=\"{}\">\n",
                escape_xml(&module.module_name),
                module.results.len(),
                module.failed_count,
                skipped
            ));

            for result in &module.results {
                xml.push_str(&format!(
                    "    <testcase classname=\"{}\" name=\"{}\"",
                    escape_xml(&module.module_name),
                    escape_xml(&result.rule_id)
                ));
                match result.outcome {
                    Outcome::Pass => xml.push_str("/>\n"),
                    Outcome::Fail => {
                        xml.push_str(">\n");
                        xml.push_str(&format!(
                            "      <failure message=\"{}\"/>\n",
                            escape_xml(&result.detail)
                        ));
                        xml.push_str("    </testcase>\n");
                    }
                    Outcome::Warn | Outcome::Info => {
                        xml.push_str(">\n");
                        xml.push_str(&format!(
                            "      <skipped message=\"{}\"/>\n",
                            escape_xml(&result.detail)
                        ));
                        xml.push_str("    </testcase>\n");
                    }
                }
            }

            xml.push_str("  </testsuite>\n");
        }

        xml.push_str("</testsuites>\n");
        xml
    }

    fn header(&self, text: &str) -> String {
        let rule = "=".repeat(HEADER_WIDTH);
        format!(
            "\n{}\n{}\n{}\n\n",
            self.paint(&rule, Tone::Blue),
            self.paint(&format!("{:^width$}", text, width = HEADER_WIDTH), Tone::Blue),
            self.paint(&rule, Tone::Blue)
        )
    }

    fn line(&self, outcome: Outcome, text: &str) -> String {
        let tone = match outcome {
            Outcome::Pass => Tone::Green,
            Outcome::Fail => Tone::Red,
            Outcome::Warn => Tone::Yellow,
            Outcome::Info => Tone::Blue,
        };
        format!("  {} {}\n", self.paint(&format!("[{}]", outcome.tag()), tone), text)
    }

    fn paint(&self, text: &str, tone: Tone) -> String {
        if self.options.use_colors {
            tint(text, tone)
        } else {
            text.to_string()
        }
    }
}

#[cfg(feature = "colors")]
fn tint(text: &str, tone: Tone) -> String {
    use colored::Colorize;

    match tone {
        Tone::Green => text.green().to_string(),
        Tone::Red => text.red().to_string(),
        Tone::Yellow => text.yellow().to_string(),
        Tone::Blue => text.blue().bold().to_string(),
        Tone::Cyan => text.cyan().to_string(),
    }
}

#[cfg(not(feature = "colors"))]
fn tint(text: &str, _tone: Tone) -> String {
    text.to_string()
}

/// Render the `====----` bar for a percentage
fn progress_bar(percentage: f64) -> String {
    let filled =
        ((PROGRESS_BAR_WIDTH as f64 * percentage / 100.0) as usize).min(PROGRESS_BAR_WIDTH);
    format!("{}{}", "=".repeat(filled), "-".repeat(PROGRESS_BAR_WIDTH - filled))
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::checks::CheckResult;

    fn plain() -> ReportFormatter {
        ReportFormatter::new(ReportOptions { use_colors: false, ..Default::default() })
    }

    fn create_test_report() -> RunReport {
        RunReport::from_modules(vec![
            ModuleReport::new(
                "backend",
                "Backend Module",
                vec![
                    CheckResult::pass("file:main.tf", "File main.tf exists"),
                    CheckResult::fail(
                        "s3_versioning",
                        "Versioning enabled - uncomment/add aws_s3_bucket_versioning",
                    ),
                ],
            ),
            ModuleReport::new(
                "remote_state",
                "Remote State Configuration",
                vec![CheckResult::info("remote_state_declared", "S3 backend not configured yet")],
            ),
        ])
    }

    #[test]
    fn test_human_format() {
        let output = plain().format_report(&create_test_report(), OutputFormat::Human).unwrap();

        assert!(output.contains("Terraform Remote State Challenge"));
        assert!(output.contains("Checking Backend Module"));
        assert!(output.contains("Checking Remote State Configuration"));
        assert!(output.contains("  [PASS] File main.tf exists\n"));
        assert!(output.contains("  [FAIL] Versioning enabled"));
        assert!(output.contains("  [INFO] S3 backend not configured yet"));
        assert!(output.contains("Total Checks: 2"));
        assert!(output.contains("Progress: 50.0%"));
        assert!(output.contains(&format!("[{}{}]", "=".repeat(20), "-".repeat(20))));
        assert!(output.contains("Good progress! Keep going!"));
    }

    #[test]
    fn test_sections_follow_module_order() {
        let output = plain().format_report(&create_test_report(), OutputFormat::Human).unwrap();
        let backend = output.find("Checking Backend Module").unwrap();
        let remote = output.find("Checking Remote State Configuration").unwrap();
        let summary = output.find("CHALLENGE PROGRESS SUMMARY").unwrap();

        assert!(backend < remote && remote < summary);
    }

    #[test]
    fn test_complete_run_congratulates() {
        let report = RunReport::from_modules(vec![ModuleReport::new(
            "iam",
            "IAM Module",
            vec![
                CheckResult::pass("file:main.tf", "File main.tf exists"),
                CheckResult::warn("sensitive_secret", "Consider adding sensitive = true"),
            ],
        )]);
        let output = plain().format_report(&report, OutputFormat::Human).unwrap();

        assert!(output.contains("Progress: 100.0%"));
        assert!(output.contains("Warnings: 1"));
        assert!(output.contains("Congratulations! All checks passed!"));
        assert!(output.contains(&format!("[{}]", "=".repeat(40))));
    }

    #[test]
    fn test_empty_report() {
        let report = RunReport::from_modules(Vec::new());
        let output = plain().format_report(&report, OutputFormat::Human).unwrap();

        assert!(output.contains("[INFO] No checks performed"));
        assert!(!output.contains("Progress:"));
    }

    #[test]
    fn test_json_format() {
        let output = plain().format_report(&create_test_report(), OutputFormat::Json).unwrap();
        let json: JsonValue = serde_json::from_str(&output).unwrap();

        assert_eq!(json["modules"].as_array().unwrap().len(), 2);
        assert_eq!(json["modules"][0]["name"], "backend");
        assert_eq!(json["modules"][0]["results"][1]["outcome"], "fail");
        assert_eq!(json["summary"]["failed"], 1);
        assert_eq!(json["success"], false);
    }

    #[test]
    fn test_junit_format() {
        let output = plain().format_report(&create_test_report(), OutputFormat::Junit).unwrap();

        assert!(output.contains("<?xml version=\"1.0\""));
        assert!(output
            .contains(r#"<testsuite name="backend" tests="2" failures="1" skipped="0">"#));
        assert!(output.contains("<failure message=\"Versioning enabled"));
        assert!(output.contains("<skipped message=\"S3 backend not configured yet\"/>"));
    }

    #[test]
    fn test_progress_bar_bounds() {
        assert_eq!(progress_bar(0.0), "-".repeat(40));
        assert_eq!(progress_bar(100.0), "=".repeat(40));
        assert_eq!(progress_bar(87.5), format!("{}{}", "=".repeat(35), "-".repeat(5)));
    }

    #[test]
    fn test_write_report() {
        let mut buffer = Vec::new();
        plain().write_report(&create_test_report(), OutputFormat::Json, &mut buffer).unwrap();
        assert!(String::from_utf8(buffer).unwrap().contains("\"modules\""));
    }
}
