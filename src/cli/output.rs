//! Output formatting for multiple formats
//!
//! Detection results, validation reports and the tag mapping render as JSON,
//! YAML, human-readable text or CI `key=value` lines.
//!
//! # Example
//!
//! ```
//! use buildscope::cli::output::{OutputFormat, OutputFormatter};
//! use buildscope::DetectionResult;
//!
//! let result = DetectionResult {
//!     to_build: vec!["automations".to_string()],
//!     ..Default::default()
//! };
//! let output = OutputFormatter::new(OutputFormat::Github).format(&result).unwrap();
//! assert!(output.contains("to_build=[\"automations\"]"));
//! ```

use anyhow::{Context, Result};

use crate::catalog::BaseImageCatalog;
use crate::output::{generate_outputs, write_outputs, DetectionResult};
use crate::validation::ValidationReport;

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// YAML format
    Yaml,
    /// Human-readable formatted text
    Human,
    /// `key=value` lines as written to the CI output file
    Github,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a detection result according to the configured format
    pub fn format(&self, result: &DetectionResult) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(result)
                .context("Failed to serialize detection result to JSON"),
            OutputFormat::Yaml => {
                serde_yaml::to_string(result).context("Failed to serialize detection result to YAML")
            }
            OutputFormat::Human => Ok(self.format_human(result)),
            OutputFormat::Github => self.format_github(result),
        }
    }

    /// Formats a validation report
    pub fn format_report(&self, report: &ValidationReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report)
                .context("Failed to serialize validation report to JSON"),
            OutputFormat::Yaml => serde_yaml::to_string(report)
                .context("Failed to serialize validation report to YAML"),
            OutputFormat::Human | OutputFormat::Github => Ok(self.format_report_human(report)),
        }
    }

    /// Formats the base image directory → tag mapping
    pub fn format_tags(&self, catalog: &BaseImageCatalog) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&catalog.mapping.dir_to_tag)
                .context("Failed to serialize tag mapping to JSON"),
            OutputFormat::Yaml => serde_yaml::to_string(&catalog.mapping.dir_to_tag)
                .context("Failed to serialize tag mapping to YAML"),
            OutputFormat::Github => {
                let mut output = String::new();
                for (directory, tag) in &catalog.mapping.dir_to_tag {
                    output.push_str(&format!("{}={}\n", directory, tag));
                }
                Ok(output)
            }
            OutputFormat::Human => Ok(self.format_tags_human(catalog)),
        }
    }

    fn format_github(&self, result: &DetectionResult) -> Result<String> {
        let outputs = generate_outputs(result)?;
        let mut buffer = Vec::new();
        write_outputs(&mut buffer, &outputs).context("Failed to render outputs")?;
        String::from_utf8(buffer).context("Outputs are not valid UTF-8")
    }

    fn format_human(&self, result: &DetectionResult) -> String {
        let mut output = String::new();

        if result.has_work() {
            output.push_str("\u{2713} Change Detection Result\n");
        } else {
            output.push_str("\u{2713} Change Detection Result (nothing to do)\n");
        }
        output.push_str(RULE);
        output.push_str("\n\n");

        output.push_str("Base Images:\n");
        push_tree(&mut output, "Changed", &result.changed_base_images);
        push_tree(&mut output, "Needed", &result.base_images_needed);
        push_last(&mut output, "Known", &result.base_images);
        output.push('\n');

        output.push_str("Services:\n");
        push_tree(&mut output, "Changed", &result.changed_services);
        push_tree(&mut output, "Affected", &result.affected_services);
        push_tree(&mut output, "Build", &result.to_build);
        push_last(&mut output, "Retag", &result.to_retag);
        output.push('\n');

        output.push_str("Checks:\n");
        push_tree(&mut output, "Tests", &result.testable_services);
        push_tree(&mut output, "Health", &result.healthcheck_services);
        push_last(&mut output, "Version", &result.version_check_services);

        output
    }

    fn format_report_human(&self, report: &ValidationReport) -> String {
        if report.is_ok() {
            format!("\u{2713} {}\n", report)
        } else {
            format!("\u{26A0} {}", report)
        }
    }

    fn format_tags_human(&self, catalog: &BaseImageCatalog) -> String {
        let mut output = String::new();
        output.push_str("Base Image Tags\n");
        output.push_str(RULE);
        output.push_str("\n\n");

        if catalog.entries.is_empty() {
            output.push_str("(no base images found)\n");
            return output;
        }

        let width = catalog
            .entries
            .iter()
            .map(|e| e.directory.len())
            .max()
            .unwrap_or(0);
        for entry in &catalog.entries {
            let tag = catalog.mapping.tag_for(&entry.directory).unwrap_or("-");
            output.push_str(&format!(
                "{:width$}  {}  (from {})\n",
                entry.directory,
                tag,
                entry.upstream_image,
                width = width
            ));
        }
        output
    }
}

fn push_tree(output: &mut String, label: &str, items: &[String]) {
    output.push_str(&format!("\u{251C}\u{2500} {:10}{}\n", format!("{}:", label), listing(items)));
}

fn push_last(output: &mut String, label: &str, items: &[String]) {
    output.push_str(&format!("\u{2514}\u{2500} {:10}{}\n", format!("{}:", label), listing(items)));
}

fn listing(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}
