//! Output formatters for command results.

use clap::ValueEnum;
use comfy_table::Table;
use serde::Serialize;

use crate::commands::{LabelEntry, Resolution, RuleReport, Verdict};
use crate::error::Result;

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter {
    /// Format a linted rule file.
    fn format_rules(&self, report: &RuleReport) -> Result<String>;

    /// Format a resolved label.
    fn format_resolution(&self, resolution: &Resolution) -> Result<String>;

    /// Format the contents of a label store.
    fn format_labels(&self, labels: &[LabelEntry]) -> Result<String>;

    /// Format an authorization dry run.
    fn format_verdict(&self, verdict: &Verdict) -> Result<String>;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_rules(&self, report: &RuleReport) -> Result<String> {
        let mut table = Table::new();
        table.set_header(vec!["Class", "Origin", "Label", "Line"]);
        for rule in &report.rules {
            table.add_row(vec![
                rule.class.to_string(),
                rule.origin.clone(),
                rule.label.to_string(),
                rule.line.to_string(),
            ]);
        }

        let mut output = table.to_string();
        for skipped in &report.skipped {
            output.push_str(&format!("\nskipped line {}: {}", skipped.line, skipped.message));
        }
        Ok(output)
    }

    fn format_resolution(&self, resolution: &Resolution) -> Result<String> {
        let source = match resolution.rule_line {
            Some(line) => format!("rule at line {}", line),
            None => "policy default".to_string(),
        };
        let mut table = Table::new();
        table.set_header(vec!["Object", "Class", "Label", "Source"]);
        table.add_row(vec![
            resolution.coordinate.clone(),
            resolution.class.to_string(),
            resolution.label.to_string(),
            source,
        ]);
        Ok(table.to_string())
    }

    fn format_labels(&self, labels: &[LabelEntry]) -> Result<String> {
        if labels.is_empty() {
            return Ok("No labels".to_string());
        }
        let mut table = Table::new();
        table.set_header(vec!["Id", "Label"]);
        for entry in labels {
            table.add_row(vec![entry.id.to_string(), entry.label.to_string()]);
        }
        Ok(table.to_string())
    }

    fn format_verdict(&self, verdict: &Verdict) -> Result<String> {
        let target = [verdict.arg1.as_deref(), verdict.arg2.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        let outcome = if verdict.allowed { "ALLOW" } else { "DENY" };
        let mut output = format!(
            "{} {} {} on {} as {}",
            outcome, verdict.operation, target, verdict.database, verdict.subject
        );
        if let Some(reason) = &verdict.reason {
            output.push_str(&format!("\n{}", reason));
        }
        Ok(output)
    }
}

/// JSON formatter.
pub struct JsonFormatter;

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

impl Formatter for JsonFormatter {
    fn format_rules(&self, report: &RuleReport) -> Result<String> {
        to_json(report)
    }

    fn format_resolution(&self, resolution: &Resolution) -> Result<String> {
        to_json(resolution)
    }

    fn format_labels(&self, labels: &[LabelEntry]) -> Result<String> {
        to_json(labels)
    }

    fn format_verdict(&self, verdict: &Verdict) -> Result<String> {
        to_json(verdict)
    }
}
