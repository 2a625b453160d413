//! Subcommand execution.

use std::path::Path;
use std::sync::Arc;

use macdb_core::{
    load_rules, parse_rules, AuthorizationEvent, ContextResolver, ContextRule, LabelId, LabelRegistry,
    MacConfig, MacSession, ObjectClass, ObjectCoordinate, OperationKind, RuleSet, SecurityLabel,
    StaticPolicy,
};
use serde::Serialize;
use tracing::debug;

use crate::config::load_policy;
use crate::error::{CliError, Result};
use crate::formatter::create_formatter;
use crate::{Args, Command};

/// Parsed rule file.
#[derive(Debug, Serialize)]
pub struct RuleReport {
    /// Rules in match order, grouped by class.
    pub rules: Vec<ContextRule>,
    pub skipped: Vec<SkippedLine>,
}

#[derive(Debug, Serialize)]
pub struct SkippedLine {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct Resolution {
    pub coordinate: String,
    pub class: ObjectClass,
    pub label: SecurityLabel,
    /// Line of the deciding rule; `None` when the policy default was used.
    pub rule_line: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LabelEntry {
    pub id: LabelId,
    pub label: SecurityLabel,
}

#[derive(Debug, Serialize)]
pub struct Verdict {
    pub operation: String,
    pub database: String,
    pub arg1: Option<String>,
    pub arg2: Option<String>,
    pub subject: SecurityLabel,
    pub allowed: bool,
    pub reason: Option<String>,
}

/// Run the selected subcommand and render its output.
pub fn run(args: &Args) -> Result<String> {
    let formatter = create_formatter(args.format);
    match &args.command {
        Command::Rules { file } => {
            let report = lint_rules(file, &load_policy(args)?)?;
            formatter.format_rules(&report)
        }
        Command::Resolve { coordinate, class } => {
            let resolution = resolve(args, coordinate, *class)?;
            formatter.format_resolution(&resolution)
        }
        Command::Labels => formatter.format_labels(&list_labels(args)?),
        Command::Authorize {
            operation,
            arg1,
            arg2,
        } => {
            let verdict = authorize(args, *operation, arg1.as_deref(), arg2.as_deref())?;
            formatter.format_verdict(&verdict)
        }
    }
}

/// Parse a rule file, keeping the reasons for skipped lines.
pub fn lint_rules(path: &Path, policy: &StaticPolicy) -> Result<RuleReport> {
    let text = std::fs::read_to_string(path).map_err(macdb_core::Error::from)?;
    let parsed = parse_rules(&text, policy);
    Ok(RuleReport {
        rules: parsed.rules.iter().cloned().collect(),
        skipped: parsed
            .skipped
            .into_iter()
            .map(|e| SkippedLine {
                line: e.line,
                message: e.message,
            })
            .collect(),
    })
}

/// Parse `db`, `db.table` or `db.table.column`, requiring the depth `class` needs.
pub fn parse_coordinate(text: &str, class: ObjectClass) -> Result<ObjectCoordinate> {
    let invalid = || CliError::InvalidCoordinate {
        coordinate: text.to_string(),
        class,
    };
    let coordinate = ObjectCoordinate::parse(text).ok_or_else(invalid)?;
    let depth = 1 + usize::from(coordinate.table_name().is_some()) + usize::from(coordinate.column_name().is_some());
    let expected = match class {
        ObjectClass::Database => 1,
        ObjectClass::Table | ObjectClass::Tuple => 2,
        ObjectClass::Column => 3,
    };
    if depth != expected {
        return Err(invalid());
    }
    Ok(coordinate)
}

pub fn resolve(args: &Args, text: &str, class: ObjectClass) -> Result<Resolution> {
    let coordinate = parse_coordinate(text, class)?;
    let policy = Arc::new(load_policy(args)?);
    let rules = match &args.rules {
        Some(path) => load_rules(path, policy.as_ref())?.rules,
        None => RuleSet::new(),
    };
    let rule_line = rules.first_match(class, &coordinate).map(|rule| rule.line);

    let resolver = ContextResolver::new(rules, policy)?;
    let label = resolver.resolve(&coordinate, class)?;
    debug!(%coordinate, %class, %label, "resolved");

    Ok(Resolution {
        coordinate: coordinate.to_string(),
        class,
        label,
        rule_line,
    })
}

pub fn list_labels(args: &Args) -> Result<Vec<LabelEntry>> {
    if args.data.is_none() {
        return Err(CliError::MissingData);
    }
    let db = MacConfig::from(args).open_store()?;
    let registry = LabelRegistry::open(&db)?;
    Ok(registry
        .entries()?
        .into_iter()
        .map(|(id, label)| LabelEntry { id, label })
        .collect())
}

/// Decide one event as a session of the policy's process label would.
pub fn authorize(
    args: &Args,
    operation: OperationKind,
    arg1: Option<&str>,
    arg2: Option<&str>,
) -> Result<Verdict> {
    let policy = load_policy(args)?;
    let mut session = MacSession::open(MacConfig::from(args), Arc::new(policy))?;

    let mut event = AuthorizationEvent::new(operation).database(&args.database);
    if let Some(arg1) = arg1 {
        event = event.arg1(arg1);
    }
    if let Some(arg2) = arg2 {
        event = event.arg2(arg2);
    }

    let decision = session.authorize(&event);
    session.flush()?;

    Ok(Verdict {
        operation: operation.name().to_string(),
        database: args.database.clone(),
        arg1: arg1.map(str::to_string),
        arg2: arg2.map(str::to_string),
        subject: session.subject_label().clone(),
        allowed: decision.is_allowed(),
        reason: decision.denial().map(ToString::to_string),
    })
}
