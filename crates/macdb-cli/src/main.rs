//! MACDB Command-Line Tool
//!
//! Lints context rule files, resolves object labels, lists a label store and
//! dry-runs authorizer events against a static policy.

mod commands;
mod config;
mod error;
mod formatter;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use formatter::OutputFormat;
use macdb_core::{ObjectClass, OperationKind};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// MACDB Command-Line Tool
#[derive(Parser, Debug)]
#[command(name = "macdb")]
#[command(version, about = "Inspect macdb label rules, label stores and access decisions")]
pub struct Args {
    /// Context rule file
    #[arg(short, long, global = true)]
    pub rules: Option<PathBuf>,

    /// Static policy file; without one every access is allowed
    #[arg(short, long, global = true)]
    pub policy: Option<PathBuf>,

    /// Label store directory; without one a temporary store is used
    #[arg(short, long, global = true)]
    pub data: Option<PathBuf>,

    /// Database name for events that do not carry one
    #[arg(long = "db", default_value = "main", global = true)]
    pub database: String,

    /// Output format
    #[arg(long, default_value = "table", value_enum, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse a rule file and print its rules in match order
    Rules {
        /// Rule file to check
        file: PathBuf,
    },

    /// Resolve the label an object gets under the rules
    Resolve {
        /// Object as `db`, `db.table` or `db.table.column`
        coordinate: String,

        /// Object class
        #[arg(short, long, default_value = "db_table")]
        class: ObjectClass,
    },

    /// List the labels issued by a label store
    Labels,

    /// Decide one authorizer event, e.g. `read secret ssn`
    Authorize {
        /// Operation name such as `read`, `insert` or `drop_table`
        operation: OperationKind,

        /// First operation argument, usually a table name
        arg1: Option<String>,

        /// Second operation argument, usually a column name
        arg2: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .init();

    let args = Args::parse();

    match commands::run(&args) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
