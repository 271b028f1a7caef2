//! Command implementations

use crate::cli::{Cli, Commands};
use anyhow::{Context, Result};
use errata_common::{
    DbLocation, ErrataConfig, ErrorAggregator, ErrorCategory, ErrorReport, ReportDb,
};
use owo_colors::OwoColorize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Report {
            category,
            message,
            traceback,
            context,
        } => {
            let aggregator = open_aggregator(&config, cli.db).await?;
            let context = parse_context(context.as_deref())?;
            report(&aggregator, category, message, traceback, context).await
        }
        Commands::Unreported { json } => {
            let aggregator = open_aggregator(&config, cli.db).await?;
            unreported(&aggregator, json).await
        }
        Commands::MarkReported { ids } => {
            let aggregator = open_aggregator(&config, cli.db).await?;
            let changed = aggregator.mark_reported(ids).await?;
            println!("Marked {} report(s) as reported", changed);
            Ok(())
        }
        Commands::Config { set } => config_command(config, cli.config, set),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<ErrataConfig> {
    match path {
        Some(path) if path.exists() => ErrataConfig::load_from(path),
        Some(_) => Ok(ErrataConfig::default()),
        None => ErrataConfig::load(),
    }
}

async fn open_aggregator(config: &ErrataConfig, db: Option<PathBuf>) -> Result<ErrorAggregator> {
    let location = match db {
        Some(path) => DbLocation::Custom(path),
        None => config.db_location(),
    };
    debug!("Using database location {:?}", location);

    let db = ReportDb::open(location)
        .await
        .context("Failed to open error report database")?;
    Ok(ErrorAggregator::new(
        Arc::new(db),
        config.aggregator_settings(),
    ))
}

/// Parse the `--context` argument; missing means an empty document
pub fn parse_context(raw: Option<&str>) -> Result<Value> {
    match raw {
        None => Ok(Value::Object(Default::default())),
        Some(raw) => serde_json::from_str(raw).context("--context is not valid JSON"),
    }
}

async fn report(
    aggregator: &ErrorAggregator,
    category: ErrorCategory,
    message: String,
    traceback: String,
    context: Value,
) -> Result<()> {
    match aggregator
        .insert_or_update_error(category, message, traceback, context)
        .await?
    {
        Some(stored) => println!(
            "Recorded {} error #{} (events: {})",
            stored.category, stored.id, stored.events
        ),
        None => println!("Developer mode is on: error not recorded"),
    }
    Ok(())
}

async fn unreported(aggregator: &ErrorAggregator, json: bool) -> Result<()> {
    let reports = aggregator.get_unreported_errors().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print!("{}", render_table(&reports, true));
    }
    Ok(())
}

/// One line per record: id, category, events, last seen, message
pub fn render_table(reports: &[ErrorReport], color: bool) -> String {
    if reports.is_empty() {
        return "No unreported errors\n".to_string();
    }

    let mut out = String::new();
    for report in reports {
        let category = format!("{:<8}", report.category.as_str());
        let category = if color {
            category.red().bold().to_string()
        } else {
            category
        };
        out.push_str(&format!(
            "#{:<5} {} x{:<5} {}  {}\n",
            report.id,
            category,
            report.events,
            report.last_occurred.format("%Y-%m-%d %H:%M:%S"),
            first_line(&report.error_message),
        ));
    }
    out
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

fn config_command(
    mut config: ErrataConfig,
    path: Option<PathBuf>,
    set: Option<String>,
) -> Result<()> {
    let Some(assignment) = set else {
        print!(
            "{}",
            toml::to_string_pretty(&config).context("Failed to serialize configuration")?
        );
        return Ok(());
    };

    let (key, value) = assignment
        .split_once('=')
        .with_context(|| format!("Expected key=value, got '{}'", assignment))?;
    config.set_value(key, value)?;

    let path = match path {
        Some(path) => path,
        None => ErrataConfig::user_config_path()?,
    };
    config.save_to(&path)?;
    println!("Updated {} in {}", key.trim(), path.display());
    Ok(())
}
