//! Command execution logic.
//!
//! Each command reads the discovered graph from [`App`] and renders through
//! [`crate::output`]. JSON output names tables by their qualified
//! `database.name` string.

use anyhow::{Context, Result};
use chrono::Utc;
use mvgraph::catalog::snapshot::write_snapshot;
use mvgraph::{Depth, TableRef, write_export};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::io;

use super::Commands;
use super::args::{DiscoverArgs, ExportArgs, LineageArgs, PathArgs, SnapshotArgs, SourceArgs, TableArgs, TopArgs};
use crate::app::{self, App};
use crate::output::{self, OutputConfig, OutputMode};

/// Dispatch a graph command.
pub async fn run(app: &App, command: &Commands, mode: OutputMode, config: OutputConfig) -> Result<()> {
    let mut stdout = io::stdout().lock();
    match command {
        Commands::Discover(args) => execute_discover(app, args, mode, config, &mut stdout),
        Commands::Cycles => execute_cycles(app, mode, config, &mut stdout),
        Commands::Depths => execute_depths(app, mode, config, &mut stdout),
        Commands::Impact(args) => execute_impact(app, args, mode, config, &mut stdout),
        Commands::Lineage(args) => execute_lineage(app, args, mode, config, &mut stdout),
        Commands::Path(args) => execute_path(app, args, mode, config, &mut stdout),
        Commands::Top(args) => execute_top(app, args, mode, config, &mut stdout),
        Commands::Health => execute_health(app, mode, config, &mut stdout),
        Commands::Stats => execute_stats(app, mode, config, &mut stdout),
        Commands::Expired => execute_expired(app, mode, config, &mut stdout),
        Commands::Export(args) => {
            drop(stdout);
            execute_export(app, args, mode).await
        }
        Commands::Snapshot(_) => anyhow::bail!("snapshot captures the catalog and has no graph to query"),
    }
}

fn names<'a>(tables: impl IntoIterator<Item = &'a TableRef>) -> Vec<String> {
    tables.into_iter().map(TableRef::qualified).collect()
}

fn write_json<W: io::Write>(w: &mut W, value: &Value) -> Result<()> {
    writeln!(w, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Warn that a table is not in the graph; analyses then return empty sets.
fn check_known(app: &App, table: &TableRef) {
    if !app.graph().contains(table) {
        tracing::warn!(table = %table, "Table not found in the discovered graph");
    }
}

/// Execute the discover command
pub fn execute_discover<W: io::Write>(
    app: &App,
    args: &DiscoverArgs,
    mode: OutputMode,
    config: OutputConfig,
    w: &mut W,
) -> Result<()> {
    let graph = app.graph();
    match mode {
        OutputMode::Json => {
            let mut value = json!({
                "nodes": graph.node_count(),
                "edges": graph.edge_count(),
                "databases": app.options().databases,
                "issues": app.issues(),
            });
            if args.verbose {
                value["objects"] = graph
                    .nodes()
                    .iter()
                    .map(|n| json!({ "id": n.table.qualified(), "kind": n.kind() }))
                    .collect();
            }
            write_json(w, &value)
        }
        OutputMode::Text => {
            output::write_summary(w, graph, app.issues(), config)?;
            if args.verbose {
                writeln!(w)?;
                for node in graph.nodes() {
                    writeln!(w, "  {:<48} {}", node.table.qualified(), node.kind())?;
                }
            }
            Ok(())
        }
    }
}

/// Execute the cycles command
pub fn execute_cycles<W: io::Write>(app: &App, mode: OutputMode, config: OutputConfig, w: &mut W) -> Result<()> {
    let cycles = app.graph().find_cycles();
    match mode {
        OutputMode::Json => {
            let cycles: Vec<Vec<String>> = cycles.iter().map(|c| names(c)).collect();
            write_json(w, &json!({ "cycles": cycles }))
        }
        OutputMode::Text => Ok(output::write_cycles(w, &cycles, config)?),
    }
}

/// Execute the depths command
pub fn execute_depths<W: io::Write>(app: &App, mode: OutputMode, config: OutputConfig, w: &mut W) -> Result<()> {
    let depths = app.graph().calculate_depths();
    match mode {
        OutputMode::Json => {
            let by_name: BTreeMap<String, Depth> =
                depths.iter().map(|(t, d)| (t.qualified(), *d)).collect();
            write_json(w, &serde_json::to_value(by_name)?)
        }
        OutputMode::Text => Ok(output::write_depths(w, &depths, config)?),
    }
}

/// Execute the impact command
pub fn execute_impact<W: io::Write>(
    app: &App,
    args: &TableArgs,
    mode: OutputMode,
    config: OutputConfig,
    w: &mut W,
) -> Result<()> {
    check_known(app, &args.table);
    let report = app.graph().analyze_impact(&args.table);
    match mode {
        OutputMode::Json => write_json(
            w,
            &json!({
                "table": args.table.qualified(),
                "downstream": names(&report.downstream),
                "affected_views": names(&report.affected_views),
            }),
        ),
        OutputMode::Text => Ok(output::write_impact(w, &args.table, &report, config)?),
    }
}

/// Execute the lineage command
pub fn execute_lineage<W: io::Write>(
    app: &App,
    args: &LineageArgs,
    mode: OutputMode,
    config: OutputConfig,
    w: &mut W,
) -> Result<()> {
    check_known(app, &args.table);
    let lineage = app.graph().lineage(&args.table, args.direction);
    match mode {
        OutputMode::Json => {
            let mut value = json!({ "table": args.table.qualified() });
            if let Some(upstream) = &lineage.upstream {
                value["upstream"] = json!(names(upstream));
            }
            if let Some(downstream) = &lineage.downstream {
                value["downstream"] = json!(names(downstream));
            }
            write_json(w, &value)
        }
        OutputMode::Text => Ok(output::write_lineage(w, &args.table, &lineage, config)?),
    }
}

/// Execute the path command
pub fn execute_path<W: io::Write>(
    app: &App,
    args: &PathArgs,
    mode: OutputMode,
    config: OutputConfig,
    w: &mut W,
) -> Result<()> {
    let path = app.graph().shortest_path(&args.from, &args.to);
    match mode {
        OutputMode::Json => write_json(
            w,
            &json!({
                "from": args.from.qualified(),
                "to": args.to.qualified(),
                "path": path.as_ref().map(|p| names(p)),
            }),
        ),
        OutputMode::Text => Ok(output::write_path(w, &args.from, &args.to, path.as_deref(), config)?),
    }
}

/// Execute the top command
pub fn execute_top<W: io::Write>(
    app: &App,
    args: &TopArgs,
    mode: OutputMode,
    config: OutputConfig,
    w: &mut W,
) -> Result<()> {
    let ranked = app.graph().most_influential(args.limit);
    match mode {
        OutputMode::Json => {
            let ranked: Vec<Value> = ranked
                .iter()
                .map(|(table, score)| json!({ "table": table.qualified(), "score": score }))
                .collect();
            write_json(w, &Value::Array(ranked))
        }
        OutputMode::Text => Ok(output::write_influence(w, &ranked, config)?),
    }
}

/// Execute the health command
pub fn execute_health<W: io::Write>(app: &App, mode: OutputMode, config: OutputConfig, w: &mut W) -> Result<()> {
    let report = app.graph().health_report();
    match mode {
        OutputMode::Json => {
            let mut value = serde_json::to_value(&report)?;
            value["healthy"] = json!(report.is_healthy());
            write_json(w, &value)
        }
        OutputMode::Text => Ok(output::write_health(w, &report, config)?),
    }
}

/// Execute the stats command
pub fn execute_stats<W: io::Write>(app: &App, mode: OutputMode, config: OutputConfig, w: &mut W) -> Result<()> {
    let stats = app.graph().database_stats();
    match mode {
        OutputMode::Json => write_json(w, &serde_json::to_value(&stats)?),
        OutputMode::Text => Ok(output::write_stats(w, &stats, config)?),
    }
}

/// Execute the expired command
pub fn execute_expired<W: io::Write>(app: &App, mode: OutputMode, config: OutputConfig, w: &mut W) -> Result<()> {
    let now = Utc::now();
    let expired = app.graph().expired_tables(now);
    match mode {
        OutputMode::Json => {
            let expired: Vec<Value> = expired
                .iter()
                .map(|n| json!({ "table": n.table.qualified(), "expires_at": n.record.expires_at }))
                .collect();
            write_json(w, &Value::Array(expired))
        }
        OutputMode::Text => Ok(output::write_expired(w, &expired, now, config)?),
    }
}

/// Execute the export command
pub async fn execute_export(app: &App, args: &ExportArgs, mode: OutputMode) -> Result<()> {
    let graph = app.graph();
    let Some(path) = &args.output else {
        println!("{}", graph.render(args.format)?);
        return Ok(());
    };

    write_export(graph, path, args.format)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    match mode {
        OutputMode::Json => output::print_json(&json!({
            "format": args.format.as_str(),
            "path": path.display().to_string(),
            "nodes": graph.node_count(),
            "edges": graph.edge_count(),
        }))?,
        OutputMode::Text => println!(
            "Exported {} nodes and {} edges as {} to {}",
            graph.node_count(),
            graph.edge_count(),
            args.format,
            path.display()
        ),
    }
    Ok(())
}

/// Execute the snapshot command
pub async fn execute_snapshot(source: &SourceArgs, args: &SnapshotArgs, mode: OutputMode) -> Result<()> {
    let collection = app::capture(source).await?;

    write_snapshot(&args.output, &collection.rows)
        .await
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    let databases = collection
        .rows
        .iter()
        .map(|row| row.database.as_str())
        .collect::<std::collections::BTreeSet<_>>()
        .len();

    match mode {
        OutputMode::Json => output::print_json(&json!({
            "path": args.output.display().to_string(),
            "rows": collection.rows.len(),
            "databases": databases,
            "issues": collection.issues,
        }))?,
        OutputMode::Text => {
            println!(
                "Captured {} rows from {databases} database(s) to {}",
                collection.rows.len(),
                args.output.display()
            );
            output::write_issues(&mut io::stdout().lock(), &collection.issues, OutputConfig::from_env())?;
        }
    }
    Ok(())
}
