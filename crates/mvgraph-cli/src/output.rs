//! Output formatting for CLI commands.
//!
//! Every command renders either human-readable text or JSON. Text writers
//! take any `Write` so they can be tested against a buffer; colors follow
//! [`OutputConfig`].

use chrono::{DateTime, Utc};
use colored::Colorize;
use mvgraph::graph::{DatabaseStats, Lineage};
use mvgraph::{
    Depth, DependencyGraph, DiscoveryIssue, GraphNode, HealthReport, ImpactReport, ObjectKind,
    TableRef,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::env;
use std::io::{self, Write};

/// Output format mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

/// Text rendering options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    /// Whether to use colors in output.
    pub use_colors: bool,
}

impl OutputConfig {
    /// Plain output, used by tests and when stdout is not a terminal.
    pub fn plain() -> Self {
        Self { use_colors: false }
    }

    /// Read color settings from the environment.
    ///
    /// Reads:
    /// - `NO_COLOR`: any value disables colors
    /// - `MVGRAPH_COLOR`: `0` or `false` disables colors (default: enabled)
    pub fn from_env() -> Self {
        // Respect NO_COLOR standard (https://no-color.org/)
        let use_colors = env::var("NO_COLOR").is_err()
            && env::var("MVGRAPH_COLOR")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true);
        Self { use_colors }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { use_colors: true }
    }
}

/// Print any serializable value as pretty JSON to stdout.
pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(handle, "{json}")
}

// ============================================================================
// Color Helpers
// ============================================================================

fn colorize_table(table: &TableRef, config: OutputConfig) -> String {
    let text = table.qualified();
    if !config.use_colors {
        return text;
    }
    text.cyan().to_string()
}

fn colorize_kind(kind: ObjectKind, config: OutputConfig) -> String {
    let text = kind.as_str().to_string();
    if !config.use_colors {
        return text;
    }
    match kind {
        ObjectKind::MaterializedView => text.blue().to_string(),
        ObjectKind::Table => text.green().to_string(),
        ObjectKind::Temporary => text.yellow().to_string(),
        ObjectKind::Unknown => text.dimmed().to_string(),
    }
}

fn heading(text: &str, config: OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.bold().to_string()
}

fn warning(text: &str, config: OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.yellow().to_string()
}

fn success(text: &str, config: OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.green().to_string()
}

fn join_tables<'a>(tables: impl IntoIterator<Item = &'a TableRef>, config: OutputConfig) -> String {
    tables
        .into_iter()
        .map(|t| colorize_table(t, config))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Human-readable byte count (`1.5 GiB`).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

// ============================================================================
// Text Writers
// ============================================================================

/// Discovery summary: counts per kind followed by any issues.
pub fn write_summary<W: Write>(
    w: &mut W,
    graph: &DependencyGraph,
    issues: &[DiscoveryIssue],
    config: OutputConfig,
) -> io::Result<()> {
    let mut by_kind: BTreeMap<&'static str, usize> = BTreeMap::new();
    for node in graph.nodes() {
        *by_kind.entry(node.kind().as_str()).or_default() += 1;
    }

    writeln!(w, "{}", heading("Discovery Summary", config))?;
    writeln!(w, "=================")?;
    writeln!(w, "Nodes: {}", graph.node_count())?;
    writeln!(w, "Edges: {}", graph.edge_count())?;
    for (kind, count) in &by_kind {
        writeln!(w, "  {kind}: {count}")?;
    }
    write_issues(w, issues, config)
}

/// Issues list, or nothing when there are none.
pub fn write_issues<W: Write>(
    w: &mut W,
    issues: &[DiscoveryIssue],
    config: OutputConfig,
) -> io::Result<()> {
    if issues.is_empty() {
        return Ok(());
    }
    writeln!(w)?;
    writeln!(w, "{}", warning(&format!("Issues ({})", issues.len()), config))?;
    for issue in issues {
        writeln!(w, "  - {issue}")?;
    }
    Ok(())
}

/// Cycle list, one cycle per line as `a -> b -> a`.
pub fn write_cycles<W: Write>(
    w: &mut W,
    cycles: &[Vec<TableRef>],
    config: OutputConfig,
) -> io::Result<()> {
    if cycles.is_empty() {
        return writeln!(w, "{}", success("No cycles found", config));
    }
    writeln!(w, "{}", warning(&format!("Found {} cycle(s):", cycles.len()), config))?;
    for cycle in cycles {
        let mut path: Vec<String> = cycle.iter().map(|t| colorize_table(t, config)).collect();
        if let Some(first) = cycle.first() {
            path.push(colorize_table(first, config));
        }
        writeln!(w, "  {}", path.join(" -> "))?;
    }
    Ok(())
}

/// Depth table grouped by level; undefined depths come last.
pub fn write_depths<W: Write>(
    w: &mut W,
    depths: &BTreeMap<TableRef, Depth>,
    config: OutputConfig,
) -> io::Result<()> {
    let mut by_depth: BTreeMap<Depth, Vec<&TableRef>> = BTreeMap::new();
    for (table, depth) in depths {
        by_depth.entry(*depth).or_default().push(table);
    }
    for (depth, tables) in by_depth {
        let label = match depth {
            Depth::Level(level) => format!("Depth {level}"),
            Depth::Undefined => "Undefined (cycle)".to_string(),
        };
        writeln!(w, "{}", heading(&label, config))?;
        for table in tables {
            writeln!(w, "  {}", colorize_table(table, config))?;
        }
    }
    Ok(())
}

/// Impact of changing one table.
pub fn write_impact<W: Write>(
    w: &mut W,
    table: &TableRef,
    report: &ImpactReport,
    config: OutputConfig,
) -> io::Result<()> {
    if report.is_empty() {
        return writeln!(w, "Nothing depends on {}", colorize_table(table, config));
    }
    writeln!(
        w,
        "Changing {} affects {} object(s), {} of them view(s):",
        colorize_table(table, config),
        report.downstream.len(),
        report.affected_views.len()
    )?;
    for affected in &report.downstream {
        let marker = if report.affected_views.contains(affected) {
            " (view)"
        } else {
            ""
        };
        writeln!(w, "  {}{marker}", colorize_table(affected, config))?;
    }
    Ok(())
}

/// Upstream and downstream lineage.
pub fn write_lineage<W: Write>(
    w: &mut W,
    table: &TableRef,
    lineage: &Lineage,
    config: OutputConfig,
) -> io::Result<()> {
    writeln!(w, "Lineage of {}", colorize_table(table, config))?;
    let sections = [("Upstream", &lineage.upstream), ("Downstream", &lineage.downstream)];
    for (label, tables) in sections {
        let Some(tables) = tables else { continue };
        if tables.is_empty() {
            writeln!(w, "  {label}: (none)")?;
        } else {
            writeln!(w, "  {label}: {}", join_tables(tables, config))?;
        }
    }
    Ok(())
}

/// Dependency path between two tables.
pub fn write_path<W: Write>(
    w: &mut W,
    from: &TableRef,
    to: &TableRef,
    path: Option<&[TableRef]>,
    config: OutputConfig,
) -> io::Result<()> {
    match path {
        Some(path) => writeln!(
            w,
            "{}",
            path.iter()
                .map(|t| colorize_table(t, config))
                .collect::<Vec<_>>()
                .join(" -> ")
        ),
        None => writeln!(w, "No dependency path from {from} to {to}"),
    }
}

/// Most influential tables with their scores.
pub fn write_influence<W: Write>(
    w: &mut W,
    ranked: &[(TableRef, usize)],
    config: OutputConfig,
) -> io::Result<()> {
    writeln!(w, "{}", heading("Most influential", config))?;
    for (rank, (table, score)) in ranked.iter().enumerate() {
        writeln!(w, "{:>3}. {:<40} {score}", rank + 1, colorize_table(table, config))?;
    }
    Ok(())
}

/// Health report with recommendations.
pub fn write_health<W: Write>(
    w: &mut W,
    report: &HealthReport,
    config: OutputConfig,
) -> io::Result<()> {
    writeln!(w, "{}", heading("Pipeline Health", config))?;
    writeln!(w, "===============")?;
    writeln!(w, "Tables:        {}", report.total_tables)?;
    writeln!(w, "Views:         {}", report.total_views)?;
    writeln!(w, "Placeholders:  {}", report.total_placeholders)?;
    writeln!(w, "Dependencies:  {}", report.total_dependencies)?;
    writeln!(w, "Cycles:        {}", report.cycles.len())?;
    writeln!(w, "Orphans:       {}", report.orphaned_tables.len())?;
    match report.max_depth {
        Some(depth) => writeln!(w, "Max depth:     {depth}")?,
        None => writeln!(w, "Max depth:     -")?,
    }
    writeln!(w, "Avg edges:     {:.2}", report.avg_connections)?;

    if !report.most_connected.is_empty() {
        writeln!(w)?;
        writeln!(w, "{}", heading("Most connected", config))?;
        for (table, connections) in &report.most_connected {
            writeln!(w, "  {} ({connections})", colorize_table(table, config))?;
        }
    }

    writeln!(w)?;
    if report.recommendations.is_empty() {
        writeln!(w, "{}", success("No issues detected", config))?;
    } else {
        writeln!(w, "{}", heading("Recommendations", config))?;
        for recommendation in &report.recommendations {
            writeln!(w, "  - {}", warning(recommendation, config))?;
        }
    }
    Ok(())
}

/// Per-database statistics table.
pub fn write_stats<W: Write>(
    w: &mut W,
    stats: &BTreeMap<String, DatabaseStats>,
    config: OutputConfig,
) -> io::Result<()> {
    writeln!(
        w,
        "{}",
        heading(
            &format!(
                "{:<24} {:>7} {:>6} {:>5} {:>6} {:>14} {:>12}",
                "DATABASE", "TABLES", "VIEWS", "TEMP", "PLACEH", "ROWS", "SIZE"
            ),
            config
        )
    )?;
    for (database, s) in stats {
        writeln!(
            w,
            "{database:<24} {:>7} {:>6} {:>5} {:>6} {:>14} {:>12}",
            s.tables,
            s.views,
            s.temporary,
            s.placeholders,
            s.rows,
            format_bytes(s.bytes)
        )?;
    }
    Ok(())
}

/// Expired temporary tables.
pub fn write_expired<W: Write>(
    w: &mut W,
    expired: &[&GraphNode],
    now: DateTime<Utc>,
    config: OutputConfig,
) -> io::Result<()> {
    if expired.is_empty() {
        return writeln!(w, "{}", success("No expired tables", config));
    }
    writeln!(w, "Expired as of {}:", now.format("%Y-%m-%dT%H:%M:%SZ"))?;
    for node in expired {
        let at = node
            .record
            .expires_at
            .map(|t| t.format("%Y-%m-%dT%H:%M:%SZ").to_string())
            .unwrap_or_default();
        writeln!(
            w,
            "  {} [{}] expired {at}",
            colorize_table(&node.table, config),
            colorize_kind(node.kind(), config)
        )?;
    }
    Ok(())
}
