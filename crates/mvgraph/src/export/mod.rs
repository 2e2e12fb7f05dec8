//! Graph export formats.
//!
//! Every exporter reads a [`DependencyGraph`] and produces one derived
//! artifact; none of them mutate the graph, and each emits exactly one entry
//! per node and per edge.
//!
//! | Format | Function | Consumers |
//! |--------|----------|-----------|
//! | JSON | [`DependencyGraph::to_json`] | scripts, dashboards |
//! | Node-link | [`DependencyGraph::to_node_link`] | graph libraries (NetworkX, d3) |
//! | DOT | [`DependencyGraph::to_dot`] | Graphviz |
//! | GraphML | [`DependencyGraph::to_graphml`] | Gephi, yEd |

use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

mod dot;
mod graphml;
mod json;
mod node_link;

pub use json::{JsonEdge, JsonExport, JsonMetadata, JsonNode};
pub use node_link::{NodeLinkGraph, NodeLinkLink, NodeLinkNode};

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Adjacency JSON with node metrics
    Json,
    /// Node-link JSON
    NodeLink,
    /// Graphviz DOT
    Dot,
    /// GraphML XML
    GraphMl,
}

impl ExportFormat {
    /// All formats, in display order
    pub const ALL: [Self; 4] = [Self::Json, Self::NodeLink, Self::Dot, Self::GraphMl];

    /// Conventional file extension
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json | Self::NodeLink => "json",
            Self::Dot => "dot",
            Self::GraphMl => "graphml",
        }
    }

    /// Name accepted by `FromStr`
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::NodeLink => "node-link",
            Self::Dot => "dot",
            Self::GraphMl => "graphml",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "node-link" | "nodelink" | "networkx" => Ok(Self::NodeLink),
            "dot" | "graphviz" => Ok(Self::Dot),
            "graphml" | "xml" => Ok(Self::GraphMl),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

impl DependencyGraph {
    /// Render the graph in `format`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if JSON serialization fails.
    pub fn render(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Json => self.to_json(true),
            ExportFormat::NodeLink => Ok(serde_json::to_string_pretty(&self.to_node_link())?),
            ExportFormat::Dot => Ok(self.to_dot()),
            ExportFormat::GraphMl => Ok(self.to_graphml()),
        }
    }

    /// The generic labeled-graph interchange structure (node-link form).
    pub fn to_graph_interchange(&self) -> NodeLinkGraph {
        self.to_node_link()
    }

    /// The textual graph description (Graphviz DOT).
    pub fn to_graph_description(&self) -> String {
        self.to_dot()
    }
}

/// Render `graph` in `format` and write it to `path`.
///
/// # Errors
///
/// Returns `Error::Io` on write failure and `Error::Json` on serialization
/// failure.
pub async fn write_export(graph: &DependencyGraph, path: &Path, format: ExportFormat) -> Result<()> {
    let content = graph.render(format)?;
    tokio::fs::write(path, content).await?;
    tracing::info!(path = %path.display(), format = %format, "Graph exported");
    Ok(())
}
