//! `flotilla graph`: describe the remote container graph.

use std::fmt::Write;

use anyhow::Result;
use serde::Serialize;

use crate::core::{Container, Workspace};
use crate::federation::Federation;
use crate::util::InternedString;

/// One bound container.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerSummary {
    pub name: InternedString,
    pub share_scope: InternedString,
    pub exposes: Vec<InternedString>,
    /// Keys the container declares, shared and overrides alike
    pub shared: Vec<InternedString>,
}

impl From<&Container> for ContainerSummary {
    fn from(container: &Container) -> Self {
        let mut shared: Vec<InternedString> = container.declarations().map(|d| d.key).collect();
        shared.sort();
        shared.dedup();
        ContainerSummary {
            name: container.name(),
            share_scope: container.share_scope(),
            exposes: container.exposes().iter().map(|e| e.name).collect(),
            shared,
        }
    }
}

/// A remote edge between two containers.
#[derive(Debug, Clone, Serialize)]
pub struct EdgeSummary {
    pub from: InternedString,
    pub alias: InternedString,
    pub to: InternedString,
    pub fallback: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphReport {
    pub containers: Vec<ContainerSummary>,
    pub edges: Vec<EdgeSummary>,
    /// Remote targets that were never bound
    pub placeholders: Vec<InternedString>,
    pub cycles: Vec<Vec<InternedString>>,
}

pub fn graph(ws: &Workspace) -> Result<GraphReport> {
    let federation = ws.federation()?;
    Ok(describe(&federation))
}

fn describe(federation: &Federation) -> GraphReport {
    let graph = federation.graph();
    let mut placeholders = graph.placeholders();
    placeholders.sort();

    GraphReport {
        containers: graph
            .containers()
            .into_iter()
            .map(ContainerSummary::from)
            .collect(),
        edges: graph
            .edges()
            .into_iter()
            .map(|(from, alias, to, fallback)| EdgeSummary {
                from,
                alias,
                to,
                fallback,
            })
            .collect(),
        placeholders,
        cycles: graph.cycles(),
    }
}

/// Format a graph report for the terminal.
pub fn format_report(report: &GraphReport, verbose: bool) -> String {
    let mut output = String::new();

    for container in &report.containers {
        writeln!(output, "{} [{}]", container.name, container.share_scope).unwrap();
        if verbose {
            if !container.exposes.is_empty() {
                let exposes: Vec<&str> = container.exposes.iter().map(|e| e.as_str()).collect();
                writeln!(output, "    exposes: {}", exposes.join(", ")).unwrap();
            }
            if !container.shared.is_empty() {
                let shared: Vec<&str> = container.shared.iter().map(|s| s.as_str()).collect();
                writeln!(output, "    shared: {}", shared.join(", ")).unwrap();
            }
        }
        for edge in report.edges.iter().filter(|e| e.from == container.name) {
            let marker = if edge.fallback { " (fallback)" } else { "" };
            if edge.alias == edge.to {
                writeln!(output, "  -> {}{}", edge.to, marker).unwrap();
            } else {
                writeln!(output, "  -> {} as {}{}", edge.to, edge.alias, marker).unwrap();
            }
        }
    }

    for name in &report.placeholders {
        writeln!(output, "\nwarning: remote container `{}` was never bound", name).unwrap();
    }
    for cycle in &report.cycles {
        let names: Vec<&str> = cycle.iter().map(|c| c.as_str()).collect();
        writeln!(output, "\nnote: containers consume each other: {}", names.join(", ")).unwrap();
    }

    output
}
