//! `flotilla build`: list the modules each container's build registers.

use std::fmt::Write;

use anyhow::Result;
use serde::Serialize;

use crate::core::Workspace;
use crate::federation::Federation;
use crate::util::InternedString;

/// Options for the build operation.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Containers to build. Empty means every bound container.
    pub containers: Vec<String>,
}

/// One registered module.
#[derive(Debug, Clone, Serialize)]
pub struct BuildModule {
    pub id: String,
    pub role: String,
}

/// The modules of one container's build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub container: InternedString,
    pub modules: Vec<BuildModule>,
    /// Unresolved remotes found when the graph was closed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<String>,
}

/// Build the requested containers of `ws`.
pub fn build(ws: &Workspace, opts: &BuildOptions) -> Result<Vec<BuildReport>> {
    let mut federation = ws.federation()?;
    let unresolved: Vec<String> = federation.close().iter().map(|e| e.to_string()).collect();
    build_federation(&federation, opts, &unresolved)
}

fn build_federation(
    federation: &Federation,
    opts: &BuildOptions,
    unresolved: &[String],
) -> Result<Vec<BuildReport>> {
    let names: Vec<String> = if opts.containers.is_empty() {
        federation
            .graph()
            .containers()
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    } else {
        opts.containers.clone()
    };

    let mut reports = Vec::with_capacity(names.len());
    for name in &names {
        let build = federation.build(name)?;
        let mut modules: Vec<BuildModule> = build
            .registry()
            .descriptors()
            .into_iter()
            .map(|d| BuildModule {
                id: d.id.as_str().to_string(),
                role: d.role().to_string(),
            })
            .collect();
        modules.sort_by(|a, b| a.id.cmp(&b.id));

        tracing::debug!("{}: {} module(s)", build.container, modules.len());
        reports.push(BuildReport {
            container: build.container,
            modules,
            unresolved: unresolved.to_vec(),
        });
    }
    Ok(reports)
}

/// Format build reports for the terminal.
pub fn format_report(reports: &[BuildReport], verbose: bool) -> String {
    let mut output = String::new();

    for (i, report) in reports.iter().enumerate() {
        if i > 0 {
            writeln!(output).unwrap();
        }
        writeln!(output, "{} ({} modules)", report.container, report.modules.len()).unwrap();
        for module in &report.modules {
            if verbose {
                writeln!(output, "  {:<60} {}", module.id, module.role).unwrap();
            } else {
                writeln!(output, "  {}", module.id).unwrap();
            }
        }
    }

    if let Some(report) = reports.first() {
        for err in &report.unresolved {
            writeln!(output, "\nwarning: {}", err).unwrap();
        }
    }

    output
}
