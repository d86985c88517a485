//! `flotilla resolve`: show the shared scope a build root resolves to.

use std::fmt::Write;

use anyhow::Result;
use serde::Serialize;

use crate::core::Workspace;
use crate::federation::{
    Boundary, Federation, FederationError, ResolvedEntry, ScopeId, ScopeWarning,
};
use crate::util::InternedString;

/// Options for the resolve operation.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Build root whose scope is resolved
    pub root: String,
    /// Only report this shared key
    pub key: Option<String>,
}

/// One resolved entry, tagged with the boundary it applies to.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeLine {
    pub boundary: Boundary,
    #[serde(flatten)]
    pub entry: ResolvedEntry,
}

/// The resolved scope of one root.
#[derive(Debug, Clone, Serialize)]
pub struct ResolveReport {
    pub root: InternedString,
    pub digest: String,
    pub entries: Vec<ScopeLine>,
    pub warnings: Vec<ScopeWarning>,
    pub unresolved_remotes: Vec<InternedString>,
}

/// Resolve the scope of `opts.root` in `ws`.
pub fn resolve(ws: &Workspace, opts: &ResolveOptions) -> Result<ResolveReport> {
    let mut federation = ws.federation()?;
    resolve_federation(&mut federation, opts)
}

fn resolve_federation(federation: &mut Federation, opts: &ResolveOptions) -> Result<ResolveReport> {
    let root = federation.resolve_scope(&opts.root)?.root;
    let table = federation.table();

    let key = opts.key.as_deref().map(InternedString::new);
    if let Some(key) = key {
        // Fails with UnresolvedShared when nothing provides the key.
        table.get_resolved(&ScopeId::within(root, Boundary::Container(root)), key)?;
    }

    let scope = table
        .scope(root)
        .ok_or(FederationError::UnknownContainer { container: root })?;

    let entries = scope
        .entries()
        .filter(|(_, entry)| key.map_or(true, |k| entry.key == k))
        .map(|(boundary, entry)| ScopeLine {
            boundary,
            entry: entry.clone(),
        })
        .collect();

    Ok(ResolveReport {
        root: scope.root,
        digest: scope.digest(),
        entries,
        warnings: scope.warnings.clone(),
        unresolved_remotes: scope.unresolved_remotes.clone(),
    })
}

/// Format a resolve report for the terminal.
pub fn format_report(report: &ResolveReport, verbose: bool) -> String {
    let mut output = String::new();

    writeln!(output, "Shared scope of {}", report.root).unwrap();
    writeln!(output, "{}", "=".repeat(50)).unwrap();

    let mut current: Option<&Boundary> = None;
    for line in &report.entries {
        if current != Some(&line.boundary) {
            writeln!(output, "\n[{}]", line.boundary).unwrap();
            current = Some(&line.boundary);
        }
        let entry = &line.entry;
        let pinned = if entry.is_pinned() { " (pinned)" } else { "" };
        writeln!(
            output,
            "  {} -> {}:{}{}",
            entry.key, entry.owner, entry.module, pinned
        )
        .unwrap();
        if verbose {
            writeln!(
                output,
                "      {} by {} at distance {}",
                entry.kind, entry.declared_by, entry.distance
            )
            .unwrap();
            if let Some(version) = &entry.version {
                writeln!(output, "      Version: {}", version).unwrap();
            }
        }
    }

    if !report.warnings.is_empty() || !report.unresolved_remotes.is_empty() {
        writeln!(output).unwrap();
    }
    for warning in &report.warnings {
        writeln!(output, "warning: {}", warning).unwrap();
    }
    for remote in &report.unresolved_remotes {
        writeln!(output, "warning: remote container `{}` was never bound", remote).unwrap();
    }

    if verbose {
        writeln!(output, "\nDigest: {}", report.digest).unwrap();
    }

    output
}
