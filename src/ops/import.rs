//! `flotilla import`: evaluate a request from a build root.

use anyhow::Result;
use serde::Serialize;

use crate::core::Workspace;
use crate::federation::{Federation, ModuleValue};
use crate::util::InternedString;

/// Options for the import operation.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub root: String,
    /// Local path, `remote/exposed` or bare shared key
    pub specifier: String,
}

/// The value an import evaluated to.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub root: InternedString,
    pub specifier: String,
    /// Id the specifier maps to in the root's build
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    pub value: ModuleValue,
}

pub fn import(ws: &Workspace, opts: &ImportOptions) -> Result<ImportReport> {
    let mut federation = ws.federation()?;
    import_federation(&mut federation, opts)
}

fn import_federation(federation: &mut Federation, opts: &ImportOptions) -> Result<ImportReport> {
    let value = federation.import(&opts.root, &opts.specifier)?;
    let module_id = federation
        .module_id_for(&opts.root, &opts.specifier)
        .ok()
        .map(|id| id.as_str().to_string());

    Ok(ImportReport {
        root: federation.container(&opts.root)?.name(),
        specifier: opts.specifier.clone(),
        module_id,
        value,
    })
}

/// Format an import report for the terminal.
pub fn format_report(report: &ImportReport, verbose: bool) -> String {
    let mut output = String::new();
    if verbose {
        output.push_str(&format!("{} imports {}", report.root, report.specifier));
        if let Some(id) = &report.module_id {
            output.push_str(&format!(" ({})", id));
        }
        output.push('\n');
    }
    match &report.value {
        ModuleValue::Text(text) => {
            output.push_str(text);
            output.push('\n');
        }
        ModuleValue::Modules(ids) => {
            for id in ids {
                output.push_str(id);
                output.push('\n');
            }
        }
    }
    output
}
