//! Command implementations

pub mod build;
pub mod completions;
pub mod graph;
pub mod import;
pub mod resolve;

use std::path::PathBuf;

use anyhow::Result;

use crate::cli::Format;
use flotilla::core::Workspace;
use flotilla::util::config::OutputFormat;
use flotilla::util::GlobalContext;

/// Options shared by every command.
pub struct GlobalArgs {
    pub manifest_path: Option<PathBuf>,
    pub verbose: bool,
    pub color: bool,
}

/// Locate and load the workspace the command runs against.
pub fn load_workspace(global: &GlobalArgs) -> Result<(GlobalContext, Workspace)> {
    let mut ctx = GlobalContext::new()?;
    ctx.set_verbose(global.verbose);
    ctx.set_color(global.color);

    let manifest_path = ctx.manifest_path(global.manifest_path.as_deref())?;
    let ws = Workspace::new(&manifest_path, &ctx)?;
    Ok((ctx, ws))
}

/// The `--format` flag, or the configured format when it is absent.
pub fn output_format(flag: Option<Format>, ws: &Workspace) -> Format {
    flag.unwrap_or(match ws.config().output_format() {
        OutputFormat::Text => Format::Text,
        OutputFormat::Json => Format::Json,
    })
}
