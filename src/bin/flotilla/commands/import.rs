//! `flotilla import` command

use anyhow::Result;

use super::{load_workspace, output_format, GlobalArgs};
use crate::cli::{Format, ImportArgs};
use flotilla::ops::format_json;
use flotilla::ops::import::{format_report, import, ImportOptions};

pub fn execute(args: ImportArgs, global: &GlobalArgs) -> Result<()> {
    let (ctx, ws) = load_workspace(global)?;

    let opts = ImportOptions {
        root: args.root,
        specifier: args.specifier,
    };
    let report = import(&ws, &opts)?;

    match output_format(args.format, &ws) {
        Format::Json => println!("{}", format_json(&report)),
        Format::Text => print!("{}", format_report(&report, ctx.is_verbose())),
    }

    Ok(())
}
