//! `flotilla resolve` command

use anyhow::Result;

use super::{load_workspace, output_format, GlobalArgs};
use crate::cli::{Format, ResolveArgs};
use flotilla::ops::format_json;
use flotilla::ops::resolve::{format_report, resolve, ResolveOptions};

pub fn execute(args: ResolveArgs, global: &GlobalArgs) -> Result<()> {
    let (ctx, ws) = load_workspace(global)?;

    let opts = ResolveOptions {
        root: args.root,
        key: args.key,
    };
    let report = resolve(&ws, &opts)?;

    match output_format(args.format, &ws) {
        Format::Json => println!("{}", format_json(&report)),
        Format::Text => print!("{}", format_report(&report, ctx.is_verbose())),
    }

    Ok(())
}
