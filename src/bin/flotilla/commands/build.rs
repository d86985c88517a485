//! `flotilla build` command

use anyhow::Result;

use super::{load_workspace, output_format, GlobalArgs};
use crate::cli::{BuildArgs, Format};
use flotilla::ops::build::{build, format_report, BuildOptions};
use flotilla::ops::format_json;

pub fn execute(args: BuildArgs, global: &GlobalArgs) -> Result<()> {
    let (ctx, ws) = load_workspace(global)?;

    let opts = BuildOptions {
        containers: args.containers,
    };
    let reports = build(&ws, &opts)?;

    match output_format(args.format, &ws) {
        Format::Json => println!("{}", format_json(&reports)),
        Format::Text => print!("{}", format_report(&reports, ctx.is_verbose())),
    }

    Ok(())
}
