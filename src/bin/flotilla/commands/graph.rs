//! `flotilla graph` command

use anyhow::Result;

use super::{load_workspace, output_format, GlobalArgs};
use crate::cli::{Format, GraphArgs};
use flotilla::ops::format_json;
use flotilla::ops::graph::{format_report, graph};

pub fn execute(args: GraphArgs, global: &GlobalArgs) -> Result<()> {
    let (ctx, ws) = load_workspace(global)?;
    let report = graph(&ws)?;

    match output_format(args.format, &ws) {
        Format::Json => println!("{}", format_json(&report)),
        Format::Text => print!("{}", format_report(&report, ctx.is_verbose())),
    }

    Ok(())
}
