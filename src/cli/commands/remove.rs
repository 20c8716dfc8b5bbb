//! packs remove - Remove an installed pack

use clap::Args;
use console::style;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{emit_robot, robot_ok};
use crate::error::Result;
use crate::registry::PackEntry;

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Installed pack name
    pub name: String,
}

#[derive(Serialize)]
struct Removed<'a> {
    name: &'a str,
    entry: &'a PackEntry,
}

pub fn run(ctx: &AppContext, args: &RemoveArgs) -> Result<()> {
    let entry = ctx.manager.remove(&args.name)?;

    if ctx.robot() {
        return emit_robot(&robot_ok(Removed {
            name: &args.name,
            entry: &entry,
        }));
    }

    let count = entry.skills.len() + entry.agents.len() + entry.hooks.len();
    println!(
        "{} {} ({count} resources)",
        style("Removed").green().bold(),
        style(&args.name).bold()
    );
    Ok(())
}
