//! packs update - Reinstall packs at their latest version

use clap::Args;
use console::style;

use crate::app::AppContext;
use crate::cli::output::{emit_robot, robot_ok};
use crate::error::Result;
use crate::lifecycle::{UpdateTarget, VersionChange};

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Pack to update (all installed packs when omitted)
    pub name: Option<String>,
}

pub fn run(ctx: &AppContext, args: &UpdateArgs) -> Result<()> {
    let target = UpdateTarget::from(args.name.clone());
    let report = ctx.manager.update(&target)?;

    if ctx.robot() {
        return emit_robot(&robot_ok(&report));
    }

    if report.updated.is_empty() {
        println!("No packs installed");
        return Ok(());
    }
    for pack in &report.updated {
        let change = match pack.change {
            VersionChange::Upgraded => style("upgraded").green(),
            VersionChange::Downgraded => style("downgraded").yellow(),
            VersionChange::Unchanged => style("unchanged").dim(),
            VersionChange::Incomparable => style("changed").cyan(),
        };
        println!(
            "{} {} -> {} ({change})",
            style(&pack.name).bold(),
            display_version(&pack.from_version),
            display_version(&pack.to_version)
        );
    }
    Ok(())
}

fn display_version(version: &str) -> &str {
    if version.is_empty() { "?" } else { version }
}
