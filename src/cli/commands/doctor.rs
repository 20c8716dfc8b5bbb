//! packs doctor - Health checks and repairs

use clap::Args;
use console::style;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok, robot_partial};
use crate::error::Result;
use crate::lifecycle::RepairReport;

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Reinstall packs whose resources are missing
    #[arg(long)]
    pub fix: bool,
}

pub fn run(ctx: &AppContext, args: &DoctorArgs) -> Result<()> {
    let report = ctx.manager.repair(args.fix)?;

    if ctx.robot() {
        return if report.failed.is_empty() {
            emit_robot(&robot_ok(&report))
        } else {
            emit_robot(&robot_partial(
                &report,
                report.reinstalled.len(),
                report.failed.len(),
            ))
        };
    }

    emit_human(&render(&report, args.fix));
    Ok(())
}

fn render(report: &RepairReport, fix: bool) -> HumanLayout {
    let mut layout = HumanLayout::new();
    if report.missing.is_empty() && report.orphans.is_empty() {
        layout.push_line(format!("{} registry matches workspace", style("ok").green().bold()));
        return layout;
    }

    if !report.missing.is_empty() {
        layout.section("Missing resources");
        for missing in &report.missing {
            let names: Vec<String> = missing.resources.iter().map(ToString::to_string).collect();
            layout.bullet(&format!("{}: {}", style(&missing.pack).bold(), names.join(", ")));
        }
        if !fix {
            layout.push_line(style("run `packs doctor --fix` to reinstall").dim().to_string());
        }
        layout.blank();
    }

    if !report.orphans.is_empty() {
        layout.section("Unmanaged resources");
        for orphan in &report.orphans {
            layout.bullet(&orphan.to_string());
        }
        layout.blank();
    }

    for pack in &report.reinstalled {
        layout.push_line(format!("{} {pack}", style("reinstalled").green()));
    }
    for failure in &report.failed {
        layout.push_line(format!(
            "{} {}: {}",
            style("failed").red(),
            failure.pack,
            failure.error
        ));
    }
    layout
}
