//! packs install - Fetch a pack and copy its resources into the workspace

use std::path::Path;

use clap::Args;
use console::style;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, join_or_none, robot_ok};
use crate::error::Result;
use crate::lifecycle::InstallOutcome;

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Repository (`github.com/org/pack`, a git URL, or a local directory)
    pub repo: String,

    /// Branch or tag to install
    #[arg(long = "ref", value_name = "REF")]
    pub reference: Option<String>,
}

pub fn run(ctx: &AppContext, args: &InstallArgs) -> Result<()> {
    let repo = normalize_repo(&args.repo)?;
    let outcome = ctx.manager.install(&repo, args.reference.as_deref())?;

    if ctx.robot() {
        let warnings = outcome.contested.iter().map(ToString::to_string).collect();
        return emit_robot(&robot_ok(&outcome).with_warnings(warnings));
    }
    emit_human(&render(&outcome));
    Ok(())
}

/// Local directories are recorded by absolute path so `update` works from anywhere.
fn normalize_repo(repo: &str) -> Result<String> {
    let path = Path::new(repo);
    if path.is_dir() && !path.is_absolute() {
        let absolute = std::env::current_dir()?.join(path);
        return Ok(absolute.to_string_lossy().into_owned());
    }
    Ok(repo.to_string())
}

fn render(outcome: &InstallOutcome) -> HumanLayout {
    let mut layout = HumanLayout::new();
    let headline = match &outcome.previous {
        Some(prev) => format!(
            "{} {} {} (was {})",
            style("Reinstalled").green().bold(),
            style(&outcome.name).bold(),
            outcome.entry.version,
            prev.version
        ),
        None => format!(
            "{} {} {}",
            style("Installed").green().bold(),
            style(&outcome.name).bold(),
            outcome.entry.version
        ),
    };
    layout
        .push_line(headline)
        .kv("skills", &join_or_none(&outcome.entry.skills))
        .kv("agents", &join_or_none(&outcome.entry.agents))
        .kv("hooks", &join_or_none(&outcome.entry.hooks));
    for shared in &outcome.contested {
        layout.push_line(format!("{} {shared}", style("warning:").yellow()));
    }
    layout
}
