//! packs list - List installed packs

use clap::Args;
use console::style;
use serde::Serialize;
use tracing::debug;

use crate::app::AppContext;
use crate::cli::output::{emit_robot, robot_ok};
use crate::error::Result;
use crate::installer::ResourceKind;
use crate::registry::PackEntry;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only packs providing this kind: skills, agents, hooks
    #[arg(long, short)]
    pub kind: Option<ResourceKind>,
}

/// Serializable pack entry for robot output
#[derive(Debug, Serialize)]
struct ListedPack<'a> {
    name: &'a str,
    #[serde(flatten)]
    entry: &'a PackEntry,
}

pub fn run(ctx: &AppContext, args: &ListArgs) -> Result<()> {
    let packs = ctx.manager.list(args.kind)?;
    debug!(target: "list", count = packs.len(), kind = ?args.kind, "listing packs");

    if ctx.robot() {
        let listed: Vec<ListedPack<'_>> = packs
            .iter()
            .map(|(name, entry)| ListedPack { name, entry })
            .collect();
        return emit_robot(&robot_ok(listed));
    }

    if packs.is_empty() {
        println!("No packs installed");
        return Ok(());
    }
    for (name, entry) in &packs {
        println!(
            "{:<32} {:<10} {}",
            style(name).bold(),
            entry.version,
            style(summary(entry)).dim()
        );
    }
    Ok(())
}

fn summary(entry: &PackEntry) -> String {
    ResourceKind::ALL
        .into_iter()
        .filter(|kind| entry.has_kind(*kind))
        .map(|kind| format!("{} {}", entry.names(kind).len(), kind.dir_name()))
        .collect::<Vec<_>>()
        .join(", ")
}
