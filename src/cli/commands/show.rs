//! packs show - Show one installed pack

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, join_or_none, robot_ok};
use crate::error::Result;
use crate::installer::{ResourceKind, ResourceRef};
use crate::registry::PackEntry;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Installed pack name
    pub name: String,
}

#[derive(Serialize)]
struct ShownPack<'a> {
    name: &'a str,
    #[serde(flatten)]
    entry: &'a PackEntry,
    missing: Vec<ResourceRef>,
}

pub fn run(ctx: &AppContext, args: &ShowArgs) -> Result<()> {
    let entry = ctx.manager.get(&args.name)?;
    let missing: Vec<ResourceRef> = entry
        .resources()
        .filter(|r| !ctx.workspace.resource_present(r.kind, &r.name))
        .collect();

    if ctx.robot() {
        return emit_robot(&robot_ok(ShownPack {
            name: &args.name,
            entry: &entry,
            missing,
        }));
    }

    let mut layout = HumanLayout::new();
    layout
        .title(&args.name)
        .kv("version", &entry.version)
        .kv("repo", &entry.repo)
        .kv("installed", &entry.installed_at.to_rfc3339())
        .kv("stacks", &join_or_none(&entry.stacks));
    for kind in ResourceKind::ALL {
        layout.kv(kind.dir_name(), &join_or_none(entry.names(kind)));
    }
    if !missing.is_empty() {
        layout.blank().section("Missing on disk");
        for resource in &missing {
            layout.bullet(&resource.to_string());
        }
    }
    emit_human(&layout);
    Ok(())
}
