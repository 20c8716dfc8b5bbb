//! packs resources - List resources present in the managed tree, or print one

use clap::{Args, Subcommand};
use console::style;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{emit_robot, robot_ok};
use crate::error::Result;
use crate::installer::ResourceKind;

#[derive(Args, Debug)]
pub struct ResourcesArgs {
    #[command(subcommand)]
    pub command: Option<ResourcesCommand>,

    /// Only this kind: skills, agents, hooks
    #[arg(long, short)]
    pub kind: Option<ResourceKind>,
}

#[derive(Subcommand, Debug)]
pub enum ResourcesCommand {
    /// Print an installed skill's entry file, or an agent or hook file
    Show {
        /// skill, agent or hook
        kind: ResourceKind,
        name: String,
    },
}

#[derive(Debug, Serialize)]
struct ResourceContent<'a> {
    kind: ResourceKind,
    name: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct InstalledResource {
    kind: ResourceKind,
    name: String,
    /// Packs whose registry entry claims this resource.
    owners: Vec<String>,
}

pub fn run(ctx: &AppContext, args: &ResourcesArgs) -> Result<()> {
    match &args.command {
        Some(ResourcesCommand::Show { kind, name }) => show(ctx, *kind, name),
        None => list(ctx, args.kind),
    }
}

fn show(ctx: &AppContext, kind: ResourceKind, name: &str) -> Result<()> {
    let content = ctx.workspace.read_content(kind, name)?;
    if ctx.robot() {
        return emit_robot(&robot_ok(ResourceContent {
            kind,
            name,
            content,
        }));
    }
    print!("{content}");
    if !content.ends_with('\n') {
        println!();
    }
    Ok(())
}

fn list(ctx: &AppContext, kind: Option<ResourceKind>) -> Result<()> {
    let registry = ctx.manager.registry().read()?.value;
    let kinds: Vec<ResourceKind> = kind.map_or_else(|| ResourceKind::ALL.to_vec(), |k| vec![k]);

    let resources: Vec<InstalledResource> = kinds
        .into_iter()
        .flat_map(|kind| {
            ctx.workspace
                .installed(kind)
                .into_iter()
                .map(move |name| (kind, name))
        })
        .map(|(kind, name)| {
            let owners = registry
                .packs
                .iter()
                .filter(|(_, entry)| entry.names(kind).contains(&name))
                .map(|(pack, _)| pack.clone())
                .collect();
            InstalledResource { kind, name, owners }
        })
        .collect();

    if ctx.robot() {
        return emit_robot(&robot_ok(&resources));
    }

    if resources.is_empty() {
        println!("No resources installed");
        return Ok(());
    }
    for resource in &resources {
        let owners = if resource.owners.is_empty() {
            style("unmanaged".to_string()).yellow()
        } else {
            style(resource.owners.join(", ")).dim()
        };
        println!("{:<6} {:<32} {owners}", resource.kind.to_string(), resource.name);
    }
    Ok(())
}
