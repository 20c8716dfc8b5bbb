//! packs stacks - Configure and detect project stacks

use clap::{Args, Subcommand};
use console::style;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, join_or_none, robot_ok};
use crate::error::Result;
use crate::stacks::{self, DetectedStack};

#[derive(Args, Debug)]
pub struct StacksArgs {
    #[command(subcommand)]
    pub command: Option<StacksCommand>,
}

#[derive(Subcommand, Debug)]
pub enum StacksCommand {
    /// Show configured, detected and effective stacks (default)
    Show,
    /// Replace the configured stacks
    Set {
        #[arg(required = true)]
        stacks: Vec<String>,
    },
    /// Add stacks to the configured list
    Add {
        #[arg(required = true)]
        stacks: Vec<String>,
    },
    /// Remove stacks from the configured list
    Remove {
        #[arg(required = true)]
        stacks: Vec<String>,
    },
    /// Clear the configured list, falling back to detection
    Clear,
    /// Detect stacks from workspace marker files
    Detect,
}

#[derive(Serialize)]
struct StacksOverview {
    configured: Vec<String>,
    detected: Vec<DetectedStack>,
    effective: Vec<String>,
}

pub fn run(ctx: &AppContext, args: &StacksArgs) -> Result<()> {
    let store = &ctx.stacks;
    let root = ctx.workspace.root();

    let configured = match args.command.as_ref().unwrap_or(&StacksCommand::Show) {
        StacksCommand::Show => return show(ctx),
        StacksCommand::Detect => {
            let detected = stacks::detect_stacks(root);
            if ctx.robot() {
                return emit_robot(&robot_ok(&detected));
            }
            let mut layout = HumanLayout::new();
            for stack in &detected {
                layout.kv(&stack.name, &stack.evidence);
            }
            if detected.is_empty() {
                layout.push_line("No stacks detected");
            }
            emit_human(&layout);
            return Ok(());
        }
        StacksCommand::Set { stacks: values } => stacks::set_stacks(store, values)?,
        StacksCommand::Add { stacks: values } => stacks::add_stacks(store, values)?,
        StacksCommand::Remove { stacks: values } => stacks::remove_stacks(store, values)?,
        StacksCommand::Clear => {
            stacks::clear_stacks(store)?;
            Vec::new()
        }
    };

    if ctx.robot() {
        return emit_robot(&robot_ok(&configured));
    }
    println!("{} {}", style("configured:").dim(), join_or_none(&configured));
    Ok(())
}

fn show(ctx: &AppContext) -> Result<()> {
    let configured = stacks::configured_stacks(&ctx.stacks)?;
    let detected = stacks::detect_stacks(ctx.workspace.root());
    let effective = if configured.is_empty() {
        detected.iter().map(|s| s.name.clone()).collect()
    } else {
        configured.clone()
    };

    if ctx.robot() {
        return emit_robot(&robot_ok(StacksOverview {
            configured,
            detected,
            effective,
        }));
    }

    let detected_names: Vec<String> = detected.into_iter().map(|s| s.name).collect();
    let mut layout = HumanLayout::new();
    layout
        .kv("configured", &join_or_none(&configured))
        .kv("detected", &join_or_none(&detected_names))
        .kv("effective", &join_or_none(&effective));
    emit_human(&layout);
    Ok(())
}
