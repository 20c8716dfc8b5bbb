//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - run() function to execute the command

use clap::Subcommand;

pub mod doctor;
pub mod install;
pub mod list;
pub mod remove;
pub mod resources;
pub mod show;
pub mod stacks;
pub mod update;

use crate::app::AppContext;
use crate::error::Result;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install a pack from a git repository or local directory
    Install(install::InstallArgs),

    /// Remove an installed pack and its resources
    Remove(remove::RemoveArgs),

    /// Reinstall one or all packs at their latest version
    Update(update::UpdateArgs),

    /// List installed packs
    List(list::ListArgs),

    /// Show one installed pack
    Show(show::ShowArgs),

    /// Check registry against the workspace and repair it
    Doctor(doctor::DoctorArgs),

    /// Manage project technology stacks
    Stacks(stacks::StacksArgs),

    /// List resources present in the managed tree
    Resources(resources::ResourcesArgs),
}

/// Dispatch a command to its handler
pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Install(args) => install::run(ctx, args),
        Commands::Remove(args) => remove::run(ctx, args),
        Commands::Update(args) => update::run(ctx, args),
        Commands::List(args) => list::run(ctx, args),
        Commands::Show(args) => show::run(ctx, args),
        Commands::Doctor(args) => doctor::run(ctx, args),
        Commands::Stacks(args) => stacks::run(ctx, args),
        Commands::Resources(args) => resources::run(ctx, args),
    }
}
