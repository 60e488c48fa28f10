//! Command-line interface definitions for the `blueprint-sync` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Top-level CLI for the `blueprint-sync` binary.
#[derive(Debug, Parser)]
#[command(
    name = "blueprint-sync",
    about = "Install and update marked blueprints on a Home Assistant controller",
    version,
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    pub(crate) verbose: bool,
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Subcommands of `blueprint-sync`.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Verify the controller is reachable and accepts the access token.
    #[command(name = "check")]
    Check,
    /// Print install links for the marked blueprints.
    #[command(name = "links")]
    Links(LinksCommand),
    /// Install missing blueprints and update existing instances.
    #[command(name = "sync")]
    Sync(SyncCommand),
}

/// Arguments for `blueprint-sync links`.
#[derive(Debug, Args)]
pub(crate) struct LinksCommand {
    /// Restrict to a domain; repeat for several. Defaults to all domains.
    #[arg(long = "domain", value_name = "DOMAIN", value_enum)]
    pub(crate) domains: Vec<DomainArg>,
    /// Skip the connectivity check; no access token is needed.
    #[arg(long)]
    pub(crate) offline: bool,
}

/// Arguments for `blueprint-sync sync`.
#[derive(Debug, Args)]
pub(crate) struct SyncCommand {
    /// Restrict to a domain; repeat for several. Defaults to automations.
    #[arg(long = "domain", value_name = "DOMAIN", value_enum)]
    pub(crate) domains: Vec<DomainArg>,
}

/// Domain names accepted on the command line.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum DomainArg {
    /// Automation blueprints.
    Automations,
    /// Script blueprints.
    Scripts,
    /// Scene definitions.
    Scenes,
    /// Dashboard definitions.
    Dashboards,
}
