//! Binary entry point for the `blueprint-sync` CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use blueprint_sync::{
    ConfigError, ControllerConfig, ControllerError, Domain, HttpController, LinksReport, Pipeline,
    PipelineError, PreconditionError, ProbeOutcome, SyncReport,
};

mod cli;

use cli::{Cli, Command, DomainArg};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("controller client error: {0}")]
    Client(#[from] ControllerError),
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let exit_code = match dispatch(cli.command).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(fmt::layer().with_writer(io::stderr).without_time())
        .init();
}

async fn dispatch(command: Command) -> Result<i32, CliError> {
    let config = ControllerConfig::load_without_cli_args()?;
    let controller = HttpController::new(&config)?;
    let mut pipeline = Pipeline::new(&config, &controller)?;
    let mut stdout = io::stdout().lock();

    match command {
        Command::Check => {
            let outcome = pipeline.check().await?;
            write_check(&mut stdout, config.base_url(), &outcome)?;
        }
        Command::Links(args) => {
            let domains = domains_or(&args.domains, &Domain::ALL);
            let report = pipeline.links(&domains, args.offline).await?;
            write_links(&mut stdout, &report)?;
        }
        Command::Sync(args) => {
            let domains = domains_or(&args.domains, &[Domain::Automations]);
            let report = pipeline.sync(&domains).await?;
            let orphan_links: Vec<(String, String)> = report
                .orphaned
                .iter()
                .map(|instance| (instance.name.clone(), pipeline.edit_link(instance)))
                .collect();
            write_sync(&mut stdout, &report, &orphan_links)?;
        }
    }
    Ok(0)
}

fn domains_or(selected: &[DomainArg], default: &[Domain]) -> Vec<Domain> {
    if selected.is_empty() {
        return default.to_vec();
    }
    let mut domains: Vec<Domain> = selected.iter().copied().map(to_domain).collect();
    domains.sort();
    domains.dedup();
    domains
}

const fn to_domain(arg: DomainArg) -> Domain {
    match arg {
        DomainArg::Automations => Domain::Automations,
        DomainArg::Scripts => Domain::Scripts,
        DomainArg::Scenes => Domain::Scenes,
        DomainArg::Dashboards => Domain::Dashboards,
    }
}

fn write_check(out: &mut impl Write, url: &str, outcome: &ProbeOutcome) -> io::Result<()> {
    writeln!(out, "{url}: {outcome}")
}

fn write_links(out: &mut impl Write, report: &LinksReport) -> io::Result<()> {
    if report.links.is_empty() {
        return writeln!(out, "No blueprints found");
    }
    writeln!(out, "Blueprint install links:")?;
    for link in &report.links {
        let template = &link.template;
        writeln!(out)?;
        writeln!(out, "{}", template.display_name)?;
        if !template.description.is_empty() {
            writeln!(out, "  Description: {}", template.description)?;
        }
        writeln!(out, "  Type: {}", template.domain)?;
        writeln!(out, "  Install: {}", link.url)?;
    }
    for skipped in &report.skipped {
        writeln!(out, "Skipped {}: {}", skipped.path, skipped.message)?;
    }
    writeln!(out)?;
    writeln!(out, "To install manually:")?;
    writeln!(out, "  1. Open an install link above while signed in to the controller")?;
    writeln!(out, "  2. Review the blueprint and confirm the import")?;
    writeln!(out, "  3. Create an automation from the imported blueprint")
}

fn write_sync(
    out: &mut impl Write,
    report: &SyncReport,
    orphan_links: &[(String, String)],
) -> io::Result<()> {
    let result = &report.result;
    writeln!(out, "Templates: {}", report.templates)?;
    writeln!(
        out,
        "Attempted: {}, succeeded: {}, failed: {}",
        result.attempted, result.succeeded, result.failed
    )?;
    for outcome in result.failures() {
        if let Some(err) = &outcome.error {
            writeln!(out, "  FAILED {} ({}): {err}", outcome.name, outcome.action)?;
        }
    }
    for template in &report.unmatched {
        writeln!(
            out,
            "  Unmatched template {} ({})",
            template.display_name, template.identifier
        )?;
    }
    for (name, link) in orphan_links {
        writeln!(out, "  No template for {name}: {link}")?;
    }
    for failure in &report.listing_failures {
        writeln!(out, "  Listing failed: {failure}")?;
    }
    for skipped in &report.skipped {
        writeln!(out, "  Skipped {}: {}", skipped.path, skipped.message)?;
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
