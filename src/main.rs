//! `stageops` command-line entry point.
//!
//! Parses arguments, loads configuration with layered precedence, installs
//! logging and dispatches to [`stageops::api`]. Domain errors are converted
//! to `eyre` reports only here, at the process boundary.

use clap::Parser;
use eyre::{Report, Result as EyreResult};
use stageops::api::{self, AppSummary, DeployOutcome, DeployParams};
use stageops::config::{Cli, Commands, DeployArgs, StageopsConfig, load_config};
use stageops::error::Result as StageopsResult;
use stageops::logging;
use stageops::reconcile::ApplyReport;
use stageops::remote::RecordedAction;
use stageops::render::RenderedFile;
use tokio::runtime::{Handle, Runtime};

fn main() -> EyreResult<()> {
    let cli = Cli::parse();
    let config = load_config(&cli).map_err(Report::from)?;
    logging::init(&config.log.level);
    // The runtime only serves the GitHub token request.
    let runtime = Runtime::new()?;
    run(&cli, &config, runtime.handle()).map_err(Report::from)
}

fn run(cli: &Cli, config: &StageopsConfig, handle: &Handle) -> StageopsResult<()> {
    match &cli.command {
        Commands::Deploy(args) => deploy(config, args, handle),
        Commands::Validate(args) => {
            let summaries = api::validate(config, &args.only)?;
            print_summaries(&summaries);
            Ok(())
        }
        Commands::Render(args) => {
            print_files(&api::render_app(config, &args.name)?);
            Ok(())
        }
        Commands::Token => {
            print_token(&api::mint_token(config, handle)?);
            Ok(())
        }
    }
}

fn deploy(config: &StageopsConfig, args: &DeployArgs, handle: &Handle) -> StageopsResult<()> {
    let env = mockable::DefaultEnv::new();
    let outcome = api::deploy(DeployParams {
        config,
        only: &args.select.only,
        dry_run: args.dry_run,
        runtime_handle: handle,
        env: &env,
    })?;
    match outcome {
        DeployOutcome::Applied(reports) => print_reports(&reports),
        DeployOutcome::Planned(actions) => print_plan(&actions),
    }
    Ok(())
}

#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
fn print_summaries(summaries: &[AppSummary]) {
    for summary in summaries {
        println!(
            "{}: {} ({}), {} files, {} cron jobs",
            summary.project_name, summary.domain, summary.tier, summary.files, summary.cron_jobs
        );
    }
    println!("{} app(s) valid", summaries.len());
}

#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
fn print_files(files: &[RenderedFile]) {
    for file in files {
        println!("# {}", file.path);
        print!("{}", file.contents);
        println!();
    }
}

#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
fn print_token(token: &str) {
    println!("{token}");
}

#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
fn print_reports(reports: &[ApplyReport]) {
    for report in reports {
        println!(
            "{}: {} commands, {} uploads, {} tolerated failures",
            report.project_name, report.executed, report.uploaded, report.tolerated
        );
    }
}

#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
fn print_plan(actions: &[RecordedAction]) {
    for action in actions {
        println!("{}", action.describe());
    }
}
