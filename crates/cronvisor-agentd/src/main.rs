mod cli;
mod config;

use std::{
    io::{self, Write},
    process::ExitCode,
};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use cronvisor_core::{CoreError, ReportMode, Supervisor, SupervisorConfig};
use cronvisor_model::RunReport;
use cronvisor_observe::{LoggerConfig, logger_init};

use crate::{cli::Cli, config::GroupPlan};

/// Exit status for usage and configuration errors.
const EXIT_USAGE: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_cfg = LoggerConfig {
        format: cli.log_format,
        level: cli.log_level.clone(),
        ..Default::default()
    };
    if let Err(e) = logger_init(&log_cfg) {
        eprintln!("cronvisor: {e}");
        return ExitCode::from(EXIT_USAGE);
    }

    let plan = match config::load(&cli.config).and_then(|c| c.plan(&cli.group, &cli.overrides())) {
        Ok(plan) => plan,
        Err(e) => {
            error!(target: "cronvisor.agentd", error = %e, config = %cli.config.display(), "invalid configuration");
            eprintln!("cronvisor: {e}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    match run(plan, cli.json) {
        Ok(code) => code,
        Err(e) => {
            error!(target: "cronvisor.agentd", error = %e, "run aborted");
            eprintln!("cronvisor: {e:#}");
            ExitCode::from(EXIT_USAGE)
        }
    }
}

fn run(plan: GroupPlan, json: bool) -> anyhow::Result<ExitCode> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;

    let mode = if json { ReportMode::Return } else { ReportMode::Exit };
    let supervisor = Supervisor::new(
        SupervisorConfig::default()
            .with_label(plan.name.clone())
            .with_mode(mode)
            .with_launch(plan.launch),
    );

    info!(
        target: "cronvisor.agentd",
        group = %plan.name,
        jobs = plan.items.len(),
        max_concurrency = plan.max_concurrency,
        "starting run"
    );
    let result = rt.block_on(supervisor.run(plan.items, plan.limits, plan.max_concurrency));

    let ok = emit(result, json, &mut io::stdout().lock(), &mut io::stderr().lock())?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Write the JSON report to `out` and, for a failed run, the failure text to `err`.
///
/// Returns whether the run succeeded.
fn emit<O: Write, E: Write>(
    result: Result<RunReport, CoreError>,
    json: bool,
    out: &mut O,
    err: &mut E,
) -> anyhow::Result<bool> {
    match result {
        Ok(report) => {
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            }
            Ok(true)
        }
        Err(CoreError::RunFailed { message, report }) => {
            write!(err, "{message}")?;
            writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}
