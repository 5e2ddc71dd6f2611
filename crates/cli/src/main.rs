use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

use iacscan_core::{CheckRegistry, ScanReport};

mod config;
mod report;

use config::{Effective, Output, ScanConfig};

#[derive(Parser, Debug)]
#[command(author, version, about="iacscan — static policy checks for CloudFormation templates")]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value_t=Level::WARN, global = true)]
    log_level: Level,

    /// Emit logs as JSON
    #[arg(long, default_value_t=false, global = true)]
    log_json: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run checks against templates
    Scan(ScanArgs),
    /// List registered checks
    List,
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Template files (CloudFormation JSON/YAML or Serverless)
    #[arg(short, long="file", required = true)]
    files: Vec<PathBuf>,

    #[arg(short, long, value_enum)]
    output: Option<Output>,

    /// Only run these check ids
    #[arg(long="check")]
    checks: Vec<String>,

    /// Never run these check ids
    #[arg(long="skip-check")]
    skip_checks: Vec<String>,

    /// Exit 0 even when checks fail
    #[arg(long, default_value_t=false)]
    soft_fail: bool,

    /// YAML file with check, skip_check, soft_fail, output
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_logging(level: Level, json: bool) {
    let fmt = tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr);
    if json {
        fmt.json().with_span_events(FmtSpan::CLOSE).init();
    } else {
        fmt.init();
    }
}

fn registry() -> Result<CheckRegistry> {
    let mut reg = CheckRegistry::new();
    iacscan_policy::register_builtin(&mut reg).context("register built-in checks")?;
    Ok(reg)
}

fn scan(args: ScanArgs) -> Result<ExitCode> {
    let file_cfg = match &args.config {
        Some(p) => ScanConfig::load(p)?,
        None => ScanConfig::default(),
    };
    let eff = Effective::merge(file_cfg, args.checks, args.skip_checks, args.soft_fail, args.output);

    let mut reg = registry()?;
    if !eff.checks.is_empty() { reg.only(&eff.checks); }
    reg.skip(&eff.skip_checks);

    let mut report = ScanReport::default();
    let mut load_errors = 0usize;
    for path in &args.files {
        let template = match iacscan_cfn::load_template(path) {
            Ok(t) => t,
            Err(e) => {
                error!(error = %e, "cannot load template");
                load_errors += 1;
                continue;
            }
        };
        let resources = match template.resources() {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "cannot read resources");
                load_errors += 1;
                continue;
            }
        };
        let file = path.display().to_string();
        info!(file = %file, resources = resources.len(), "scanning");
        for res in resources {
            report.extend(reg.scan_resource(&file, res.logical_id, res.type_name, res.conf));
        }
    }

    let mut stdout = std::io::stdout().lock();
    match eff.output {
        Output::Cli => report::render_cli(&report, &mut stdout)?,
        Output::Json => report::render_json(&report, &mut stdout)?,
    }

    if load_errors > 0 { return Ok(ExitCode::from(2)); }
    if report.has_failures() && !eff.soft_fail { return Ok(ExitCode::from(1)); }
    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.log_json);

    match cli.cmd {
        Cmd::Scan(args) => scan(args),
        Cmd::List => {
            let reg = registry()?;
            for c in reg.checks() {
                println!("{}\t{}\t{}", c.id(), c.name(), c.supported_resources().join(","));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
