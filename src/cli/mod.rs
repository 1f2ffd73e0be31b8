use std::io;
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;

use crate::client::{ApiClient, ClientOptions, ImageUpload};
use crate::config::EffectiveConfig;
use crate::core::{DetectionResponse, Decision, RejectPolicy, Verdict};
use crate::exit::ExitCode;
use crate::export::InspectionReport;
use crate::ui::UiConfig;
use crate::workflow::UploadWorkflow;

#[derive(Debug, Parser)]
#[command(
    name = "parcelscan",
    version,
    about = "Submit package photos to the damage-detection API and decide whether to accept the delivery"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Seconds to wait for the detection server.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload an image and print the delivery verdict.
    Detect(DetectArgs),
    /// Interpret a saved detection response without contacting the server.
    Interpret(InterpretArgs),
    /// Show operator guidance for a damage class.
    Explain(ExplainArgs),
    /// Look up a package by tracking code.
    Package(PackageArgs),
    /// Check that the detection API is reachable.
    Health,
    Completion(CompletionArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct VerdictArgs {
    /// How to decide packages with only moderate or minor damage.
    #[arg(long)]
    pub policy: Option<RejectPolicy>,
    /// Write a JSON inspection report (default name in the export dir).
    #[arg(long, num_args = 0..=1)]
    pub report: Option<Option<PathBuf>>,
    /// Write detections as CSV (default name in the export dir).
    #[arg(long, num_args = 0..=1)]
    pub csv: Option<Option<PathBuf>>,
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    pub image: PathBuf,
    #[arg(long)]
    pub tracking_code: Option<String>,
    #[command(flatten)]
    pub verdict: VerdictArgs,
}

#[derive(Debug, Args)]
pub struct InterpretArgs {
    /// Path to a saved response JSON, or `-` for stdin.
    pub response: PathBuf,
    #[command(flatten)]
    pub verdict: VerdictArgs,
}

#[derive(Debug, Args)]
pub struct ExplainArgs {
    pub class: String,
}

#[derive(Debug, Args)]
pub struct PackageArgs {
    pub tracking_code: String,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    let stdout_is_tty = io::stdout().is_terminal();
    let stderr_is_tty = io::stderr().is_terminal();

    let env_config_path = std::env::var_os("PARCELSCAN_CONFIG").map(PathBuf::from);
    let home_dir = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
    let mut cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        &home_dir,
    )
    .map_err(crate::exit::invalid_args_err)?;
    if let Some(timeout) = cli.timeout {
        crate::config::check_timeout_secs(timeout)
            .context("--timeout")
            .map_err(crate::exit::invalid_args_err)?;
        cfg.api.timeout_secs = timeout;
    }
    log::debug!("effective config: {cfg:?}");

    let ui_cfg = UiConfig {
        color: stdout_is_tty && cfg.ui.color && !cli.no_color,
        stdout_is_tty,
        stderr_is_tty,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Detect(args) => {
            let upload = ImageUpload::from_path(&args.image)
                .map_err(crate::exit::detect_err)?
                .with_tracking_code(args.tracking_code);

            let client = api_client(&cfg);
            let mut workflow = UploadWorkflow::new(client, Duration::from_secs(cfg.api.timeout_secs));

            let pb = if ui_cfg.stderr_is_tty && !cli.quiet && !cli.json {
                Some(progress_bar())
            } else {
                None
            };
            let result = workflow.submit(upload, |p| {
                if let Some(pb) = &pb {
                    pb.set_position(u64::from(p));
                }
            });
            if let Some(pb) = &pb {
                pb.finish_and_clear();
            }
            let resp = result.map_err(crate::exit::detect_err)?;

            let policy = args.verdict.policy.unwrap_or(cfg.decision.reject_on);
            finish_verdict(resp, policy, &args.verdict, &cfg, &ui_cfg, cli.json)
        }
        Commands::Interpret(args) => {
            let resp = read_response(&args.response)?;
            let policy = args.verdict.policy.unwrap_or(cfg.decision.reject_on);
            finish_verdict(&resp, policy, &args.verdict, &cfg, &ui_cfg, cli.json)
        }
        Commands::Explain(args) => {
            let class = args.class.trim();
            if class.is_empty() {
                return Err(crate::exit::invalid_args("explain: damage class must not be empty"));
            }
            let explanation = crate::core::explain(class);
            if cli.json {
                write_json(&explanation)?;
            } else {
                crate::ui::print_explanation(class, &explanation, &ui_cfg);
            }
            Ok(ExitCode::Success)
        }
        Commands::Package(args) => {
            let value = api_client(&cfg)
                .package_details(&args.tracking_code)
                .map_err(crate::exit::detect_err)?;
            if cli.json {
                write_json(&value)?;
            } else {
                crate::ui::print_value(&format!("Package {}", args.tracking_code.trim()), &value, &ui_cfg);
            }
            Ok(ExitCode::Success)
        }
        Commands::Health => {
            let client = api_client(&cfg);
            let value = client.health().map_err(crate::exit::detect_err)?;
            if cli.json {
                write_json(&value)?;
            } else {
                crate::ui::print_value(&format!("API {}", client.base_url()), &value, &ui_cfg);
            }
            Ok(ExitCode::Success)
        }
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let mut out = std::io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "parcelscan", &mut out);
            Ok(ExitCode::Success)
        }
        Commands::Config(args) => {
            if args.show {
                if cli.json {
                    write_json(&cfg)?;
                } else {
                    println!("{}", toml::to_string_pretty(&cfg)?);
                }
            } else if !ui_cfg.quiet {
                eprintln!("config: use `parcelscan config --show`");
            }
            Ok(ExitCode::Success)
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "info"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .try_init();
}

fn api_client(cfg: &EffectiveConfig) -> ApiClient {
    ApiClient::new(ClientOptions {
        base_url: cfg.api.base_url.clone(),
        token: cfg.api.token.clone(),
        timeout: Duration::from_secs(cfg.api.timeout_secs),
    })
}

fn progress_bar() -> indicatif::ProgressBar {
    let pb = indicatif::ProgressBar::new(100);
    pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    let style = indicatif::ProgressStyle::with_template("{msg} [{bar:30}] {pos:>3}%")
        .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
        .progress_chars("=> ");
    pb.set_style(style);
    pb.set_message("Analyzing damage");
    pb
}

fn finish_verdict(
    resp: &DetectionResponse,
    policy: RejectPolicy,
    args: &VerdictArgs,
    cfg: &EffectiveConfig,
    ui_cfg: &UiConfig,
    json: bool,
) -> Result<ExitCode> {
    let verdict = Verdict::from_response(resp, policy);
    let report = InspectionReport::new(resp, &verdict);
    let export_dir = Path::new(&cfg.export.dir);

    if let Some(path) = &args.report {
        let path = path
            .clone()
            .unwrap_or_else(|| crate::export::default_report_path(export_dir));
        crate::export::write_report(&path, &report)?;
        if !ui_cfg.quiet && !json {
            eprintln!("report: {}", path.display());
        }
    }
    if let Some(path) = &args.csv {
        let path = path
            .clone()
            .unwrap_or_else(|| crate::export::default_csv_path(export_dir));
        crate::export::write_csv(&path, resp)?;
        if !ui_cfg.quiet && !json {
            eprintln!("csv: {}", path.display());
        }
    }

    if json {
        write_json(&report)?;
    } else {
        crate::ui::print_verdict(&verdict, resp, ui_cfg);
    }

    Ok(match verdict.decision {
        Decision::Accept => ExitCode::Success,
        Decision::Reject => ExitCode::Rejected,
    })
}

fn read_response(path: &Path) -> Result<DetectionResponse> {
    let buf = if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        io::stdin()
            .lock()
            .read_to_end(&mut buf)
            .context("failed to read response from stdin")?;
        buf
    } else {
        std::fs::read(path)
            .with_context(|| format!("failed to read response: {}", path.display()))
            .map_err(crate::exit::invalid_args_err)?
    };
    crate::client::decode_detection(&buf).map_err(|err| {
        crate::exit::invalid_args_err(
            anyhow::Error::new(err).context(format!("not a detection response: {}", path.display())),
        )
    })
}

fn write_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    use std::io::Write;

    let buf = serde_json::to_vec_pretty(value)?;

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(err.into()),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(crate::exit::invalid_args(format!(
            "unsupported shell: {other} (expected bash|zsh|fish)"
        ))),
    }
}
