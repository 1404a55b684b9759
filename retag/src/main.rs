use clap::{CommandFactory, FromArgMatches, Parser};
use libretag::auth::DockerConfigProvider;
use libretag::report;
use libretag::{RetagError, RetagRequest, Retagger};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod context;
mod format;
mod version;

use context::{AppContext, CliOverrides, VerbosityLevel};
use format::OutputFormatter;

/// Exit code after Ctrl-C, as shells report for SIGINT.
const EXIT_CANCELLED: u8 = 130;

/// docker-retag - point a registry tag at an existing image
///
/// Makes NEW_TAG in the source image's repository point at the same manifest
/// as SOURCE_IMAGE, without pulling or pushing layers. Running it again is a
/// no-op once the tag is correct.
#[derive(Parser, Debug)]
#[command(name = "docker-retag")]
#[command(about, long_about)]
struct Cli {
    /// Image to promote (e.g. registry.example.com/team/app:build-42)
    #[arg(value_name = "SOURCE_IMAGE")]
    source: String,

    /// Tag to point at the source image (e.g. production)
    #[arg(value_name = "NEW_TAG")]
    new_tag: String,

    /// Show what would change without writing the tag
    #[arg(long)]
    dry_run: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Control colored output: auto, always, never
    #[arg(long, value_parser = ["auto", "always", "never"])]
    color: Option<String>,

    /// Output format: pretty, json, yaml
    #[arg(short, long, value_parser = ["pretty", "json", "yaml"])]
    format: Option<String>,

    /// Configuration file (YAML)
    #[arg(long, value_name = "PATH", env = "RETAG_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            config_path: self.config.clone(),
            color: self.color.as_deref().map(format::parse_color),
            format: self.format.as_deref().map(format::parse_format),
            verbosity: VerbosityLevel::from_count(self.verbose),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = Cli::command()
        .version(version::get_version_string())
        .get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    let ctx = match AppContext::build(cli.overrides()) {
        Ok(ctx) => ctx,
        Err(e) => return fail(ctx_error_formatter(&cli).as_ref(), &e),
    };
    init_tracing(ctx.verbosity);
    if let Some(path) = ctx.config_file() {
        tracing::debug!(path = %path.display(), "loaded configuration file");
    }

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let stderr = format::create_error_formatter(ctx.config.output.color);
    match run(&cli, &ctx, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(stderr.as_ref(), &e),
    }
}

async fn run(cli: &Cli, ctx: &AppContext, cancel: &CancellationToken) -> libretag::Result<()> {
    let retagger = Retagger::builder()
        .with_config(ctx.config.clone())
        .with_credentials(DockerConfigProvider::from_environment()?)
        .build()?;

    let request = RetagRequest::new(&cli.source, &cli.new_tag).dry_run(cli.dry_run);
    let outcome = retagger.retag(&request, cancel).await?;

    let options = ctx.config.report_options();
    let report = report::render(&outcome, &options);
    let summary = report::summarize(&outcome, &options);
    let stdout = format::create_formatter(ctx.config.output.color);
    let output = format::format_output(
        &summary,
        &report,
        ctx.config.output.format,
        stdout.as_ref(),
    )
    .map_err(RetagError::validation)?;
    println!("{}", output);
    Ok(())
}

fn init_tracing(verbosity: VerbosityLevel) {
    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping");
            cancel.cancel();
        }
    });
}

/// Formatter for errors raised before the configuration is known.
fn ctx_error_formatter(cli: &Cli) -> Box<dyn OutputFormatter> {
    let color = cli
        .color
        .as_deref()
        .map(format::parse_color)
        .unwrap_or_default();
    format::create_error_formatter(color)
}

fn fail(formatter: &dyn OutputFormatter, error: &RetagError) -> ExitCode {
    eprintln!("{}", formatter.failure(error));
    if error.is_cancelled() {
        ExitCode::from(EXIT_CANCELLED)
    } else {
        ExitCode::FAILURE
    }
}
