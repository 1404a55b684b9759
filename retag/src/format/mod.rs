use libretag::config::{ColorChoice, OutputFormat};
use libretag::error::RetagError;
use libretag::report::{FAILURE_MARKER, Report, ReportStatus, RetagSummary};
use owo_colors::OwoColorize;
use std::io::IsTerminal;

/// Turns reports and failures into the lines the CLI prints.
pub trait OutputFormatter: Send + Sync {
    /// The `[OK]` or `[DRY-RUN]` line for a finished run.
    fn report(&self, report: &Report) -> String;

    /// The `[FAIL]` line for a failed run.
    fn failure(&self, error: &RetagError) -> String;
}

/// Formatter with colored markers, for terminals.
pub struct TtyFormatter;

impl OutputFormatter for TtyFormatter {
    fn report(&self, report: &Report) -> String {
        let marker = match report.status {
            ReportStatus::Ok => report.status.marker().green().bold().to_string(),
            ReportStatus::DryRun => report.status.marker().yellow().bold().to_string(),
        };
        format!("{} {}", marker, report.message)
    }

    fn failure(&self, error: &RetagError) -> String {
        format!("{} Error: {}", FAILURE_MARKER.red().bold(), error)
    }
}

/// Plain text formatter for non-TTY output (piped, scripted)
pub struct PlainFormatter;

impl OutputFormatter for PlainFormatter {
    fn report(&self, report: &Report) -> String {
        report.to_string()
    }

    fn failure(&self, error: &RetagError) -> String {
        libretag::report::render_failure(error)
    }
}

/// Decides whether to color output written to a stream.
///
/// `auto` colors only when the stream is a terminal and `NO_COLOR` is unset.
pub fn should_color(choice: ColorChoice, is_terminal: bool, no_color: bool) -> bool {
    match choice {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => is_terminal && !no_color,
    }
}

/// Create the formatter for stdout.
pub fn create_formatter(choice: ColorChoice) -> Box<dyn OutputFormatter> {
    create_formatter_for(choice, std::io::stdout().is_terminal())
}

/// Create the formatter for stderr, which may be a terminal when stdout is not.
pub fn create_error_formatter(choice: ColorChoice) -> Box<dyn OutputFormatter> {
    create_formatter_for(choice, std::io::stderr().is_terminal())
}

fn create_formatter_for(choice: ColorChoice, is_terminal: bool) -> Box<dyn OutputFormatter> {
    let no_color = std::env::var_os("NO_COLOR").is_some();
    if should_color(choice, is_terminal, no_color) {
        Box::new(TtyFormatter)
    } else {
        Box::new(PlainFormatter)
    }
}

/// Parses a `--color` value. Unknown values fall back to `auto`.
pub fn parse_color(s: &str) -> ColorChoice {
    match s.to_lowercase().as_str() {
        "always" => ColorChoice::Always,
        "never" => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

/// Parses a `--format` value. Unknown values fall back to `pretty`.
pub fn parse_format(s: &str) -> OutputFormat {
    match s.to_lowercase().as_str() {
        "json" => OutputFormat::Json,
        "yaml" | "yml" => OutputFormat::Yaml,
        _ => OutputFormat::Pretty,
    }
}

/// Format a successful run for stdout.
pub fn format_output(
    summary: &RetagSummary,
    report: &Report,
    format: OutputFormat,
    formatter: &dyn OutputFormatter,
) -> Result<String, String> {
    match format {
        OutputFormat::Pretty => Ok(formatter.report(report)),
        OutputFormat::Json => serde_json::to_string_pretty(summary)
            .map_err(|e| format!("Failed to serialize to JSON: {}", e)),
        OutputFormat::Yaml => serde_yaml::to_string(summary)
            .map(|s| s.trim_end().to_string())
            .map_err(|e| format!("Failed to serialize to YAML: {}", e)),
    }
}
