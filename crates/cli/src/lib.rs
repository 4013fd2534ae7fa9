pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use fitstore_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};
use tracing_subscriber::EnvFilter;

use crate::commands::recommend::RecommendTarget;

#[derive(Debug, Parser)]
#[command(
    name = "fitstore",
    about = "Fitstore recommendation and customer segmentation CLI",
    long_about = "Operate the Fitstore catalog database, refresh customer segments, and query product recommendations.",
    after_help = "Examples:\n  fitstore migrate\n  fitstore seed\n  fitstore recommend item prod-whey-gold --limit 3\n  fitstore recommend hybrid user-001 --by-user"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    #[arg(long, global = true, help = "Path to a fitstore.toml config file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override the database URL")]
    database_url: Option<String>,
    #[arg(long, global = true, help = "Override the log level (trace, debug, info, warn, error)")]
    log_level: Option<String>,
    #[arg(long, global = true, value_parser = parse_log_format, help = "compact, pretty or json")]
    log_format: Option<LogFormat>,
    #[arg(long, global = true, help = "Cache the co-occurrence matrix between calls")]
    cache_matrix: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo catalog and orders, then classify the demo customers")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Provision customers for every buyer and recompute all segments")]
    Resync,
    #[command(about = "Query one of the recommendation strategies")]
    Recommend {
        #[command(subcommand)]
        target: RecommendTarget,
    },
}

impl GlobalArgs {
    fn load_options(self) -> LoadOptions {
        LoadOptions {
            require_file: self.config.is_some(),
            config_path: self.config,
            overrides: ConfigOverrides {
                database_url: self.database_url,
                log_level: self.log_level,
                log_format: self.log_format,
                default_limit: None,
                cache_matrix: self.cache_matrix.then_some(true),
            },
        }
    }
}

fn parse_log_format(raw: &str) -> Result<LogFormat, String> {
    raw.parse::<LogFormat>().map_err(|error| error.to_string())
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.global.load_options();

    // Config failures are reported by the command itself.
    if let Ok(config) = AppConfig::load(options.clone()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(&options),
        Command::Seed => commands::seed::run(&options),
        Command::Resync => commands::resync::run(&options),
        Command::Recommend { target } => commands::recommend::run(&options, target),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(&options) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout stays a single JSON document per command.
fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(error) = installed {
        eprintln!("logging already initialized: {error}");
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::Cli;

    #[test]
    fn popular_help_counts_every_non_cancelled_order() {
        let command = Cli::command();
        let about = command
            .find_subcommand("recommend")
            .and_then(|recommend| recommend.find_subcommand("popular"))
            .and_then(|popular| popular.get_about())
            .map(|about| about.to_string())
            .expect("popular subcommand has help text");

        assert!(about.contains("non-cancelled"), "{about}");
        assert!(about.contains("pending"), "{about}");
    }
}
