mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::paths::cmd_paths;
use commands::stringify::cmd_stringify;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Turn value graphs into source text that rebuilds them.
#[derive(Parser)]
#[command(
    name = "exval",
    version,
    about = "Serialize value graphs as executable source text"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serialize a JSON graph document to source text
    Stringify {
        /// Path to the graph document
        file: PathBuf,
        /// Keep the `name` attribute of named callables
        #[arg(long)]
        preserve_names: bool,
        /// TOML file with serializer options
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List the canonical paths of the default realm
    Paths {
        /// Only show paths containing this text
        #[arg(long)]
        filter: Option<String>,
        /// TOML file with serializer options
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Stringify {
            file,
            preserve_names,
            config,
        } => {
            cmd_stringify(
                &file,
                preserve_names,
                config.as_deref(),
                cli.output,
                cli.quiet,
            );
        }
        Commands::Paths { filter, config } => {
            cmd_paths(filter.as_deref(), config.as_deref(), cli.output, cli.quiet);
        }
    }
}

/// Print an error to stderr in the selected format.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            let json = serde_json::json!({ "error": msg });
            eprintln!("{}", json);
        }
    }
}
