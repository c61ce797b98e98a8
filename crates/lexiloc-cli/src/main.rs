use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod commands;

#[derive(Parser)]
#[command(name = "lexiloc", version, about = "Localized string-table toolkit")]
struct Cli {
    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Only warnings and errors on stderr
    #[arg(long)]
    quiet: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List discovered per-language documents
    Scan {
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        app_id: Option<String>,
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Resolve an id for a language, walking the fallback chain
    Resolve {
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        app_id: Option<String>,
        #[arg(short, long)]
        lang: String,
        #[arg(short, long)]
        id: String,
        /// Expand newline/ampersand placeholder tokens
        #[arg(long, default_value_t = false)]
        display: bool,
        #[arg(long, conflicts_with = "shortcut", default_value_t = false)]
        tooltip: bool,
        #[arg(long, conflicts_with = "tooltip", default_value_t = false)]
        shortcut: bool,
    },

    /// Merge a fresh harvest document against an old baseline
    Merge {
        /// Freshly harvested default-language document
        #[arg(long)]
        new: PathBuf,
        /// Previously shipped baseline (may be absent)
        #[arg(long)]
        old: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Check every variant's substitution markers against its source
    Validate {
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        app_id: Option<String>,
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Write back every dirty document
    Save {
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        app_id: Option<String>,
        /// Also write languages that have no customized file yet
        #[arg(long = "force-lang")]
        force_langs: Vec<String>,
    },
}

fn init_tracing(quiet: bool, log_dir: Option<&str>) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .boxed();
    let registry = tracing_subscriber::registry().with(filter).with(stderr_layer);
    if let Some(dir) = log_dir {
        let file = tracing_appender::rolling::daily(dir, "lexiloc.log");
        let file_layer = fmt::layer().with_ansi(false).with_writer(file).boxed();
        registry.with(file_layer).init();
    } else {
        registry.init();
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let cfg = lexiloc_config::load_config().unwrap_or_default();
    init_tracing(cli.quiet, cfg.log_dir.as_deref());

    let use_color =
        !cli.no_color && std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    commands::run(cli.cmd, &cfg, use_color)
}
