//! lego-console - interactive shell for Lego Mindstorms Inventor / Spike Prime hubs.

use std::any::Any;
use std::panic;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use lego_console::cli::Console;
use lego_console::colors::{self, Painter};
use lego_console::config::ConsoleConfig;
use lego_console::device::serial::SerialConnector;
use lego_console::terminal::Terminal;
use lego_console::types::ColorMode;

#[derive(Parser, Debug)]
#[command(name = "lego-console", version, about)]
struct Args {
    /// Serial port of the hub to connect to on startup
    #[arg(short, long)]
    device: Option<String>,

    /// Do not connect to a hub on startup
    #[arg(long)]
    no_auto_connect: bool,

    /// Configuration file (default: <config dir>/lego-console/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Command history file
    #[arg(long, value_name = "PATH")]
    history_file: Option<PathBuf>,

    /// Number of history entries kept
    #[arg(long, value_name = "N")]
    history_size: Option<usize>,

    /// Colored output
    #[arg(long, value_enum)]
    color: Option<ColorMode>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn install_broken_pipe_handler() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let payload = info.payload();
        let is_broken = <dyn Any>::downcast_ref::<&str>(payload)
            .is_some_and(|s| s.contains("Broken pipe"))
            || <dyn Any>::downcast_ref::<String>(payload)
                .is_some_and(|s| s.contains("Broken pipe"));

        if is_broken {
            std::process::exit(0);
        }

        default_hook(info);
    }));
}

fn load_config(args: &Args) -> ConsoleConfig {
    let mut config = match &args.config {
        Some(path) => ConsoleConfig::load_from_path(path),
        None => ConsoleConfig::load(),
    };
    if args.no_auto_connect {
        config.auto_connect = false;
    }
    if let Some(file) = &args.history_file {
        config.history_file = Some(file.clone());
    }
    if let Some(size) = args.history_size {
        config.history_size = size;
    }
    if let Some(color) = args.color {
        config.color = color;
    }
    config
}

fn main() -> anyhow::Result<()> {
    install_broken_pipe_handler();
    let args = Args::parse();

    // stdout belongs to the shell; diagnostics go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.parse().unwrap_or_default()),
        )
        .with_ansi(colors::is_enabled(args.color.unwrap_or_default()))
        .with_target(false)
        .without_time()
        .init();

    let config = load_config(&args);
    debug!("Configuration: {:?}", config);

    let terminal = Terminal::stdio(Painter::new(config.color));
    let mut console =
        Console::new(config, Box::new(SerialConnector), terminal).with_device(args.device);
    console.cmdloop().context("console terminated")?;
    Ok(())
}
