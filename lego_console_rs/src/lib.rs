//! # lego-console
//!
//! Interactive shell for the files and program slots of Lego Mindstorms
//! Inventor / Spike Prime hubs.
//!
//! The hub runs MicroPython. The console reaches its filesystem by running
//! small programs in the raw REPL over a serial link and parsing what they
//! print, and offers familiar commands on top: `ls`, `cat`, `cd`, `cp`, `rm`,
//! `df`, `upload`, `download` and `vim`. The `slots` sub-shell installs
//! scripts into the hub's numbered program slots.
//!
//! ## Library usage
//!
//! ```rust,no_run
//! use lego_console::cli::Console;
//! use lego_console::colors::Painter;
//! use lego_console::config::ConsoleConfig;
//! use lego_console::device::serial::SerialConnector;
//! use lego_console::terminal::Terminal;
//!
//! # fn main() -> lego_console::ShellResult<()> {
//! let config = ConsoleConfig::load();
//! let terminal = Terminal::stdio(Painter::new(config.color));
//! let mut console = Console::new(config, Box::new(SerialConnector), terminal);
//! console.cmdloop()?;
//! # Ok(())
//! # }
//! ```

/// Alias registry: short tokens expanding to full command lines.
pub mod alias;
/// The console, its sub-shells, the dispatcher and the command handlers.
pub mod cli;
/// ANSI colors for prompts and listings.
pub mod colors;
/// Configuration file support.
///
/// Reads `<config dir>/lego-console/config.toml`; every field is optional.
pub mod config;
/// The hub link: [`Device`](device::Device) and
/// [`Connector`](device::Connector) traits, the serial transport and typed
/// remote queries.
pub mod device;
/// Error types.
pub mod error;
/// Command history with optional file persistence.
pub mod history;
/// Remote path normalization and protected paths.
pub mod paths;
/// Line input and output for the shells.
pub mod terminal;
/// Shared value types.
pub mod types;

pub use cli::Console;
pub use config::ConsoleConfig;
pub use error::{DeviceError, ShellError, ShellResult};
