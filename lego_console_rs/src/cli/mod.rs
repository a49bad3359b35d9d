//! The interactive shells.
//!
//! # Architecture
//!
//! ```text
//! input line
//!     │
//!     ▼
//! dispatch::onecmd ──(unknown command)──► alias registry ──► re-dispatch
//!     │
//!     ▼
//! command table entry
//!     ├── Guard::Connected   (refused when no device is open)
//!     └── Handler::Parsed    (parser::ParserCache splits and validates)
//!           │
//!           ▼
//!     handlers::* / slots::*  ──►  device helpers  ──►  hub
//! ```
//!
//! [`console::Console`] is the main shell. `slots` opens [`slots::Slots`], a
//! sub-shell that borrows the console and shares its parsers, terminal and
//! history.

pub mod console;
pub mod dispatch;
pub mod format;
pub mod handlers;
pub mod parser;
pub mod slots;

pub use console::{Console, Session};
pub use dispatch::{Shell, onecmd};
pub use parser::{ParserCache, Subsystem, check_mutually_exclusive};
