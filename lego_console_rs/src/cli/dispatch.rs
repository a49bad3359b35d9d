//! Read-execute-print loop shared by the console and its sub-shells.
//!
//! A shell is a table of [`CommandEntry`] values. Each entry declares whether
//! it needs a connected device and whether its arguments go through the
//! parser cache; the dispatcher applies both before calling the handler.

use clap::ArgMatches;
use tracing::{debug, error};

use super::parser::{ParserCache, Subsystem};
use crate::alias::AliasRegistry;
use crate::cli::console::Session;
use crate::error::{ShellError, ShellResult};
use crate::history::History;
use crate::terminal::Terminal;
use crate::types::Flow;

/// Alias expansions allowed for a single input line.
const MAX_ALIAS_DEPTH: usize = 8;

/// Largest edit distance that still earns a "did you mean" hint.
const SUGGESTION_DISTANCE: usize = 2;

/// Line fed to the shell when input runs out.
pub const EOF_LINE: &str = "EOF";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Guard {
    /// Refused without an open device; the handler never runs.
    Connected,
    Always,
}

pub enum Handler<S> {
    /// Arguments are validated by the command's parser first.
    Parsed(fn(&mut S, &ArgMatches) -> ShellResult<Flow>),
    /// Receives the rest of the line untouched.
    Raw(fn(&mut S, &str) -> ShellResult<Flow>),
}

impl<S> Clone for Handler<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Handler<S> {}

pub struct CommandEntry<S> {
    pub name: &'static str,
    /// One line shown by `help <name>` when the command has no parser.
    pub summary: &'static str,
    pub guard: Guard,
    pub handler: Handler<S>,
}

impl<S> Clone for CommandEntry<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for CommandEntry<S> {}

impl<S> CommandEntry<S> {
    pub const fn parsed(
        name: &'static str,
        guard: Guard,
        handler: fn(&mut S, &ArgMatches) -> ShellResult<Flow>,
    ) -> Self {
        Self {
            name,
            summary: "",
            guard,
            handler: Handler::Parsed(handler),
        }
    }

    pub const fn raw(
        name: &'static str,
        summary: &'static str,
        guard: Guard,
        handler: fn(&mut S, &str) -> ShellResult<Flow>,
    ) -> Self {
        Self {
            name,
            summary,
            guard,
            handler: Handler::Raw(handler),
        }
    }
}

/// What the dispatcher needs from a shell.
pub trait Shell: Sized {
    fn subsystem(&self) -> Subsystem;

    fn commands(&self) -> Vec<CommandEntry<Self>>;

    fn aliases(&self) -> &AliasRegistry;

    fn session(&self) -> &Session;

    fn parsers(&mut self) -> &mut ParserCache;

    fn terminal(&mut self) -> &mut Terminal;

    /// Parser cache and terminal borrowed together, for argument parsing.
    fn parsers_and_terminal(&mut self) -> (&mut ParserCache, &mut Terminal);

    fn history(&mut self) -> &mut History;

    fn prompt(&self) -> String;

    fn is_connected(&self) -> bool {
        self.session().is_connected()
    }
}

/// Runs one input line.
pub fn onecmd<S: Shell>(shell: &mut S, line: &str) -> ShellResult<Flow> {
    dispatch(shell, line, 0)
}

fn dispatch<S: Shell>(shell: &mut S, line: &str, depth: usize) -> ShellResult<Flow> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Flow::Continue);
    }

    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim_start()),
        None => (line, ""),
    };

    if let Some(entry) = shell.commands().into_iter().find(|e| e.name == command) {
        return run_entry(shell, entry, rest);
    }

    if depth < MAX_ALIAS_DEPTH
        && let Some(resolved) = shell.aliases().resolve_line(Some(line))
    {
        debug!("alias: {} -> {}", line, resolved);
        return dispatch(shell, &resolved, depth + 1);
    }

    command_not_found(shell, line, command);
    Ok(Flow::Continue)
}

fn run_entry<S: Shell>(shell: &mut S, entry: CommandEntry<S>, rest: &str) -> ShellResult<Flow> {
    if entry.guard == Guard::Connected && !shell.is_connected() {
        error!("{}", ShellError::NotConnected);
        return Ok(Flow::Continue);
    }
    match entry.handler {
        Handler::Parsed(handler) => {
            let subsystem = shell.subsystem();
            let (parsers, terminal) = shell.parsers_and_terminal();
            match parsers.parse(rest, subsystem, entry.name, terminal)? {
                Some(matches) => handler(shell, &matches),
                None => Ok(Flow::Continue),
            }
        }
        Handler::Raw(handler) => handler(shell, rest),
    }
}

fn command_not_found<S: Shell>(shell: &mut S, line: &str, command: &str) {
    let mut candidates: Vec<String> = shell
        .commands()
        .iter()
        .map(|entry| entry.name.to_string())
        .collect();
    candidates.extend(shell.aliases().lookup_all().into_iter().map(|(name, _)| name));

    let suggestion = candidates
        .into_iter()
        .filter(|name| name != EOF_LINE)
        .map(|name| (strsim::levenshtein(command, &name), name))
        .filter(|(distance, _)| *distance <= SUGGESTION_DISTANCE)
        .min_by_key(|(distance, _)| *distance);

    let terminal = shell.terminal();
    terminal.println(&format!("{line}: command not found"));
    if let Some((_, name)) = suggestion {
        terminal.println(&format!("did you mean '{name}'?"));
    }
}

/// Reads and runs lines until a handler stops the loop.
///
/// Errors from a command are logged and the loop goes on, except for
/// defects in the command tables, which end the shell.
pub fn run_loop<S: Shell>(shell: &mut S) -> ShellResult<()> {
    loop {
        let prompt = shell.prompt();
        let line = match shell.terminal().read_line(&prompt)? {
            Some(line) => {
                shell.history().push(&line);
                line
            }
            None => {
                shell.terminal().println("");
                EOF_LINE.to_string()
            }
        };
        if run_boundary(shell, &line)? == Flow::Stop {
            return Ok(());
        }
    }
}

/// Runs one line, logging recoverable errors.
pub fn run_boundary<S: Shell>(shell: &mut S, line: &str) -> ShellResult<Flow> {
    match onecmd(shell, line) {
        Ok(flow) => Ok(flow),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            error!("{e}");
            Ok(Flow::Continue)
        }
    }
}
