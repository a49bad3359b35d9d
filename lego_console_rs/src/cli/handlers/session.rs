//! Session and shell plumbing commands.
//!
//! `alias` and `help` are generic over [`Shell`] so that sub-shells get them
//! with their own aliases and parsers.

use clap::ArgMatches;
use tracing::{debug, error};

use crate::cli::console::Console;
use crate::cli::dispatch::Shell;
use crate::cli::parser::check_mutually_exclusive;
use crate::cli::slots;
use crate::colors::CLEAR_SCREEN;
use crate::error::ShellResult;
use crate::types::Flow;

const HELP_WIDTH: usize = 80;

pub fn alias<S: Shell>(shell: &mut S, _: &str) -> ShellResult<Flow> {
    let aliases = shell.aliases().lookup_all();
    for (name, value) in aliases {
        shell.terminal().println(&format!("alias {name}='{value}'"));
    }
    Ok(Flow::Continue)
}

pub fn help<S: Shell>(shell: &mut S, args: &ArgMatches) -> ShellResult<Flow> {
    let Some(topic) = args.get_one::<String>("topic") else {
        list_commands(shell);
        return Ok(Flow::Continue);
    };

    let mut topic = topic.clone();
    if let Some(resolved) = shell.aliases().resolve_line(Some(topic.as_str())) {
        shell.terminal().println(&format!("alias: {resolved}\n"));
        topic = resolved;
    }

    let subsystem = shell.subsystem();
    if let Ok(parser) = shell.parsers().get_parser(subsystem, &topic) {
        let text = parser.as_ref().clone().render_long_help().to_string();
        shell.terminal().print(&text);
        return Ok(Flow::Continue);
    }

    let summary = shell
        .commands()
        .into_iter()
        .find(|entry| entry.name == topic && !entry.summary.is_empty())
        .map(|entry| entry.summary);
    match summary {
        Some(summary) => shell.terminal().println(summary),
        None => shell.terminal().println(&format!("*** No help on {topic}")),
    }
    Ok(Flow::Continue)
}

fn list_commands<S: Shell>(shell: &mut S) {
    let names: Vec<&str> = shell.commands().iter().map(|entry| entry.name).collect();
    let header = "Documented commands (type help <topic>):";
    let width = names.iter().map(|n| n.len()).max().unwrap_or(0) + 2;
    let per_line = (HELP_WIDTH / width.max(1)).max(1);

    let terminal = shell.terminal();
    terminal.println(header);
    terminal.println(&"=".repeat(header.len()));
    for row in names.chunks(per_line) {
        let line: String = row.iter().map(|n| format!("{n:<width$}")).collect();
        terminal.println(line.trim_end());
    }
    terminal.println("");
}

pub fn clear(console: &mut Console, _: &str) -> ShellResult<Flow> {
    console.terminal.print(CLEAR_SCREEN);
    Ok(Flow::Continue)
}

pub fn connect(console: &mut Console, args: &ArgMatches) -> ShellResult<Flow> {
    let device = args.get_one::<String>("device").map(String::as_str);
    console.connect(device)?;
    Ok(Flow::Continue)
}

pub fn disconnect(console: &mut Console, _: &str) -> ShellResult<Flow> {
    console.disconnect();
    Ok(Flow::Continue)
}

pub fn exit(console: &mut Console, _: &str) -> ShellResult<Flow> {
    console.disconnect();
    Ok(Flow::Stop)
}

pub fn history(console: &mut Console, args: &ArgMatches) -> ShellResult<Flow> {
    if !check_mutually_exclusive(args, &["read", "write"]) {
        error!("Options -r and -w are mutually exclusive.");
        return Ok(Flow::Continue);
    }

    if args.get_flag("clear") {
        debug!("Clearing history ...");
        console.history.clear();
    } else if let Some(&offset) = args.get_one::<i64>("offset") {
        match console.history.remove(offset) {
            Some(line) => debug!("Removed history entry {}: {}", offset, line),
            None => error!("History position out of range: {}", offset),
        }
        return Ok(Flow::Continue);
    }

    if args.get_flag("write") {
        console.history.write()?;
    } else if args.get_flag("read") {
        console.history.read()?;
    } else {
        let lines: Vec<String> = console
            .history
            .entries()
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{:>4}  {}", i + 1, line))
            .collect();
        for line in lines {
            console.terminal.println(&line);
        }
    }
    Ok(Flow::Continue)
}

pub fn status(console: &mut Console, args: &ArgMatches) -> ShellResult<Flow> {
    let painter = console.terminal.painter();
    let connected = console.session.is_connected();
    let state = if connected {
        painter.ok("Connected")
    } else {
        painter.error("Disconnected")
    };
    console.terminal.println(&format!("Status      : {state}"));
    if !connected {
        return Ok(Flow::Continue);
    }

    let port = console.session.port().unwrap_or_default().to_string();
    let name = painter.device(console.session.device_name().unwrap_or("?"));
    console.terminal.println(&format!("Device      : {port}"));
    console.terminal.println(&format!("Device Name : {name}"));

    if args.get_flag("slots") {
        slots::print_status(console)?;
    }
    Ok(Flow::Continue)
}
