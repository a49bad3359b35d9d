//! Argument parsers for shell commands, built on demand and cached.
//!
//! Each (subsystem, command) pair owns one `clap::Command`. Parsers are
//! created the first time they are asked for and then reused for the rest
//! of the session.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use tracing::trace;

use crate::error::{ShellError, ShellResult};
use crate::terminal::Terminal;

/// Which shell a command belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Console,
    Slots,
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subsystem::Console => f.write_str("console"),
            Subsystem::Slots => f.write_str("slots"),
        }
    }
}

#[derive(Debug)]
pub struct ParserCache {
    max_slots: usize,
    cache: HashMap<(Subsystem, String), Rc<Command>>,
}

impl ParserCache {
    pub fn new(max_slots: usize) -> Self {
        Self {
            max_slots,
            cache: HashMap::new(),
        }
    }

    /// Returns the parser for `command`, building it on first use.
    pub fn get_parser(&mut self, subsystem: Subsystem, command: &str) -> ShellResult<Rc<Command>> {
        let key = (subsystem, command.to_string());
        if let Some(parser) = self.cache.get(&key) {
            return Ok(Rc::clone(parser));
        }

        trace!("building parser for {}::{}", subsystem, command);
        let parser = match (subsystem, command) {
            // The sub-shell reuses the console's help surface for these.
            (Subsystem::Slots, "help" | "history") => self.get_parser(Subsystem::Console, command)?,
            _ => Rc::new(
                build_parser(subsystem, command, self.max_slots).ok_or_else(|| {
                    ShellError::UnknownParser {
                        subsystem: subsystem.to_string(),
                        command: command.to_string(),
                    }
                })?,
            ),
        };
        self.cache.insert(key, Rc::clone(&parser));
        Ok(parser)
    }

    /// Splits `raw` like a shell would and validates it.
    ///
    /// Input errors are printed to `term` with the command's usage and yield
    /// `Ok(None)`: the caller has nothing left to do.
    pub fn parse(
        &mut self,
        raw: &str,
        subsystem: Subsystem,
        command: &str,
        term: &mut Terminal,
    ) -> ShellResult<Option<ArgMatches>> {
        let parser = self.get_parser(subsystem, command)?;
        let Some(tokens) = shlex::split(raw) else {
            term.println(&format!("{command}: error: No closing quotation"));
            term.println(&parser.as_ref().clone().render_usage().to_string());
            return Ok(None);
        };
        match parser.as_ref().clone().try_get_matches_from(tokens) {
            Ok(matches) => Ok(Some(matches)),
            Err(err) => {
                term.print(&err.render().to_string());
                Ok(None)
            }
        }
    }
}

/// False when more than one of `names` was given on the command line.
pub fn check_mutually_exclusive(matches: &ArgMatches, names: &[&str]) -> bool {
    let given = names
        .iter()
        .filter(|name| matches.value_source(name) == Some(ValueSource::CommandLine))
        .count();
    given <= 1
}

fn base(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .no_binary_name(true)
        .disable_help_flag(true)
        .disable_version_flag(true)
}

fn flag(id: &'static str, short: char, long: Option<&'static str>, help: &'static str) -> Arg {
    let arg = Arg::new(id).short(short).action(ArgAction::SetTrue).help(help);
    match long {
        Some(long) => arg.long(long),
        None => arg,
    }
}

fn build_parser(subsystem: Subsystem, command: &str, max_slots: usize) -> Option<Command> {
    let slot_help = format!("0 <= slot < {max_slots}");
    let parser = match (subsystem, command) {
        (Subsystem::Console, "cat") => base("cat", "Concatenate files and print on the standard output.")
            .arg(flag("number_nonblank", 'b', Some("number-nonblank"), "Number nonempty output lines, overrides -n."))
            .arg(flag("show_ends", 'E', Some("show-ends"), "Display $ at end of each line."))
            .arg(flag("number", 'n', Some("number"), "Number all output lines."))
            .arg(flag("raw", 'r', Some("raw"), "Prints the raw data, overrides all other options."))
            .arg(flag("squeeze_blank", 's', Some("squeeze-blank"), "Suppress repeated empty output lines."))
            .arg(flag("show_tabs", 'T', Some("show-tabs"), "Display TAB characters as ^I."))
            .arg(flag("show_nonprinting", 'v', Some("show-nonprinting"), "Use ^ and M- notation, except for LFD and TAB."))
            .arg(Arg::new("file").num_args(1..).required(true)),
        (Subsystem::Console, "cd") => base(
            "cd",
            "Change the working directory to <directory>. The default <directory> is '/'.",
        )
        .arg(Arg::new("directory").default_value("/")),
        (Subsystem::Console, "connect") => {
            base("connect", "Connects to a device, prompting if one is not specified.")
                .arg(Arg::new("device"))
        }
        (Subsystem::Console, "cp") => base("cp", "Copies files.")
            .arg(Arg::new("source").num_args(1..).required(true))
            .arg(Arg::new("destination").required(true))
            .arg(flag("backup", 'b', None, "Make a backup of each existing destination file."))
            .arg(flag("force", 'f', Some("force"), "Overwrite existing destination files without prompting (ignored when -n or -i are used)."))
            .arg(flag("interactive", 'i', Some("interactive"), "Prompt before overwriting existing destination files (ignored when -n is used)."))
            .arg(flag("no_clobber", 'n', Some("no-clobber"), "Do not overwrite existing destination files."))
            .arg(flag("preserve", 'p', None, "Preserve mode, ownership, and timestamp attributes."))
            .arg(
                Arg::new("suffix")
                    .short('s')
                    .long("suffix")
                    .default_value("~")
                    .help("Override the backup suffix."),
            )
            .arg(flag("verbose", 'v', Some("verbose"), "Explain what is being done.")),
        (Subsystem::Console, "df") => base("df", "Report file system disk space usage.")
            .arg(Arg::new("file").default_value("/"))
            .arg(
                Arg::new("size")
                    .short('B')
                    .long("block-size")
                    .value_name("SIZE")
                    .help("Scale sizes by <SIZE> before printing them."),
            )
            .arg(flag("human_readable", 'h', Some("human-readable"), "Print sizes in powers of 1024."))
            .arg(flag("si", 'H', Some("si"), "Print sizes in powers of 1000.")),
        (Subsystem::Console, "download") => base(
            "download",
            "Downloads a file to the working directory on the local machine.",
        )
        .arg(Arg::new("source").required(true))
        .arg(Arg::new("target")),
        (Subsystem::Console, "help") => {
            base("help", "Display help information.").arg(Arg::new("topic"))
        }
        (Subsystem::Console, "history") => base("history", "Display or manipulate the history list.")
            .arg(flag("clear", 'c', None, "Clear the history list by deleting all of the entries."))
            .arg(flag("read", 'r', None, "Read the history file and append the contents to the history list."))
            .arg(flag("write", 'w', None, "Write the current history to the history file."))
            .arg(
                Arg::new("offset")
                    .short('d')
                    .value_parser(value_parser!(i64))
                    .allow_negative_numbers(true)
                    .help("Delete the history entry at position <offset>. Negative offsets count back from the end of the history list."),
            ),
        (Subsystem::Console, "ls") => base(
            "ls",
            "List information about the <file>s (the working directory by default).",
        )
        .arg(flag("all", 'a', Some("all"), "Do not ignore entries starting with '.'."))
        .arg(flag("long_list", 'l', None, "Use a long listing format."))
        .arg(flag("sort_reverse", 'r', Some("reverse"), "Reverse order while sorting."))
        .arg(flag("recursive", 'R', Some("recursive"), "List subdirectories recursively."))
        .arg(flag("sort_size", 'S', None, "Sort by file size."))
        .arg(flag("sort_none", 'U', None, "Do not sort; list entries in directory order."))
        .arg(Arg::new("file").num_args(0..)),
        (Subsystem::Console, "rm") => {
            base("rm", "Removes a remote <file>.").arg(Arg::new("file").required(true))
        }
        (Subsystem::Console, "status") => base("status", "Displays the current device status.")
            .arg(flag("slots", 's', Some("slots"), "Include slot status.")),
        (Subsystem::Console, "upload") => base(
            "upload",
            "Uploads a file to the working directory on the device.",
        )
        .arg(Arg::new("source").required(true))
        .arg(Arg::new("target")),
        (Subsystem::Console, "vim") => base("vim", "Vi IMproved, a programmer's text editor.")
            .arg(Arg::new("file").required(true)),
        (Subsystem::Slots, "install") => base("install", "Installs a <script> to a <slot>.")
            .arg(Arg::new("script").required(true))
            .arg(flag("force", 'f', Some("force"), "Allow existing slots to be overridden."))
            .arg(
                Arg::new("slot")
                    .short('s')
                    .long("slot")
                    .required(true)
                    .value_parser(value_parser!(i64))
                    .allow_negative_numbers(true)
                    .help(slot_help),
            )
            .arg(
                Arg::new("type")
                    .short('t')
                    .long("type")
                    .value_parser(["python", "scratch"])
                    .num_args(0..=1)
                    .default_value("python")
                    .default_missing_value("python"),
            ),
        (Subsystem::Slots, "uninstall") => base("uninstall", "Uninstalls a script from a <slot>.")
            .arg(
                Arg::new("slot")
                    .required(true)
                    .value_parser(value_parser!(i64))
                    .allow_negative_numbers(true)
                    .help(slot_help),
            )
            .arg(flag("force", 'f', Some("force"), "Ignore empty slots, never prompt.")),
        _ => return None,
    };
    Some(parser)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::testing::scripted;

    #[test]
    fn cached_parser_is_reused() {
        let mut cache = ParserCache::new(10);
        let first = cache.get_parser(Subsystem::Console, "ls").unwrap();
        let second = cache.get_parser(Subsystem::Console, "ls").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn slots_share_help_and_history_parsers() {
        let mut cache = ParserCache::new(10);
        let console = cache.get_parser(Subsystem::Console, "history").unwrap();
        let slots = cache.get_parser(Subsystem::Slots, "history").unwrap();
        assert!(Rc::ptr_eq(&console, &slots));

        let slots_help = cache.get_parser(Subsystem::Slots, "help").unwrap();
        let console_help = cache.get_parser(Subsystem::Console, "help").unwrap();
        assert!(Rc::ptr_eq(&slots_help, &console_help));
    }

    #[test]
    fn unknown_pair_is_a_defect() {
        let mut cache = ParserCache::new(10);
        let err = cache.get_parser(Subsystem::Slots, "ls").unwrap_err();
        assert!(err.is_fatal());
        assert!(cache.get_parser(Subsystem::Console, "install").is_err());
    }

    #[test]
    fn parses_quoted_arguments() {
        let mut cache = ParserCache::new(10);
        let (mut term, _) = scripted("");
        let matches = cache
            .parse("-n 'my file.py' other.py", Subsystem::Console, "cat", &mut term)
            .unwrap()
            .expect("valid arguments");
        let files: Vec<&String> = matches.get_many::<String>("file").unwrap().collect();
        assert_eq!(files, ["my file.py", "other.py"]);
        assert!(matches.get_flag("number"));
        assert!(!matches.get_flag("raw"));
    }

    #[test]
    fn user_errors_print_usage_and_yield_none() {
        let mut cache = ParserCache::new(10);
        let (mut term, out) = scripted("");
        let parsed = cache.parse("-x", Subsystem::Console, "rm", &mut term).unwrap();
        assert!(parsed.is_none());
        assert!(out.contents().contains("Usage: rm"));

        out.clear();
        let parsed = cache.parse("'open", Subsystem::Console, "cat", &mut term).unwrap();
        assert!(parsed.is_none());
        assert!(out.contents().contains("No closing quotation"));
    }

    #[test]
    fn cp_takes_many_sources_and_one_destination() {
        let mut cache = ParserCache::new(10);
        let (mut term, _) = scripted("");
        let matches = cache
            .parse("a.py b.py /projects", Subsystem::Console, "cp", &mut term)
            .unwrap()
            .unwrap();
        assert_eq!(matches.get_many::<String>("source").unwrap().count(), 2);
        assert_eq!(matches.get_one::<String>("destination").unwrap(), "/projects");
        assert_eq!(matches.get_one::<String>("suffix").unwrap(), "~");
    }

    #[test]
    fn mutually_exclusive_flags() {
        let mut cache = ParserCache::new(10);
        let (mut term, _) = scripted("");
        let both = cache
            .parse("-b -n a b", Subsystem::Console, "cp", &mut term)
            .unwrap()
            .unwrap();
        assert!(!check_mutually_exclusive(&both, &["backup", "no_clobber"]));

        let one = cache
            .parse("-b a b", Subsystem::Console, "cp", &mut term)
            .unwrap()
            .unwrap();
        assert!(check_mutually_exclusive(&one, &["backup", "no_clobber"]));

        // defaults do not count as given
        let df = cache
            .parse("-h", Subsystem::Console, "df", &mut term)
            .unwrap()
            .unwrap();
        assert!(check_mutually_exclusive(&df, &["human_readable", "si", "size"]));
        let df = cache
            .parse("-h -B M", Subsystem::Console, "df", &mut term)
            .unwrap()
            .unwrap();
        assert!(!check_mutually_exclusive(&df, &["human_readable", "si", "size"]));
    }

    #[test]
    fn slot_arguments_are_typed() {
        let mut cache = ParserCache::new(10);
        let (mut term, _) = scripted("");
        let install = cache
            .parse("prog.py -s 3 -t", Subsystem::Slots, "install", &mut term)
            .unwrap()
            .unwrap();
        assert_eq!(*install.get_one::<i64>("slot").unwrap(), 3);
        assert_eq!(install.get_one::<String>("type").unwrap(), "python");

        let missing_slot = cache
            .parse("prog.py", Subsystem::Slots, "install", &mut term)
            .unwrap();
        assert!(missing_slot.is_none());

        let uninstall = cache
            .parse("-1", Subsystem::Slots, "uninstall", &mut term)
            .unwrap()
            .unwrap();
        assert_eq!(*uninstall.get_one::<i64>("slot").unwrap(), -1);
    }

    #[test]
    fn help_text_lists_flags_and_defaults() {
        let mut cache = ParserCache::new(10);
        let parser = cache.get_parser(Subsystem::Console, "cp").unwrap();
        let help = parser.as_ref().clone().render_long_help().to_string();
        assert!(help.contains("Copies files."));
        assert!(help.contains("--no-clobber"));
        assert!(help.contains("[default: ~]"));
    }
}
