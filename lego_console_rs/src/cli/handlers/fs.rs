//! Unix-like file commands against the hub filesystem.

use std::sync::OnceLock;

use chrono::DateTime;
use clap::ArgMatches;
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::cli::console::Console;
use crate::cli::format::{
    Align, CatOptions, filemode, format_size_automatic, format_size_explicit, render_cat,
    render_columns,
};
use crate::cli::parser::check_mutually_exclusive;
use crate::device::{self, StatEntry};
use crate::error::ShellResult;
use crate::paths::{RemotePath, normalize_path};
use crate::types::Flow;

const DEFAULT_BLOCK_UNIT: &str = "K";

fn strings<'a>(args: &'a ArgMatches, id: &str) -> Vec<&'a String> {
    args.get_many::<String>(id)
        .map(|values| values.collect())
        .unwrap_or_default()
}

pub fn cat(console: &mut Console, args: &ArgMatches) -> ShellResult<Flow> {
    let raw = args.get_flag("raw");
    let options = CatOptions {
        number_nonblank: args.get_flag("number_nonblank"),
        show_ends: args.get_flag("show_ends"),
        number: args.get_flag("number"),
        squeeze_blank: args.get_flag("squeeze_blank"),
        show_tabs: args.get_flag("show_tabs"),
        show_nonprinting: args.get_flag("show_nonprinting"),
    };

    for file in strings(args, "file") {
        let path = console.session.resolve(file);
        let device = console.session.device()?;
        if !device::exists_file(device, &path)? {
            error!("File does not exist: {}", path);
            continue;
        }
        let data = match device.get(&path) {
            Ok(data) => data,
            Err(e) => {
                error!("Unable to read file: {}: {}", path, e);
                continue;
            }
        };

        if raw {
            console.terminal.write_bytes(&data);
            continue;
        }

        let text = match String::from_utf8(data) {
            Ok(text) => text,
            Err(e) => {
                error!("Unable to decode file: {}: {}", path, e);
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        for line in render_cat(&text, &options) {
            console.terminal.println(&line);
        }
    }
    Ok(Flow::Continue)
}

pub fn cd(console: &mut Console, args: &ArgMatches) -> ShellResult<Flow> {
    let directory = args
        .get_one::<String>("directory")
        .map(String::as_str)
        .unwrap_or("/");
    let path = if directory == "-" {
        console.session.cwd_old.clone()
    } else {
        console.session.resolve(directory)
    };

    let device = console.session.device()?;
    if device::exists_directory(device, &path)? {
        console.session.change_dir(path);
    } else {
        error!("Directory does not exist: {}", path);
    }
    Ok(Flow::Continue)
}

/// Strips everything but `[0-9a-zA-Z.~]` from a backup suffix.
fn sanitize_suffix(suffix: &str) -> String {
    regex_suffix_junk().replace_all(suffix, "").into_owned()
}

fn regex_suffix_junk() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^0-9a-zA-Z.~]+").expect("valid regex literal"))
}

pub fn cp(console: &mut Console, args: &ArgMatches) -> ShellResult<Flow> {
    if !check_mutually_exclusive(args, &["backup", "no_clobber"]) {
        error!("Options --backup (-b) and --no-clobber (-n) are mutually exclusive.");
        return Ok(Flow::Continue);
    }
    let backup = args.get_flag("backup");
    let force = args.get_flag("force");
    let interactive = args.get_flag("interactive");
    let no_clobber = args.get_flag("no_clobber");
    let verbose = args.get_flag("verbose");
    let suffix = sanitize_suffix(
        args.get_one::<String>("suffix")
            .map(String::as_str)
            .unwrap_or("~"),
    );
    if args.get_flag("preserve") {
        debug!("Attributes are not preserved on the hub; ignoring -p.");
    }

    let Some(destination) = args.get_one::<String>("destination") else {
        return Ok(Flow::Continue);
    };
    let destination = console.session.resolve(destination);
    let sources: Vec<RemotePath> = strings(args, "source")
        .into_iter()
        .map(|source| console.session.resolve(source))
        .collect();

    let device = console.session.device()?;
    for source in &sources {
        if !device::exists_file(device, source)? {
            error!("Does not exist or is not a file: {}", source);
            return Ok(Flow::Continue);
        }
    }

    let destination_is_dir = device::exists_directory(device, &destination)?;
    if sources.len() > 1 && !destination_is_dir {
        error!("Does not exist or is not directory: {}", destination);
        return Ok(Flow::Continue);
    }

    let mut unique = sources;
    unique.sort();
    unique.dedup();

    for source in unique {
        let target = if destination_is_dir {
            destination.join(source.file_name())
        } else {
            destination.clone()
        };
        if source == target {
            error!("'{}' and '{}' are the same file", source, target);
            continue;
        }

        let mut backup_path = None;
        if device::exists_file(device, &target)? {
            if no_clobber {
                continue;
            }
            if console.protected.is_protected(&target) {
                error!("Protected Path: {}", target);
                continue;
            }
            if (interactive || !force)
                && !console
                    .terminal
                    .confirm(&format!("Override existing file: {target}?"))
            {
                continue;
            }
            if backup {
                let path = target
                    .parent()
                    .join(&format!("{}{}", target.file_name(), suffix));
                device::copy_file(device, &target, &path)?;
                backup_path = Some(path);
            }
        }

        debug!("Copying '{}' to '{}' ...", source, target);
        if verbose {
            let mut line = format!("'{source}' -> '{target}'");
            if let Some(path) = &backup_path {
                line.push_str(&format!(" (backup: '{path}')"));
            }
            console.terminal.println(&line);
        }
        device::copy_file(device, &source, &target)?;
        info!("Copy completed.");
    }
    Ok(Flow::Continue)
}

pub fn df(console: &mut Console, args: &ArgMatches) -> ShellResult<Flow> {
    if !check_mutually_exclusive(args, &["human_readable", "si", "size"]) {
        error!(
            "Options --block-size (-B), --human-readable (-h), and --si (-H) are mutually exclusive."
        );
        return Ok(Flow::Continue);
    }

    let file = args
        .get_one::<String>("file")
        .map(String::as_str)
        .unwrap_or("/");
    let path = console.session.resolve(file);
    let device = console.session.device()?;
    let Some(vfs) = device::statvfs(device, &path)? else {
        error!("No such file or directory: {}", file);
        return Ok(Flow::Continue);
    };

    let frsize = vfs.frsize.max(0) as u64;
    let total = frsize * vfs.blocks.max(0) as u64;
    let free = frsize * vfs.bfree.max(0) as u64;
    let available = frsize * vfs.bavail.max(0) as u64;
    let used = total.saturating_sub(free);
    let used_percent = if total == 0 { 0 } else { used * 100 / total };

    let human_readable = args.get_flag("human_readable");
    let columns = if human_readable || args.get_flag("si") {
        let factor = if human_readable { 1024.0 } else { 1000.0 };
        vec![
            ("Filesystem".to_string(), Align::Left, file.to_string()),
            ("Size".to_string(), Align::Right, format_size_automatic(total, factor)),
            ("Used".to_string(), Align::Right, format_size_automatic(used, factor)),
            ("Avail".to_string(), Align::Right, format_size_automatic(available, factor)),
            ("Use%".to_string(), Align::Right, format!("{used_percent}%")),
        ]
    } else {
        let unit = args
            .get_one::<String>("size")
            .map(|size| size.to_uppercase())
            .unwrap_or_else(|| DEFAULT_BLOCK_UNIT.to_string());
        let (Some(total), Some(used), Some(available)) = (
            format_size_explicit(total, &unit),
            format_size_explicit(used, &unit),
            format_size_explicit(available, &unit),
        ) else {
            error!("Invalid block size: {}", unit);
            return Ok(Flow::Continue);
        };
        vec![
            ("Filesystem".to_string(), Align::Left, file.to_string()),
            (format!("1{unit}-blocks"), Align::Right, total),
            ("Used".to_string(), Align::Right, used),
            ("Available".to_string(), Align::Right, available),
            ("Use%".to_string(), Align::Right, format!("{used_percent}%")),
        ]
    };

    let columns: Vec<(&str, Align, String)> = columns
        .iter()
        .map(|(key, align, value)| (key.as_str(), *align, value.clone()))
        .collect();
    let (header, row) = render_columns(&columns);
    console.terminal.println(&header);
    console.terminal.println(&row);
    Ok(Flow::Continue)
}

fn owner(id: i64) -> String {
    if id == 0 {
        "root".to_string()
    } else {
        id.to_string()
    }
}

/// Entry name as `ls` shows it: relative to the working directory when below it.
fn entry_name(entry: &StatEntry, cwd: &RemotePath) -> String {
    match entry.name() {
        name @ ("." | "..") => name.to_string(),
        name => {
            let path = normalize_path(name);
            path.relative_to(cwd).unwrap_or_else(|| path.to_string())
        }
    }
}

fn long_line(entry: &StatEntry, name: &str) -> String {
    let stat = entry.stat();
    let modified = DateTime::from_timestamp(stat.mtime(), 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "?".to_string());
    format!(
        "{} {:>2} {} {} {:>8} {} {}",
        filemode(stat.mode()),
        stat.nlink(),
        owner(stat.uid()),
        owner(stat.gid()),
        stat.size(),
        modified,
        name
    )
}

pub fn ls(console: &mut Console, args: &ArgMatches) -> ShellResult<Flow> {
    let all = args.get_flag("all");
    let long_list = args.get_flag("long_list");
    let sort_reverse = args.get_flag("sort_reverse");
    let sort_size = args.get_flag("sort_size");
    let sort_none = args.get_flag("sort_none");
    if args.get_flag("recursive") {
        warn!("Recursive listing is not supported; listing the top level only.");
    }

    let files = strings(args, "file");
    let mut paths: Vec<RemotePath> = if files.is_empty() {
        vec![console.session.cwd.clone()]
    } else {
        files
            .into_iter()
            .map(|file| console.session.resolve(file))
            .collect()
    };
    paths.sort();
    let several = paths.len() > 1;

    for path in &paths {
        let device = console.session.device()?;
        let Some(mut entries) = device::list(device, path, all)? else {
            error!("File or directory does not exist: {}", path);
            continue;
        };

        if several {
            console.terminal.println(&format!("{path}:"));
        }
        if !sort_none {
            if sort_size {
                entries.sort_by_key(|entry| entry.stat().size());
            } else {
                entries.sort_by(|a, b| a.name().cmp(b.name()));
            }
        }
        if sort_reverse {
            entries.reverse();
        }

        let mut short = String::new();
        for entry in &entries {
            let name = entry_name(entry, &console.session.cwd);
            if long_list {
                console.terminal.println(&long_line(entry, &name));
            } else {
                short.push_str(&format!("{name}  "));
            }
        }
        if !long_list {
            console.terminal.println(&short);
        }
        if several {
            console.terminal.println("");
        }
    }
    Ok(Flow::Continue)
}

pub fn rm(console: &mut Console, args: &ArgMatches) -> ShellResult<Flow> {
    let Some(file) = args.get_one::<String>("file") else {
        return Ok(Flow::Continue);
    };
    let path = console.session.resolve(file);
    let device = console.session.device()?;
    if !device::exists_file(device, &path)? {
        error!("File does not exist: {}", path);
        return Ok(Flow::Continue);
    }
    if console.protected.is_protected(&path) {
        error!("Protected Path: {}", path);
        return Ok(Flow::Continue);
    }
    if !console.terminal.confirm(&format!("Remove file: {path}?")) {
        warn!("User aborted operation!");
        return Ok(Flow::Continue);
    }

    debug!("Removing file: {} ...", path);
    device.rm(&path)?;
    info!("File removed.");
    Ok(Flow::Continue)
}
