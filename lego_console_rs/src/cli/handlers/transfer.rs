//! Moving files between the host and the hub, and editing in place.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use clap::ArgMatches;
use tracing::{debug, error, info, warn};

use crate::cli::console::Console;
use crate::device;
use crate::error::ShellResult;
use crate::types::Flow;

pub fn upload(console: &mut Console, args: &ArgMatches) -> ShellResult<Flow> {
    let Some(source) = args.get_one::<String>("source") else {
        return Ok(Flow::Continue);
    };
    let source = match fs::canonicalize(source) {
        Ok(path) => path,
        Err(e) => {
            error!("{}: {}", source, e);
            return Ok(Flow::Continue);
        }
    };
    if !source.is_file() {
        error!("Not a file: {}", source.display());
        return Ok(Flow::Continue);
    }

    let file_name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let target = args
        .get_one::<String>("target")
        .map(String::as_str)
        .unwrap_or(&file_name);
    let target = console.session.resolve(target);

    let device = console.session.device()?;
    if device::exists_file(device, &target)? {
        if console.protected.is_protected(&target) {
            error!("Protected Path: {}", target);
            return Ok(Flow::Continue);
        }
        if !console
            .terminal
            .confirm(&format!("Override existing file: {target}?"))
        {
            warn!("User aborted operation!");
            return Ok(Flow::Continue);
        }
    }

    debug!("Uploading '{}' to '{}' ...", source.display(), target);
    let data = fs::read(&source)?;
    device.put(&target, &data)?;
    info!("Upload completed: [{} bytes]", data.len());
    Ok(Flow::Continue)
}

pub fn download(console: &mut Console, args: &ArgMatches) -> ShellResult<Flow> {
    let Some(source) = args.get_one::<String>("source") else {
        return Ok(Flow::Continue);
    };
    let source = console.session.resolve(source);
    let device = console.session.device()?;
    if !device::exists_file(device, &source)? {
        error!("File does not exist: {}", source);
        return Ok(Flow::Continue);
    }

    let target = match args.get_one::<String>("target") {
        Some(target) => PathBuf::from(target),
        None => PathBuf::from(source.file_name()),
    };
    if target.exists()
        && !console
            .terminal
            .confirm(&format!("Override existing file: {}?", target.display()))
    {
        warn!("User aborted operation!");
        return Ok(Flow::Continue);
    }

    debug!("Downloading '{}' to '{}' ...", source, target.display());
    let data = device.get(&source)?;
    fs::write(&target, &data)?;
    info!("Download completed: [{} bytes]", data.len());
    Ok(Flow::Continue)
}

/// Downloads a file, opens it in the editor and uploads it again if it was
/// saved. The temporary copy is removed when this returns.
pub fn vim(console: &mut Console, args: &ArgMatches) -> ShellResult<Flow> {
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

    let Some((program, editor_args)) = shlex::split(&console.editor)
        .and_then(|words| words.split_first().map(|(p, a)| (p.clone(), a.to_vec())))
    else {
        error!("Invalid editor: {}", console.editor);
        return Ok(Flow::Continue);
    };

    let temp_file = tempfile::Builder::new().suffix(".tmp").tempfile()?;
    debug!("Downloading '{}' to '{}' ...", path, temp_file.path().display());
    let data = device.get(&path)?;
    fs::write(temp_file.path(), &data)?;
    info!("Download completed: [{} bytes]", data.len());

    let modified = fs::metadata(temp_file.path())?.modified()?;
    let status = Command::new(&program)
        .args(&editor_args)
        .arg("+set backupcopy=yes")
        .arg(temp_file.path())
        .status()?;
    if !status.success() {
        error!(
            "Editor failed: [editor={}, rc={}]",
            console.editor,
            status.code().unwrap_or(-1)
        );
        return Ok(Flow::Continue);
    }
    if fs::metadata(temp_file.path())?.modified()? == modified {
        debug!("File unchanged; aborting ...");
        return Ok(Flow::Continue);
    }

    let content = fs::read(temp_file.path())?;
    debug!("Uploading file: '{}' ...", path);
    device.put(&path, &content)?;
    info!("Upload completed: [{} bytes]", content.len());
    Ok(Flow::Continue)
}
