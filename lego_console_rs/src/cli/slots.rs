//! `slots` sub-shell: installs scripts into the hub's program slots.
//!
//! The hub keeps its slot table in `/projects/.slots` as a Python dict keyed
//! by slot number. It is read whole, changed in memory and written back
//! whole; keys the firmware stores that this tool does not know about are
//! carried through untouched.

use std::collections::BTreeMap;
use std::fs;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Local, TimeZone, Utc};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use super::console::{Console, Session};
use super::dispatch::{CommandEntry, Guard, Shell, onecmd, run_loop};
use super::handlers::session;
use super::parser::{ParserCache, Subsystem};
use crate::alias::AliasRegistry;
use crate::device::{self, Device, literal};
use crate::error::{DeviceError, ShellResult};
use crate::history::History;
use crate::paths::{PATH_PROJECTS, PATH_SLOTS, RemotePath};
use crate::terminal::Terminal;
use crate::types::Flow;

/// Script types a slot can hold, by file extension.
pub const FILE_EXTENSIONS: [&str; 2] = ["mpy", "py"];

/// Project ids are this plus the slot number.
const PROJECT_ID_BASE: i64 = 10000;

/// One entry of the slot table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlotRecord {
    /// Base64 of the script's file name.
    pub name: String,
    #[serde(default)]
    pub project_id: String,
    /// Milliseconds since the epoch.
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub modified: i64,
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SlotRecord {
    pub fn new(file_name: &str, id: i64, kind: &str, created: i64, modified: i64) -> Self {
        Self {
            name: BASE64.encode(file_name.as_bytes()),
            project_id: format!("prj{id}"),
            created,
            modified,
            id,
            kind: kind.to_string(),
            extra: Map::new(),
        }
    }

    /// The decoded file name, or the stored value when it is not base64.
    pub fn display_name(&self) -> String {
        BASE64
            .decode(self.name.as_bytes())
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_else(|_| self.name.clone())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SlotConfiguration {
    slots: BTreeMap<u32, SlotRecord>,
}

impl SlotConfiguration {
    /// Reads the slot table; a missing table is an empty one.
    pub fn read(device: &mut dyn Device) -> Result<Self, DeviceError> {
        debug!("Retrieving slot configuration: {} ...", PATH_SLOTS);
        match device::read_literal(device, &RemotePath::new(PATH_SLOTS)) {
            Ok(slots) => Ok(Self { slots }),
            Err(e) if e.is_not_found() => {
                warn!("No slot configuration found: {}", PATH_SLOTS);
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    pub fn write(&self, device: &mut dyn Device) -> Result<(), DeviceError> {
        let text = self.to_literal()?;
        debug!("Storing slot configuration: {} ...", PATH_SLOTS);
        device.put(&RemotePath::new(PATH_SLOTS), text.as_bytes())?;
        debug!("Stored slot configuration: [{} bytes]", text.len());
        Ok(())
    }

    /// Python dict literal with integer keys.
    pub fn to_literal(&self) -> Result<String, DeviceError> {
        let mut parts = Vec::with_capacity(self.slots.len());
        for (slot, record) in &self.slots {
            let value = serde_json::to_value(record)?;
            parts.push(format!("{}: {}", slot, literal::to_literal(&value)));
        }
        Ok(format!("{{{}}}", parts.join(", ")))
    }

    pub fn get(&self, slot: u32) -> Option<&SlotRecord> {
        self.slots.get(&slot)
    }

    pub fn insert(&mut self, slot: u32, record: SlotRecord) {
        self.slots.insert(slot, record);
    }

    pub fn remove(&mut self, slot: u32) -> Option<SlotRecord> {
        self.slots.remove(&slot)
    }
}

/// `slot` as an index when `0 <= slot < max_slots`.
fn check_slot(slot: i64, max_slots: usize) -> Option<u32> {
    (0..max_slots as i64)
        .contains(&slot)
        .then_some(slot as u32)
}

fn project_dir(id: i64) -> RemotePath {
    RemotePath::new(PATH_PROJECTS).join(&id.to_string())
}

/// Removes a project's script files and, unless told otherwise, its directory.
fn remove_project(
    device: &mut dyn Device,
    id: i64,
    leave_directory: bool,
) -> Result<(), DeviceError> {
    let project = project_dir(id);
    for extension in FILE_EXTENSIONS {
        let path = project.join(&format!("__init__.{extension}"));
        if device::exists_file(device, &path)? {
            debug!("Removing file: {} ...", path);
            device.rm(&path)?;
        }
    }
    if !leave_directory {
        debug!("Removing directory: {} ...", project);
        device.rmdir(&project, true)?;
    }
    Ok(())
}

fn format_modified(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "?".to_string())
}

/// Prints the slot table.
pub fn print_status(console: &mut Console) -> ShellResult<()> {
    let max_slots = console.max_slots();
    let config = SlotConfiguration::read(console.session.device()?)?;
    let painter = console.terminal.painter();

    console.terminal.println("Slots       :");
    for i in 0..max_slots as u32 {
        let Some(record) = config.get(i) else {
            console
                .terminal
                .println(&format!("  {}: {}", i, painter.dim("<empty>")));
            continue;
        };
        let lines = [
            format!("  {}: {}", i, painter.slot(&record.display_name())),
            format!("    id       : {}", record.id),
            format!("    type     : {}", record.kind),
            format!("    modified : {}", format_modified(record.modified)),
        ];
        for line in lines {
            console.terminal.println(&line);
        }
    }
    Ok(())
}

/// Entry point of the `slots` console command.
///
/// With arguments, runs them as one sub-shell command and returns.
pub fn enter(console: &mut Console, line: &str) -> ShellResult<Flow> {
    let mut slots = Slots::new(console);
    if line.trim().is_empty() {
        slots.cmdloop()?;
    } else {
        onecmd(&mut slots, line)?;
    }
    Ok(Flow::Continue)
}

pub struct Slots<'a> {
    console: &'a mut Console,
    aliases: AliasRegistry,
}

impl<'a> Slots<'a> {
    pub fn new(console: &'a mut Console) -> Self {
        Self {
            console,
            aliases: AliasRegistry::slots_defaults(),
        }
    }

    pub fn cmdloop(&mut self) -> ShellResult<()> {
        run_loop(self)
    }

    fn forward_clear(&mut self, line: &str) -> ShellResult<Flow> {
        session::clear(self.console, line)
    }

    fn forward_history(&mut self, args: &ArgMatches) -> ShellResult<Flow> {
        session::history(self.console, args)
    }

    fn exit(&mut self, _: &str) -> ShellResult<Flow> {
        Ok(Flow::Stop)
    }

    fn status(&mut self, _: &str) -> ShellResult<Flow> {
        print_status(self.console)?;
        Ok(Flow::Continue)
    }

    fn install(&mut self, args: &ArgMatches) -> ShellResult<Flow> {
        let Some(script) = args.get_one::<String>("script") else {
            return Ok(Flow::Continue);
        };
        let source = match fs::canonicalize(script) {
            Ok(path) => path,
            Err(e) => {
                error!("{}: {}", script, e);
                return Ok(Flow::Continue);
            }
        };
        if !source.is_file() {
            error!("Not a file: {}", source.display());
            return Ok(Flow::Continue);
        }

        let mut extension = source
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if extension.is_empty() {
            warn!("Cannot detect file type; assuming uncompiled python.");
            extension = "py".to_string();
        }
        if !FILE_EXTENSIONS.contains(&extension.as_str()) {
            error!("Unsupported extension: {}", extension);
            return Ok(Flow::Continue);
        }

        let requested = args.get_one::<i64>("slot").copied().unwrap_or(-1);
        let Some(slot) = check_slot(requested, self.console.max_slots()) else {
            error!("Slot is out of range: {}", requested);
            return Ok(Flow::Continue);
        };
        let kind = args
            .get_one::<String>("type")
            .map(String::as_str)
            .unwrap_or("python");
        let force = args.get_flag("force");

        let device = self.console.session.device()?;
        let mut config = SlotConfiguration::read(device)?;
        if let Some(existing) = config.get(slot) {
            if !force {
                error!("Slot is not empty: {}", slot);
                return Ok(Flow::Continue);
            }
            warn!("Overriding existing slot #{}", slot);
            let id = existing.id;
            remove_project(device, id, true)?;
        }

        let metadata = fs::metadata(&source)?;
        let modified = metadata.modified()?;
        let created = metadata.created().unwrap_or(modified);
        let id = PROJECT_ID_BASE + i64::from(slot);
        let file_name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        config.insert(
            slot,
            SlotRecord::new(
                &file_name,
                id,
                kind,
                DateTime::<Utc>::from(created).timestamp_millis(),
                DateTime::<Utc>::from(modified).timestamp_millis(),
            ),
        );

        let project = project_dir(id);
        let target = project.join(&format!("__init__.{extension}"));
        debug!("Creating directory: {} ...", project);
        device.mkdir(&project, true)?;
        debug!("Uploading '{}' to '{}' ...", source.display(), target);
        let data = fs::read(&source)?;
        device.put(&target, &data)?;
        debug!("Upload completed: [{} bytes]", data.len());

        config.write(device)?;
        info!("Installed '{}' to slot #{}.", source.display(), slot);
        Ok(Flow::Continue)
    }

    fn uninstall(&mut self, args: &ArgMatches) -> ShellResult<Flow> {
        let requested = args.get_one::<i64>("slot").copied().unwrap_or(-1);
        let Some(slot) = check_slot(requested, self.console.max_slots()) else {
            error!("Slot is out of range: {}", requested);
            return Ok(Flow::Continue);
        };
        let force = args.get_flag("force");

        let device = self.console.session.device()?;
        let mut config = SlotConfiguration::read(device)?;
        let Some(record) = config.remove(slot) else {
            if force {
                debug!("Slot is already empty: {}", slot);
            } else {
                error!("Slot is empty: {}", slot);
            }
            return Ok(Flow::Continue);
        };

        let title = format!("Uninstall slot #{}: {}?", slot, record.display_name());
        if !force && !self.console.terminal.confirm(&title) {
            warn!("User aborted operation!");
            return Ok(Flow::Continue);
        }

        config.write(device)?;
        remove_project(device, record.id, false)?;
        info!("Uninstalled slot #{}.", slot);
        Ok(Flow::Continue)
    }
}

impl<'a> Shell for Slots<'a> {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Slots
    }

    fn commands(&self) -> Vec<CommandEntry<Self>> {
        vec![
            CommandEntry::raw(
                "alias",
                "Define or display aliases.",
                Guard::Always,
                session::alias::<Self>,
            ),
            CommandEntry::raw(
                "clear",
                "Clears your screen if this is possible, including its scrollback buffer.",
                Guard::Always,
                Self::forward_clear,
            ),
            CommandEntry::raw(
                "exit",
                "Returns to the main console.",
                Guard::Always,
                Self::exit,
            ),
            CommandEntry::parsed("help", Guard::Always, session::help::<Self>),
            CommandEntry::parsed("history", Guard::Always, Self::forward_history),
            CommandEntry::parsed("install", Guard::Connected, Self::install),
            CommandEntry::raw(
                "status",
                "Displays the current slot status.",
                Guard::Connected,
                Self::status,
            ),
            CommandEntry::parsed("uninstall", Guard::Connected, Self::uninstall),
        ]
    }

    fn aliases(&self) -> &AliasRegistry {
        &self.aliases
    }

    fn session(&self) -> &Session {
        self.console.session()
    }

    fn parsers(&mut self) -> &mut ParserCache {
        &mut self.console.parsers
    }

    fn terminal(&mut self) -> &mut Terminal {
        &mut self.console.terminal
    }

    fn parsers_and_terminal(&mut self) -> (&mut ParserCache, &mut Terminal) {
        (&mut self.console.parsers, &mut self.console.terminal)
    }

    fn history(&mut self) -> &mut History {
        &mut self.console.history
    }

    fn prompt(&self) -> String {
        self.console.sub_prompt("slots")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::console::testing::connected;
    use crate::device::fake::FakeHub;
    use tempfile::TempDir;

    const OLD_SLOTS: &[u8] = b"{0: {'name': 'b2xkLnB5', 'project_id': 'prj10000', \
        'modified': 1600000000000, 'created': 1600000000000, 'id': 10000, \
        'type': 'python', 'size': 12}}";

    fn hub() -> FakeHub {
        let hub = FakeHub::new();
        hub.add_file(PATH_SLOTS, OLD_SLOTS);
        hub.add_file("/projects/10000/__init__.py", b"print('old')");
        hub
    }

    fn script(dir: &TempDir, name: &str) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, b"print('new')").unwrap();
        path.display().to_string()
    }

    fn slots_table(hub: &FakeHub) -> SlotConfiguration {
        let bytes = hub.file(PATH_SLOTS).unwrap();
        SlotConfiguration {
            slots: device::decode_literal(&bytes).unwrap(),
        }
    }

    #[test]
    fn record_round_trips_extra_keys() {
        let slots: BTreeMap<u32, SlotRecord> = device::decode_literal(OLD_SLOTS).unwrap();
        let record = &slots[&0];
        assert_eq!(record.display_name(), "old.py");
        assert_eq!(record.kind, "python");
        assert_eq!(record.extra.get("size"), Some(&Value::from(12)));

        let config = SlotConfiguration { slots };
        let text = config.to_literal().unwrap();
        assert!(text.starts_with("{0: {"));
        assert!(text.contains("'size': 12"));
        assert!(text.contains("'type': 'python'"));
    }

    #[test]
    fn slot_range_excludes_max() {
        assert_eq!(check_slot(0, 10), Some(0));
        assert_eq!(check_slot(9, 10), Some(9));
        assert_eq!(check_slot(10, 10), None);
        assert_eq!(check_slot(-1, 10), None);
    }

    #[test]
    fn install_into_empty_slot() {
        let temp = TempDir::new().unwrap();
        let hub = hub();
        let (mut console, _) = connected(&hub, "");
        let line = format!("slots install '{}' -s 2 -t scratch", script(&temp, "prog.py"));
        assert_eq!(onecmd(&mut console, &line).unwrap(), Flow::Continue);

        assert_eq!(hub.file("/projects/10002/__init__.py").unwrap(), b"print('new')");
        let table = slots_table(&hub);
        let record = table.get(2).unwrap();
        assert_eq!(record.name, "cHJvZy5weQ==");
        assert_eq!(record.project_id, "prj10002");
        assert_eq!(record.id, 10002);
        assert_eq!(record.kind, "scratch");
        assert!(record.modified > 0);
        // the other slot and its firmware keys survive
        assert_eq!(table.get(0).unwrap().extra.get("size"), Some(&Value::from(12)));
    }

    #[test]
    fn install_refuses_occupied_slot_without_force() {
        let temp = TempDir::new().unwrap();
        let hub = hub();
        let (mut console, _) = connected(&hub, "");
        let line = format!("slots install '{}' -s 0", script(&temp, "prog.py"));
        onecmd(&mut console, &line).unwrap();
        assert_eq!(hub.file(PATH_SLOTS).unwrap(), OLD_SLOTS);
        assert!(hub.calls().iter().all(|call| !call.starts_with("put")));
    }

    #[test]
    fn forced_install_replaces_project_files() {
        let temp = TempDir::new().unwrap();
        let hub = hub();
        let (mut console, _) = connected(&hub, "");
        let line = format!("slots install -f '{}' -s 0", script(&temp, "other.mpy"));
        onecmd(&mut console, &line).unwrap();

        assert!(hub.file("/projects/10000/__init__.py").is_none());
        assert_eq!(hub.file("/projects/10000/__init__.mpy").unwrap(), b"print('new')");
        assert!(!hub.calls().iter().any(|call| call.starts_with("rmdir")));
        assert_eq!(slots_table(&hub).get(0).unwrap().name, "b3RoZXIubXB5");
    }

    #[test]
    fn install_validates_input() {
        let temp = TempDir::new().unwrap();
        let hub = hub();
        let (mut console, _) = connected(&hub, "");
        let text = script(&temp, "notes.txt");
        let prog = script(&temp, "prog.py");
        for line in [
            format!("slots install '{text}' -s 1"),
            format!("slots install '{prog}' -s 10"),
            format!("slots install '{prog}' -s -1"),
            "slots install /no/such/file.py -s 1".to_string(),
        ] {
            onecmd(&mut console, &line).unwrap();
        }
        assert!(hub.calls().iter().all(|call| !call.starts_with("put")));
    }

    #[test]
    fn install_without_extension_assumes_python() {
        let temp = TempDir::new().unwrap();
        let hub = hub();
        let (mut console, _) = connected(&hub, "");
        let line = format!("slots install '{}' -s 3", script(&temp, "robot"));
        onecmd(&mut console, &line).unwrap();
        assert!(hub.file("/projects/10003/__init__.py").is_some());
    }

    #[test]
    fn uninstall_confirms_then_removes() {
        let hub = hub();
        let (mut console, _) = connected(&hub, "n\ny\n");
        onecmd(&mut console, "slots uninstall 0").unwrap();
        assert_eq!(hub.file(PATH_SLOTS).unwrap(), OLD_SLOTS);

        onecmd(&mut console, "slots uninstall 0").unwrap();
        assert_eq!(hub.file(PATH_SLOTS).unwrap(), b"{}");
        assert!(hub.file("/projects/10000/__init__.py").is_none());
        assert!(!hub.state.borrow().dirs.contains("/projects/10000"));
    }

    #[test]
    fn uninstall_empty_slot() {
        let hub = hub();
        let (mut console, _) = connected(&hub, "");
        onecmd(&mut console, "slots uninstall 4").unwrap();
        onecmd(&mut console, "slots uninstall -f 4").unwrap();
        onecmd(&mut console, "slots uninstall 12").unwrap();
        assert!(hub.calls().iter().all(|call| !call.starts_with("put")));
    }

    #[test]
    fn status_lists_every_slot() {
        let hub = hub();
        let (mut console, out) = connected(&hub, "");
        onecmd(&mut console, "slots status").unwrap();
        let text = out.contents();
        assert!(text.starts_with("Slots       :\n  0: old.py\n    id       : 10000\n"));
        assert!(text.contains("    type     : python\n    modified : "));
        assert!(text.contains("  1: <empty>\n"));
        assert!(text.ends_with("  9: <empty>\n"));
    }

    #[test]
    fn console_status_includes_slots_on_request() {
        let hub = hub();
        let (mut console, out) = connected(&hub, "");
        onecmd(&mut console, "status -s").unwrap();
        assert!(out.contents().contains("Device Name : Robo\nSlots       :\n"));
    }

    #[test]
    fn sub_shell_loop_returns_to_console() {
        let hub = hub();
        let (mut console, out) = connected(&hub, "help install\nman ls\nquit\n");
        assert_eq!(onecmd(&mut console, "slots").unwrap(), Flow::Continue);
        let text = out.contents();
        assert!(text.contains("(slots) 🤖: "));
        assert!(text.contains("Installs a <script> to a <slot>."));
        assert!(text.contains("*** No help on ls"));
        assert!(console.session.is_connected());
        assert_eq!(console.history.entries(), ["help install", "man ls", "quit"]);
    }

    #[test]
    fn sub_shell_unknown_command() {
        let hub = hub();
        let (mut console, out) = connected(&hub, "");
        onecmd(&mut console, "slots ls").unwrap();
        assert_eq!(out.contents(), "ls: command not found\n");
    }
}
