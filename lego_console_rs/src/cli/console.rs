//! The main console: session state, command table and the outer loop.

use chrono::Local;
use tracing::{debug, error, info, warn};

use super::dispatch::{CommandEntry, Guard, Shell, run_loop};
use super::handlers::{fs, session, transfer};
use super::parser::{ParserCache, Subsystem};
use super::slots;
use crate::alias::AliasRegistry;
use crate::config::ConsoleConfig;
use crate::device::{Connector, Device};
use crate::error::{ShellError, ShellResult};
use crate::history::History;
use crate::paths::{PATH_LOCAL_NAME, ProtectedPaths, RemotePath};
use crate::terminal::Terminal;

/// Connection and working-directory state.
pub struct Session {
    pub cwd: RemotePath,
    /// Target of `cd -`.
    pub cwd_old: RemotePath,
    device: Option<Box<dyn Device>>,
    device_name: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            cwd: RemotePath::root(),
            cwd_old: RemotePath::root(),
            device: None,
            device_name: None,
        }
    }
}

impl Session {
    pub fn is_connected(&self) -> bool {
        self.device.is_some()
    }

    pub fn port(&self) -> Option<&str> {
        self.device.as_ref().map(|d| d.port())
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    /// Name shown in the prompt: the hub's own name, else its port.
    pub fn display_name(&self) -> &str {
        self.device_name().or(self.port()).unwrap_or("?")
    }

    pub fn device(&mut self) -> ShellResult<&mut dyn Device> {
        match self.device.as_mut() {
            Some(device) => Ok(&mut **device),
            None => Err(ShellError::NotConnected),
        }
    }

    /// `path` taken relative to the working directory.
    pub fn resolve(&self, path: &str) -> RemotePath {
        self.cwd.join(path)
    }

    pub fn change_dir(&mut self, path: RemotePath) {
        self.cwd_old = std::mem::replace(&mut self.cwd, path);
    }

    fn attach(&mut self, device: Box<dyn Device>) {
        self.device = Some(device);
    }

    /// Drops the device handle and resets the paths.
    fn detach(&mut self) -> Option<Box<dyn Device>> {
        let device = self.device.take();
        *self = Self::default();
        device
    }
}

pub struct Console {
    pub(crate) session: Session,
    pub(crate) aliases: AliasRegistry,
    pub(crate) parsers: ParserCache,
    pub(crate) terminal: Terminal,
    pub(crate) history: History,
    pub(crate) config: ConsoleConfig,
    pub(crate) protected: ProtectedPaths,
    /// Editor command line for `vim`.
    pub(crate) editor: String,
    connector: Box<dyn Connector>,
    preferred_device: Option<String>,
}

const CONSOLE_COMMANDS: &[CommandEntry<Console>] = &[
    CommandEntry::raw(
        "alias",
        "Define or display aliases.",
        Guard::Always,
        session::alias::<Console>,
    ),
    CommandEntry::parsed("cat", Guard::Connected, fs::cat),
    CommandEntry::parsed("cd", Guard::Connected, fs::cd),
    CommandEntry::raw(
        "clear",
        "Clears your screen if this is possible, including its scrollback buffer.",
        Guard::Always,
        session::clear,
    ),
    CommandEntry::parsed("connect", Guard::Always, session::connect),
    CommandEntry::parsed("cp", Guard::Connected, fs::cp),
    CommandEntry::parsed("df", Guard::Connected, fs::df),
    CommandEntry::raw(
        "disconnect",
        "Disconnects from a connected device.",
        Guard::Always,
        session::disconnect,
    ),
    CommandEntry::parsed("download", Guard::Connected, transfer::download),
    CommandEntry::raw(
        "exit",
        "Cause normal process termination.",
        Guard::Always,
        session::exit,
    ),
    CommandEntry::parsed("help", Guard::Always, session::help::<Console>),
    CommandEntry::parsed("history", Guard::Always, session::history),
    CommandEntry::parsed("ls", Guard::Connected, fs::ls),
    CommandEntry::parsed("rm", Guard::Connected, fs::rm),
    CommandEntry::raw(
        "slots",
        "Sub-command for interacting with slots.",
        Guard::Connected,
        slots::enter,
    ),
    CommandEntry::parsed("status", Guard::Always, session::status),
    CommandEntry::parsed("upload", Guard::Connected, transfer::upload),
    CommandEntry::parsed("vim", Guard::Connected, transfer::vim),
];

impl Console {
    pub fn new(config: ConsoleConfig, connector: Box<dyn Connector>, terminal: Terminal) -> Self {
        let history = History::new(config.history_file.clone(), config.history_size);
        let protected = ProtectedPaths::new(&config.protected_paths, &config.protected_dirs);
        let editor = config.editor();
        Self {
            session: Session::default(),
            aliases: AliasRegistry::console_defaults(),
            parsers: ParserCache::new(config.max_slots),
            terminal,
            history,
            config,
            protected,
            editor,
            connector,
            preferred_device: None,
        }
    }

    /// Port used when connecting on startup instead of asking.
    pub fn with_device(mut self, port: Option<String>) -> Self {
        self.preferred_device = port;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn max_slots(&self) -> usize {
        self.config.max_slots
    }

    /// Connects to `port`, or picks one from the connector.
    pub fn connect(&mut self, port: Option<&str>) -> ShellResult<()> {
        let port = match port {
            Some(port) => Some(port.to_string()),
            None => self.select_port()?,
        };
        let Some(port) = port else {
            error!("Unable to connect; no device provided!");
            return Ok(());
        };

        debug!("Connecting to device: {} ...", port);
        self.disconnect();
        match self.connector.open(&port) {
            Ok(device) => {
                self.session.attach(device);
                info!("Device connected.");
                self.load_device_name();
            }
            Err(e) => error!("Unable to connect to device: {}: {}", port, e),
        }
        Ok(())
    }

    fn select_port(&mut self) -> ShellResult<Option<String>> {
        let mut ports = self.connector.ports()?;
        match ports.len() {
            0 => Ok(None),
            1 => {
                debug!("Only 1 port found; connecting ...");
                Ok(ports.pop())
            }
            _ => Ok(self
                .terminal
                .choose("Select a device:", &ports)
                .map(|i| ports.swap_remove(i))),
        }
    }

    fn load_device_name(&mut self) {
        let Ok(device) = self.session.device() else {
            return;
        };
        debug!("Retrieving device name: {} ...", PATH_LOCAL_NAME);
        match device.get(&RemotePath::new(PATH_LOCAL_NAME)) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                let text = text.trim();
                let name = text.split_once('@').map_or(text, |(_, name)| name);
                debug!("Retrieved device name: {}", name);
                self.session.device_name = Some(name.to_string());
            }
            Err(e) => warn!("Unable to retrieve device name: {}", e),
        }
    }

    /// Closes the device, if any. The session is reset even when closing fails.
    pub fn disconnect(&mut self) {
        if let Some(mut device) = self.session.detach() {
            debug!("Disconnecting from device ...");
            match device.close() {
                Ok(()) => info!("Device disconnected."),
                Err(e) => error!("Unable to close device cleanly: {}", e),
            }
        }
    }

    fn prompt_header(&self) -> String {
        let painter = self.terminal.painter();
        let timestamp = Local::now().format("%H:%M:%S");
        if self.session.is_connected() {
            format!(
                "{} {} [{}]",
                timestamp,
                painter.device(self.session.display_name()),
                self.session.cwd
            )
        } else {
            format!("{} [{}]", timestamp, painter.error("disconnected"))
        }
    }

    /// Prompt of a sub-shell: the console's first line, then `(<name>) `.
    pub(crate) fn sub_prompt(&self, name: &str) -> String {
        format!("{}\n({}) 🤖: ", self.prompt_header(), name)
    }

    fn preloop(&mut self) {
        match self.history.file() {
            Some(_) => {
                if let Err(e) = self.history.ensure_file() {
                    warn!("Unable to create history file: {}", e);
                }
            }
            None => warn!("No history file!"),
        }
        if let Err(e) = self.history.read() {
            warn!("Unable to read history file: {}", e);
        }

        if self.config.auto_connect {
            let port = self.preferred_device.clone();
            if let Err(e) = self.connect(port.as_deref()) {
                error!("{}", e);
            }
        }
    }

    fn postloop(&mut self) {
        if let Err(e) = self.history.write() {
            warn!("Unable to write history file: {}", e);
        }
        self.disconnect();
    }

    /// Runs the interactive session until `exit` or end of input.
    pub fn cmdloop(&mut self) -> ShellResult<()> {
        self.preloop();
        let result = run_loop(self);
        self.postloop();
        result
    }
}

impl Shell for Console {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Console
    }

    fn commands(&self) -> Vec<CommandEntry<Self>> {
        CONSOLE_COMMANDS.to_vec()
    }

    fn aliases(&self) -> &AliasRegistry {
        &self.aliases
    }

    fn session(&self) -> &Session {
        &self.session
    }

    fn parsers(&mut self) -> &mut ParserCache {
        &mut self.parsers
    }

    fn terminal(&mut self) -> &mut Terminal {
        &mut self.terminal
    }

    fn parsers_and_terminal(&mut self) -> (&mut ParserCache, &mut Terminal) {
        (&mut self.parsers, &mut self.terminal)
    }

    fn history(&mut self) -> &mut History {
        &mut self.history
    }

    fn prompt(&self) -> String {
        format!("{}\n🤖: ", self.prompt_header())
    }
}
