//! In-memory hub used by unit tests. Records every call it receives.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use super::{Connector, Device, Snippet};
use crate::error::DeviceError;
use crate::paths::RemotePath;

const ENOENT: &str = "Traceback (most recent call last):\nOSError: [Errno 2] ENOENT";

#[derive(Debug)]
pub(crate) struct FakeState {
    pub files: BTreeMap<String, Vec<u8>>,
    pub dirs: BTreeSet<String>,
    pub calls: Vec<String>,
    pub statvfs: (i64, i64, i64, i64, i64),
    pub mtime: i64,
    pub closed: bool,
    /// When set, every remote call fails with this traceback.
    pub failure: Option<String>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            files: BTreeMap::new(),
            dirs: ["/".to_string()].into_iter().collect(),
            calls: Vec::new(),
            // bsize, frsize, blocks, bfree, bavail
            statvfs: (4096, 4096, 8192, 2048, 2048),
            mtime: 1_600_000_000,
            closed: false,
            failure: None,
        }
    }
}

/// Shared handle to the state, so tests can inspect it after the device has
/// been moved into a session.
#[derive(Clone, Debug, Default)]
pub(crate) struct FakeHub {
    pub state: Rc<RefCell<FakeState>>,
}

impl FakeHub {
    pub fn new() -> Self {
        let hub = Self::default();
        hub.add_file("/local_name.txt", b"LEGO Hub@Robo");
        hub
    }

    pub fn add_file(&self, path: &str, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        let path = RemotePath::new(path);
        let mut parent = path.parent();
        loop {
            state.dirs.insert(parent.to_string());
            if parent.is_root() {
                break;
            }
            parent = parent.parent();
        }
        state.files.insert(path.to_string(), data.to_vec());
    }

    pub fn add_dir(&self, path: &str) {
        self.state
            .borrow_mut()
            .dirs
            .insert(RemotePath::new(path).to_string());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.borrow().files.get(path).cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn fail_with(&self, traceback: &str) {
        self.state.borrow_mut().failure = Some(traceback.to_string());
    }

    pub fn connector(&self) -> FakeConnector {
        FakeConnector {
            ports: vec!["/dev/ttyFAKE0".to_string()],
            hub: self.clone(),
        }
    }
}

pub(crate) struct FakeDevice {
    port: String,
    hub: FakeHub,
}

impl FakeDevice {
    fn record(&self, call: String) -> Result<(), DeviceError> {
        let mut state = self.hub.state.borrow_mut();
        state.calls.push(call);
        match &state.failure {
            Some(traceback) => Err(DeviceError::remote(traceback.clone())),
            None => Ok(()),
        }
    }

    fn stat_literal(state: &FakeState, path: &str) -> Option<String> {
        let mtime = state.mtime;
        if state.dirs.contains(path) {
            return Some(format!("(16384, 0, 0, 0, 0, 0, 0, {mtime}, {mtime}, {mtime})"));
        }
        state.files.get(path).map(|data| {
            format!(
                "(32768, 0, 0, 0, 0, 0, {}, {mtime}, {mtime}, {mtime})",
                data.len()
            )
        })
    }

    fn children(state: &FakeState, dir: &RemotePath) -> Vec<String> {
        let names = state.dirs.iter().chain(state.files.keys());
        names
            .filter(|p| {
                let p = RemotePath::new(p);
                !p.is_root() && p.parent() == *dir
            })
            .cloned()
            .collect()
    }
}

impl Device for FakeDevice {
    fn port(&self) -> &str {
        &self.port
    }

    fn exec(&mut self, snippet: &Snippet) -> Result<Vec<u8>, DeviceError> {
        let state = self.hub.state.borrow();
        let (call, result) = match snippet {
            Snippet::Stat { path } => (
                format!("stat {path}"),
                Self::stat_literal(&state, path.as_str()),
            ),
            Snippet::StatVfs { path } => {
                let (bsize, frsize, blocks, bfree, bavail) = state.statvfs;
                let exists = Self::stat_literal(&state, path.as_str()).is_some();
                (
                    format!("statvfs {path}"),
                    exists.then(|| {
                        format!("({bsize}, {frsize}, {blocks}, {bfree}, {bavail}, 0, 0, 0, 0, 255)")
                    }),
                )
            }
            Snippet::List { path, all } => {
                let call = format!("list {path}");
                let rows = Self::stat_literal(&state, path.as_str()).map(|own| {
                    let row = |name: &str, stat: &str| {
                        format!("['{}', {}]", name, stat.trim_matches(|c| c == '(' || c == ')'))
                    };
                    let mut rows = Vec::new();
                    if state.dirs.contains(path.as_str()) {
                        if *all {
                            rows.push(row(".", &own));
                            let parent = Self::stat_literal(&state, path.parent().as_str())
                                .unwrap_or_else(|| own.clone());
                            rows.push(row("..", &parent));
                        }
                        for child in Self::children(&state, path) {
                            if let Some(stat) = Self::stat_literal(&state, &child) {
                                rows.push(row(&child, &stat));
                            }
                        }
                    } else {
                        rows.push(row(path.as_str(), &own));
                    }
                    format!("[{}]", rows.join(", "))
                });
                (call, rows)
            }
        };
        drop(state);
        self.record(call)?;
        match result {
            Some(text) => Ok(format!("{text}\r\n").into_bytes()),
            None => Err(DeviceError::remote(ENOENT)),
        }
    }

    fn get(&mut self, path: &RemotePath) -> Result<Vec<u8>, DeviceError> {
        self.record(format!("get {path}"))?;
        self.hub
            .file(path.as_str())
            .ok_or_else(|| DeviceError::remote(ENOENT))
    }

    fn put(&mut self, path: &RemotePath, data: &[u8]) -> Result<(), DeviceError> {
        self.record(format!("put {path}"))?;
        if !self.hub.state.borrow().dirs.contains(path.parent().as_str()) {
            return Err(DeviceError::remote(ENOENT));
        }
        self.hub
            .state
            .borrow_mut()
            .files
            .insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn rm(&mut self, path: &RemotePath) -> Result<(), DeviceError> {
        self.record(format!("rm {path}"))?;
        match self.hub.state.borrow_mut().files.remove(path.as_str()) {
            Some(_) => Ok(()),
            None => Err(DeviceError::remote(ENOENT)),
        }
    }

    fn mkdir(&mut self, path: &RemotePath, exists_okay: bool) -> Result<(), DeviceError> {
        self.record(format!("mkdir {path}"))?;
        let inserted = self.hub.state.borrow_mut().dirs.insert(path.to_string());
        if !inserted && !exists_okay {
            return Err(DeviceError::remote("OSError: [Errno 17] EEXIST"));
        }
        Ok(())
    }

    fn rmdir(&mut self, path: &RemotePath, missing_okay: bool) -> Result<(), DeviceError> {
        self.record(format!("rmdir {path}"))?;
        let removed = self.hub.state.borrow_mut().dirs.remove(path.as_str());
        if !removed && !missing_okay {
            return Err(DeviceError::remote(ENOENT));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.hub.state.borrow_mut().closed = true;
        Ok(())
    }
}

pub(crate) struct FakeConnector {
    pub ports: Vec<String>,
    hub: FakeHub,
}

impl Connector for FakeConnector {
    fn ports(&self) -> Result<Vec<String>, DeviceError> {
        Ok(self.ports.clone())
    }

    fn open(&self, port: &str) -> Result<Box<dyn Device>, DeviceError> {
        if !self.ports.iter().any(|p| p == port) {
            return Err(DeviceError::Protocol(format!("no such port: {port}")));
        }
        Ok(Box::new(FakeDevice {
            port: port.to_string(),
            hub: self.hub.clone(),
        }))
    }
}
