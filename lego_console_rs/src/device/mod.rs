//! Device collaborator: the transport to the hub and typed helpers on top.
//!
//! The shells never talk to the serial port directly. They hold a
//! `Box<dyn Device>` and go through the helpers in this module, which run
//! small MicroPython [`Snippet`]s and read the printed literal back.

pub mod literal;
pub mod serial;

#[cfg(test)]
pub(crate) mod fake;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::DeviceError;
use crate::paths::RemotePath;

const S_IFMT: i64 = 0o170000;
const S_IFDIR: i64 = 0o040000;
const S_IFREG: i64 = 0o100000;

/// Operations the hub link offers.
pub trait Device {
    /// Name of the port the device is attached to.
    fn port(&self) -> &str;

    /// Runs a snippet in the raw REPL and returns what it printed.
    fn exec(&mut self, snippet: &Snippet) -> Result<Vec<u8>, DeviceError>;

    fn get(&mut self, path: &RemotePath) -> Result<Vec<u8>, DeviceError>;

    fn put(&mut self, path: &RemotePath, data: &[u8]) -> Result<(), DeviceError>;

    fn rm(&mut self, path: &RemotePath) -> Result<(), DeviceError>;

    fn mkdir(&mut self, path: &RemotePath, exists_okay: bool) -> Result<(), DeviceError>;

    fn rmdir(&mut self, path: &RemotePath, missing_okay: bool) -> Result<(), DeviceError>;

    fn close(&mut self) -> Result<(), DeviceError>;
}

/// Finds and opens devices.
pub trait Connector {
    fn ports(&self) -> Result<Vec<String>, DeviceError>;

    fn open(&self, port: &str) -> Result<Box<dyn Device>, DeviceError>;
}

/// Programs executed on the hub. Each prints one Python literal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Snippet {
    Stat { path: RemotePath },
    StatVfs { path: RemotePath },
    /// Stat tuples for a directory's entries (or the file itself),
    /// each prefixed with its path.
    List { path: RemotePath, all: bool },
}

impl Snippet {
    pub fn source(&self) -> String {
        match self {
            Snippet::Stat { path } => format!(
                "import os\nprint(os.stat({}))\n",
                literal::quote(path.as_str())
            ),
            Snippet::StatVfs { path } => format!(
                "import os\nprint(os.statvfs({}))\n",
                literal::quote(path.as_str())
            ),
            Snippet::List { path, all } => format!(
                "import os\n\
                 r = []\n\
                 path = {path}\n\
                 base = path.rstrip('/')\n\
                 stats = os.stat(path)\n\
                 if (stats[0] & 0o170000) == 0o040000:\n    \
                     if {all}:\n        \
                         r.append(['.'] + list(stats))\n        \
                         r.append(['..'] + list(os.stat(base + '/..')))\n    \
                     for entry in os.listdir(path):\n        \
                         path_entry = base + '/' + entry\n        \
                         r.append([path_entry] + list(os.stat(path_entry)))\n\
                 else:\n    \
                     r.append([path] + list(stats))\n\
                 print(r)\n",
                path = literal::quote(path.as_str()),
                all = if *all { "True" } else { "False" },
            ),
        }
    }
}

/// `os.stat` result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct Stat(
    pub i64, // mode
    pub i64, // ino
    pub i64, // dev
    pub i64, // nlink
    pub i64, // uid
    pub i64, // gid
    pub i64, // size
    pub i64, // atime
    pub i64, // mtime
    pub i64, // ctime
);

impl Stat {
    pub fn mode(&self) -> i64 {
        self.0
    }
    pub fn nlink(&self) -> i64 {
        self.3
    }
    pub fn uid(&self) -> i64 {
        self.4
    }
    pub fn gid(&self) -> i64 {
        self.5
    }
    pub fn size(&self) -> i64 {
        self.6
    }
    pub fn mtime(&self) -> i64 {
        self.8
    }

    pub fn is_dir(&self) -> bool {
        self.0 & S_IFMT == S_IFDIR
    }

    pub fn is_file(&self) -> bool {
        self.0 & S_IFMT == S_IFREG
    }
}

/// One row of a [`Snippet::List`] result: the path, then its stat tuple.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct StatEntry(
    pub String,
    pub i64,
    pub i64,
    pub i64,
    pub i64,
    pub i64,
    pub i64,
    pub i64,
    pub i64,
    pub i64,
    pub i64,
);

impl StatEntry {
    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn stat(&self) -> Stat {
        Stat(
            self.1, self.2, self.3, self.4, self.5, self.6, self.7, self.8, self.9, self.10,
        )
    }
}

/// `os.statvfs` result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct StatVfs {
    pub bsize: i64,
    pub frsize: i64,
    pub blocks: i64,
    pub bfree: i64,
    pub bavail: i64,
    pub files: i64,
    pub ffree: i64,
    pub favail: i64,
    pub flag: i64,
    pub namemax: i64,
}

/// Decodes printed output into `T`.
pub fn decode_literal<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DeviceError> {
    let text = String::from_utf8_lossy(bytes);
    let value = literal::parse(&text)?;
    Ok(serde_json::from_value(value)?)
}

/// Runs `snippet`, mapping "not found" to `None`.
fn exec_optional<T: DeserializeOwned>(
    device: &mut dyn Device,
    snippet: &Snippet,
) -> Result<Option<T>, DeviceError> {
    match device.exec(snippet) {
        Ok(bytes) => decode_literal(&bytes).map(Some),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn stat(device: &mut dyn Device, path: &RemotePath) -> Result<Option<Stat>, DeviceError> {
    debug!("stat {}", path);
    exec_optional(device, &Snippet::Stat { path: path.clone() })
}

pub fn statvfs(
    device: &mut dyn Device,
    path: &RemotePath,
) -> Result<Option<StatVfs>, DeviceError> {
    debug!("statvfs {}", path);
    exec_optional(device, &Snippet::StatVfs { path: path.clone() })
}

pub fn list(
    device: &mut dyn Device,
    path: &RemotePath,
    all: bool,
) -> Result<Option<Vec<StatEntry>>, DeviceError> {
    debug!("list {} (all={})", path, all);
    exec_optional(
        device,
        &Snippet::List {
            path: path.clone(),
            all,
        },
    )
}

pub fn exists_file(device: &mut dyn Device, path: &RemotePath) -> Result<bool, DeviceError> {
    Ok(stat(device, path)?.is_some_and(|s| s.is_file()))
}

pub fn exists_directory(device: &mut dyn Device, path: &RemotePath) -> Result<bool, DeviceError> {
    Ok(stat(device, path)?.is_some_and(|s| s.is_dir()))
}

/// Reads a remote file holding a Python literal.
pub fn read_literal<T: DeserializeOwned>(
    device: &mut dyn Device,
    path: &RemotePath,
) -> Result<T, DeviceError> {
    let bytes = device.get(path)?;
    debug!("read {} bytes from {}", bytes.len(), path);
    decode_literal(&bytes)
}

pub fn copy_file(
    device: &mut dyn Device,
    source: &RemotePath,
    destination: &RemotePath,
) -> Result<(), DeviceError> {
    let data = device.get(source)?;
    device.put(destination, &data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stat_mode_helpers() {
        let dir = Stat(0o040000, 0, 0, 0, 0, 0, 0, 0, 0, 0);
        let file = Stat(0o100644, 0, 0, 1, 0, 0, 42, 0, 7, 0);
        assert!(dir.is_dir() && !dir.is_file());
        assert!(file.is_file() && !file.is_dir());
        assert_eq!(file.size(), 42);
        assert_eq!(file.mtime(), 7);
    }

    #[test]
    fn decodes_statvfs_tuple() {
        let vfs: StatVfs = decode_literal(b"(4096, 4096, 256, 64, 64, 0, 0, 0, 0, 255)\r\n").unwrap();
        assert_eq!(vfs.frsize, 4096);
        assert_eq!(vfs.blocks, 256);
        assert_eq!(vfs.bavail, 64);
    }

    #[test]
    fn decodes_list_rows() {
        let rows: Vec<StatEntry> =
            decode_literal(b"[['/a.py', 32768, 0, 0, 0, 0, 0, 10, 0, 5, 5]]").unwrap();
        assert_eq!(rows[0].name(), "/a.py");
        assert_eq!(rows[0].stat().size(), 10);
    }

    #[test]
    fn snippet_sources_quote_paths() {
        let src = Snippet::Stat {
            path: RemotePath::new("/it's.py"),
        }
        .source();
        assert!(src.contains(r"os.stat('/it\'s.py')"));

        let list = Snippet::List {
            path: RemotePath::root(),
            all: true,
        }
        .source();
        assert!(list.contains("if True:"));
        assert!(list.contains("print(r)"));
    }
}
