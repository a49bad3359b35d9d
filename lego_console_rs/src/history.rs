//! Command history, optionally backed by a local file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<String>,
    max_len: usize,
    file: Option<PathBuf>,
}

impl History {
    pub fn new(file: Option<PathBuf>, max_len: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_len,
            file,
        }
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, line: &str) {
        let line = line.trim_end();
        if line.trim().is_empty() {
            return;
        }
        self.entries.push(line.to_string());
        self.truncate();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Removes the entry at 1-based `offset`; negative offsets count back
    /// from the end. Returns the removed line.
    pub fn remove(&mut self, offset: i64) -> Option<String> {
        let len = self.entries.len() as i64;
        let index = match offset {
            0 => return None,
            o if o > 0 => o - 1,
            o => o + len,
        };
        if index < 0 || index >= len {
            return None;
        }
        Some(self.entries.remove(index as usize))
    }

    /// Creates the history file if it does not exist yet.
    pub fn ensure_file(&self) -> io::Result<()> {
        if let Some(path) = &self.file
            && !path.is_file()
        {
            debug!("Creating history file: {} ...", path.display());
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::File::create(path)?;
        }
        Ok(())
    }

    /// Appends the history file's lines to the list.
    pub fn read(&mut self) -> io::Result<()> {
        let Some(path) = &self.file else {
            return Ok(());
        };
        if !path.is_file() {
            return Ok(());
        }
        debug!("Reading history file: {} ...", path.display());
        let content = fs::read_to_string(path)?;
        self.entries.extend(
            content
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string),
        );
        self.truncate();
        debug!("Read {} lines.", self.entries.len());
        Ok(())
    }

    /// Writes the list to the history file.
    pub fn write(&self) -> io::Result<()> {
        let Some(path) = &self.file else {
            return Ok(());
        };
        debug!("Writing history file: {} ...", path.display());
        let mut content = self.entries.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        fs::write(path, content)?;
        debug!("Wrote {} lines.", self.entries.len());
        Ok(())
    }

    fn truncate(&mut self) {
        if self.entries.len() > self.max_len {
            let excess = self.entries.len() - self.max_len;
            self.entries.drain(..excess);
        }
    }
}
