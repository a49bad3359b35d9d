//! Line-oriented terminal: where the shells read input and print output.
//!
//! Input and output are boxed trait objects so the whole shell can be driven
//! from a buffer in tests.

use std::io::{self, BufRead, Write};

use tracing::warn;

use crate::colors::Painter;

pub struct Terminal {
    input: Box<dyn BufRead>,
    output: Box<dyn Write>,
    painter: Painter,
}

impl Terminal {
    pub fn new(input: Box<dyn BufRead>, output: Box<dyn Write>, painter: Painter) -> Self {
        Self {
            input,
            output,
            painter,
        }
    }

    /// Standard input and output.
    pub fn stdio(painter: Painter) -> Self {
        Self::new(
            Box::new(io::BufReader::new(io::stdin())),
            Box::new(io::stdout()),
            painter,
        )
    }

    pub fn painter(&self) -> Painter {
        self.painter
    }

    pub fn print(&mut self, text: &str) {
        // A closed stdout is not worth aborting a command over.
        let _ = self.output.write_all(text.as_bytes());
        let _ = self.output.flush();
    }

    pub fn println(&mut self, text: &str) {
        self.print(&format!("{text}\n"));
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        let _ = self.output.write_all(data);
        let _ = self.output.flush();
    }

    /// Shows `prompt` and reads one line without its line ending.
    /// `None` at end of input. Bytes that are not UTF-8 are replaced.
    pub fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.print(prompt);
        let mut bytes = Vec::new();
        if self.input.read_until(b'\n', &mut bytes)? == 0 {
            return Ok(None);
        }
        while bytes.ends_with(b"\n") || bytes.ends_with(b"\r") {
            bytes.pop();
        }
        let line = match String::from_utf8(bytes) {
            Ok(line) => line,
            Err(e) => {
                warn!("Input is not valid UTF-8: {}", e.utf8_error());
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        Ok(Some(line))
    }

    /// Yes/no question; anything but `y`/`yes` (or end of input) is no.
    pub fn confirm(&mut self, title: &str) -> bool {
        match self.read_line(&format!("{title} [y/N] ")) {
            Ok(Some(answer)) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            _ => false,
        }
    }

    /// Numbered menu; returns the index of the chosen item.
    pub fn choose(&mut self, title: &str, items: &[String]) -> Option<usize> {
        self.println(title);
        for (i, item) in items.iter().enumerate() {
            self.println(&format!("  {}) {}", i + 1, item));
        }
        loop {
            let answer = match self.read_line(&format!("Select [1-{}]: ", items.len())) {
                Ok(Some(answer)) => answer,
                _ => return None,
            };
            let answer = answer.trim();
            if answer.is_empty() {
                return None;
            }
            match answer.parse::<usize>() {
                Ok(n) if (1..=items.len()).contains(&n) => return Some(n - 1),
                _ => self.println(&format!("Invalid selection: {answer}")),
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{scripted, scripted_bytes};

    #[test]
    fn read_line_strips_line_endings() {
        let (mut term, out) = scripted("ls -l\r\n");
        assert_eq!(term.read_line("> ").unwrap().as_deref(), Some("ls -l"));
        assert_eq!(term.read_line("> ").unwrap(), None);
        assert_eq!(out.contents(), "> > ");
    }

    #[test]
    fn read_line_replaces_invalid_utf8() {
        let (mut term, _) = scripted_bytes(b"st\xffatus\nstatus\n");
        assert_eq!(
            term.read_line("> ").unwrap().as_deref(),
            Some("st\u{fffd}atus")
        );
        assert_eq!(term.read_line("> ").unwrap().as_deref(), Some("status"));
        assert_eq!(term.read_line("> ").unwrap(), None);
    }

    #[test]
    fn confirm_defaults_to_no() {
        let (mut term, _) = scripted("y\nno\n\n");
        assert!(term.confirm("Remove?"));
        assert!(!term.confirm("Remove?"));
        assert!(!term.confirm("Remove?"));
        assert!(!term.confirm("Remove?"));
    }

    #[test]
    fn choose_retries_invalid_input() {
        let (mut term, out) = scripted("7\n2\n");
        let items = vec!["/dev/ttyACM0".to_string(), "/dev/ttyACM1".to_string()];
        assert_eq!(term.choose("Select a device:", &items), Some(1));
        assert!(out.contents().contains("Invalid selection: 7"));
    }
}
