//! Terminal color utilities for shell output.
//!
//! Provides ANSI color codes and semantic helpers for the prompt,
//! `status` and slot listings.

use std::io::IsTerminal;

use crate::types::ColorMode;

// ============================================================================
// ANSI Color Codes
// ============================================================================

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const BLUE: &str = "\x1b[34m";
pub const GRAY: &str = "\x1b[90m";

pub const RESET: &str = "\x1b[0m";

/// Clears the screen and the scrollback buffer.
pub const CLEAR_SCREEN: &str = "\x1bc\x1b[3J";

// ============================================================================
// Color State
// ============================================================================

/// Determines if colors should be used based on ColorMode and terminal detection.
pub fn is_enabled(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => std::io::stdout().is_terminal(),
    }
}

/// Colorizer that can be passed around to format functions.
#[derive(Clone, Copy, Debug)]
pub struct Painter {
    enabled: bool,
}

impl Painter {
    pub fn new(mode: ColorMode) -> Self {
        Self {
            enabled: is_enabled(mode),
        }
    }

    pub fn plain() -> Self {
        Self { enabled: false }
    }

    /// Disconnected, failures - RED
    pub fn error(&self, s: &str) -> String {
        self.wrap(s, RED)
    }

    /// Connected - GREEN
    pub fn ok(&self, s: &str) -> String {
        self.wrap(s, GREEN)
    }

    /// Device names - BLUE
    pub fn device(&self, s: &str) -> String {
        self.wrap(s, BLUE)
    }

    /// Slot program names - YELLOW
    pub fn slot(&self, s: &str) -> String {
        self.wrap(s, YELLOW)
    }

    /// Placeholders - GRAY
    pub fn dim(&self, s: &str) -> String {
        self.wrap(s, GRAY)
    }

    pub fn wrap(&self, s: &str, code: &str) -> String {
        if self.enabled {
            format!("{code}{s}{RESET}")
        } else {
            s.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_painter_disabled() {
        let p = Painter::plain();
        assert_eq!(p.error("test"), "test");
        assert_eq!(p.ok("test"), "test");
        assert_eq!(p.device("test"), "test");
    }

    #[test]
    fn test_painter_enabled() {
        let p = Painter { enabled: true };
        assert_eq!(p.error("test"), "\x1b[31mtest\x1b[0m");
        assert_eq!(p.ok("test"), "\x1b[32mtest\x1b[0m");
        assert_eq!(p.dim("<empty>"), "\x1b[90m<empty>\x1b[0m");
    }

    #[test]
    fn test_color_mode_detection() {
        assert!(is_enabled(ColorMode::Always));
        assert!(!is_enabled(ColorMode::Never));
    }
}
