//! Output formatting shared by the file commands.

/// Size units, in increasing powers of the scale factor.
pub const SIZE_UNITS: [&str; 9] = ["B", "K", "M", "G", "T", "P", "E", "Z", "Y"];

/// Formats `size` in the largest unit that keeps it below `factor`.
///
/// One decimal below 10, none above, width 3. Never prints less than 1.
pub fn format_size_automatic(size: u64, factor: f64) -> String {
    let mut size = size as f64;
    for unit in SIZE_UNITS {
        if size < factor {
            let size = size.max(1.0);
            let precision = if size >= 10.0 { 0 } else { 1 };
            return format!("{size:3.precision$}{unit}");
        }
        size /= factor;
    }
    format!("{size:3.0}Y")
}

/// Formats `size` in a fixed power-of-1024 `unit`; `None` for unknown units.
pub fn format_size_explicit(size: u64, unit: &str) -> Option<String> {
    let index = SIZE_UNITS.iter().position(|u| *u == unit)?;
    let scaled = (size as f64 / 1024f64.powi(index as i32)) as u64;
    Some(format!("{}{}", scaled.max(1), unit))
}

/// `cat -v` notation: `^X` for control characters, `M-` for the high half.
/// Tabs are left alone.
pub fn show_nonprinting(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for c in line.chars() {
        let ch = c as u32;
        if c == '\t' {
            out.push(c);
        } else if ch >= 32 {
            if ch < 127 {
                out.push(c);
            } else if ch == 127 {
                out.push_str("^?");
            } else {
                out.push_str("M-");
                if ch >= 128 + 32 {
                    if ch < 128 + 127 {
                        out.push(char::from_u32(ch - 128).unwrap_or('?'));
                    } else {
                        out.push_str("^?");
                    }
                } else {
                    out.push('^');
                    out.push(char::from_u32(ch - 128 + 64).unwrap_or('?'));
                }
            }
        } else {
            out.push('^');
            out.push(char::from_u32(ch + 64).unwrap_or('?'));
        }
    }
    out
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CatOptions {
    pub number_nonblank: bool,
    pub show_ends: bool,
    pub number: bool,
    pub squeeze_blank: bool,
    pub show_tabs: bool,
    pub show_nonprinting: bool,
}

/// Splits at every line boundary Python's `str.splitlines` knows: `\n`,
/// `\r`, `\r\n`, VT, FF, FS, GS, RS, NEL and the Unicode line and paragraph
/// separators. A trailing boundary does not start another line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let is_break = matches!(
            c,
            '\n' | '\r'
                | '\x0b'
                | '\x0c'
                | '\x1c'
                | '\x1d'
                | '\x1e'
                | '\u{85}'
                | '\u{2028}'
                | '\u{2029}'
        );
        if !is_break {
            continue;
        }
        lines.push(&text[start..i]);
        start = i + c.len_utf8();
        if c == '\r' && chars.peek().is_some_and(|&(_, next)| next == '\n') {
            chars.next();
            start += 1;
        }
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

/// Renders file text line by line the way `cat` flags ask for.
pub fn render_cat(text: &str, options: &CatOptions) -> Vec<String> {
    let mut lines = Vec::new();
    let mut count = 0usize;
    let mut blank_previous = false;
    for line in split_lines(text) {
        let blank = line.is_empty();
        if options.squeeze_blank && blank && blank_previous {
            continue;
        }
        blank_previous = blank;

        let mut line = if options.show_nonprinting {
            show_nonprinting(line)
        } else {
            line.to_string()
        };
        if options.show_tabs {
            line = line.replace('\t', "^I");
        }
        let numbered = if options.number_nonblank {
            !blank
        } else {
            options.number
        };
        if numbered {
            count += 1;
            line = format!("{count:>6}\t{line}");
        }
        if options.show_ends {
            line.push('$');
        }
        lines.push(line);
    }
    lines
}

/// `ls -l` style mode string, e.g. `-rw-r--r--`.
pub fn filemode(mode: i64) -> String {
    let kind = match mode & 0o170000 {
        0o120000 => 'l',
        0o140000 => 's',
        0o100000 => '-',
        0o060000 => 'b',
        0o040000 => 'd',
        0o020000 => 'c',
        0o010000 => 'p',
        _ => '-',
    };
    let bit = |mask: i64, c: char| if mode & mask != 0 { c } else { '-' };
    let exec = |exec_mask: i64, special_mask: i64, set: char, unset: char| {
        match (mode & exec_mask != 0, mode & special_mask != 0) {
            (true, true) => set,
            (false, true) => unset,
            (true, false) => 'x',
            (false, false) => '-',
        }
    };
    [
        kind,
        bit(0o400, 'r'),
        bit(0o200, 'w'),
        exec(0o100, 0o4000, 's', 'S'),
        bit(0o040, 'r'),
        bit(0o020, 'w'),
        exec(0o010, 0o2000, 's', 'S'),
        bit(0o004, 'r'),
        bit(0o002, 'w'),
        exec(0o001, 0o1000, 't', 'T'),
    ]
    .iter()
    .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

/// Lays out a one-row table; each column is as wide as its header or value.
pub fn render_columns(columns: &[(&str, Align, String)]) -> (String, String) {
    let mut header = String::new();
    let mut row = String::new();
    for (key, align, value) in columns {
        let width = key.chars().count().max(value.chars().count());
        match align {
            Align::Left => {
                header.push_str(&format!("{key:<width$} "));
                row.push_str(&format!("{value:<width$} "));
            }
            Align::Right => {
                header.push_str(&format!("{key:>width$} "));
                row.push_str(&format!("{value:>width$} "));
            }
        }
    }
    (header, row)
}
