//! Alias registry: short tokens that expand to full command lines.

/// Canonical value -> alias names, in registration order.
#[derive(Clone, Debug, Default)]
pub struct AliasRegistry {
    entries: Vec<(String, Vec<String>)>,
}

impl AliasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from `(value, names)` pairs.
    pub fn with_table(table: &[(&str, &[&str])]) -> Self {
        let mut registry = Self::new();
        for (value, names) in table {
            for name in *names {
                registry.assign(name, value);
            }
        }
        registry
    }

    /// Aliases of the main console.
    pub fn console_defaults() -> Self {
        Self::with_table(&[
            ("exit", &["EOF", "quit"]),
            ("help", &["man"]),
            ("ls -l", &["ll"]),
            ("vim", &["vi"]),
        ])
    }

    /// Aliases of the `slots` sub-shell.
    pub fn slots_defaults() -> Self {
        Self::with_table(&[("exit", &["EOF", "quit"]), ("help", &["man"])])
    }

    /// Flattened `alias -> value` view, in registration order.
    pub fn lookup_all(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .flat_map(|(value, names)| names.iter().map(|name| (name.clone(), value.clone())))
            .collect()
    }

    pub fn names_for(&self, value: &str) -> Vec<String> {
        self.entries
            .iter()
            .find(|(v, _)| v == value)
            .map(|(_, names)| names.clone())
            .unwrap_or_default()
    }

    pub fn value_for(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, names)| names.iter().any(|n| n == name))
            .map(|(value, _)| value.as_str())
    }

    /// Points `name` at `value`, detaching it from any previous value.
    pub fn assign(&mut self, name: &str, value: &str) {
        self.unassign(name);
        match self.entries.iter_mut().find(|(v, _)| v == value) {
            Some((_, names)) => names.push(name.to_string()),
            None => self
                .entries
                .push((value.to_string(), vec![name.to_string()])),
        }
    }

    pub fn unassign(&mut self, name: &str) {
        for (_, names) in self.entries.iter_mut() {
            names.retain(|n| n != name);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Replaces a leading alias token with its value.
    ///
    /// The value is substituted as the first element of the whitespace-split
    /// line and the tokens are re-joined with single spaces, so `ll -a` with
    /// `ll -> "ls -l"` becomes `"ls -l -a"`. Original spacing between the
    /// remaining tokens is not kept.
    pub fn resolve_line(&self, line: Option<&str>) -> Option<String> {
        let mut tokens: Vec<&str> = line?.split_whitespace().collect();
        let first = tokens.first()?;
        let value = self.value_for(first)?;
        tokens[0] = value;
        Some(tokens.join(" "))
    }
}
