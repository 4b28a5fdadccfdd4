use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// Prompt shown when the session has no `PROMPT` variable.
const DEFAULT_PROMPT: &str = "->";

/// Mutable, session-scoped view of the process environment.
///
/// The environment contains:
/// - `vars`: a map of environment variables that will be visible to executed commands.
/// - `current_dir`: the working directory for command execution.
///
/// The store lives for the whole session. Builtins mutate it in place;
/// external commands only ever see a point-in-time copy taken when they are
/// spawned, so a child process can never change the session's state.
///
/// Note: fields are public for simplicity to keep the crate small.
/// Production code would prefer accessor methods over public fields.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    ///
    /// This copies variables from `std::env::vars()` and initializes
    /// `current_dir` from `std::env::current_dir()`. `PROMPT` is seeded with
    /// its default when the process did not inherit one, so spawned commands
    /// see it too.
    pub fn new() -> Self {
        let mut vars: HashMap<String, String> = stdenv::vars().collect();
        vars.entry("PROMPT".to_string())
            .or_insert_with(|| DEFAULT_PROMPT.to_string());
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { vars, current_dir }
    }

    /// Get the value of an environment variable.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    /// Set or override an environment variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// The prompt text to display before reading a line.
    pub fn prompt(&self) -> String {
        self.get_var("PROMPT")
            .unwrap_or_else(|| DEFAULT_PROMPT.to_string())
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializes tests that change the process working directory.
#[cfg(test)]
pub(crate) fn lock_current_dir() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};
    static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
    MUTEX.get_or_init(|| Mutex::new(())).lock().unwrap()
}
