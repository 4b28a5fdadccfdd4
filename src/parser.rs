//! Parsing one pipeline stage into a [`Command`].

use crate::command::Command;
use crate::env::Environment;
use regex::Regex;
use std::sync::OnceLock;

/// An argument that is wholly a variable reference, e.g. `$HOME`.
///
/// Only whole-token references are substituted; a `$` embedded in a larger
/// token is left alone.
fn variable_reference() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\$(.+)$").expect("valid pattern"))
}

/// Parse one stage string into a [`Command`].
///
/// The stage is split on runs of whitespace; the first field is the program
/// name, the rest become arguments. Arguments that are wholly a `$NAME`
/// reference are replaced with the variable's value from `env`, an unset
/// variable resolving to the empty string. The name field is never
/// substituted.
///
/// Returns `None` when the stage contains no fields at all.
pub fn parse_command(stage: &str, env: &Environment) -> Option<Command> {
    let mut fields = stage.split_whitespace();
    let name = fields.next()?.to_string();
    let args = fields.map(|raw| substitute(raw, env)).collect();
    Some(Command { name, args })
}

fn substitute(raw: &str, env: &Environment) -> String {
    match variable_reference().captures(raw) {
        Some(reference) => env.get_var(&reference[1]).unwrap_or_default(),
        None => raw.to_string(),
    }
}
