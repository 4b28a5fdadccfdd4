/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// One parsed pipeline stage: a program name and its arguments, in order.
///
/// Produced by the parser from a single stage string and immutable from then
/// on. Whether the name refers to a builtin or an external program is decided
/// later, by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Program or builtin name, exactly as typed (never substituted).
    pub name: String,
    /// Arguments after variable substitution.
    pub args: Vec<String>,
}
