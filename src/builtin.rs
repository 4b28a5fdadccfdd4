use crate::command::{Command, ExitCode};
use crate::env::Environment;
use crate::external;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{self, Stdio};

/// Built-in commands known to the shell at compile time.
///
/// The set is closed: classification is an exact match of the command name
/// against the four variants, checked before any external resolution is
/// attempted. Arguments are parsed with the [`argh`] crate (`FromArgs`) and
/// the operation executes directly in the orchestrator, never in a child
/// process.
pub enum Builtin {
    /// `cd` — change the session working directory.
    ChangeDirectory(Cd),
    /// `exit` — terminate the whole session with a chosen status.
    Terminate(Exit),
    /// `set` — write KEY=VALUE entries into the session environment.
    AssignVariable(Set),
    /// `exec` — run a program in the foreground on the real terminal streams.
    RunForeground(Exec),
}

/// Usage text produced when a builtin invocation does not parse.
pub struct Usage {
    /// argh's generated help or error message.
    pub output: String,
    /// False for an explicit `--help`, true for a genuine parse error.
    pub is_error: bool,
}

impl Builtin {
    /// Classify a parsed command, parsing its arguments when the name is a
    /// builtin. Returns `None` for anything that should resolve externally.
    pub fn classify(command: &Command) -> Option<Result<Builtin, Usage>> {
        match command.name.as_str() {
            "cd" => Some(parse_args(command, Builtin::ChangeDirectory)),
            "exit" => Some(parse_args(command, Builtin::Terminate)),
            "set" => Some(parse_args(command, Builtin::AssignVariable)),
            "exec" => Some(parse_args(command, Builtin::RunForeground)),
            _ => None,
        }
    }

    /// Execute the operation against the session state.
    ///
    /// Side effects are immediate and visible to every later stage of the
    /// same line and to all future lines. `Terminate` does not return.
    pub fn execute(self, env: &mut Environment) -> Result<ExitCode> {
        match self {
            Builtin::ChangeDirectory(cd) => cd.run(env),
            Builtin::Terminate(exit) => exit.run(),
            Builtin::AssignVariable(set) => set.run(env),
            Builtin::RunForeground(exec) => exec.run(env),
        }
    }
}

fn parse_args<T: FromArgs>(command: &Command, wrap: fn(T) -> Builtin) -> Result<Builtin, Usage> {
    let args: Vec<&str> = command.args.iter().map(String::as_str).collect();
    match T::from_args(&[command.name.as_str()], &args) {
        Ok(parsed) => Ok(wrap(parsed)),
        Err(EarlyExit { output, status }) => Err(Usage {
            output,
            is_error: status.is_err(),
        }),
    }
}

#[derive(FromArgs)]
/// Change the session working directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub target: String,
}

impl Cd {
    fn run(self, env: &mut Environment) -> Result<ExitCode> {
        let target = PathBuf::from(&self.target);
        let new_dir = if target.is_absolute() {
            target
        } else {
            env.current_dir.join(target)
        };

        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: can't canonicalize {}", new_dir.display()))?;

        env::set_current_dir(&canonical)
            .with_context(|| format!("cd: can't chdir to {}", canonical.display()))?;
        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Terminate the shell with an optional numeric status.
pub struct Exit {
    #[argh(positional, greedy)]
    /// exit status; 0 when omitted or not a number.
    pub status: Vec<String>,
}

impl Exit {
    /// The status the process will terminate with.
    pub fn status_code(&self) -> ExitCode {
        self.status
            .first()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0)
    }

    fn run(self) -> Result<ExitCode> {
        // Ends the whole session immediately, even mid-pipeline.
        process::exit(self.status_code())
    }
}

#[derive(FromArgs)]
/// Assign KEY=VALUE entries into the session environment.
pub struct Set {
    #[argh(positional, greedy)]
    /// entries of the form KEY=VALUE; anything without '=' is ignored.
    pub assignments: Vec<String>,
}

impl Set {
    fn run(self, env: &mut Environment) -> Result<ExitCode> {
        for assignment in self.assignments {
            // Split on the first '='; the value may itself contain '='.
            if let Some((key, value)) = assignment.split_once('=') {
                env.set_var(key, value);
            }
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Run a program in the foreground, wired to the session's real standard
/// input, output and error, bypassing any pipeline stream wiring.
pub struct Exec {
    #[argh(positional)]
    /// program to run.
    pub program: String,

    #[argh(positional, greedy)]
    /// arguments passed through verbatim.
    pub args: Vec<String>,
}

impl Exec {
    fn run(self, env: &Environment) -> Result<ExitCode> {
        let search_paths = env.get_var("PATH").unwrap_or_default();
        let path = external::find_command_path(OsStr::new(&search_paths), Path::new(&self.program))
            .ok_or_else(|| anyhow::anyhow!("command not found: {}", self.program))?;

        let status = process::Command::new(path)
            .args(&self.args)
            .env_clear()
            .envs(&env.vars)
            .current_dir(&env.current_dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .with_context(|| format!("exec: can't start {}", self.program))?;

        Ok(status
            .code()
            .unwrap_or_else(|| external::terminated_by_signal(status)))
    }
}
