//! The pipeline executor and the interactive read-eval loop.

use crate::builtin::Builtin;
use crate::command::{Command, ExitCode};
use crate::env::Environment;
use crate::external;
use crate::lexer;
use crate::parser;
use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::ffi::OsStr;
use std::io::{self, PipeWriter, Read, Write};
use std::path::Path;
use std::process::{self, Child, ChildStdout, Stdio};
use std::thread;

/// Where the next external stage reads its input from.
enum StageInput {
    /// Head of the chain: the session's real standard input.
    Terminal,
    /// The previous stage's output conduit.
    Conduit(ChildStdout),
    /// The predecessor was skipped or failed to start: nothing to read.
    Closed,
}

impl StageInput {
    fn into_stdio(self) -> Stdio {
        match self {
            StageInput::Terminal => Stdio::inherit(),
            StageInput::Conduit(conduit) => Stdio::from(conduit),
            StageInput::Closed => Stdio::null(),
        }
    }
}

/// A minimal interactive shell that executes pipelines of built-in and
/// external commands.
///
/// The interpreter owns the session [`Environment`]. One input line is
/// tokenized into stages, parsed into [`Command`] records and executed:
/// builtins first, in order, in-process; then every external stage is
/// started, wired stdout-to-stdin with OS pipes, and only then waited on.
/// A failing command never ends the session — only the `exit` builtin does.
pub struct Interpreter {
    env: Environment,
}

impl Interpreter {
    /// Create an interpreter whose session environment is captured from the
    /// current process.
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
        }
    }

    /// The interactive Read-Eval-Print Loop.
    ///
    /// Reads lines until end of input, executing each one. The prompt comes
    /// from the `PROMPT` variable, so `set PROMPT=...` changes it live.
    pub fn repl(&mut self) -> rustyline::Result<()> {
        let mut rl = DefaultEditor::new()?;

        loop {
            let readline = rl.readline(&format!("{} ", self.env.prompt()));
            match readline {
                Ok(line) => {
                    rl.add_history_entry(line.as_str())?;
                    if let Err(err) = self.run_line(&line) {
                        eprintln!("osh: {err}");
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("osh: reading input: {err}");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Execute one raw input line against the real standard streams.
    pub fn run_line(&mut self, line: &str) -> Result<ExitCode> {
        let mut stdout = io::stdout();
        let mut stderr = io::stderr();
        let code = self.run_line_with_output(line, &mut stdout, &mut stderr)?;
        stdout.flush()?;
        Ok(code)
    }

    /// Like [`run_line`](Self::run_line), but the pipeline's collected
    /// output and diagnostics go to the provided writers.
    fn run_line_with_output(
        &mut self,
        line: &str,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<ExitCode> {
        let pipeline: Vec<Command> = lexer::split_into_stages(line)
            .iter()
            .filter_map(|stage| parser::parse_command(stage, &self.env))
            .collect();

        // A blank line is a no-op, straight back to the prompt.
        if pipeline.is_empty() {
            return Ok(0);
        }
        self.run_pipeline(pipeline, stdout, stderr)
    }

    /// Execute one parsed pipeline.
    ///
    /// Builtins run first, synchronously and in order; their effects on the
    /// session are visible to every external stage of this line and to all
    /// later lines. The remaining stages then run as a concurrent chain of
    /// child processes.
    fn run_pipeline<'a>(
        &mut self,
        pipeline: Vec<Command>,
        stdout: &'a mut dyn Write,
        stderr: &'a mut dyn Write,
    ) -> Result<ExitCode> {
        let mut externals = Vec::new();
        for command in pipeline {
            match Builtin::classify(&command) {
                Some(Ok(builtin)) => {
                    if let Err(err) = builtin.execute(&mut self.env) {
                        writeln!(stderr, "osh: {err}")?;
                    }
                }
                Some(Err(usage)) => {
                    let dest = if usage.is_error { &mut *stderr } else { &mut *stdout };
                    writeln!(dest, "{}", usage.output.trim_end())?;
                }
                None => externals.push(command),
            }
        }

        if externals.is_empty() {
            return Ok(0);
        }
        self.run_external_stages(externals, stdout, stderr)
    }

    /// Resolve, wire, start and reap the external stages of one pipeline.
    ///
    /// Every stage is started before any is waited on: conduits have bounded
    /// buffers, so a producer blocked on a full conduit only makes progress
    /// once its consumer is running. Once a stage has started it is always
    /// waited on, whatever happens to its neighbors.
    fn run_external_stages(
        &mut self,
        stages: Vec<Command>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<ExitCode> {
        let search_paths = self.env.get_var("PATH").unwrap_or_default();

        // One shared conduit aggregates stderr across stages; each child
        // receives a clone of the write end.
        let (error_reader, error_writer) = io::pipe()?;

        let mut children: Vec<(String, Child)> = Vec::new();
        let mut diagnostics: Vec<String> = Vec::new();
        let mut first_failure: Option<String> = None;
        let mut input = StageInput::Terminal;

        for command in stages {
            let upstream = std::mem::replace(&mut input, StageInput::Closed);

            let resolved =
                external::find_command_path(OsStr::new(&search_paths), Path::new(&command.name));
            let Some(path) = resolved else {
                diagnostics.push(format!("osh: command not found: {}", command.name));
                // `upstream` drops here: a conduit whose consumer is gone.
                // The skipped stage's successor reads from the null device.
                continue;
            };

            match self.spawn_stage(&command, &path, upstream.into_stdio(), &error_writer) {
                Ok(mut child) => {
                    if let Some(conduit) = child.stdout.take() {
                        input = StageInput::Conduit(conduit);
                    }
                    children.push((command.name, child));
                }
                Err(err) => {
                    first_failure.get_or_insert(format!("osh: {}: {}", command.name, err));
                }
            }
        }

        // Draining. Our write end closes now, so the collector reaches EOF
        // once the last child releases its clone.
        drop(error_writer);
        let collector = thread::spawn(move || {
            let mut reader = error_reader;
            let mut collected = Vec::new();
            let _ = reader.read_to_end(&mut collected);
            collected
        });

        let mut output = Vec::new();
        if let StageInput::Conduit(mut tail) = input {
            let _ = tail.read_to_end(&mut output);
        }

        let mut code = 0;
        for (name, child) in &mut children {
            match child.wait() {
                Ok(status) => {
                    if !status.success() {
                        first_failure.get_or_insert(format!("osh: {name}: {status}"));
                    }
                    code = status
                        .code()
                        .unwrap_or_else(|| external::terminated_by_signal(status));
                }
                Err(err) => {
                    first_failure.get_or_insert(format!("osh: {name}: {err}"));
                }
            }
        }
        let collected = collector.join().unwrap_or_default();

        // Done: the captured output, then everything bound for the error
        // stream, and control returns to the loop.
        stdout.write_all(&output)?;
        stderr.write_all(&collected)?;
        for line in diagnostics {
            writeln!(stderr, "{line}")?;
        }
        if let Some(report) = first_failure {
            writeln!(stderr, "{report}")?;
        }
        Ok(code)
    }

    /// Allocate one stage's conduit ends and start its process.
    ///
    /// The stage sees a point-in-time copy of the session environment and
    /// working directory. Its stdout is always a conduit: interior stages
    /// feed their successor, the final stage feeds the orchestrator's
    /// output collection.
    fn spawn_stage(
        &self,
        command: &Command,
        path: &Path,
        input: Stdio,
        error_sink: &PipeWriter,
    ) -> io::Result<Child> {
        let mut stage = process::Command::new(path);
        stage
            .args(&command.args)
            .env_clear()
            .envs(&self.env.vars)
            .current_dir(&self.env.current_dir)
            .stdin(input)
            .stdout(Stdio::piped())
            .stderr(error_sink.try_clone()?);
        stage.spawn()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod pipeline_tests {
    use super::Interpreter;
    use std::env as stdenv;
    use std::fs;

    fn run(interp: &mut Interpreter, line: &str) -> (i32, String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = interp
            .run_line_with_output(line, &mut out, &mut err)
            .expect("pipeline execution failed");
        (
            code,
            String::from_utf8(out).expect("utf8 stdout"),
            String::from_utf8(err).expect("utf8 stderr"),
        )
    }

    #[test]
    fn test_pipeline_data_flow() {
        let mut interp = Interpreter::default();
        let (code, out, err) = run(&mut interp, "echo hello | cat");
        assert_eq!(code, 0);
        assert_eq!(out, "hello\n");
        assert_eq!(err, "");
    }

    #[test]
    fn test_three_stage_pipeline() {
        let mut interp = Interpreter::default();
        let (code, out, _) = run(&mut interp, "printf 'alpha\\nbeta\\n' | grep beta | cat");
        assert_eq!(code, 0);
        assert_eq!(out, "beta\n");
    }

    #[test]
    fn test_quoted_pipe_is_one_argument() {
        let mut interp = Interpreter::default();
        let (code, out, _) = run(&mut interp, "echo \"a|b\"");
        assert_eq!(code, 0);
        assert_eq!(out, "a|b\n");
    }

    #[test]
    fn test_whitespace_runs_between_arguments() {
        let mut interp = Interpreter::default();
        let (_, out, _) = run(&mut interp, "echo   a     b | cat");
        assert_eq!(out, "a b\n");
    }

    #[test]
    fn test_blank_line_is_a_no_op() {
        let mut interp = Interpreter::default();
        let (code, out, err) = run(&mut interp, "   ");
        assert_eq!(code, 0);
        assert_eq!(out, "");
        assert_eq!(err, "");
    }

    #[test]
    fn test_unresolved_command_is_reported_and_survived() {
        let mut interp = Interpreter::default();
        let (code, out, err) = run(&mut interp, "nosuchprog_osh_test arg");
        assert_eq!(code, 0);
        assert_eq!(out, "");
        assert!(err.contains("command not found: nosuchprog_osh_test"));

        // The session keeps going.
        let (code, out, _) = run(&mut interp, "echo next | cat");
        assert_eq!(code, 0);
        assert_eq!(out, "next\n");
    }

    #[test]
    fn test_unresolved_interior_stage_degrades_gracefully() {
        let mut interp = Interpreter::default();
        let (_, out, err) = run(&mut interp, "echo hi | nosuchprog_osh_test | cat");
        // cat reads from the null device once its predecessor is skipped.
        assert_eq!(out, "");
        assert!(err.contains("command not found: nosuchprog_osh_test"));
    }

    #[test]
    fn test_failing_stage_is_reported_and_survived() {
        let mut interp = Interpreter::default();
        let (code, _, err) = run(&mut interp, "false");
        assert_ne!(code, 0);
        assert!(err.contains("osh: false"));

        let (code, out, _) = run(&mut interp, "echo ok");
        assert_eq!(code, 0);
        assert_eq!(out, "ok\n");
    }

    #[test]
    fn test_set_builtin_persists_across_lines() {
        let mut interp = Interpreter::default();
        let (code, out, err) = run(&mut interp, "set GREETING=bonjour");
        assert_eq!(code, 0);
        assert_eq!(out, "");
        assert_eq!(err, "");

        let (_, out, _) = run(&mut interp, "echo $GREETING | cat");
        assert_eq!(out, "bonjour\n");
    }

    #[test]
    fn test_unset_variable_substitutes_empty() {
        let mut interp = Interpreter::default();
        let (_, out, _) = run(&mut interp, "echo $OSH_TEST_UNSET_VARIABLE");
        assert_eq!(out, "\n");
    }

    #[test]
    fn test_cd_builtin_is_visible_to_later_external_stages() {
        let _lock = crate::env::lock_current_dir();
        let orig = stdenv::current_dir().unwrap();

        let mut target = stdenv::temp_dir();
        target.push(format!("osh_cd_pipeline_{}", std::process::id()));
        fs::create_dir_all(&target).unwrap();
        let canonical = fs::canonicalize(&target).unwrap();

        let mut interp = Interpreter::default();
        let (code, _, err) = run(&mut interp, &format!("cd {}", canonical.display()));
        assert_eq!(code, 0);
        assert_eq!(err, "");

        let (_, out, _) = run(&mut interp, "pwd");
        assert_eq!(out.trim_end(), canonical.to_string_lossy());

        stdenv::set_current_dir(orig).unwrap();
        let _ = fs::remove_dir_all(&target);
    }

    #[test]
    fn test_failed_cd_is_reported_and_survived() {
        let mut interp = Interpreter::default();
        let (_, _, err) = run(&mut interp, "cd /definitely/not/a/real/path/osh");
        assert!(err.contains("osh: cd:"));

        let (code, out, _) = run(&mut interp, "echo still-here");
        assert_eq!(code, 0);
        assert_eq!(out, "still-here\n");
    }

    #[test]
    fn test_builtin_usage_error_is_reported() {
        let mut interp = Interpreter::default();
        let (code, _, err) = run(&mut interp, "cd");
        assert_eq!(code, 0);
        assert!(!err.is_empty());
    }

    #[test]
    fn test_builtin_next_to_externals_does_not_join_the_chain() {
        let mut interp = Interpreter::default();
        // The builtin runs first and stays out of the conduit chain, so the
        // two external stages end up wired directly to each other.
        let (code, out, _) = run(&mut interp, "echo threaded | set MARKER=1 | cat");
        assert_eq!(code, 0);
        assert_eq!(out, "threaded\n");

        let (_, out, _) = run(&mut interp, "echo $MARKER");
        assert_eq!(out, "1\n");
    }
}
