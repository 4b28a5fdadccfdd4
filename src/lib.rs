//! A tiny interactive shell built around pipelines.
//!
//! One input line is split into pipe-separated stages, each stage is parsed
//! into a program name and arguments (with `$NAME` substitution from the
//! session environment), and the resulting chain is executed: builtins run
//! in-process, external programs run as concurrently scheduled children
//! connected by OS pipes.
//!
//! The main entry point is [`Interpreter`], which owns the session
//! [`env::Environment`] and drives the read-eval loop. The public modules
//! [`command`] and [`env`] expose the parsed-command record and the
//! session variable store.

mod builtin;
pub mod command;
pub mod env;
mod external;
mod interpreter;
mod lexer;
mod parser;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API.
pub use interpreter::Interpreter;
