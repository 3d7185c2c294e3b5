//! A small interactive shell.
//!
//! Lines are split into words with shell quoting rules, output redirections are peeled
//! off, and the first word is resolved to a builtin or to a program on `PATH`. Lines
//! with `|` run as pipelines whose stages execute concurrently. The interactive loop
//! adds tab completion of command names on top of [`rustyline`].
//!
//! The main entry point is [`Interpreter`]. The public modules [`command`] and [`env`]
//! expose the command traits and the session state.

mod builtin;
pub mod command;
pub mod completion;
pub mod config;
pub mod env;
mod external;
pub mod history;
mod interpreter;
pub mod io_adapters;
pub mod lexer;
pub mod logging;
pub mod pipeline;
pub mod redirect;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;
