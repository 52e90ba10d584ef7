//! A small interactive shell that runs pipelines of external programs.
//!
//! A line is first checked against the built-ins (`exit`, `clear`/`cls`, `cd`,
//! `pwd`, `color`). Anything else goes through the pipeline engine:
//!
//! - [`parser`] splits the line into stages at unquoted `|` and `;` and detects `&`;
//! - [`lexer`] splits one stage into argument tokens, honoring double quotes;
//! - [`redirect`] strips a trailing `>`, `>>` or `<` and applies it in the child;
//! - [`executor`] forks one process per stage, connects them with pipes and
//!   either waits for the last one or detaches them into their own process group.
//!
//! The main entry point is [`Interpreter`].

mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
pub mod executor;
mod interpreter;
pub mod lexer;
pub mod parser;
pub mod redirect;
pub mod signal;

pub use builtin::{COLORS, color_sequence};
pub use error::ShellError;
pub use interpreter::{DEFAULT_PROMPT, Interpreter, StdinGuard};
