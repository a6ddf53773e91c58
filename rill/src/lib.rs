//! An embeddable interpreter for a small line-oriented scripting language.
//!
//! The language has assignments, `if`/`elif`/`else`, counted `for` loops,
//! `goto` with labels, and installable native functions.  There is no syntax
//! tree: the interpreter executes straight off the token stream, which keeps
//! the runtime small and makes single-statement stepping natural.
//!
//! The core performs no I/O.  Side effects reach the host through installed
//! [`builtins::Library`] actions and through the interpreter's output buffer:
//!
//! ```
//! use rill::interp::Interpreter;
//!
//! let mut interp = Interpreter::new();
//! interp.run("x = 6\nx * 7").unwrap();
//! assert_eq!(interp.take_output(), vec!["42"]);
//! ```

pub mod builtins;
pub mod cli;
pub mod error;
pub mod interp;
pub mod lexer;
pub mod value;

pub use builtins::{Library, NativeAction, NativeFn, RandomLibrary, StandardLibrary};
pub use error::{CallError, ErrorKind, ScriptError};
pub use interp::{Interactive, Interpreter};
pub use value::Value;
