//! Shared error types used across the compilation pipeline.
//!
//! The first error aborts the current compilation; there is no recovery and
//! no multi-error reporting. The driver prints the `Display` rendering
//! (which already carries the category prefix) and exits non-zero.

use snafu::Snafu;

use crate::origin::Origin;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Clone, PartialEq, Snafu)]
pub enum CompileError {
  /// Malformed token, missing punctuation, unknown name at a use site,
  /// missing `main`, wrong argument count.
  #[snafu(display("Syntax error at {origin}: {message}"))]
  Syntax { message: String, origin: Origin },

  /// Syntax error with no sensible position (e.g. a whole-program check).
  #[snafu(display("Syntax error: {message}"))]
  SyntaxUnlocalized { message: String },

  /// Same name declared twice in the innermost scope (variables) or twice
  /// program-wide (functions).
  #[snafu(display(
    "Redefinition error at {origin}: '{name}' is already declared at {previous}"
  ))]
  Redefinition {
    name: String,
    origin: Origin,
    previous: Origin,
  },

  /// Redefinition of a name the compiler itself registered (`read`,
  /// `print`, `sqrt`).
  #[snafu(display("Redefinition error at {origin}: '{name}' is already declared internally"))]
  RedefinitionInternal { name: String, origin: Origin },

  /// Reserved for typed-value coercions; the numeric-only language never
  /// raises it.
  #[snafu(display("Coercion error: {message}"))]
  Coercion { message: String },

  /// Reserved for immutable bindings; the current language never raises it.
  #[snafu(display("Value reassignment error at {origin}: '{name}' cannot be reassigned"))]
  ValueReassignment { name: String, origin: Origin },

  /// Unreachable-in-well-formed-programs conditions. These are compiler
  /// bugs surfaced as fatal diagnostics.
  #[snafu(display("Logic error: {message}"))]
  Logic { message: String },
}

impl CompileError {
  /// Syntax error anchored at a source position.
  pub fn syntax_at(origin: Origin, message: impl Into<String>) -> Self {
    Self::Syntax {
      message: message.into(),
      origin,
    }
  }

  /// Syntax error without a source position.
  pub fn syntax(message: impl Into<String>) -> Self {
    Self::SyntaxUnlocalized {
      message: message.into(),
    }
  }

  /// Redefinition error; `previous` is `None` when the earlier declaration
  /// is a built-in.
  pub fn redefinition(name: impl Into<String>, origin: Origin, previous: Option<Origin>) -> Self {
    match previous {
      Some(previous) => Self::Redefinition {
        name: name.into(),
        origin,
        previous,
      },
      None => Self::RedefinitionInternal {
        name: name.into(),
        origin,
      },
    }
  }

  pub fn logic(message: impl Into<String>) -> Self {
    Self::Logic {
      message: message.into(),
    }
  }
}
