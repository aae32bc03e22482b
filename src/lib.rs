//! Crate root: wires together the compilation pipeline.
//!
//! The stages are intentionally small and composable so they can be evolved
//! independently:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and returns the program AST.
//! - `optimizer` rewrites expression trees (sign elision, trivial
//!   operations, constant folding) without touching statement structure.
//! - `codegen` lowers the optimized program into stack-machine assembly,
//!   resolving names through a scoped symbol table.
//! - `error` and `origin` centralise diagnostics shared by the other stages.

use log::debug;

pub mod ast;
pub mod error;
pub mod optimizer;
pub mod origin;
pub mod parser;
pub mod symtab;
pub mod tokenizer;

mod codegen;

pub use error::{CompileError, CompileResult};

/// Compile a source string into a stack-machine assembly listing.
pub fn compile(source: &str) -> CompileResult<String> {
  let program = build_ast(source)?;
  codegen::generate(&program)
}

/// Run the frontend and middleend only: tokenize, parse and optimize.
pub fn build_ast(source: &str) -> CompileResult<ast::Program> {
  let tokens = tokenizer::tokenize(source)?;
  debug!("tokenized {} tokens", tokens.len());
  let program = parser::parse(tokens)?;
  debug!("parsed {} function definitions", program.functions.len());
  Ok(optimizer::optimize(program))
}
