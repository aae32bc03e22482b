//! Abstract syntax tree produced by the parser.
//!
//! Statements and expressions are separate sums so that statement-only
//! constructs can never nest inside arithmetic. Comparisons get their own
//! struct instead of an `Expr` variant: the grammar only allows them in
//! `if`/`while` headers, and the types enforce exactly that. Conditional and
//! loop bodies are always a `Block`, so every body introduces a lexical
//! scope.

use crate::origin::Origin;
use crate::tokenizer::{BinOp, CompOp, UnOp};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Number {
    value: f64,
    origin: Origin,
  },
  Variable {
    name: String,
    origin: Origin,
  },
  BinOp {
    op: BinOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
    origin: Origin,
  },
  UnOp {
    op: UnOp,
    operand: Box<Expr>,
    origin: Origin,
  },
  Call {
    name: String,
    args: Vec<Expr>,
    origin: Origin,
  },
}

impl Expr {
  pub fn number(value: f64, origin: Origin) -> Self {
    Self::Number { value, origin }
  }

  pub fn variable(name: impl Into<String>, origin: Origin) -> Self {
    Self::Variable {
      name: name.into(),
      origin,
    }
  }

  pub fn binary(op: BinOp, lhs: Expr, rhs: Expr, origin: Origin) -> Self {
    Self::BinOp {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
      origin,
    }
  }

  pub fn unary(op: UnOp, operand: Expr, origin: Origin) -> Self {
    Self::UnOp {
      op,
      operand: Box::new(operand),
      origin,
    }
  }

  pub fn call(name: impl Into<String>, args: Vec<Expr>, origin: Origin) -> Self {
    Self::Call {
      name: name.into(),
      args,
      origin,
    }
  }

  pub fn origin(&self) -> Origin {
    match self {
      Expr::Number { origin, .. }
      | Expr::Variable { origin, .. }
      | Expr::BinOp { origin, .. }
      | Expr::UnOp { origin, .. }
      | Expr::Call { origin, .. } => *origin,
    }
  }
}

/// Condition of an `if`/`while` header.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
  pub op: CompOp,
  pub lhs: Expr,
  pub rhs: Expr,
  pub origin: Origin,
}

/// A braced statement sequence. Entering one opens a scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
  pub statements: Vec<Stmt>,
  pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
  Expr(Expr),
  Assignment {
    target: String,
    target_origin: Origin,
    value: Expr,
  },
  VarDecl {
    name: String,
    init: Option<Expr>,
    origin: Origin,
  },
  Block(Block),
  If {
    cond: Comparison,
    body: Block,
  },
  IfElse {
    cond: Comparison,
    then_body: Block,
    else_body: Block,
  },
  While {
    cond: Comparison,
    body: Block,
  },
  Return {
    value: Expr,
    origin: Origin,
  },
}

impl Stmt {
  pub fn origin(&self) -> Origin {
    match self {
      Stmt::Expr(expr) => expr.origin(),
      Stmt::Assignment { target_origin, .. } => *target_origin,
      Stmt::VarDecl { origin, .. } => *origin,
      Stmt::Block(block) => block.origin,
      Stmt::If { cond, .. } | Stmt::IfElse { cond, .. } | Stmt::While { cond, .. } => cond.origin,
      Stmt::Return { origin, .. } => *origin,
    }
  }
}

/// Formal parameter of a function definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
  pub name: String,
  pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
  pub name: String,
  pub params: Vec<Param>,
  pub body: Block,
  pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
  pub functions: Vec<Function>,
}
