//! Tree-rewriting optimizations over expression trees.
//!
//! Each rewriter takes ownership of a node and returns the replacement. Two
//! traversal orders exist: the sign rewrites run current-first so collapsed
//! nodes are re-examined on the way down, the trivial-operation rewrites run
//! children-first so they see already-simplified operands. Rewrites never
//! cross statement or block boundaries; statements only route the rewriters
//! into the expression trees they contain.

use crate::ast::{Block, Comparison, Expr, Function, Program, Stmt};
use crate::tokenizer::{BinOp, UnOp};

const COMPARE_EPS: f64 = 1e-9;

/// A single tree rewrite. `rewrite_current` transforms one node without
/// descending and must reach a local fixpoint before returning.
pub trait Optimizer {
  fn rewrite_current(&self, expr: Expr) -> Expr;

  /// Whether children are optimized before the node itself.
  fn children_first(&self) -> bool {
    false
  }

  fn optimize(&self, expr: Expr) -> Expr {
    if self.children_first() {
      self.rewrite_current(self.optimize_children(expr))
    } else {
      self.optimize_children(self.rewrite_current(expr))
    }
  }

  fn optimize_children(&self, expr: Expr) -> Expr {
    match expr {
      Expr::BinOp {
        op,
        lhs,
        rhs,
        origin,
      } => Expr::BinOp {
        op,
        lhs: Box::new(self.optimize(*lhs)),
        rhs: Box::new(self.optimize(*rhs)),
        origin,
      },
      Expr::UnOp {
        op,
        operand,
        origin,
      } => Expr::UnOp {
        op,
        operand: Box::new(self.optimize(*operand)),
        origin,
      },
      Expr::Call { name, args, origin } => Expr::Call {
        name,
        args: args.into_iter().map(|arg| self.optimize(arg)).collect(),
        origin,
      },
      leaf => leaf,
    }
  }
}

/// Removes unary-plus nodes; `+x` carries no meaning for numbers.
pub struct UnaryPlusElision;

impl Optimizer for UnaryPlusElision {
  fn rewrite_current(&self, mut expr: Expr) -> Expr {
    loop {
      match expr {
        Expr::UnOp {
          op: UnOp::Plus,
          operand,
          ..
        } => expr = *operand,
        done => return done,
      }
    }
  }
}

/// Collapses double arithmetic negations: `-(-x)` becomes `x`.
pub struct NegationCollapse;

impl Optimizer for NegationCollapse {
  fn rewrite_current(&self, mut expr: Expr) -> Expr {
    loop {
      match expr {
        Expr::UnOp {
          op: UnOp::Neg,
          operand,
          origin,
        } => match *operand {
          Expr::UnOp {
            op: UnOp::Neg,
            operand: inner,
            ..
          } => expr = *inner,
          other => {
            return Expr::UnOp {
              op: UnOp::Neg,
              operand: Box::new(other),
              origin,
            }
          }
        },
        done => return done,
      }
    }
  }
}

/// `0 + x` and `x + 0` reduce to `x`.
pub struct TrivialAddition;

impl Optimizer for TrivialAddition {
  fn children_first(&self) -> bool {
    true
  }

  fn rewrite_current(&self, mut expr: Expr) -> Expr {
    loop {
      match expr {
        Expr::BinOp {
          op: BinOp::Add,
          lhs,
          rhs,
          origin,
        } => {
          if is_zero(&lhs) {
            expr = *rhs;
          } else if is_zero(&rhs) {
            expr = *lhs;
          } else {
            return Expr::BinOp {
              op: BinOp::Add,
              lhs,
              rhs,
              origin,
            };
          }
        }
        done => return done,
      }
    }
  }
}

/// `0 * x` and `x * 0` absorb to the zero; `1 * x` and `x * 1` drop the one.
pub struct TrivialMultiplication;

impl Optimizer for TrivialMultiplication {
  fn children_first(&self) -> bool {
    true
  }

  fn rewrite_current(&self, mut expr: Expr) -> Expr {
    loop {
      match expr {
        Expr::BinOp {
          op: BinOp::Mul,
          lhs,
          rhs,
          origin,
        } => {
          if is_zero(&lhs) || is_one(&rhs) {
            expr = *lhs;
          } else if is_zero(&rhs) || is_one(&lhs) {
            expr = *rhs;
          } else {
            return Expr::BinOp {
              op: BinOp::Mul,
              lhs,
              rhs,
              origin,
            };
          }
        }
        done => return done,
      }
    }
  }
}

/// Replaces arithmetic over literal operands with the computed literal.
/// IEEE-754 semantics throughout; division by zero folds to the IEEE value.
pub struct ConstantFolding;

impl Optimizer for ConstantFolding {
  fn children_first(&self) -> bool {
    true
  }

  fn rewrite_current(&self, expr: Expr) -> Expr {
    match expr {
      Expr::UnOp {
        op,
        operand,
        origin,
      } => match *operand {
        Expr::Number { value, .. } => Expr::Number {
          value: fold_unary(op, value),
          origin,
        },
        other => Expr::UnOp {
          op,
          operand: Box::new(other),
          origin,
        },
      },
      Expr::BinOp {
        op,
        lhs,
        rhs,
        origin,
      } => match (*lhs, *rhs) {
        (Expr::Number { value: a, .. }, Expr::Number { value: b, .. }) => Expr::Number {
          value: fold_binary(op, a, b),
          origin,
        },
        (lhs, rhs) => Expr::BinOp {
          op,
          lhs: Box::new(lhs),
          rhs: Box::new(rhs),
          origin,
        },
      },
      other => other,
    }
  }
}

/// Composite pass for identity/absorption rewrites and constant folding,
/// applied post-order so every node sees simplified children.
pub struct TrivialOperations {
  passes: Vec<Box<dyn Optimizer>>,
}

impl TrivialOperations {
  pub fn new() -> Self {
    Self {
      passes: vec![
        Box::new(TrivialMultiplication),
        Box::new(TrivialAddition),
        Box::new(ConstantFolding),
      ],
    }
  }
}

impl Default for TrivialOperations {
  fn default() -> Self {
    Self::new()
  }
}

impl Optimizer for TrivialOperations {
  fn children_first(&self) -> bool {
    true
  }

  fn rewrite_current(&self, mut expr: Expr) -> Expr {
    for pass in &self.passes {
      expr = pass.rewrite_current(expr);
    }
    expr
  }
}

fn fold_binary(op: BinOp, lhs: f64, rhs: f64) -> f64 {
  match op {
    BinOp::Add => lhs + rhs,
    BinOp::Sub => lhs - rhs,
    BinOp::Mul => lhs * rhs,
    BinOp::Div => lhs / rhs,
    BinOp::Pow => lhs.powf(rhs),
  }
}

fn fold_unary(op: UnOp, value: f64) -> f64 {
  match op {
    UnOp::Plus => value,
    UnOp::Neg => -value,
  }
}

fn is_zero(expr: &Expr) -> bool {
  matches!(expr, Expr::Number { value, .. } if value.abs() < COMPARE_EPS)
}

fn is_one(expr: &Expr) -> bool {
  matches!(expr, Expr::Number { value, .. } if (value - 1.0).abs() < COMPARE_EPS)
}

/// The default optimization pipeline applied between parsing and codegen.
pub struct Pipeline {
  passes: Vec<Box<dyn Optimizer>>,
}

impl Default for Pipeline {
  fn default() -> Self {
    Self {
      passes: vec![
        Box::new(UnaryPlusElision),
        Box::new(NegationCollapse),
        Box::new(TrivialOperations::new()),
      ],
    }
  }
}

impl Pipeline {
  pub fn optimize_expr(&self, mut expr: Expr) -> Expr {
    for pass in &self.passes {
      expr = pass.optimize(expr);
    }
    expr
  }

  pub fn optimize_program(&self, program: Program) -> Program {
    Program {
      functions: program
        .functions
        .into_iter()
        .map(|function| self.optimize_function(function))
        .collect(),
    }
  }

  fn optimize_function(&self, function: Function) -> Function {
    let Function {
      name,
      params,
      body,
      origin,
    } = function;
    Function {
      name,
      params,
      body: self.optimize_block(body),
      origin,
    }
  }

  fn optimize_block(&self, block: Block) -> Block {
    Block {
      statements: block
        .statements
        .into_iter()
        .map(|statement| self.optimize_stmt(statement))
        .collect(),
      origin: block.origin,
    }
  }

  fn optimize_stmt(&self, statement: Stmt) -> Stmt {
    match statement {
      Stmt::Expr(expr) => Stmt::Expr(self.optimize_expr(expr)),
      Stmt::Assignment {
        target,
        target_origin,
        value,
      } => Stmt::Assignment {
        target,
        target_origin,
        value: self.optimize_expr(value),
      },
      Stmt::VarDecl { name, init, origin } => Stmt::VarDecl {
        name,
        init: init.map(|expr| self.optimize_expr(expr)),
        origin,
      },
      Stmt::Block(block) => Stmt::Block(self.optimize_block(block)),
      Stmt::If { cond, body } => Stmt::If {
        cond: self.optimize_comparison(cond),
        body: self.optimize_block(body),
      },
      Stmt::IfElse {
        cond,
        then_body,
        else_body,
      } => Stmt::IfElse {
        cond: self.optimize_comparison(cond),
        then_body: self.optimize_block(then_body),
        else_body: self.optimize_block(else_body),
      },
      Stmt::While { cond, body } => Stmt::While {
        cond: self.optimize_comparison(cond),
        body: self.optimize_block(body),
      },
      Stmt::Return { value, origin } => Stmt::Return {
        value: self.optimize_expr(value),
        origin,
      },
    }
  }

  fn optimize_comparison(&self, comparison: Comparison) -> Comparison {
    let Comparison {
      op,
      lhs,
      rhs,
      origin,
    } = comparison;
    Comparison {
      op,
      lhs: self.optimize_expr(lhs),
      rhs: self.optimize_expr(rhs),
      origin,
    }
  }
}

/// Run the default pipeline over a whole program.
pub fn optimize(program: Program) -> Program {
  Pipeline::default().optimize_program(program)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::origin::Origin;

  fn at() -> Origin {
    Origin::new(1, 1)
  }

  fn number(value: f64) -> Expr {
    Expr::number(value, at())
  }

  fn variable(name: &str) -> Expr {
    Expr::variable(name, at())
  }

  fn run(expr: Expr) -> Expr {
    Pipeline::default().optimize_expr(expr)
  }

  #[test]
  fn unary_plus_chain_is_elided() {
    let expr = Expr::unary(
      UnOp::Plus,
      Expr::unary(UnOp::Plus, variable("x"), at()),
      at(),
    );
    assert_eq!(run(expr), variable("x"));
  }

  #[test]
  fn double_negation_collapses() {
    let expr = Expr::unary(UnOp::Neg, Expr::unary(UnOp::Neg, variable("x"), at()), at());
    assert_eq!(run(expr), variable("x"));
  }

  #[test]
  fn single_negation_of_variable_is_preserved() {
    let expr = Expr::unary(UnOp::Neg, variable("x"), at());
    assert_eq!(run(expr), Expr::unary(UnOp::Neg, variable("x"), at()));
  }

  #[test]
  fn triple_negation_keeps_one() {
    let expr = Expr::unary(
      UnOp::Neg,
      Expr::unary(UnOp::Neg, Expr::unary(UnOp::Neg, variable("x"), at()), at()),
      at(),
    );
    assert_eq!(run(expr), Expr::unary(UnOp::Neg, variable("x"), at()));
  }

  #[test]
  fn addition_identity_is_dropped() {
    let expr = Expr::binary(BinOp::Add, number(0.0), variable("x"), at());
    assert_eq!(run(expr), variable("x"));
    let expr = Expr::binary(BinOp::Add, variable("x"), number(0.0), at());
    assert_eq!(run(expr), variable("x"));
  }

  #[test]
  fn multiplication_identity_and_absorption() {
    let expr = Expr::binary(BinOp::Mul, number(1.0), variable("x"), at());
    assert_eq!(run(expr), variable("x"));
    let expr = Expr::binary(BinOp::Mul, variable("x"), number(0.0), at());
    assert_eq!(run(expr), number(0.0));
  }

  #[test]
  fn near_zero_and_near_one_match_with_tolerance() {
    let expr = Expr::binary(BinOp::Add, number(1e-12), variable("x"), at());
    assert_eq!(run(expr), variable("x"));
    let expr = Expr::binary(BinOp::Mul, number(1.0 + 1e-12), variable("x"), at());
    assert_eq!(run(expr), variable("x"));
  }

  #[test]
  fn constants_fold_recursively() {
    // 1 + 2 * 3 -> 7
    let expr = Expr::binary(
      BinOp::Add,
      number(1.0),
      Expr::binary(BinOp::Mul, number(2.0), number(3.0), at()),
      at(),
    );
    assert_eq!(run(expr), number(7.0));
  }

  #[test]
  fn power_folds() {
    let expr = Expr::binary(BinOp::Pow, number(2.0), number(10.0), at());
    assert_eq!(run(expr), number(1024.0));
  }

  #[test]
  fn division_by_zero_folds_to_infinity() {
    let expr = Expr::binary(BinOp::Div, number(1.0), number(0.0), at());
    match run(expr) {
      Expr::Number { value, .. } => assert!(value.is_infinite()),
      other => panic!("expected a folded literal, got {other:?}"),
    }
  }

  #[test]
  fn negated_literal_folds_after_collapse() {
    // -(-(-5)) -> -5
    let expr = Expr::unary(
      UnOp::Neg,
      Expr::unary(UnOp::Neg, Expr::unary(UnOp::Neg, number(5.0), at()), at()),
      at(),
    );
    assert_eq!(run(expr), number(-5.0));
  }

  #[test]
  fn variables_block_folding() {
    let expr = Expr::binary(BinOp::Add, number(1.0), variable("x"), at());
    assert_eq!(
      run(expr),
      Expr::binary(BinOp::Add, number(1.0), variable("x"), at())
    );
  }

  #[test]
  fn call_arguments_are_optimized_in_place() {
    let expr = Expr::call(
      "f",
      vec![Expr::binary(BinOp::Add, number(1.0), number(2.0), at())],
      at(),
    );
    assert_eq!(run(expr), Expr::call("f", vec![number(3.0)], at()));
  }

  #[test]
  fn folded_literal_takes_the_operator_origin() {
    let expr = Expr::binary(
      BinOp::Add,
      Expr::number(1.0, Origin::new(3, 7)),
      Expr::number(2.0, Origin::new(3, 11)),
      Origin::new(3, 9),
    );
    let folded = run(expr);
    assert_eq!(folded, Expr::number(3.0, Origin::new(3, 9)));
    assert_eq!(folded.origin(), Origin::new(3, 9));
  }

  #[test]
  fn pipeline_reaches_a_fixpoint_in_one_application() {
    let tokens = crate::tokenizer::tokenize(
      "func main() { var x = +1 + 2 * 3 - -(-4); if (x < 0 * x) { print(x + 0); } }",
    )
    .unwrap();
    let program = crate::parser::parse(tokens).unwrap();
    let once = optimize(program);
    let twice = optimize(once.clone());
    assert_eq!(once, twice);
  }
}
