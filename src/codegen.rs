//! Code generation: lower the optimized AST into stack-machine assembly.
//!
//! Every expression leaves exactly one value on the stack and statements pop
//! intermediate results to keep the stack balanced. `AX` is the frame
//! pointer: it points one byte past the last local of the current function,
//! so a variable at local address `a` lives in RAM at
//! `AX - (next_local_address - a)`. `BX` holds computed addresses and return
//! values, `CX` briefly parks the saved frame pointer while parameters are
//! popped into their slots.

use log::debug;

use crate::ast::{Block, Comparison, Expr, Function, Param, Program, Stmt};
use crate::error::{CompileError, CompileResult};
use crate::origin::Origin;
use crate::symtab::{FunctionReference, SymbolTable, VariableSymbol, VARIABLE_SIZE};
use crate::tokenizer::{BinOp, CompOp, UnOp};

/// Emit the assembly listing for a whole program.
pub fn generate(program: &Program) -> CompileResult<String> {
  let mut generator = CodeGenerator::new();
  generator.run(program)?;
  debug!(
    "generated {} lines of assembly",
    generator.listing.lines().count()
  );
  Ok(generator.listing)
}

struct CodeGenerator {
  listing: String,
  symbols: SymbolTable,
  next_label: u32,
}

impl CodeGenerator {
  fn new() -> Self {
    Self {
      listing: String::new(),
      symbols: SymbolTable::new(),
      next_label: 0,
    }
  }

  fn run(&mut self, program: &Program) -> CompileResult<()> {
    self.push_number(0.0);
    self.pop_reg("AX");
    self.line("CALL main");
    self.line("HLT");

    for function in &program.functions {
      self.emit_function(function)?;
    }

    match self.symbols.function("main") {
      Some(symbol) if symbol.arity == 0 => Ok(()),
      _ => Err(CompileError::syntax(
        "expected no-arg 'main' function declaration",
      )),
    }
  }

  fn emit_function(&mut self, function: &Function) -> CompileResult<()> {
    self
      .symbols
      .add_function(&function.name, true, function.params.len(), function.origin)?;

    self.label(&function.name);
    self.prolog();

    self.symbols.enter_function();
    self.emit_parameters(&function.params)?;
    // The body block shares the function scope; no second scope is opened.
    self.emit_statements(&function.body.statements)?;
    self.symbols.leave_function();

    self.epilog();

    // Implicit 'return 0' so every control path terminates the function.
    self.push_number(0.0);
    self.line("RET");
    Ok(())
  }

  /// Bind the formals left-to-right. The caller pushed the arguments in
  /// reverse, so the first pop after rescuing the saved frame pointer is
  /// the first parameter.
  fn emit_parameters(&mut self, params: &[Param]) -> CompileResult<()> {
    if params.is_empty() {
      return Ok(());
    }

    self.pop_reg("CX");
    for param in params {
      // The slot is filled before the name is registered; at that moment
      // the slot address equals the frame pointer, so the store is direct.
      self.store_var(self.symbols.next_local_address());
      self.declare_variable(&param.name, param.origin)?;
    }
    self.push_reg("CX");
    Ok(())
  }

  fn emit_statements(&mut self, statements: &[Stmt]) -> CompileResult<()> {
    for statement in statements {
      self.emit_statement(statement)?;
    }
    Ok(())
  }

  fn emit_statement(&mut self, statement: &Stmt) -> CompileResult<()> {
    match statement {
      Stmt::Expr(expr) => {
        let yields = self.yields_value(expr)?;
        self.emit_expr(expr)?;
        if yields {
          // The value is left on the stack and nobody consumes it.
          self.pop();
        }
        Ok(())
      }
      Stmt::Assignment {
        target,
        target_origin,
        value,
      } => self.emit_assignment(target, *target_origin, value),
      Stmt::VarDecl { name, init, origin } => {
        let symbol = self.declare_variable(name, *origin)?;
        if let Some(init) = init {
          self.emit_expr(init)?;
          self.store_var(symbol.address);
        }
        Ok(())
      }
      Stmt::Block(block) => self.emit_block(block),
      Stmt::If { cond, body } => {
        let else_label = self.fresh_label();
        self.emit_comparison(cond)?;
        self.cond_jump_negated(cond.op, &else_label);
        self.emit_block(body)?;
        self.label(&else_label);
        Ok(())
      }
      Stmt::IfElse {
        cond,
        then_body,
        else_body,
      } => {
        let else_label = self.fresh_label();
        let end_label = self.fresh_label();
        self.emit_comparison(cond)?;
        self.cond_jump_negated(cond.op, &else_label);
        self.emit_block(then_body)?;
        self.jump(&end_label);
        self.label(&else_label);
        self.emit_block(else_body)?;
        self.label(&end_label);
        Ok(())
      }
      Stmt::While { cond, body } => {
        let start_label = self.fresh_label();
        let end_label = self.fresh_label();
        self.label(&start_label);
        self.emit_comparison(cond)?;
        self.cond_jump_negated(cond.op, &end_label);
        self.emit_block(body)?;
        self.jump(&start_label);
        self.label(&end_label);
        Ok(())
      }
      Stmt::Return { value, .. } => {
        let yields = self.yields_value(value)?;
        self.emit_expr(value)?;
        if yields {
          self.pop_reg("BX");
        }
        self.epilog();
        if yields {
          self.push_reg("BX");
        }
        self.line("RET");
        Ok(())
      }
    }
  }

  fn emit_block(&mut self, block: &Block) -> CompileResult<()> {
    self.symbols.enter_block();
    self.emit_statements(&block.statements)?;
    self.symbols.leave_block();
    Ok(())
  }

  fn emit_assignment(
    &mut self,
    target: &str,
    target_origin: Origin,
    value: &Expr,
  ) -> CompileResult<()> {
    // Assigning to an unseen name declares it in the innermost scope.
    let symbol = match self.symbols.variable(target) {
      Some(symbol) => symbol,
      None => self.declare_variable(target, target_origin)?,
    };
    self.emit_expr(value)?;
    self.store_var(symbol.address);
    Ok(())
  }

  fn emit_comparison(&mut self, comparison: &Comparison) -> CompileResult<()> {
    self.emit_expr(&comparison.lhs)?;
    self.emit_expr(&comparison.rhs)
  }

  fn emit_expr(&mut self, expr: &Expr) -> CompileResult<()> {
    match expr {
      Expr::Number { value, .. } => {
        self.push_number(*value);
        Ok(())
      }
      Expr::Variable { name, origin } => {
        let Some(symbol) = self.symbols.variable(name) else {
          return Err(CompileError::syntax_at(
            *origin,
            format!("undeclared variable '{name}'"),
          ));
        };
        self.load_var(symbol.address);
        Ok(())
      }
      Expr::BinOp { op, lhs, rhs, .. } => {
        self.emit_expr(lhs)?;
        self.emit_expr(rhs)?;
        self.binary_op(*op);
        Ok(())
      }
      Expr::UnOp { op, operand, .. } => {
        self.emit_expr(operand)?;
        self.unary_op(*op);
        Ok(())
      }
      Expr::Call { name, args, origin } => self.emit_call(name, args, *origin),
    }
  }

  fn emit_call(&mut self, name: &str, args: &[Expr], origin: Origin) -> CompileResult<()> {
    let Some(symbol) = self.symbols.function(name) else {
      return Err(CompileError::syntax_at(
        origin,
        format!("undeclared function '{name}'"),
      ));
    };
    if symbol.arity != args.len() {
      return Err(CompileError::syntax_at(
        origin,
        format!(
          "invalid arguments number for '{name}': expected {}, got {}",
          symbol.arity,
          args.len()
        ),
      ));
    }
    let reference = symbol.reference.clone();

    // Arguments go onto the stack in reverse so the callee pops the first
    // parameter first.
    for arg in args.iter().rev() {
      self.emit_expr(arg)?;
    }

    match reference {
      FunctionReference::Internal(mnemonic) => self.line(mnemonic),
      FunctionReference::Label(label) => self.line(&format!("CALL {label}")),
    }
    Ok(())
  }

  /// Whether the expression leaves a value on the stack.
  fn yields_value(&self, expr: &Expr) -> CompileResult<bool> {
    match expr {
      Expr::Number { .. } | Expr::Variable { .. } | Expr::BinOp { .. } | Expr::UnOp { .. } => {
        Ok(true)
      }
      Expr::Call { name, origin, .. } => match self.symbols.function(name) {
        Some(symbol) => Ok(symbol.returns_value),
        None => Err(CompileError::syntax_at(
          *origin,
          format!("undeclared function '{name}'"),
        )),
      },
    }
  }

  /// Advance the frame pointer by one slot and register the name.
  fn declare_variable(&mut self, name: &str, origin: Origin) -> CompileResult<VariableSymbol> {
    self.push_reg("AX");
    self.push_number(f64::from(VARIABLE_SIZE));
    self.line("ADD");
    self.pop_reg("AX");

    self.symbols.add_variable(name, origin)
  }

  /// Push the value of the slot at `address` onto the stack.
  fn load_var(&mut self, address: u32) {
    let offset = self.symbols.next_local_address() - address;
    if offset == 0 {
      self.line("PUSH [AX]");
    } else {
      self.push_reg("AX");
      self.push_number(f64::from(offset));
      self.line("SUB");
      self.pop_reg("BX");
      self.line("PUSH [BX]");
    }
  }

  /// Pop the stack top into the slot at `address`.
  fn store_var(&mut self, address: u32) {
    let offset = self.symbols.next_local_address() - address;
    if offset == 0 {
      self.line("POP [AX]");
    } else {
      self.push_reg("AX");
      self.push_number(f64::from(offset));
      self.line("SUB");
      self.pop_reg("BX");
      self.line("POP [BX]");
    }
  }

  fn binary_op(&mut self, op: BinOp) {
    match op {
      BinOp::Add => self.line("ADD"),
      BinOp::Sub => self.line("SUB"),
      BinOp::Mul => self.line("MUL"),
      BinOp::Div => self.line("DIV"),
      BinOp::Pow => self.line("POW"),
    }
  }

  fn unary_op(&mut self, op: UnOp) {
    match op {
      UnOp::Neg => {
        self.push_number(-1.0);
        self.line("MUL");
      }
      // Unary plus is a no-op; the optimizer usually removed it already.
      UnOp::Plus => {}
    }
  }

  /// Jump taken when the comparison fails, so the mnemonic is the
  /// complement of the source operator.
  fn cond_jump_negated(&mut self, op: CompOp, label: &str) {
    let mnemonic = match negate(op) {
      CompOp::Lt => "JMPL",
      CompOp::Le => "JMPLE",
      CompOp::Gt => "JMPG",
      CompOp::Ge => "JMPGE",
      CompOp::Eq => "JMPE",
      CompOp::Ne => "JMPNE",
    };
    self.line(&format!("{mnemonic} {label}"));
  }

  fn jump(&mut self, label: &str) {
    self.line(&format!("JMP {label}"));
  }

  fn prolog(&mut self) {
    self.push_reg("AX");
  }

  fn epilog(&mut self) {
    self.pop_reg("AX");
  }

  fn fresh_label(&mut self) -> String {
    let label = format!("L{}", self.next_label);
    self.next_label += 1;
    label
  }

  fn label(&mut self, name: &str) {
    self.listing.push_str(name);
    self.listing.push_str(":\n");
  }

  fn push_number(&mut self, value: f64) {
    self.line(&format!("PUSH {value}"));
  }

  fn push_reg(&mut self, register: &str) {
    self.line(&format!("PUSH {register}"));
  }

  fn pop(&mut self) {
    self.line("POP");
  }

  fn pop_reg(&mut self, register: &str) {
    self.line(&format!("POP {register}"));
  }

  fn line(&mut self, text: &str) {
    self.listing.push_str(text);
    self.listing.push('\n');
  }
}

fn negate(op: CompOp) -> CompOp {
  match op {
    CompOp::Lt => CompOp::Ge,
    CompOp::Le => CompOp::Gt,
    CompOp::Gt => CompOp::Le,
    CompOp::Ge => CompOp::Lt,
    CompOp::Eq => CompOp::Ne,
    CompOp::Ne => CompOp::Eq,
  }
}
