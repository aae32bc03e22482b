//! Recursive-descent parser producing the program AST.
//!
//! One production per grammar rule, all descending over a single shared
//! cursor. Statement dispatch uses one token of lookahead, except for the
//! assignment/expression split which needs two (`Id '='`). Comparisons are
//! parsed only inside `if`/`while` headers, so they can never appear as an
//! arithmetic operand. Single-statement conditional and loop bodies are
//! wrapped into a block here, which guarantees that variables declared in a
//! branch die with the branch.

use crate::ast::{Block, Comparison, Expr, Function, Param, Program, Stmt};
use crate::error::{CompileError, CompileResult};
use crate::origin::Origin;
use crate::tokenizer::{describe, BinOp, Keyword, ParenKind, Token, TokenKind};

/// Parse a token sequence into a program: a list of function definitions.
pub fn parse(tokens: Vec<Token>) -> CompileResult<Program> {
  let mut stream = TokenStream::new(tokens);

  let mut functions = Vec::new();
  while !stream.is_eof() {
    functions.push(parse_function(&mut stream)?);
  }

  Ok(Program { functions })
}

fn parse_function(stream: &mut TokenStream) -> CompileResult<Function> {
  stream.expect(TokenKind::Keyword(Keyword::Func), "'func'")?;
  let (name, origin) = stream.expect_ident()?;

  stream.expect(open_round(), "'('")?;
  let mut params = Vec::new();
  if !stream.check(&close_round()) {
    loop {
      let (param_name, param_origin) = stream.expect_ident()?;
      params.push(Param {
        name: param_name,
        origin: param_origin,
      });
      if !stream.eat(&TokenKind::Comma) {
        break;
      }
    }
  }
  stream.expect(close_round(), "')'")?;

  let body = parse_block(stream)?;

  Ok(Function {
    name,
    params,
    body,
    origin,
  })
}

fn parse_block(stream: &mut TokenStream) -> CompileResult<Block> {
  let origin = stream.expect(open_curly(), "'{'")?;

  let mut statements = Vec::new();
  while !stream.check(&close_curly()) {
    if stream.is_eof() {
      return Err(CompileError::syntax("expected '}', but got end of input"));
    }
    statements.push(parse_statement(stream)?);
  }
  stream.expect(close_curly(), "'}'")?;

  Ok(Block { statements, origin })
}

fn parse_statement(stream: &mut TokenStream) -> CompileResult<Stmt> {
  match stream.peek_kind() {
    Some(TokenKind::Paren {
      kind: ParenKind::Curly,
      open: true,
    }) => Ok(Stmt::Block(parse_block(stream)?)),
    Some(TokenKind::Keyword(Keyword::If)) => parse_if(stream),
    Some(TokenKind::Keyword(Keyword::While)) => parse_while(stream),
    Some(TokenKind::Keyword(Keyword::Var)) => parse_var_decl(stream),
    Some(TokenKind::Keyword(Keyword::Return)) => parse_return(stream),
    Some(TokenKind::Keyword(Keyword::Else)) => Err(CompileError::syntax_at(
      stream.current_origin(),
      "'else' without a matching 'if'",
    )),
    _ => {
      if matches!(stream.peek_kind(), Some(TokenKind::Ident(_)))
        && matches!(stream.peek2_kind(), Some(TokenKind::Assign))
      {
        parse_assignment(stream)
      } else {
        let expr = parse_expression(stream)?;
        stream.expect(TokenKind::Semicolon, "';'")?;
        Ok(Stmt::Expr(expr))
      }
    }
  }
}

/// Parse a conditional/loop body and wrap it in a block if it is not one.
fn parse_body(stream: &mut TokenStream) -> CompileResult<Block> {
  let statement = parse_statement(stream)?;
  Ok(match statement {
    Stmt::Block(block) => block,
    single => Block {
      origin: single.origin(),
      statements: vec![single],
    },
  })
}

fn parse_if(stream: &mut TokenStream) -> CompileResult<Stmt> {
  stream.expect(TokenKind::Keyword(Keyword::If), "'if'")?;
  stream.expect(open_round(), "'('")?;
  let cond = parse_comparison(stream)?;
  stream.expect(close_round(), "')'")?;
  let body = parse_body(stream)?;

  if stream.eat(&TokenKind::Keyword(Keyword::Else)) {
    let else_body = parse_body(stream)?;
    Ok(Stmt::IfElse {
      cond,
      then_body: body,
      else_body,
    })
  } else {
    Ok(Stmt::If { cond, body })
  }
}

fn parse_while(stream: &mut TokenStream) -> CompileResult<Stmt> {
  stream.expect(TokenKind::Keyword(Keyword::While), "'while'")?;
  stream.expect(open_round(), "'('")?;
  let cond = parse_comparison(stream)?;
  stream.expect(close_round(), "')'")?;
  let body = parse_body(stream)?;

  Ok(Stmt::While { cond, body })
}

fn parse_comparison(stream: &mut TokenStream) -> CompileResult<Comparison> {
  let lhs = parse_expression(stream)?;
  let (op, origin) = match stream.peek() {
    Some(Token {
      kind: TokenKind::CompOp(op),
      origin,
    }) => (*op, *origin),
    other => return Err(unexpected(other, "comparison operator")),
  };
  stream.bump();
  let rhs = parse_expression(stream)?;

  Ok(Comparison {
    op,
    lhs,
    rhs,
    origin,
  })
}

fn parse_var_decl(stream: &mut TokenStream) -> CompileResult<Stmt> {
  stream.expect(TokenKind::Keyword(Keyword::Var), "'var'")?;
  let (name, origin) = stream.expect_ident()?;
  let init = if stream.eat(&TokenKind::Assign) {
    Some(parse_expression(stream)?)
  } else {
    None
  };
  stream.expect(TokenKind::Semicolon, "';'")?;

  Ok(Stmt::VarDecl { name, init, origin })
}

fn parse_return(stream: &mut TokenStream) -> CompileResult<Stmt> {
  let origin = stream.expect(TokenKind::Keyword(Keyword::Return), "'return'")?;
  let value = parse_expression(stream)?;
  stream.expect(TokenKind::Semicolon, "';'")?;

  Ok(Stmt::Return { value, origin })
}

fn parse_assignment(stream: &mut TokenStream) -> CompileResult<Stmt> {
  let (target, target_origin) = stream.expect_ident()?;
  stream.expect(TokenKind::Assign, "'='")?;
  let value = parse_expression(stream)?;
  stream.expect(TokenKind::Semicolon, "';'")?;

  Ok(Stmt::Assignment {
    target,
    target_origin,
    value,
  })
}

// ----- Expression parsing -----

fn parse_expression(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_term(stream)?;

  loop {
    let (op, origin) = match stream.peek() {
      Some(Token {
        kind: TokenKind::BinOp(op),
        origin,
      }) if matches!(op, BinOp::Add | BinOp::Sub) => (*op, *origin),
      _ => break,
    };
    stream.bump();
    let rhs = parse_term(stream)?;
    node = Expr::binary(op, node, rhs, origin);
  }

  Ok(node)
}

fn parse_term(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_power(stream)?;

  loop {
    let (op, origin) = match stream.peek() {
      Some(Token {
        kind: TokenKind::BinOp(op),
        origin,
      }) if matches!(op, BinOp::Mul | BinOp::Div) => (*op, *origin),
      _ => break,
    };
    stream.bump();
    let rhs = parse_power(stream)?;
    node = Expr::binary(op, node, rhs, origin);
  }

  Ok(node)
}

/// `^` is right-associative, hence the recursion on the right operand.
fn parse_power(stream: &mut TokenStream) -> CompileResult<Expr> {
  let base = parse_factor(stream)?;

  let origin = match stream.peek() {
    Some(Token {
      kind: TokenKind::BinOp(BinOp::Pow),
      origin,
    }) => *origin,
    _ => return Ok(base),
  };
  stream.bump();
  let exponent = parse_power(stream)?;

  Ok(Expr::binary(BinOp::Pow, base, exponent, origin))
}

fn parse_factor(stream: &mut TokenStream) -> CompileResult<Expr> {
  match stream.peek() {
    Some(Token {
      kind: TokenKind::UnOp(op),
      origin,
    }) => {
      let (op, origin) = (*op, *origin);
      stream.bump();
      let operand = parse_factor(stream)?;
      Ok(Expr::unary(op, operand, origin))
    }
    Some(Token {
      kind:
        TokenKind::Paren {
          kind: ParenKind::Round,
          open: true,
        },
      ..
    }) => {
      stream.bump();
      let node = parse_expression(stream)?;
      stream.expect(close_round(), "')'")?;
      Ok(node)
    }
    Some(Token {
      kind: TokenKind::Number(value),
      origin,
    }) => {
      let (value, origin) = (*value, *origin);
      stream.bump();
      Ok(Expr::number(value, origin))
    }
    Some(Token {
      kind: TokenKind::Ident(_),
      ..
    }) => parse_variable_or_call(stream),
    other => Err(unexpected(other, "expression")),
  }
}

fn parse_variable_or_call(stream: &mut TokenStream) -> CompileResult<Expr> {
  let (name, origin) = stream.expect_ident()?;

  if !stream.eat(&open_round()) {
    return Ok(Expr::variable(name, origin));
  }

  let mut args = Vec::new();
  if !stream.check(&close_round()) {
    loop {
      args.push(parse_expression(stream)?);
      if !stream.eat(&TokenKind::Comma) {
        break;
      }
    }
  }
  stream.expect(close_round(), "')'")?;

  Ok(Expr::call(name, args, origin))
}

fn unexpected(token: Option<&Token>, description: &str) -> CompileError {
  match token {
    Some(token) => CompileError::syntax_at(
      token.origin,
      format!("expected {description}, but got {}", describe(&token.kind)),
    ),
    None => CompileError::syntax(format!("expected {description}, but got end of input")),
  }
}

fn open_round() -> TokenKind {
  TokenKind::Paren {
    kind: ParenKind::Round,
    open: true,
  }
}

fn close_round() -> TokenKind {
  TokenKind::Paren {
    kind: ParenKind::Round,
    open: false,
  }
}

fn open_curly() -> TokenKind {
  TokenKind::Paren {
    kind: ParenKind::Curly,
    open: true,
  }
}

fn close_curly() -> TokenKind {
  TokenKind::Paren {
    kind: ParenKind::Curly,
    open: false,
  }
}

/// Lightweight cursor over the token vector.
struct TokenStream {
  tokens: Vec<Token>,
  pos: usize,
}

impl TokenStream {
  fn new(tokens: Vec<Token>) -> Self {
    Self { tokens, pos: 0 }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn peek_kind(&self) -> Option<&TokenKind> {
    self.peek().map(|token| &token.kind)
  }

  fn peek2_kind(&self) -> Option<&TokenKind> {
    self.tokens.get(self.pos + 1).map(|token| &token.kind)
  }

  fn current_origin(&self) -> Origin {
    self
      .peek()
      .map(|token| token.origin)
      .unwrap_or(Origin::new(0, 0))
  }

  fn bump(&mut self) {
    self.pos += 1;
  }

  fn check(&self, kind: &TokenKind) -> bool {
    self.peek_kind() == Some(kind)
  }

  /// Consume the current token if it matches the expected kind.
  fn eat(&mut self, kind: &TokenKind) -> bool {
    if self.check(kind) {
      self.bump();
      true
    } else {
      false
    }
  }

  fn expect(&mut self, kind: TokenKind, description: &str) -> CompileResult<Origin> {
    match self.peek() {
      Some(token) if token.kind == kind => {
        let origin = token.origin;
        self.bump();
        Ok(origin)
      }
      other => Err(unexpected(other, description)),
    }
  }

  fn expect_ident(&mut self) -> CompileResult<(String, Origin)> {
    match self.peek() {
      Some(Token {
        kind: TokenKind::Ident(name),
        origin,
      }) => {
        let result = (name.clone(), *origin);
        self.bump();
        Ok(result)
      }
      other => Err(unexpected(other, "identifier")),
    }
  }

  fn is_eof(&self) -> bool {
    self.pos >= self.tokens.len()
  }
}
