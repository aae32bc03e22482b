//! Lexical analysis: turns the raw source text into a vector of tokens.
//!
//! The tokenizer is a single forward pass. Its only state is the current
//! source position, the accumulated token vector and the previously emitted
//! token, which decides whether `+`/`-` are binary or unary: they are binary
//! exactly when the previous token is a number literal, an identifier or a
//! closing round parenthesis. A closing curly brace does not count.

use crate::error::{CompileError, CompileResult};
use crate::origin::Origin;

/// Identifier names are truncated to this many characters.
pub const MAX_IDENT_LENGTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParenKind {
  Round,
  Curly,
}

/// Binary arithmetic operators. `Pow` is right-associative and binds tighter
/// than the multiplicative operators but looser than unary signs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
  Add,
  Sub,
  Mul,
  Div,
  Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
  Plus,
  Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
  Lt,
  Le,
  Gt,
  Ge,
  Eq,
  Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
  If,
  Else,
  While,
  Func,
  Var,
  Return,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
  Number(f64),
  Paren { kind: ParenKind, open: bool },
  BinOp(BinOp),
  UnOp(UnOp),
  CompOp(CompOp),
  Assign,
  Comma,
  Semicolon,
  Keyword(Keyword),
  Ident(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
  pub kind: TokenKind,
  pub origin: Origin,
}

/// Human-friendly description of a token kind, used in diagnostics.
pub fn describe(kind: &TokenKind) -> String {
  match kind {
    TokenKind::Number(value) => format!("number '{value}'"),
    TokenKind::Paren { kind, open } => {
      let symbol = match (kind, open) {
        (ParenKind::Round, true) => "(",
        (ParenKind::Round, false) => ")",
        (ParenKind::Curly, true) => "{",
        (ParenKind::Curly, false) => "}",
      };
      format!("'{symbol}'")
    }
    TokenKind::BinOp(op) => {
      let symbol = match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Pow => "^",
      };
      format!("'{symbol}'")
    }
    TokenKind::UnOp(op) => match op {
      UnOp::Plus => "unary '+'".to_string(),
      UnOp::Neg => "unary '-'".to_string(),
    },
    TokenKind::CompOp(op) => {
      let symbol = match op {
        CompOp::Lt => "<",
        CompOp::Le => "<=",
        CompOp::Gt => ">",
        CompOp::Ge => ">=",
        CompOp::Eq => "==",
        CompOp::Ne => "!=",
      };
      format!("'{symbol}'")
    }
    TokenKind::Assign => "'='".to_string(),
    TokenKind::Comma => "','".to_string(),
    TokenKind::Semicolon => "';'".to_string(),
    TokenKind::Keyword(keyword) => {
      let word = match keyword {
        Keyword::If => "if",
        Keyword::Else => "else",
        Keyword::While => "while",
        Keyword::Func => "func",
        Keyword::Var => "var",
        Keyword::Return => "return",
      };
      format!("'{word}'")
    }
    TokenKind::Ident(name) => format!("identifier '{name}'"),
  }
}

/// Lex the input into a flat vector of tokens.
pub fn tokenize(source: &str) -> CompileResult<Vec<Token>> {
  Tokenizer::new(source).run()
}

struct Tokenizer<'a> {
  source: &'a str,
  bytes: &'a [u8],
  pos: usize,
  line: u32,
  column: u32,
  tokens: Vec<Token>,
}

impl<'a> Tokenizer<'a> {
  fn new(source: &'a str) -> Self {
    Self {
      source,
      bytes: source.as_bytes(),
      pos: 0,
      line: 1,
      column: 1,
      tokens: Vec::new(),
    }
  }

  fn run(mut self) -> CompileResult<Vec<Token>> {
    while let Some(c) = self.peek() {
      if c == b'\n' {
        self.pos += 1;
        self.line += 1;
        self.column = 1;
        continue;
      }
      if c.is_ascii_whitespace() {
        self.bump();
        continue;
      }

      let origin = Origin::new(self.line, self.column);
      let kind = self.scan_token(c, origin)?;
      self.tokens.push(Token { kind, origin });
    }
    Ok(self.tokens)
  }

  fn scan_token(&mut self, c: u8, origin: Origin) -> CompileResult<TokenKind> {
    match c {
      b';' => {
        self.bump();
        Ok(TokenKind::Semicolon)
      }
      b',' => {
        self.bump();
        Ok(TokenKind::Comma)
      }
      b'(' => {
        self.bump();
        Ok(paren(ParenKind::Round, true))
      }
      b')' => {
        self.bump();
        Ok(paren(ParenKind::Round, false))
      }
      b'{' => {
        self.bump();
        Ok(paren(ParenKind::Curly, true))
      }
      b'}' => {
        self.bump();
        Ok(paren(ParenKind::Curly, false))
      }
      b'*' => {
        self.bump();
        Ok(TokenKind::BinOp(BinOp::Mul))
      }
      b'/' => {
        self.bump();
        Ok(TokenKind::BinOp(BinOp::Div))
      }
      b'^' => {
        self.bump();
        Ok(TokenKind::BinOp(BinOp::Pow))
      }
      b'+' | b'-' => {
        self.bump();
        Ok(self.plus_or_minus(c))
      }
      b'<' => {
        self.bump();
        if self.eat(b'=') {
          Ok(TokenKind::CompOp(CompOp::Le))
        } else {
          Ok(TokenKind::CompOp(CompOp::Lt))
        }
      }
      b'>' => {
        self.bump();
        if self.eat(b'=') {
          Ok(TokenKind::CompOp(CompOp::Ge))
        } else {
          Ok(TokenKind::CompOp(CompOp::Gt))
        }
      }
      b'=' => {
        self.bump();
        if self.eat(b'=') {
          Ok(TokenKind::CompOp(CompOp::Eq))
        } else {
          Ok(TokenKind::Assign)
        }
      }
      b'!' => {
        self.bump();
        if self.eat(b'=') {
          Ok(TokenKind::CompOp(CompOp::Ne))
        } else {
          Err(CompileError::syntax_at(origin, "expected '=' after '!'"))
        }
      }
      b'0'..=b'9' => self.number(origin),
      c if c.is_ascii_alphabetic() => Ok(self.word()),
      _ => {
        let symbol = self.source[self.pos..].chars().next().unwrap_or('\0');
        Err(CompileError::syntax_at(
          origin,
          format!("invalid symbol '{symbol}'"),
        ))
      }
    }
  }

  /// The sign is binary exactly when the previous token can end an operand.
  fn plus_or_minus(&self, c: u8) -> TokenKind {
    let binary = matches!(
      self.tokens.last().map(|token| &token.kind),
      Some(TokenKind::Number(_))
        | Some(TokenKind::Ident(_))
        | Some(TokenKind::Paren {
          kind: ParenKind::Round,
          open: false,
        })
    );
    match (c, binary) {
      (b'+', true) => TokenKind::BinOp(BinOp::Add),
      (b'-', true) => TokenKind::BinOp(BinOp::Sub),
      (b'+', false) => TokenKind::UnOp(UnOp::Plus),
      (_, false) => TokenKind::UnOp(UnOp::Neg),
      _ => unreachable!("plus_or_minus is only called for '+' and '-'"),
    }
  }

  /// Longest prefix parseable as a decimal, with an optional fractional
  /// part and an optional signed exponent.
  fn number(&mut self, origin: Origin) -> CompileResult<TokenKind> {
    let start = self.pos;
    self.eat_digits();

    if self.peek() == Some(b'.') {
      self.bump();
      self.eat_digits();
    }

    if matches!(self.peek(), Some(b'e') | Some(b'E')) {
      // The exponent belongs to the number only if digits follow.
      let mut ahead = self.pos + 1;
      if matches!(self.bytes.get(ahead), Some(b'+') | Some(b'-')) {
        ahead += 1;
      }
      if self.bytes.get(ahead).is_some_and(u8::is_ascii_digit) {
        while self.pos < ahead {
          self.bump();
        }
        self.eat_digits();
      }
    }

    let text = &self.source[start..self.pos];
    let value = text
      .parse::<f64>()
      .map_err(|_| CompileError::syntax_at(origin, format!("invalid number literal '{text}'")))?;
    Ok(TokenKind::Number(value))
  }

  /// A letter followed by letters/digits: either a keyword or an identifier.
  fn word(&mut self) -> TokenKind {
    let start = self.pos;
    while self.peek().is_some_and(|c| c.is_ascii_alphanumeric()) {
      self.bump();
    }
    let text = &self.source[start..self.pos];
    match text {
      "if" => TokenKind::Keyword(Keyword::If),
      "else" => TokenKind::Keyword(Keyword::Else),
      "while" => TokenKind::Keyword(Keyword::While),
      "func" => TokenKind::Keyword(Keyword::Func),
      "var" => TokenKind::Keyword(Keyword::Var),
      "return" => TokenKind::Keyword(Keyword::Return),
      name => {
        let truncated = if name.len() > MAX_IDENT_LENGTH {
          &name[..MAX_IDENT_LENGTH]
        } else {
          name
        };
        TokenKind::Ident(truncated.to_string())
      }
    }
  }

  fn peek(&self) -> Option<u8> {
    self.bytes.get(self.pos).copied()
  }

  fn bump(&mut self) {
    self.pos += 1;
    self.column += 1;
  }

  fn eat(&mut self, expected: u8) -> bool {
    if self.peek() == Some(expected) {
      self.bump();
      true
    } else {
      false
    }
  }

  fn eat_digits(&mut self) {
    while self.peek().is_some_and(|c| c.is_ascii_digit()) {
      self.bump();
    }
  }
}

fn paren(kind: ParenKind, open: bool) -> TokenKind {
  TokenKind::Paren { kind, open }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source)
      .unwrap()
      .into_iter()
      .map(|token| token.kind)
      .collect()
  }

  #[test]
  fn simple_expression() {
    assert_eq!(
      kinds("1*(2+3)"),
      vec![
        TokenKind::Number(1.0),
        TokenKind::BinOp(BinOp::Mul),
        paren(ParenKind::Round, true),
        TokenKind::Number(2.0),
        TokenKind::BinOp(BinOp::Add),
        TokenKind::Number(3.0),
        paren(ParenKind::Round, false),
      ]
    );
  }

  #[test]
  fn sign_after_number_identifier_and_round_paren_is_binary() {
    assert_eq!(kinds("1 + 2")[1], TokenKind::BinOp(BinOp::Add));
    assert_eq!(kinds("x - 2")[1], TokenKind::BinOp(BinOp::Sub));
    assert_eq!(kinds("(x) - 2")[3], TokenKind::BinOp(BinOp::Sub));
  }

  #[test]
  fn sign_elsewhere_is_unary() {
    assert_eq!(kinds("-5")[0], TokenKind::UnOp(UnOp::Neg));
    assert_eq!(kinds("+5")[0], TokenKind::UnOp(UnOp::Plus));
    assert_eq!(kinds("; -5")[1], TokenKind::UnOp(UnOp::Neg));
    assert_eq!(kinds(", -5")[1], TokenKind::UnOp(UnOp::Neg));
    assert_eq!(kinds("* -5")[1], TokenKind::UnOp(UnOp::Neg));
    // A closing curly brace does not end an operand.
    assert_eq!(kinds("} -5")[1], TokenKind::UnOp(UnOp::Neg));
  }

  #[test]
  fn mixed_signs_in_parenthesised_expression() {
    assert_eq!(
      kinds("(+a - -b)"),
      vec![
        paren(ParenKind::Round, true),
        TokenKind::UnOp(UnOp::Plus),
        TokenKind::Ident("a".to_string()),
        TokenKind::BinOp(BinOp::Sub),
        TokenKind::UnOp(UnOp::Neg),
        TokenKind::Ident("b".to_string()),
        paren(ParenKind::Round, false),
      ]
    );
  }

  #[test]
  fn stacked_signs_stay_unary() {
    assert_eq!(
      kinds("-+-5"),
      vec![
        TokenKind::UnOp(UnOp::Neg),
        TokenKind::UnOp(UnOp::Plus),
        TokenKind::UnOp(UnOp::Neg),
        TokenKind::Number(5.0),
      ]
    );
  }

  #[test]
  fn number_forms() {
    assert_eq!(kinds("5.25"), vec![TokenKind::Number(5.25)]);
    assert_eq!(kinds("1e3"), vec![TokenKind::Number(1000.0)]);
    assert_eq!(kinds("2.5E-2"), vec![TokenKind::Number(0.025)]);
    // A bare exponent suffix is not part of the number.
    assert_eq!(
      kinds("1e"),
      vec![TokenKind::Number(1.0), TokenKind::Ident("e".to_string())]
    );
  }

  #[test]
  fn keywords_and_identifiers() {
    assert_eq!(
      kinds("if else while func var return counter2"),
      vec![
        TokenKind::Keyword(Keyword::If),
        TokenKind::Keyword(Keyword::Else),
        TokenKind::Keyword(Keyword::While),
        TokenKind::Keyword(Keyword::Func),
        TokenKind::Keyword(Keyword::Var),
        TokenKind::Keyword(Keyword::Return),
        TokenKind::Ident("counter2".to_string()),
      ]
    );
  }

  #[test]
  fn comparison_and_assignment_operators() {
    assert_eq!(
      kinds("< <= > >= == != ="),
      vec![
        TokenKind::CompOp(CompOp::Lt),
        TokenKind::CompOp(CompOp::Le),
        TokenKind::CompOp(CompOp::Gt),
        TokenKind::CompOp(CompOp::Ge),
        TokenKind::CompOp(CompOp::Eq),
        TokenKind::CompOp(CompOp::Ne),
        TokenKind::Assign,
      ]
    );
  }

  #[test]
  fn long_identifier_is_truncated() {
    let name = "a".repeat(MAX_IDENT_LENGTH + 40);
    let tokens = tokenize(&name).unwrap();
    assert_eq!(tokens.len(), 1);
    match &tokens[0].kind {
      TokenKind::Ident(ident) => assert_eq!(ident.len(), MAX_IDENT_LENGTH),
      other => panic!("expected identifier, got {other:?}"),
    }
  }

  #[test]
  fn origins_track_lines_and_columns() {
    let tokens = tokenize("var x;\n  x = 1;").unwrap();
    assert_eq!(tokens[0].origin, Origin::new(1, 1)); // var
    assert_eq!(tokens[1].origin, Origin::new(1, 5)); // x
    assert_eq!(tokens[2].origin, Origin::new(1, 6)); // ;
    assert_eq!(tokens[3].origin, Origin::new(2, 3)); // x
    assert_eq!(tokens[4].origin, Origin::new(2, 5)); // =
  }

  #[test]
  fn invalid_symbol_is_rejected_with_origin() {
    let err = tokenize("var x = $;").unwrap_err();
    assert_eq!(
      err,
      CompileError::syntax_at(Origin::new(1, 9), "invalid symbol '$'")
    );
  }

  #[test]
  fn lone_exclamation_mark_is_rejected() {
    assert!(tokenize("1 ! 2").is_err());
  }

  #[test]
  fn retokenizing_rendered_lexemes_preserves_kinds() {
    let source = "func main() { var x = -1.5e2; while (x < 3) { x = x + 1; } print(+x); }";
    let first = kinds(source);
    let rendered = first.iter().map(render).collect::<Vec<_>>().join(" ");
    assert_eq!(kinds(&rendered), first);
  }

  fn render(kind: &TokenKind) -> String {
    match kind {
      TokenKind::Number(value) => value.to_string(),
      TokenKind::Ident(name) => name.clone(),
      TokenKind::UnOp(UnOp::Plus) => "+".to_string(),
      TokenKind::UnOp(UnOp::Neg) => "-".to_string(),
      other => describe(other).trim_matches('\'').to_string(),
    }
  }
}
