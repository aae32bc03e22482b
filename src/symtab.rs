//! Scoped symbol resolution for variables and a flat function namespace.
//!
//! Variables live in a stack of per-scope maps: entering a block pushes an
//! empty map, leaving pops it. Lookups scan innermost-outward, so a nested
//! declaration shadows an outer one, while redeclaring a name in the same
//! innermost scope is an error. Every variable occupies eight bytes and
//! sequential declarations receive contiguous local addresses.
//!
//! Functions can only be declared at the outer scope and therefore live in a
//! single flat map. The built-ins `read`, `print` and `sqrt` are
//! pre-registered and lower to single opcodes instead of calls.

use std::collections::HashMap;

use crate::error::{CompileError, CompileResult};
use crate::origin::Origin;

/// Size of every variable slot; the language has a single numeric type.
pub const VARIABLE_SIZE: u32 = 8;

#[derive(Debug, Clone, Copy)]
pub struct VariableSymbol {
  /// Byte offset of the slot inside the owning function's frame.
  pub address: u32,
  pub origin: Origin,
}

/// How a call to the function is emitted.
#[derive(Debug, Clone)]
pub enum FunctionReference {
  /// `CALL <label>`; user functions are labeled with their source name.
  Label(String),
  /// A single opcode standing in for the whole call.
  Internal(&'static str),
}

#[derive(Debug, Clone)]
pub struct FunctionSymbol {
  pub reference: FunctionReference,
  pub returns_value: bool,
  pub arity: usize,
  /// `None` for built-ins registered by the compiler itself.
  pub origin: Option<Origin>,
}

impl FunctionSymbol {
  pub fn is_internal(&self) -> bool {
    matches!(self.reference, FunctionReference::Internal(_))
  }

  pub fn is_void(&self) -> bool {
    !self.returns_value
  }
}

pub struct SymbolTable {
  scopes: Vec<HashMap<String, VariableSymbol>>,
  next_local_address: u32,
  functions: HashMap<String, FunctionSymbol>,
}

impl SymbolTable {
  pub fn new() -> Self {
    let mut functions = HashMap::new();
    functions.insert(
      "read".to_string(),
      FunctionSymbol {
        reference: FunctionReference::Internal("IN"),
        returns_value: true,
        arity: 0,
        origin: None,
      },
    );
    functions.insert(
      "print".to_string(),
      FunctionSymbol {
        reference: FunctionReference::Internal("OUT"),
        returns_value: false,
        arity: 1,
        origin: None,
      },
    );
    functions.insert(
      "sqrt".to_string(),
      FunctionSymbol {
        reference: FunctionReference::Internal("SQRT"),
        returns_value: true,
        arity: 1,
        origin: None,
      },
    );

    Self {
      scopes: vec![HashMap::new()],
      next_local_address: 0,
      functions,
    }
  }

  /// Register a variable in the innermost scope and hand out its slot.
  pub fn add_variable(&mut self, name: &str, origin: Origin) -> CompileResult<VariableSymbol> {
    let Some(scope) = self.scopes.last_mut() else {
      return Err(CompileError::logic("no active scope to declare in"));
    };
    if let Some(existing) = scope.get(name) {
      return Err(CompileError::redefinition(name, origin, Some(existing.origin)));
    }

    let symbol = VariableSymbol {
      address: self.next_local_address,
      origin,
    };
    self.next_local_address += VARIABLE_SIZE;
    scope.insert(name.to_string(), symbol);
    Ok(symbol)
  }

  /// Innermost-outward lookup; an inner scope hides an outer one.
  pub fn variable(&self, name: &str) -> Option<VariableSymbol> {
    self
      .scopes
      .iter()
      .rev()
      .find_map(|scope| scope.get(name).copied())
  }

  pub fn next_local_address(&self) -> u32 {
    self.next_local_address
  }

  pub fn add_function(
    &mut self,
    name: &str,
    returns_value: bool,
    arity: usize,
    origin: Origin,
  ) -> CompileResult<()> {
    if let Some(existing) = self.functions.get(name) {
      return Err(CompileError::redefinition(name, origin, existing.origin));
    }

    self.functions.insert(
      name.to_string(),
      FunctionSymbol {
        reference: FunctionReference::Label(name.to_string()),
        returns_value,
        arity,
        origin: Some(origin),
      },
    );
    Ok(())
  }

  pub fn function(&self, name: &str) -> Option<&FunctionSymbol> {
    self.functions.get(name)
  }

  /// A function body is a block whose locals start at address zero.
  pub fn enter_function(&mut self) {
    self.enter_block();
    self.next_local_address = 0;
  }

  pub fn leave_function(&mut self) {
    self.leave_block();
  }

  pub fn enter_block(&mut self) {
    self.scopes.push(HashMap::new());
  }

  /// Drop the innermost scope and release its slots: the next address goes
  /// back to one past the highest still-visible variable, or zero if none.
  pub fn leave_block(&mut self) {
    self.scopes.pop();

    let max_visible = self
      .scopes
      .iter()
      .flat_map(|scope| scope.values())
      .map(|symbol| symbol.address)
      .max();
    self.next_local_address = match max_visible {
      Some(address) => address + VARIABLE_SIZE,
      None => 0,
    };
  }
}

impl Default for SymbolTable {
  fn default() -> Self {
    Self::new()
  }
}
