//! End-to-end pipeline tests: source text in, assembly listing out.

use stackc::{compile, CompileError};

fn lines(listing: &str) -> Vec<&str> {
  listing.lines().collect()
}

fn contains_window(listing: &str, window: &[&str]) -> bool {
  lines(listing)
    .windows(window.len())
    .any(|chunk| chunk == window)
}

#[test]
fn constant_folding_reaches_the_listing() {
  let asm = compile("func main() { print(1 + 2); }").unwrap();
  let lines = lines(&asm);

  assert_eq!(&lines[..4], &["PUSH 0", "POP AX", "CALL main", "HLT"]);
  assert!(lines.contains(&"main:"));
  assert!(contains_window(&asm, &["PUSH 3", "OUT"]));
  // The unfolded operands never reach the backend.
  assert!(!contains_window(&asm, &["PUSH 1", "PUSH 2", "ADD"]));
  // Prolog and epilog around the body.
  assert!(contains_window(
    &asm,
    &["main:", "PUSH AX", "PUSH 3", "OUT", "POP AX"]
  ));
}

#[test]
fn while_loop_shape() {
  let asm = compile("func main() { var x = 0; while (x < 3) { x = x + 1; } print(x); }").unwrap();

  // Condition: load x (slot 0 of a one-slot frame), push the bound, then
  // leave the loop once the comparison fails.
  assert!(contains_window(
    &asm,
    &[
      "L0:", "PUSH AX", "PUSH 8", "SUB", "POP BX", "PUSH [BX]", "PUSH 3", "JMPGE L1"
    ]
  ));
  // The body jumps back to the condition and the exit label follows.
  let lines = lines(&asm);
  let back = lines.iter().position(|line| *line == "JMP L0").unwrap();
  let exit = lines.iter().position(|line| *line == "L1:").unwrap();
  assert!(back < exit);
  // The print lowering follows the loop exit.
  let out = lines.iter().position(|line| *line == "OUT").unwrap();
  assert!(exit < out);
}

#[test]
fn recursive_fibonacci() {
  let asm = compile(
    "func fib(n) { if (n <= 2) return 1; return fib(n - 1) + fib(n - 2); } \
     func main() { print(fib(7)); }",
  )
  .unwrap();

  let lines = lines(&asm);
  assert_eq!(lines.iter().filter(|line| **line == "fib:").count(), 1);
  assert_eq!(lines.iter().filter(|line| **line == "CALL fib").count(), 3);

  // Every function ends with the implicit zero return after its epilog.
  assert!(contains_window(&asm, &["POP AX", "PUSH 0", "RET"]));

  // The early return moves its value through BX around the epilog.
  assert!(contains_window(
    &asm,
    &["PUSH 1", "POP BX", "POP AX", "PUSH BX", "RET"]
  ));
}

#[test]
fn shadowing_resolves_to_the_outer_slot_after_the_block() {
  let asm = compile(
    "func f() { var x = 1; { var x = 2; } return x; } \
     func main() { print(f()); }",
  )
  .unwrap();

  // After the inner block the frame extent is back to one slot, so the
  // return reads the outer x at offset 8 from the frame pointer.
  assert!(contains_window(
    &asm,
    &[
      "PUSH AX", "PUSH 8", "SUB", "POP BX", "PUSH [BX]", "POP BX", "POP AX", "PUSH BX", "RET"
    ]
  ));
}

#[test]
fn same_scope_redefinition_reports_both_origins() {
  let err = compile("func f() { var x = 1; var x = 2; } func main() { }").unwrap_err();
  match err {
    CompileError::Redefinition {
      name,
      origin,
      previous,
    } => {
      assert_eq!(name, "x");
      assert_eq!((previous.line, previous.column), (1, 16));
      assert_eq!((origin.line, origin.column), (1, 27));
    }
    other => panic!("expected redefinition error, got {other:?}"),
  }
}

#[test]
fn nested_shadowing_is_permitted() {
  assert!(compile("func f() { var x = 1; { var x = 2; } } func main() { }").is_ok());
}

#[test]
fn builtins_resolve_without_declaration() {
  let asm = compile("func main() { print(sqrt(read())); }").unwrap();
  assert!(contains_window(&asm, &["IN", "SQRT", "OUT"]));
}

#[test]
fn other_undeclared_calls_are_syntax_errors() {
  let err = compile("func main() { cbrt(8); }").unwrap_err();
  assert!(matches!(err, CompileError::Syntax { message, .. } if message.contains("cbrt")));
}

#[test]
fn missing_main_is_a_syntax_error() {
  let err = compile("func f() { }").unwrap_err();
  assert!(matches!(err, CompileError::SyntaxUnlocalized { .. }));
}

#[test]
fn single_negation_survives_optimization() {
  // (+a - -b): the unary plus disappears, the single negation stays.
  let asm = compile("func main() { var a = 1; var b = 2; print(+a - -b); }").unwrap();
  assert!(contains_window(&asm, &["PUSH -1", "MUL", "SUB"]));
}

#[test]
fn double_negation_is_gone_from_the_listing() {
  let asm = compile("func main() { var b = 2; print(- -b); }").unwrap();
  assert!(!asm.contains("PUSH -1\nMUL\nPUSH -1\nMUL"));
}

#[test]
fn errors_render_with_category_prefix_and_origin() {
  let err = compile("func main() { print(x); }").unwrap_err();
  let message = err.to_string();
  assert!(message.starts_with("Syntax error at 1:21:"), "{message}");
  assert!(message.contains("undeclared variable 'x'"));
}
