use std::env;
use std::fs;
use std::path::Path;
use std::process;

fn main() {
  env_logger::init();

  let args: Vec<String> = env::args().collect();
  if args.len() < 2 || args.len() > 3 {
    let program = args.first().map(String::as_str).unwrap_or("stackc");
    eprintln!("usage: {program} <source-file> [ast|run]");
    process::exit(1);
  }

  let source_path = Path::new(&args[1]);
  let mode = args.get(2).map(String::as_str).unwrap_or("compile");

  let source = match fs::read_to_string(source_path) {
    Ok(source) => source,
    Err(err) => {
      eprintln!("cannot read {}: {err}", source_path.display());
      process::exit(1);
    }
  };

  match mode {
    "ast" => match stackc::build_ast(&source) {
      Ok(program) => println!("{program:#?}"),
      Err(err) => {
        eprintln!("{err}");
        process::exit(1);
      }
    },
    "run" | "compile" => {
      let listing = match stackc::compile(&source) {
        Ok(listing) => listing,
        Err(err) => {
          eprintln!("{err}");
          process::exit(1);
        }
      };

      let assembly_path = source_path.with_extension("asm");
      if let Err(err) = fs::write(&assembly_path, listing) {
        eprintln!("cannot write {}: {err}", assembly_path.display());
        process::exit(1);
      }

      if mode == "run" {
        // Execution belongs to the stack-machine runtime; hand the listing over.
        println!(
          "wrote {}; pass it to the stack-machine runtime",
          assembly_path.display()
        );
      }
    }
    other => {
      eprintln!("unknown mode '{other}'; expected 'ast' or 'run'");
      process::exit(1);
    }
  }
}
