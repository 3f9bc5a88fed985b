use std::fs;
use std::path::Path;

use crate::codegen::{CodeGenerator, Target};
use crate::error::CompileError;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::semantic::semantic::analyze;

const DEFAULT_SOURCE: &str = "demos/test_basic.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lexer,
    Parser,
    Semantics,
    Assembly,
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lexer" => Ok(Stage::Lexer),
            "parser" => Ok(Stage::Parser),
            "semantics" => Ok(Stage::Semantics),
            "assembly" => Ok(Stage::Assembly),
            other => Err(format!("unknown stage '{other}' (expected lexer, parser, semantics, or assembly)")),
        }
    }
}

#[derive(Debug)]
pub struct Options {
    pub source_path: String,
    pub stage: Stage,
    pub target: Target,
}

/// Hand-rolled in the teacher's style: a positional file argument plus two
/// `--flag value` options, no external arg-parsing crate.
pub fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut source_path = None;
    let mut stage = Stage::Assembly;
    let mut target = Target::Py65mon;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--stage" => {
                let value = args.get(i + 1).ok_or("--stage requires a value")?;
                stage = value.parse()?;
                i += 2;
            }
            "--target" => {
                let value = args.get(i + 1).ok_or("--target requires a value")?;
                target = value.parse().map_err(|e: String| e)?;
                i += 2;
            }
            other if source_path.is_none() => {
                source_path = Some(other.to_string());
                i += 1;
            }
            other => return Err(format!("unexpected argument '{other}'")),
        }
    }

    Ok(Options { source_path: source_path.unwrap_or_else(|| DEFAULT_SOURCE.to_string()), stage, target })
}

/// Runs the pipeline described by `opts`, printing the requested stage's
/// artifact and writing `.asm` output alongside the source when the pipeline
/// reaches code generation. Returns the process exit code.
pub fn run(opts: &Options) -> i32 {
    if opts.source_path == DEFAULT_SOURCE {
        println!("Using default source file: {}", opts.source_path);
    }

    match run_pipeline(opts) {
        Ok(()) => 0,
        Err(err) => {
            log::error!("{err}");
            eprintln!("{err}");
            err.exit_code()
        }
    }
}

fn run_pipeline(opts: &Options) -> Result<(), CompileError> {
    let source = fs::read_to_string(&opts.source_path)
        .map_err(|e| CompileError::syntax(None, format!("cannot read '{}': {e}", opts.source_path)))?;

    let tokens = Lexer::new(&source).scan_tokens()?;
    log::info!("lexer produced {} tokens", tokens.len());
    if opts.stage == Stage::Lexer {
        println!("Successfully tokenized {} tokens:\n", tokens.len());
        for (i, tok) in tokens.iter().enumerate() {
            println!("{:3}. {:?}", i + 1, tok);
        }
        return Ok(());
    }

    let tree = Parser::new(tokens).parse()?;
    if opts.stage == Stage::Parser {
        println!("Parse tree: {tree:#?}");
        return Ok(());
    }

    let ast = analyze(tree)?;
    log::info!("semantic pass checked {} statements", ast.statements.len());
    println!("Semantic analysis: passed");
    if opts.stage == Stage::Semantics {
        return Ok(());
    }

    println!("\nGenerating 6502 assembly code (target: {:?})...", opts.target);
    let asm = CodeGenerator::new(opts.target).generate(&ast)?;

    let output_path = with_extension_asm(&opts.source_path);
    fs::write(&output_path, &asm).map_err(|e| CompileError::codegen(format!("cannot write '{output_path}': {e}")))?;
    println!("Assembly code written to: {output_path}");

    println!("\n{}", "=".repeat(60));
    println!("{asm}");
    println!("{}", "=".repeat(60));

    Ok(())
}

fn with_extension_asm(path: &str) -> String {
    Path::new(path).with_extension("asm").to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_assembly_stage_and_py65mon_target() {
        let opts = parse_args(&["sixlang".to_string()]).unwrap();
        assert_eq!(opts.source_path, DEFAULT_SOURCE);
        assert_eq!(opts.stage, Stage::Assembly);
        assert_eq!(opts.target, Target::Py65mon);
    }

    #[test]
    fn parses_positional_file_and_stage_flag() {
        let opts = parse_args(&[
            "sixlang".to_string(),
            "demos/foo.txt".to_string(),
            "--stage".to_string(),
            "lexer".to_string(),
        ])
        .unwrap();
        assert_eq!(opts.source_path, "demos/foo.txt");
        assert_eq!(opts.stage, Stage::Lexer);
    }

    #[test]
    fn rejects_unknown_stage() {
        let err = parse_args(&["sixlang".to_string(), "--stage".to_string(), "bogus".to_string()]).unwrap_err();
        assert!(err.contains("unknown stage"));
    }

    #[test]
    fn rejects_unknown_target() {
        let err = parse_args(&["sixlang".to_string(), "--target".to_string(), "bogus".to_string()]).unwrap_err();
        assert!(err.contains("unknown target"));
    }

    #[test]
    fn with_extension_asm_replaces_suffix() {
        assert_eq!(with_extension_asm("demos/test_basic.txt"), "demos/test_basic.asm");
    }
}
