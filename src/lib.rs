pub mod error;

#[path = "lexer/lexer.rs"]
pub mod lexer;

#[path = "grammar/grammar.rs"]
pub mod grammar;

pub mod parser {
    #[path = "tree.rs"]
    pub mod tree;

    #[path = "parser.rs"]
    mod parser_impl;
    pub use parser_impl::*;
}

pub mod semantic {
    #[path = "ast.rs"]
    pub mod ast;

    #[path = "semantic.rs"]
    pub mod semantic;
}

#[path = "codegen/codegen.rs"]
pub mod codegen;

#[path = "runner/runner.rs"]
pub mod runner;
