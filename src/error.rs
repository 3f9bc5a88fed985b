use std::fmt;

/// The single error type threaded through all four pipeline stages.
///
/// Each stage returns a complete artifact or exactly one of these — there is no
/// diagnostic accumulation or recovery, matching the "first error aborts the stage"
/// policy of the pipeline.
#[derive(Debug)]
pub enum CompileError {
    Lexical { line: usize, message: String },
    Syntax { line: Option<usize>, message: String },
    Semantic { line: Option<usize>, message: String },
    Codegen { message: String },
}

impl CompileError {
    pub fn lexical(line: usize, message: impl Into<String>) -> Self {
        CompileError::Lexical { line, message: message.into() }
    }

    pub fn syntax(line: Option<usize>, message: impl Into<String>) -> Self {
        CompileError::Syntax { line, message: message.into() }
    }

    pub fn semantic(line: Option<usize>, message: impl Into<String>) -> Self {
        CompileError::Semantic { line, message: message.into() }
    }

    pub fn codegen(message: impl Into<String>) -> Self {
        CompileError::Codegen { message: message.into() }
    }

    /// Process exit code for this error, matching the CLI contract: 65 for input
    /// that fails a compile-time check, 70 for an internal/codegen failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            CompileError::Lexical { .. } | CompileError::Syntax { .. } | CompileError::Semantic { .. } => 65,
            CompileError::Codegen { .. } => 70,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompileError::Lexical { line, message } => write!(f, "[line {line}] LexicalError: {message}"),
            CompileError::Syntax { line: Some(line), message } => write!(f, "[line {line}] SyntaxError: {message}"),
            CompileError::Syntax { line: None, message } => write!(f, "SyntaxError: {message}"),
            CompileError::Semantic { line: Some(line), message } => write!(f, "[line {line}] SemanticError: {message}"),
            CompileError::Semantic { line: None, message } => write!(f, "SemanticError: {message}"),
            CompileError::Codegen { message } => write!(f, "CodegenError: {message}"),
        }
    }
}

impl std::error::Error for CompileError {}
