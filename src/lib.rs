/// The lexer takes the source input, mapping it into a stream of tokens
/// with a single token of lookahead.
pub mod lexer;

/// The parser consumes the lexer's lookahead, mapping it into an AST.
pub mod parser;

/// The lowering engine walks the AST and emits the IR module.
pub mod codegen;

pub mod ast;
pub mod ir;
pub mod printer;
pub mod token;

use std::fmt;

/// Compiles source text into IR text, the whole front-end in one call.
pub fn compile(source: &str) -> Result<String, CompileError> {
    let lexer = lexer::Lexer::new(source)?;
    let mut parser = parser::Parser::new(lexer, false);
    let program = parser.parse_program()?;
    let module = codegen::lower_program(&program)?;
    Ok(module.to_string())
}

/// Any front-end failure, tagged with the phase that produced it. All three
/// are fatal: no partial output is ever produced.
#[derive(Debug)]
pub enum CompileError {
    Lexer(lexer::LexerError),
    Parser(parser::ParseError),
    Codegen(codegen::CodegenError),
}

impl From<lexer::LexerError> for CompileError {
    fn from(error: lexer::LexerError) -> CompileError {
        CompileError::Lexer(error)
    }
}

impl From<parser::Error> for CompileError {
    fn from(error: parser::Error) -> CompileError {
        match error {
            parser::Error::Lexer(e) => CompileError::Lexer(e),
            parser::Error::Unexpected(e) => CompileError::Parser(e),
        }
    }
}

impl From<codegen::CodegenError> for CompileError {
    fn from(error: codegen::CodegenError) -> CompileError {
        CompileError::Codegen(error)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Lexer(e) => write!(f, "Lexer error: {e}"),
            CompileError::Parser(e) => write!(f, "Parser error: {e}"),
            CompileError::Codegen(e) => write!(f, "Code generation error: {e}"),
        }
    }
}

impl std::error::Error for CompileError {}
