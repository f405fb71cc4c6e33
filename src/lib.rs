pub mod ast;
pub mod interpreter;
pub mod parser;
pub mod position;
pub mod tokenizer;

use ast::Program;
use interpreter::{Interpreter, RuntimeError};
use parser::SyntaxError;
use tokenizer::TokenizeError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

pub fn parse(source: &str) -> Result<Program, Error> {
    let tokens = tokenizer::tokens(source)?;
    Ok(parser::program(&tokens)?)
}

/// Lexes, parses and runs `source` on `interpreter`.
pub fn run(source: &str, interpreter: &mut Interpreter) -> Result<(), Error> {
    let program = parse(source)?;
    interpreter.interpret(&program)?;
    Ok(())
}
