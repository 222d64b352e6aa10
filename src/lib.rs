pub mod analyzer;
pub mod codegen;
pub mod driver;
pub mod error;
pub mod lexer;
pub mod parser;

use codegen::Instruction;
use lexer::Lexer;
use parser::Parser;

pub use error::{Error, Result};

/// Translates the source of one class into VM instructions.
///
/// Each call owns its own symbol table, label counter and emitter, so
/// independent classes can be compiled on different threads.
pub fn compile(source: &str) -> Result<Vec<Instruction>> {
    let tokens = Lexer::tokenize(source)?;
    let parser = Parser::new(tokens);
    parser.parse()
}

/// Like [`compile`], rendered as VM text with one instruction per line.
pub fn compile_to_string(source: &str) -> Result<String> {
    let instructions = compile(source)?;
    let mut out = String::new();
    for instruction in instructions {
        out.push_str(&instruction.to_string());
        out.push('\n');
    }
    Ok(out)
}
