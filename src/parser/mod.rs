mod expr;
mod parser;
mod shape;

pub use expr::*;
pub use parser::*;
pub use shape::*;
