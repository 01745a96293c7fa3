//! Source text to expression trees.

pub mod lexer;
pub mod parser;

pub use lexer::{tokenize, Delimiter, Lexeme, Lexer, Operator, Token};
pub use parser::{parse_constraint, parse_expression, parse_objective, Parser};
