pub mod ast;
pub mod class;
pub mod environment;
pub mod error;
pub mod function;
pub mod interpreter;
pub mod lox;
pub mod native;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;

pub use crate::error::{LoxError, RuntimeError, Warning};
pub use crate::interpreter::Interpreter;
pub use crate::lox::{Lox, Report, Status};
pub use crate::value::Value;
