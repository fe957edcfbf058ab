pub use ast_def::*;
pub use eval::*;

pub mod ast_def;
pub mod eval;
