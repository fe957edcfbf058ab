pub use lir_def::*;

pub mod lir_def;
