pub use scope::*;

pub mod scope;
