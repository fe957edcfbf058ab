pub use translate::*;

mod translate;
