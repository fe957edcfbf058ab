pub use explore::*;
pub use sem_err::*;

pub mod explore;
mod sem_err;
