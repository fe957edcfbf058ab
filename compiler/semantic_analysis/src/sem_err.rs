use thiserror::Error;

use symbols::LookupError;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum SemErr {
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error("{0}")]
    Invalid(String),
}

impl SemErr {
    pub fn new<S: Into<String>>(message: S) -> Self {
        SemErr::Invalid(message.into())
    }
}

pub type SemanticResult<T> = Result<T, SemErr>;
