use std::fmt::{Display, Formatter};

use thiserror::Error;

use lir::Reg;
use semantic_analysis::SemErr;
use symbols::LookupError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Scope,
    Codegen,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Scope => write!(f, "scope analysis"),
            Phase::Codegen => write!(f, "code generation"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorKind {
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Semantic(#[from] SemErr),
    #[error("ran out of scratch registers while generating {0}")]
    AllocationExhausted(String),
    #[error("unsupported construct: {0}")]
    Unsupported(String),
    #[error("internal error: scratch registers {0:?} still reserved")]
    RegisterLeak(Vec<Reg>),
}

/// A fatal error for one compilation unit, naming the unit and the phase it failed in
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{phase} of '{unit}' failed: {kind}")]
pub struct CodegenErr {
    pub unit: String,
    pub phase: Phase,
    pub kind: ErrorKind,
}

impl CodegenErr {
    pub fn new<S: Into<String>>(unit: S, phase: Phase, kind: ErrorKind) -> Self {
        Self {
            unit: unit.into(),
            phase,
            kind,
        }
    }
}

pub type CodegenResult<T> = Result<T, CodegenErr>;

pub(crate) type GenResult<T> = Result<T, ErrorKind>;
