use std::collections::HashMap;

use log::trace;
use thiserror::Error;

use lir::Reg;

/// Offset of the first local slot above the frame pointer
pub const FIRST_OFFSET: i32 = 4;
pub const SLOT_SIZE: i32 = 4;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum LookupError {
    #[error("variable '{0}' is not declared")]
    Undeclared(String),
    #[error("'{0}' is a global and has no frame offset")]
    NotLocal(String),
}

pub type LookupResult<T> = Result<T, LookupError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub is_global: bool,
    /// Only meaningful for locals
    pub frame_offset: i32,
    /// Advisory only, never trusted across statements
    pub register_hint: Option<Reg>,
}

/// Binding context for one compilation unit
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolTable {
    symbols: HashMap<String, Binding>,
    next_offset: i32,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            symbols: HashMap::with_capacity(20),
            next_offset: FIRST_OFFSET,
        }
    }

    /// Give `name` the next free frame slot and return its offset
    pub fn declare_local<S: Into<String>>(&mut self, name: S) -> i32 {
        let offset = self.next_offset;
        self.next_offset += SLOT_SIZE;

        let name = name.into();
        trace!("local '{}' at {}($fp)", name, offset);

        self.symbols.insert(
            name,
            Binding {
                is_global: false,
                frame_offset: offset,
                register_hint: None,
            },
        );

        offset
    }

    pub fn declare_global<S: Into<String>>(&mut self, name: S) {
        self.symbols.insert(
            name.into(),
            Binding {
                is_global: true,
                frame_offset: 0,
                register_hint: None,
            },
        );
    }

    pub fn lookup(&self, name: &str) -> LookupResult<&Binding> {
        self.symbols
            .get(name)
            .ok_or_else(|| LookupError::Undeclared(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn is_global(&self, name: &str) -> LookupResult<bool> {
        Ok(self.lookup(name)?.is_global)
    }

    pub fn offset(&self, name: &str) -> LookupResult<i32> {
        let binding = self.lookup(name)?;

        if binding.is_global {
            return Err(LookupError::NotLocal(name.to_string()));
        }

        Ok(binding.frame_offset)
    }

    pub fn next_offset(&self) -> i32 {
        self.next_offset
    }

    /// Bytes needed below the saved frame pointer to hold every local
    pub fn frame_size(&self) -> i32 {
        self.next_offset
    }

    pub fn globals(&self) -> impl Iterator<Item = &String> {
        self.symbols
            .iter()
            .filter(|(_, binding)| binding.is_global)
            .map(|(name, _)| name)
    }

    /// Import the globals of another table, keeping any existing entry of the same name
    pub fn merge_globals(&mut self, other: &SymbolTable) {
        for (name, binding) in &other.symbols {
            if binding.is_global {
                self.symbols
                    .entry(name.clone())
                    .or_insert_with(|| binding.clone());
            }
        }
    }

    /// Splice a nested scope into this one.
    ///
    /// Every incoming local moves up by `offset_shift - 4`, so a child table whose first slot is
    /// at 4 lands at `offset_shift`. Existing entries win over incoming ones of the same name.
    pub fn merge_all(&mut self, other: SymbolTable, offset_shift: i32) {
        let rebase = offset_shift - FIRST_OFFSET;

        for (name, mut binding) in other.symbols {
            if !binding.is_global {
                binding.frame_offset += rebase;
            }
            self.symbols.entry(name).or_insert(binding);
        }

        self.next_offset = self.next_offset.max(other.next_offset + rebase);
    }

    pub fn set_register_hint(&mut self, name: &str, reg: Reg) -> LookupResult<()> {
        match self.symbols.get_mut(name) {
            Some(binding) => {
                binding.register_hint = Some(reg);
                Ok(())
            }
            None => Err(LookupError::Undeclared(name.to_string())),
        }
    }

    pub fn clear_register_hints(&mut self) {
        for binding in self.symbols.values_mut() {
            binding.register_hint = None;
        }
    }
}
