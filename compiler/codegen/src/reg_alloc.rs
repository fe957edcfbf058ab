use std::ops::RangeInclusive;

use log::trace;

use lir::Reg;

/// Registers handed out as scratch space; everything else belongs to the assembler, kernel or linkage
pub const SCRATCH: RangeInclusive<u8> = 8..=25;

const REGISTER_COUNT: usize = 32;

/// Tracks which of the 32 registers currently hold a live value.
///
/// The allocator never frees on its own: every register taken with `allocate` + `reserve`
/// must be given back with exactly one `release`.
#[derive(Debug)]
pub struct RegisterAllocator {
    used: [bool; REGISTER_COUNT],
    reservations: usize,
    releases: usize,
}

impl Default for RegisterAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterAllocator {
    pub fn new() -> Self {
        let mut used = [false; REGISTER_COUNT];
        // hardwired zero
        used[Reg::ZERO.number()] = true;

        Self {
            used,
            reservations: 0,
            releases: 0,
        }
    }

    /// Lowest free scratch register, without claiming it
    pub fn allocate(&self) -> Option<Reg> {
        SCRATCH.map(Reg).find(|reg| !self.used[reg.number()])
    }

    /// Mark `reg` as in use; false if it already was
    pub fn reserve(&mut self, reg: Reg) -> bool {
        if self.used[reg.number()] {
            return false;
        }

        trace!("reserve {}", reg);
        self.used[reg.number()] = true;
        self.reservations += 1;
        true
    }

    pub fn release(&mut self, reg: Reg) {
        if reg == Reg::ZERO {
            return;
        }

        trace!("release {}", reg);
        self.used[reg.number()] = false;
        self.releases += 1;
    }

    pub fn is_used(&self, reg: Reg) -> bool {
        self.used[reg.number()]
    }

    /// Scratch registers currently reserved
    pub fn live(&self) -> impl Iterator<Item = Reg> + '_ {
        SCRATCH.map(Reg).filter(|reg| self.used[reg.number()])
    }

    pub fn reservations(&self) -> usize {
        self.reservations
    }

    pub fn releases(&self) -> usize {
        self.releases
    }
}
