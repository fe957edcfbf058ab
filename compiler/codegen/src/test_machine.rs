//! A small interpreter for generated LIR, used to check what compiled programs compute.
//!
//! Branch delay slots always hold a `nop` in generated code, so jumps take effect immediately.

use std::collections::HashMap;

use lir::{AluOp, Imm, Instruction, MulDivOp, Program, Reg, TopLevel};

const STACK_TOP: i32 = 0x7fff_0000;
const GLOBAL_BASE: i32 = 0x1000_0000;
const STEP_LIMIT: usize = 1_000_000;
const RETURN_SENTINEL: i32 = -1;

pub struct Machine {
    code: Vec<Instruction>,
    labels: HashMap<String, usize>,
    addresses: HashMap<String, i32>,
    regs: [i32; 32],
    lo: i32,
    memory: HashMap<i32, i32>,
    /// Largest number of words stored below the initial stack pointer
    pub deepest_stack: i32,
}

impl Machine {
    pub fn load(program: &Program) -> Self {
        let mut code = vec![];
        let mut labels = HashMap::new();
        let mut addresses = HashMap::new();
        let mut memory = HashMap::new();

        for item in &program.items {
            match item {
                TopLevel::Func(func) => {
                    labels.insert(func.name.clone(), code.len());
                    for instruction in &func.instructions {
                        if let Instruction::Label(label) = instruction {
                            labels.insert(label.clone(), code.len());
                        }
                        code.push(instruction.clone());
                    }
                }
                TopLevel::Global(global) => {
                    let addr = GLOBAL_BASE + 4 * addresses.len() as i32;
                    addresses.insert(global.name.clone(), addr);
                    memory.insert(addr, global.init);
                }
            }
        }

        Self {
            code,
            labels,
            addresses,
            regs: [0; 32],
            lo: 0,
            memory,
            deepest_stack: 0,
        }
    }

    pub fn global(&self, name: &str) -> i32 {
        self.memory[&self.addresses[name]]
    }

    /// Call `func` and return what it leaves in $2
    pub fn call(&mut self, func: &str) -> Result<i32, String> {
        self.regs[Reg::SP.number()] = STACK_TOP;
        self.regs[Reg::FP.number()] = STACK_TOP;
        self.regs[Reg::RA.number()] = RETURN_SENTINEL;

        let mut pc = self.target(func)?;

        for _ in 0..STEP_LIMIT {
            let instruction = self
                .code
                .get(pc)
                .cloned()
                .ok_or_else(|| format!("ran off the end of the code at {}", pc))?;
            pc += 1;

            match instruction {
                Instruction::Lui { rt, imm } => {
                    let upper = match imm {
                        Imm::Int(val) => val,
                        Imm::Hi(symbol) => self.address(&symbol)? >> 16,
                        Imm::Lo(_) => return Err("lui with %lo".to_string()),
                    };
                    self.set(rt, upper << 16);
                }
                Instruction::Addiu { rt, rs, imm } => {
                    let val = self.get(rs).wrapping_add(self.immediate(&imm)?);
                    self.set(rt, val);
                }
                Instruction::Ori { rt, rs, imm } => self.set(rt, self.get(rs) | (imm & 0xffff)),
                Instruction::Xori { rt, rs, imm } => self.set(rt, self.get(rs) ^ (imm & 0xffff)),
                Instruction::Lw { rt, offset, base } => {
                    let addr = self.get(base).wrapping_add(self.immediate(&offset)?);
                    let val = self.memory.get(&addr).copied().unwrap_or(0);
                    self.set(rt, val);
                }
                Instruction::Sw { rt, offset, base } => {
                    let addr = self.get(base).wrapping_add(self.immediate(&offset)?);
                    if addr <= STACK_TOP {
                        self.deepest_stack = self.deepest_stack.max((STACK_TOP - addr) / 4);
                    }
                    self.memory.insert(addr, self.get(rt));
                }
                Instruction::Alu { op, rd, rs, rt } => {
                    let (a, b) = (self.get(rs), self.get(rt));
                    let val = match op {
                        AluOp::Addu => a.wrapping_add(b),
                        AluOp::Sub => a.wrapping_sub(b),
                        AluOp::And => a & b,
                        AluOp::Or => a | b,
                        AluOp::Xor => a ^ b,
                        AluOp::Nor => !(a | b),
                        AluOp::Slt => (a < b) as i32,
                        AluOp::Sltu => ((a as u32) < (b as u32)) as i32,
                        AluOp::Sllv => a.wrapping_shl(b as u32),
                        AluOp::Srav => a.wrapping_shr(b as u32),
                    };
                    self.set(rd, val);
                }
                Instruction::MulDiv { op, rs, rt } => {
                    let (a, b) = (self.get(rs), self.get(rt));
                    self.lo = match op {
                        MulDivOp::Mult => a.wrapping_mul(b),
                        MulDivOp::Div if b == 0 => return Err("division by zero".to_string()),
                        MulDivOp::Div => a.wrapping_div(b),
                    };
                }
                Instruction::Mflo(rd) => self.set(rd, self.lo),
                Instruction::Move { rd, rs } => self.set(rd, self.get(rs)),
                Instruction::Beq { rs, rt, label } => {
                    if self.get(rs) == self.get(rt) {
                        pc = self.target(&label)?;
                    }
                }
                Instruction::J(label) => pc = self.target(&label)?,
                Instruction::Jal(label) => {
                    // skip the delay slot on return
                    self.set(Reg::RA, pc as i32 + 1);
                    pc = self.target(&label)?;
                }
                Instruction::Jr(rs) => {
                    let dest = self.get(rs);
                    if dest == RETURN_SENTINEL {
                        return Ok(self.get(Reg::V0));
                    }
                    pc = dest as usize;
                }
                Instruction::Nop | Instruction::Label(_) => {}
            }
        }

        Err(format!("'{}' did not return within {} steps", func, STEP_LIMIT))
    }

    pub fn reg(&self, reg: Reg) -> i32 {
        self.get(reg)
    }

    fn get(&self, reg: Reg) -> i32 {
        self.regs[reg.number()]
    }

    fn set(&mut self, reg: Reg, val: i32) {
        if reg != Reg::ZERO {
            self.regs[reg.number()] = val;
        }
    }

    fn target(&self, label: &str) -> Result<usize, String> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| format!("unknown label '{}'", label))
    }

    fn address(&self, symbol: &str) -> Result<i32, String> {
        self.addresses
            .get(symbol)
            .copied()
            .ok_or_else(|| format!("unknown symbol '{}'", symbol))
    }

    fn immediate(&self, imm: &Imm) -> Result<i32, String> {
        match imm {
            Imm::Int(val) => Ok(*val),
            Imm::Lo(symbol) => Ok(self.address(symbol)? as i16 as i32),
            Imm::Hi(_) => Err("%hi outside of lui".to_string()),
        }
    }
}
