use std::fmt::{Display, Formatter};

/// Defines assembly tree datatypes

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub items: Vec<TopLevel>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TopLevel {
    Func(Func),
    Global(GlobalVar),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Func {
    pub name: String,
    /// Bytes of local storage above the frame pointer
    pub frame_size: i32,
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVar {
    pub name: String,
    pub init: i32,
}

/// One of the 32 general purpose registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg(pub u8);

impl Reg {
    pub const ZERO: Reg = Reg(0);
    pub const V0: Reg = Reg(2);
    pub const SP: Reg = Reg(29);
    pub const FP: Reg = Reg(30);
    pub const RA: Reg = Reg(31);

    pub fn number(self) -> usize {
        self.0 as usize
    }
}

impl Display for Reg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Reg::SP => write!(f, "$sp"),
            Reg::FP => write!(f, "$fp"),
            Reg(n) => write!(f, "${}", n),
        }
    }
}

/// Immediate field, either a literal or a relocation against a symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Imm {
    Int(i32),
    Hi(String),
    Lo(String),
}

impl Display for Imm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Imm::Int(val) => write!(f, "{}", val),
            Imm::Hi(symbol) => write!(f, "%hi({})", symbol),
            Imm::Lo(symbol) => write!(f, "%lo({})", symbol),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Lui {
        rt: Reg,
        imm: Imm,
    },
    Addiu {
        rt: Reg,
        rs: Reg,
        imm: Imm,
    },
    Ori {
        rt: Reg,
        rs: Reg,
        imm: i32,
    },
    Xori {
        rt: Reg,
        rs: Reg,
        imm: i32,
    },
    Lw {
        rt: Reg,
        offset: Imm,
        base: Reg,
    },
    Sw {
        rt: Reg,
        offset: Imm,
        base: Reg,
    },
    /// Three register ALU operation, `op rd, rs, rt`; shifts move `rs` by `rt`
    Alu {
        op: AluOp,
        rd: Reg,
        rs: Reg,
        rt: Reg,
    },
    MulDiv {
        op: MulDivOp,
        rs: Reg,
        rt: Reg,
    },
    Mflo(Reg),
    Move {
        rd: Reg,
        rs: Reg,
    },
    Beq {
        rs: Reg,
        rt: Reg,
        label: String,
    },
    J(String),
    Jal(String),
    Jr(Reg),
    Nop,
    Label(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Addu,
    Sub,
    And,
    Or,
    Xor,
    Nor,
    Slt,
    Sltu,
    Sllv,
    Srav,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MulDivOp {
    Mult,
    Div,
}

impl Instruction {
    /// Register written by this instruction, if any
    pub fn written_reg(&self) -> Option<Reg> {
        match self {
            Instruction::Lui { rt, .. }
            | Instruction::Addiu { rt, .. }
            | Instruction::Ori { rt, .. }
            | Instruction::Xori { rt, .. }
            | Instruction::Lw { rt, .. } => Some(*rt),
            Instruction::Alu { rd, .. } | Instruction::Move { rd, .. } | Instruction::Mflo(rd) => {
                Some(*rd)
            }
            Instruction::Jal(_) => Some(Reg::RA),
            Instruction::Sw { .. }
            | Instruction::MulDiv { .. }
            | Instruction::Beq { .. }
            | Instruction::J(_)
            | Instruction::Jr(_)
            | Instruction::Nop
            | Instruction::Label(_) => None,
        }
    }
}
