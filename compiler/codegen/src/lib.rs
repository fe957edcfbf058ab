use log::debug;

use ast::*;
use lir::{AluOp, Func, GlobalVar, Imm, Instruction, MulDivOp, Program, Reg, TopLevel};
use semantic_analysis::{declare_global, explore};
use symbols::SymbolTable;
use unique_ident::LabelGenerator;

pub use crate::codegen_err::*;
pub use crate::reg_alloc::*;

mod codegen_err;
mod reg_alloc;
#[cfg(test)]
mod test_machine;

/// Bytes pushed around a call: the return address at 4, then every scratch register from 8 up
pub const CALL_FRAME_SIZE: i32 = 88;
const RA_SLOT: i32 = 4;
const FIRST_SAVE_SLOT: i32 = 8;

/// Extra bytes below the locals: one spare word and the caller's frame pointer
const FRAME_LINKAGE: i32 = 8;

/// Result of generating an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    InRegister(Reg),
    Nothing,
}

pub fn gen_assm(program: &TranslationUnit) -> CodegenResult<Program> {
    Codegen::new().gen_program(program)
}

/// Owns the state shared by every function of one compiled output
pub struct Codegen {
    regs: RegisterAllocator,
    labels: LabelGenerator,
    globals: SymbolTable,
}

impl Default for Codegen {
    fn default() -> Self {
        Self::new()
    }
}

impl Codegen {
    pub fn new() -> Self {
        Self {
            regs: RegisterAllocator::new(),
            labels: LabelGenerator::new(),
            globals: SymbolTable::new(),
        }
    }

    pub fn registers(&self) -> &RegisterAllocator {
        &self.regs
    }

    pub fn gen_program(&mut self, program: &TranslationUnit) -> CodegenResult<Program> {
        let mut items = vec![];

        for decl in &program.decls {
            let item = match decl {
                Decl::Var(var) => TopLevel::Global(self.gen_global(var)?),
                Decl::Func(func) => TopLevel::Func(self.gen_func(func)?),
            };
            items.push(item);
        }

        Ok(Program { items })
    }

    fn gen_global(&mut self, var: &VarDecl) -> CodegenResult<GlobalVar> {
        declare_global(var, &mut self.globals)
            .map_err(|err| CodegenErr::new(&var.name, Phase::Scope, err.into()))?;

        let init = match &var.init {
            None => 0,
            Some(expr) => match expr.evaluate(&Bindings::new()) {
                Ok(val) => val as i32,
                Err(err) => {
                    return Err(CodegenErr::new(
                        &var.name,
                        Phase::Codegen,
                        ErrorKind::Unsupported(format!(
                            "initializer of global '{}' is not a constant: {}",
                            var.name, err
                        )),
                    ))
                }
            },
        };

        Ok(GlobalVar {
            name: var.name.clone(),
            init,
        })
    }

    fn gen_func(&mut self, func: &FuncDecl) -> CodegenResult<Func> {
        if !func.params.is_empty() {
            return Err(CodegenErr::new(
                &func.name,
                Phase::Codegen,
                ErrorKind::Unsupported(format!(
                    "function '{}' takes {} parameter(s), only parameterless functions can be compiled",
                    func.name,
                    func.params.len()
                )),
            ));
        }

        let mut resolved = func.clone();
        let symbols = explore(&mut resolved, &self.globals)
            .map_err(|err| CodegenErr::new(&func.name, Phase::Scope, err.into()))?;

        debug!("generating '{}'", func.name);

        let mut generator = FuncGen {
            name: &func.name,
            epilogue: format!("{}.epilogue", func.name),
            symbols,
            regs: &mut self.regs,
            labels: &mut self.labels,
            instructions: vec![],
        };

        generator
            .gen_body(&resolved.body)
            .map_err(|kind| CodegenErr::new(&func.name, Phase::Codegen, kind))?;

        let frame_size = generator.symbols.frame_size();
        let instructions = generator.instructions;

        let leaked: Vec<_> = self.regs.live().collect();
        if !leaked.is_empty() {
            return Err(CodegenErr::new(
                &func.name,
                Phase::Codegen,
                ErrorKind::RegisterLeak(leaked),
            ));
        }

        Ok(Func {
            name: func.name.clone(),
            frame_size,
            instructions,
        })
    }
}

struct FuncGen<'a> {
    name: &'a str,
    epilogue: String,
    symbols: SymbolTable,
    regs: &'a mut RegisterAllocator,
    labels: &'a mut LabelGenerator,
    instructions: Vec<Instruction>,
}

impl<'a> FuncGen<'a> {
    fn emit(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    fn alu(&mut self, op: AluOp, rd: Reg, rs: Reg, rt: Reg) {
        self.emit(Instruction::Alu { op, rd, rs, rt });
    }

    fn label(&mut self, kind: &str) -> String {
        self.labels.make_label(&format!("{}.{}", self.name, kind))
    }

    /// Run `f` with a freshly reserved scratch register and release it on every exit path
    fn with_scratch<T>(
        &mut self,
        purpose: &str,
        f: impl FnOnce(&mut Self, Reg) -> GenResult<T>,
    ) -> GenResult<T> {
        let reg = self
            .regs
            .allocate()
            .ok_or_else(|| ErrorKind::AllocationExhausted(purpose.to_string()))?;

        if !self.regs.reserve(reg) {
            return Err(ErrorKind::RegisterLeak(vec![reg]));
        }

        let result = f(self, reg);
        self.regs.release(reg);

        result
    }

    fn gen_body(&mut self, body: &Block) -> GenResult<()> {
        let frame_size = self.symbols.frame_size();
        let linkage_slot = frame_size + FRAME_LINKAGE - 4;

        if frame_size + FRAME_LINKAGE > i16::MAX as i32 {
            return Err(ErrorKind::Unsupported(format!(
                "stack frame of {} bytes does not fit a 16 bit offset",
                frame_size
            )));
        }

        // prologue
        self.emit(Instruction::Addiu {
            rt: Reg::SP,
            rs: Reg::SP,
            imm: Imm::Int(-(frame_size + FRAME_LINKAGE)),
        });
        self.emit(Instruction::Sw {
            rt: Reg::FP,
            offset: Imm::Int(linkage_slot),
            base: Reg::SP,
        });
        self.emit(Instruction::Move {
            rd: Reg::FP,
            rs: Reg::SP,
        });

        self.gen_block(body)?;

        // falling off the end returns 0
        self.emit(Instruction::Move {
            rd: Reg::V0,
            rs: Reg::ZERO,
        });

        let epilogue = self.epilogue.clone();
        self.emit(Instruction::Label(epilogue));
        self.emit(Instruction::Move {
            rd: Reg::SP,
            rs: Reg::FP,
        });
        self.emit(Instruction::Lw {
            rt: Reg::FP,
            offset: Imm::Int(linkage_slot),
            base: Reg::SP,
        });
        self.emit(Instruction::Addiu {
            rt: Reg::SP,
            rs: Reg::SP,
            imm: Imm::Int(frame_size + FRAME_LINKAGE),
        });
        self.emit(Instruction::Jr(Reg::RA));
        self.emit(Instruction::Nop);

        Ok(())
    }

    fn gen_block(&mut self, block: &Block) -> GenResult<()> {
        for item in &block.items {
            match item {
                BlockItem::S(stmt) => self.gen_stmt(stmt)?,
                BlockItem::D(VarDecl {
                    name,
                    init: Some(init),
                }) => self.gen_assignment(name, init)?,
                BlockItem::D(VarDecl { init: None, .. }) => {}
            }
        }

        Ok(())
    }

    fn gen_stmt(&mut self, stmt: &Stmt) -> GenResult<()> {
        match stmt {
            Stmt::Expression { expr } => {
                self.with_scratch("an expression statement", |gen, reg| {
                    gen.gen_expr(expr, reg).map(|_| ())
                })
            }
            Stmt::Return { expr } => {
                self.with_scratch("a return value", |gen, reg| {
                    gen.gen_value(expr, reg)?;
                    gen.emit(Instruction::Move {
                        rd: Reg::V0,
                        rs: reg,
                    });
                    Ok(())
                })?;

                let epilogue = self.epilogue.clone();
                self.emit(Instruction::J(epilogue));
                self.emit(Instruction::Nop);
                Ok(())
            }
            Stmt::If {
                condition,
                then,
                otherwise,
            } => {
                let else_label = self.label("if_else");
                self.gen_branch_if_zero(condition, &else_label)?;
                self.gen_stmt(then)?;

                match otherwise {
                    None => self.emit(Instruction::Label(else_label)),
                    Some(otherwise) => {
                        let end_label = self.label("if_end");
                        self.emit(Instruction::J(end_label.clone()));
                        self.emit(Instruction::Nop);
                        self.emit(Instruction::Label(else_label));
                        self.gen_stmt(otherwise)?;
                        self.emit(Instruction::Label(end_label));
                    }
                }

                Ok(())
            }
            Stmt::While { condition, body } => {
                let start_label = self.label("while_start");
                let end_label = self.label("while_end");

                self.emit(Instruction::Label(start_label.clone()));
                self.gen_branch_if_zero(condition, &end_label)?;
                self.gen_stmt(body)?;
                self.emit(Instruction::J(start_label));
                self.emit(Instruction::Nop);
                self.emit(Instruction::Label(end_label));

                Ok(())
            }
            Stmt::Compound { block } => self.gen_block(block),
            Stmt::Null => Ok(()),
        }
    }

    fn gen_branch_if_zero(&mut self, condition: &Expr, target: &str) -> GenResult<()> {
        self.with_scratch("a condition", |gen, reg| {
            gen.gen_value(condition, reg)?;
            gen.emit(Instruction::Beq {
                rs: reg,
                rt: Reg::ZERO,
                label: target.to_string(),
            });
            gen.emit(Instruction::Nop);
            Ok(())
        })
    }

    /// Generate `expr`, requiring it to leave a value in `dest`
    fn gen_value(&mut self, expr: &Expr, dest: Reg) -> GenResult<()> {
        match self.gen_expr(expr, dest)? {
            Value::InRegister(reg) if reg == dest => Ok(()),
            Value::InRegister(reg) => {
                self.emit(Instruction::Move { rd: dest, rs: reg });
                Ok(())
            }
            Value::Nothing => Err(ErrorKind::Unsupported(format!(
                "{} has no value and cannot be used as an operand",
                describe(expr)
            ))),
        }
    }

    fn gen_expr(&mut self, expr: &Expr, dest: Reg) -> GenResult<Value> {
        match expr {
            Expr::Constant(val) => {
                self.gen_constant(*val, dest);
                Ok(Value::InRegister(dest))
            }
            Expr::Var(name) => {
                if self.symbols.is_global(name)? {
                    self.emit(Instruction::Lui {
                        rt: dest,
                        imm: Imm::Hi(name.clone()),
                    });
                    self.emit(Instruction::Lw {
                        rt: dest,
                        offset: Imm::Lo(name.clone()),
                        base: dest,
                    });
                } else {
                    let offset = self.symbols.offset(name)?;
                    self.emit(Instruction::Lw {
                        rt: dest,
                        offset: Imm::Int(offset),
                        base: Reg::FP,
                    });
                }
                Ok(Value::InRegister(dest))
            }
            Expr::Assignment { target, value } => {
                self.gen_assignment(target, value)?;
                Ok(Value::Nothing)
            }
            Expr::FunctionCall { name, args } => {
                if !args.is_empty() {
                    return Err(ErrorKind::Unsupported(format!(
                        "call to '{}' with {} argument(s), only calls without arguments can be compiled",
                        name,
                        args.len()
                    )));
                }

                self.gen_call(name, dest);
                Ok(Value::InRegister(dest))
            }
            Expr::Unary { op, operand } => {
                self.gen_value(operand, dest)?;

                match op {
                    UnaryOp::Not => {
                        self.alu(AluOp::Sltu, dest, Reg::ZERO, dest);
                        self.emit(Instruction::Xori {
                            rt: dest,
                            rs: dest,
                            imm: 1,
                        });
                    }
                    UnaryOp::BitwiseNot => self.alu(AluOp::Nor, dest, dest, Reg::ZERO),
                }

                Ok(Value::InRegister(dest))
            }
            Expr::Binary { op, left, right } => {
                self.gen_value(left, dest)?;

                self.with_scratch("a right operand", |gen, right_reg| {
                    gen.gen_value(right, right_reg)?;
                    gen.gen_binary(*op, dest, right_reg)
                })?;

                Ok(Value::InRegister(dest))
            }
        }
    }

    fn gen_constant(&mut self, val: i32, dest: Reg) {
        if (i16::MIN as i32..=i16::MAX as i32).contains(&val) {
            self.emit(Instruction::Addiu {
                rt: dest,
                rs: Reg::ZERO,
                imm: Imm::Int(val),
            });
        } else {
            let bits = val as u32;
            self.emit(Instruction::Lui {
                rt: dest,
                imm: Imm::Int((bits >> 16) as i32),
            });
            self.emit(Instruction::Ori {
                rt: dest,
                rs: dest,
                imm: (bits & 0xffff) as i32,
            });
        }
    }

    /// Combine `dest` (left) and `right` into `dest`
    fn gen_binary(&mut self, op: BinaryOp, dest: Reg, right: Reg) -> GenResult<()> {
        match op {
            BinaryOp::Add => self.alu(AluOp::Addu, dest, dest, right),
            BinaryOp::Subtract => self.alu(AluOp::Sub, dest, dest, right),
            BinaryOp::Multiply => self.gen_mul_div(MulDivOp::Mult, dest, right),
            BinaryOp::Divide => self.gen_mul_div(MulDivOp::Div, dest, right),

            BinaryOp::BitwiseAnd => self.alu(AluOp::And, dest, dest, right),
            BinaryOp::BitwiseOr => self.alu(AluOp::Or, dest, dest, right),
            BinaryOp::BitwiseXor => self.alu(AluOp::Xor, dest, dest, right),
            BinaryOp::ShiftLeft => self.alu(AluOp::Sllv, dest, dest, right),
            BinaryOp::ShiftRight => self.alu(AluOp::Srav, dest, dest, right),

            // operands are not guaranteed to be 0/1, normalize both first
            BinaryOp::And | BinaryOp::Or => {
                self.alu(AluOp::Sltu, dest, Reg::ZERO, dest);
                self.alu(AluOp::Sltu, right, Reg::ZERO, right);
                let combine = if op == BinaryOp::And {
                    AluOp::And
                } else {
                    AluOp::Or
                };
                self.alu(combine, dest, dest, right);
            }

            BinaryOp::Less => self.alu(AluOp::Slt, dest, dest, right),
            BinaryOp::Greater => self.alu(AluOp::Slt, dest, right, dest),
            BinaryOp::GreaterEqual => {
                self.alu(AluOp::Slt, dest, dest, right);
                self.emit(Instruction::Xori {
                    rt: dest,
                    rs: dest,
                    imm: 1,
                });
            }
            BinaryOp::LessEqual => {
                self.alu(AluOp::Slt, dest, right, dest);
                self.emit(Instruction::Xori {
                    rt: dest,
                    rs: dest,
                    imm: 1,
                });
            }
            BinaryOp::Equal | BinaryOp::NotEqual => {
                self.with_scratch("a comparison", |gen, less| {
                    gen.alu(AluOp::Slt, less, dest, right);
                    gen.alu(AluOp::Slt, right, right, dest);
                    // exactly one of the two is set iff the operands differ
                    gen.alu(AluOp::Xor, dest, right, less);

                    if op == BinaryOp::Equal {
                        gen.emit(Instruction::Xori {
                            rt: dest,
                            rs: dest,
                            imm: 1,
                        });
                    }
                    Ok(())
                })?;
            }
        }

        Ok(())
    }

    /// The result lands in LO a few cycles later, so pad around the move out of it
    fn gen_mul_div(&mut self, op: MulDivOp, dest: Reg, right: Reg) {
        self.emit(Instruction::MulDiv {
            op,
            rs: dest,
            rt: right,
        });
        self.emit(Instruction::Nop);
        self.emit(Instruction::Mflo(dest));
        self.emit(Instruction::Nop);
        self.emit(Instruction::Nop);
    }

    fn gen_assignment(&mut self, target: &str, value: &Expr) -> GenResult<()> {
        if self.symbols.is_global(target)? {
            self.with_scratch("a global address", |gen, addr| {
                gen.emit(Instruction::Lui {
                    rt: addr,
                    imm: Imm::Hi(target.to_string()),
                });
                gen.emit(Instruction::Addiu {
                    rt: addr,
                    rs: addr,
                    imm: Imm::Lo(target.to_string()),
                });

                gen.with_scratch("an assigned value", |gen, val| {
                    gen.gen_value(value, val)?;
                    gen.emit(Instruction::Sw {
                        rt: val,
                        offset: Imm::Int(0),
                        base: addr,
                    });
                    Ok(())
                })
            })
        } else {
            let offset = self.symbols.offset(target)?;

            self.with_scratch("an assigned value", |gen, val| {
                gen.gen_value(value, val)?;
                gen.emit(Instruction::Sw {
                    rt: val,
                    offset: Imm::Int(offset),
                    base: Reg::FP,
                });
                Ok(())
            })
        }
    }

    /// Zero argument call: every scratch register and $31 are saved around the jal
    fn gen_call(&mut self, name: &str, dest: Reg) {
        self.emit(Instruction::Addiu {
            rt: Reg::SP,
            rs: Reg::SP,
            imm: Imm::Int(-CALL_FRAME_SIZE),
        });
        for (reg, slot) in save_slots() {
            self.emit(Instruction::Sw {
                rt: reg,
                offset: Imm::Int(slot),
                base: Reg::SP,
            });
        }
        self.emit(Instruction::Sw {
            rt: Reg::RA,
            offset: Imm::Int(RA_SLOT),
            base: Reg::SP,
        });

        self.emit(Instruction::Jal(name.to_string()));
        self.emit(Instruction::Nop);

        self.emit(Instruction::Lw {
            rt: Reg::RA,
            offset: Imm::Int(RA_SLOT),
            base: Reg::SP,
        });
        for (reg, slot) in save_slots() {
            self.emit(Instruction::Lw {
                rt: reg,
                offset: Imm::Int(slot),
                base: Reg::SP,
            });
        }

        self.emit(Instruction::Move {
            rd: dest,
            rs: Reg::V0,
        });
        self.emit(Instruction::Addiu {
            rt: Reg::SP,
            rs: Reg::SP,
            imm: Imm::Int(CALL_FRAME_SIZE),
        });
    }
}

/// (register, offset from $sp) for every caller saved scratch register
fn save_slots() -> impl Iterator<Item = (Reg, i32)> {
    SCRATCH
        .enumerate()
        .map(|(i, reg)| (Reg(reg), FIRST_SAVE_SLOT + 4 * i as i32))
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Assignment { target, .. } => format!("assignment to '{}'", target),
        Expr::FunctionCall { name, .. } => format!("call to '{}'", name),
        Expr::Var(name) => format!("variable '{}'", name),
        Expr::Constant(val) => format!("constant {}", val),
        Expr::Binary { op, .. } => format!("'{}' expression", op),
        Expr::Unary { op, .. } => format!("'{}' expression", op),
    }
}
