use std::fs::File;
use std::io::{BufWriter, Write};

use lir::*;

type IOResult = std::io::Result<()>;

pub fn output(path: &str, assm: &Program) -> IOResult {
    let output = File::create(path)?;
    let mut writer = BufWriter::new(output);

    write_program(&mut writer, assm)?;

    writer.flush()?;

    Ok(())
}

pub fn write_program<W: Write>(writer: &mut W, assm: &Program) -> IOResult {
    for item in &assm.items {
        match item {
            TopLevel::Func(func) => emit_func(writer, func)?,
            TopLevel::Global(var) => emit_global(writer, var)?,
        }
    }

    Ok(())
}

fn emit_global<W: Write>(writer: &mut W, var: &GlobalVar) -> IOResult {
    writeln!(writer, "\t.data")?;
    writeln!(writer, "\t.globl\t{}", var.name)?;
    writeln!(writer, "\t.align\t2")?;
    writeln!(writer, "{}:", var.name)?;
    writeln!(writer, "\t.word\t{}", var.init)?;
    writeln!(writer)?;

    Ok(())
}

fn emit_func<W: Write>(writer: &mut W, func: &Func) -> IOResult {
    writeln!(writer, "\t.text")?;
    writeln!(writer, "\t.globl\t{}", func.name)?;
    writeln!(writer, "\t.ent\t{}", func.name)?;
    writeln!(writer, "{}:", func.name)?;
    // delay slots are filled explicitly
    writeln!(writer, "\t.set\tnoreorder")?;

    for instruction in &func.instructions {
        emit_instruction(writer, instruction)?;
    }

    writeln!(writer, "\t.set\treorder")?;
    writeln!(writer, "\t.end\t{}", func.name)?;
    writeln!(writer)?;

    Ok(())
}

fn emit_instruction<W: Write>(writer: &mut W, instruction: &Instruction) -> IOResult {
    match instruction {
        Instruction::Lui { rt, imm } => writeln!(writer, "\tlui\t{},{}", rt, imm)?,
        Instruction::Addiu { rt, rs, imm } => writeln!(writer, "\taddiu\t{},{},{}", rt, rs, imm)?,
        Instruction::Ori { rt, rs, imm } => writeln!(writer, "\tori\t{},{},{}", rt, rs, imm)?,
        Instruction::Xori { rt, rs, imm } => writeln!(writer, "\txori\t{},{},{}", rt, rs, imm)?,
        Instruction::Lw { rt, offset, base } => {
            writeln!(writer, "\tlw\t{},{}({})", rt, offset, base)?
        }
        Instruction::Sw { rt, offset, base } => {
            writeln!(writer, "\tsw\t{},{}({})", rt, offset, base)?
        }
        Instruction::Alu { op, rd, rs, rt } => {
            writeln!(writer, "\t{}\t{},{},{}", show_alu(op), rd, rs, rt)?
        }
        Instruction::MulDiv { op, rs, rt } => {
            writeln!(writer, "\t{}\t{},{}", show_mul_div(op), rs, rt)?
        }
        Instruction::Mflo(rd) => writeln!(writer, "\tmflo\t{}", rd)?,
        Instruction::Move { rd, rs } => writeln!(writer, "\tmove\t{},{}", rd, rs)?,
        Instruction::Beq { rs, rt, label } => writeln!(writer, "\tbeq\t{},{},{}", rs, rt, label)?,
        Instruction::J(label) => writeln!(writer, "\tj\t{}", label)?,
        Instruction::Jal(label) => writeln!(writer, "\tjal\t{}", label)?,
        Instruction::Jr(rs) => writeln!(writer, "\tjr\t{}", rs)?,
        Instruction::Nop => writeln!(writer, "\tnop")?,
        Instruction::Label(label) => writeln!(writer, "{}:", label)?,
    }

    Ok(())
}

fn show_alu(op: &AluOp) -> &'static str {
    match op {
        AluOp::Addu => "addu",
        AluOp::Sub => "sub",
        AluOp::And => "and",
        AluOp::Or => "or",
        AluOp::Xor => "xor",
        AluOp::Nor => "nor",
        AluOp::Slt => "slt",
        AluOp::Sltu => "sltu",
        AluOp::Sllv => "sllv",
        AluOp::Srav => "srav",
    }
}

fn show_mul_div(op: &MulDivOp) -> &'static str {
    match op {
        MulDivOp::Mult => "mult",
        MulDivOp::Div => "div",
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn render(program: &Program) -> String {
        let mut buf = vec![];
        write_program(&mut buf, program).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn render_instruction(instruction: Instruction) -> String {
        let mut buf = vec![];
        emit_instruction(&mut buf, &instruction).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn global_data() {
        let program = Program {
            items: vec![TopLevel::Global(GlobalVar {
                name: "counter".to_string(),
                init: -3,
            })],
        };

        assert_eq!(
            render(&program),
            "\t.data\n\t.globl\tcounter\n\t.align\t2\ncounter:\n\t.word\t-3\n\n"
        );
    }

    #[test]
    fn function_wrapper() {
        let program = Program {
            items: vec![TopLevel::Func(Func {
                name: "main".to_string(),
                frame_size: 4,
                instructions: vec![Instruction::Jr(Reg::RA), Instruction::Nop],
            })],
        };

        assert_eq!(
            render(&program),
            "\t.text\n\t.globl\tmain\n\t.ent\tmain\nmain:\n\t.set\tnoreorder\n\tjr\t$31\n\tnop\n\t.set\treorder\n\t.end\tmain\n\n"
        );
    }

    #[test]
    fn memory_operands() {
        assert_eq!(
            render_instruction(Instruction::Sw {
                rt: Reg(8),
                offset: Imm::Int(12),
                base: Reg::FP,
            }),
            "\tsw\t$8,12($fp)\n"
        );
        assert_eq!(
            render_instruction(Instruction::Lw {
                rt: Reg(9),
                offset: Imm::Lo("g".to_string()),
                base: Reg(9),
            }),
            "\tlw\t$9,%lo(g)($9)\n"
        );
        assert_eq!(
            render_instruction(Instruction::Lui {
                rt: Reg(9),
                imm: Imm::Hi("g".to_string()),
            }),
            "\tlui\t$9,%hi(g)\n"
        );
    }

    #[test]
    fn register_operations() {
        assert_eq!(
            render_instruction(Instruction::Alu {
                op: AluOp::Slt,
                rd: Reg(8),
                rs: Reg(9),
                rt: Reg(8),
            }),
            "\tslt\t$8,$9,$8\n"
        );
        assert_eq!(
            render_instruction(Instruction::Alu {
                op: AluOp::Nor,
                rd: Reg(8),
                rs: Reg(8),
                rt: Reg::ZERO,
            }),
            "\tnor\t$8,$8,$0\n"
        );
        assert_eq!(
            render_instruction(Instruction::MulDiv {
                op: MulDivOp::Div,
                rs: Reg(8),
                rt: Reg(9),
            }),
            "\tdiv\t$8,$9\n"
        );
        assert_eq!(
            render_instruction(Instruction::Addiu {
                rt: Reg::SP,
                rs: Reg::SP,
                imm: Imm::Int(-88),
            }),
            "\taddiu\t$sp,$sp,-88\n"
        );
        assert_eq!(
            render_instruction(Instruction::Move {
                rd: Reg::V0,
                rs: Reg(8),
            }),
            "\tmove\t$2,$8\n"
        );
    }

    #[test]
    fn branches_and_labels() {
        assert_eq!(
            render_instruction(Instruction::Beq {
                rs: Reg(8),
                rt: Reg::ZERO,
                label: "main.if_else.0".to_string(),
            }),
            "\tbeq\t$8,$0,main.if_else.0\n"
        );
        assert_eq!(
            render_instruction(Instruction::Label("main.epilogue".to_string())),
            "main.epilogue:\n"
        );
        assert_eq!(
            render_instruction(Instruction::Jal("f".to_string())),
            "\tjal\tf\n"
        );
    }
}
