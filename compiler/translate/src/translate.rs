use std::collections::HashSet;
use std::io::Write;

use itertools::Itertools;
use thiserror::Error;

use ast::*;
use semantic_analysis::{declare_global, explore_identifiers, SemErr};
use symbols::SymbolTable;

type IOResult = std::io::Result<()>;

const INDENT_WIDTH: usize = 4;

const BOILERPLATE: &str = r#"# Boilerplate
if __name__ == "__main__":
    import sys
    ret=main()
    sys.exit(ret)
"#;

#[derive(Error, Debug)]
pub enum TranslateErr {
    #[error("scope analysis of '{unit}' failed: {err}")]
    Scope { unit: String, err: SemErr },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type TranslateResult<T> = Result<T, TranslateErr>;

/// A top level item after scope resolution
enum Item<'a> {
    Var(&'a VarDecl),
    /// Function with every local uniquely named, and the globals it refers to in declaration order
    Func(FuncDecl, Vec<&'a str>),
}

/// Render `program` as indentation structured source followed by the entry point boilerplate.
///
/// Scopes are resolved before anything is written: locals that shadow an outer name get a
/// fresh `name_N`, since the output has one flat scope per function.
pub fn translate<W: Write>(writer: &mut W, program: &TranslationUnit) -> TranslateResult<()> {
    let items = resolve(program)?;

    for item in &items {
        match item {
            Item::Var(var) => write_var(writer, var, 0)?,
            Item::Func(func, globals) => write_func(writer, func, globals)?,
        }
    }

    write!(writer, "{}", BOILERPLATE)?;

    Ok(())
}

pub fn translate_to_string(program: &TranslationUnit) -> TranslateResult<String> {
    let mut buf = vec![];
    translate(&mut buf, program)?;

    String::from_utf8(buf).map_err(|err| {
        TranslateErr::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    })
}

fn resolve(program: &TranslationUnit) -> TranslateResult<Vec<Item<'_>>> {
    let mut table = SymbolTable::new();
    // functions only see globals declared above them
    let mut declared: Vec<&str> = vec![];
    let mut items = vec![];

    for decl in &program.decls {
        match decl {
            Decl::Var(var) => {
                declare_global(var, &mut table).map_err(|err| TranslateErr::Scope {
                    unit: var.name.clone(),
                    err,
                })?;
                declared.push(&var.name);
                items.push(Item::Var(var));
            }
            Decl::Func(func) => {
                let mut resolved = func.clone();
                explore_identifiers(&mut resolved, &table).map_err(|err| TranslateErr::Scope {
                    unit: func.name.clone(),
                    err,
                })?;

                // no local is left with a global's name, so a match is a use of the global
                let mut used = HashSet::new();
                collect_block(&resolved.body, &mut used);
                let globals = declared
                    .iter()
                    .copied()
                    .filter(|name| used.contains(*name))
                    .collect();

                items.push(Item::Func(resolved, globals));
            }
        }
    }

    Ok(items)
}

fn collect_block<'a>(block: &'a Block, used: &mut HashSet<&'a str>) {
    for item in &block.items {
        match item {
            BlockItem::D(VarDecl {
                init: Some(init), ..
            }) => collect_expr(init, used),
            BlockItem::D(VarDecl { init: None, .. }) => {}
            BlockItem::S(stmt) => collect_stmt(stmt, used),
        }
    }
}

fn collect_stmt<'a>(stmt: &'a Stmt, used: &mut HashSet<&'a str>) {
    match stmt {
        Stmt::Expression { expr } | Stmt::Return { expr } => collect_expr(expr, used),
        Stmt::If {
            condition,
            then,
            otherwise,
        } => {
            collect_expr(condition, used);
            collect_stmt(then, used);
            if let Some(otherwise) = otherwise {
                collect_stmt(otherwise, used);
            }
        }
        Stmt::While { condition, body } => {
            collect_expr(condition, used);
            collect_stmt(body, used);
        }
        Stmt::Compound { block } => collect_block(block, used),
        Stmt::Null => {}
    }
}

fn collect_expr<'a>(expr: &'a Expr, used: &mut HashSet<&'a str>) {
    match expr {
        Expr::Constant(_) => {}
        Expr::Var(name) => {
            used.insert(name);
        }
        Expr::Assignment { target, value } => {
            used.insert(target);
            collect_expr(value, used);
        }
        Expr::FunctionCall { args, .. } => args.iter().for_each(|arg| collect_expr(arg, used)),
        Expr::Binary { left, right, .. } => {
            collect_expr(left, used);
            collect_expr(right, used);
        }
        Expr::Unary { operand, .. } => collect_expr(operand, used),
    }
}

fn write_func<W: Write>(writer: &mut W, func: &FuncDecl, globals: &[&str]) -> IOResult {
    writeln!(writer, "def {}({}):", func.name, func.params.iter().join(", "))?;

    let indent = INDENT_WIDTH;

    for global in globals {
        writeln!(writer, "{:indent$}global {}", "", global, indent = indent)?;
    }

    if globals.is_empty() && renders_empty(&func.body) {
        write_pass(writer, indent)?;
    } else {
        write_block(writer, &func.body, indent)?;
    }

    writeln!(writer)?;

    Ok(())
}

fn write_var<W: Write>(writer: &mut W, var: &VarDecl, indent: usize) -> IOResult {
    match &var.init {
        Some(init) => writeln!(
            writer,
            "{:indent$}{} = ( {} )",
            "",
            var.name,
            format_expr(init),
            indent = indent
        ),
        None => writeln!(writer, "{:indent$}{} = 0", "", var.name, indent = indent),
    }
}

/// Items of a block at the same depth; nested blocks are flattened into their parent
fn write_block<W: Write>(writer: &mut W, block: &Block, indent: usize) -> IOResult {
    for item in &block.items {
        match item {
            BlockItem::D(var) => write_var(writer, var, indent)?,
            BlockItem::S(stmt) => write_stmt(writer, stmt, indent)?,
        }
    }

    Ok(())
}

fn write_stmt<W: Write>(writer: &mut W, stmt: &Stmt, indent: usize) -> IOResult {
    match stmt {
        Stmt::Expression { expr } => {
            writeln!(writer, "{:indent$}{}", "", format_stmt_expr(expr), indent = indent)
        }
        Stmt::Return { expr } => writeln!(
            writer,
            "{:indent$}return {}",
            "",
            format_expr(expr),
            indent = indent
        ),
        Stmt::If {
            condition,
            then,
            otherwise,
        } => {
            writeln!(
                writer,
                "{:indent$}if {}:",
                "",
                format_expr(condition),
                indent = indent
            )?;
            write_body(writer, then, indent + INDENT_WIDTH)?;

            if let Some(otherwise) = otherwise {
                writeln!(writer, "{:indent$}else:", "", indent = indent)?;
                write_body(writer, otherwise, indent + INDENT_WIDTH)?;
            }

            Ok(())
        }
        Stmt::While { condition, body } => {
            writeln!(
                writer,
                "{:indent$}while {}:",
                "",
                format_expr(condition),
                indent = indent
            )?;
            write_body(writer, body, indent + INDENT_WIDTH)
        }
        Stmt::Compound { block } => write_block(writer, block, indent),
        Stmt::Null => write_pass(writer, indent),
    }
}

/// The indented suite under an `if`, `else` or `while` header; never empty
fn write_body<W: Write>(writer: &mut W, body: &Stmt, indent: usize) -> IOResult {
    match body {
        Stmt::Compound { block } if renders_empty(block) => write_pass(writer, indent),
        _ => write_stmt(writer, body, indent),
    }
}

fn write_pass<W: Write>(writer: &mut W, indent: usize) -> IOResult {
    writeln!(writer, "{:indent$}pass", "", indent = indent)
}

fn renders_empty(block: &Block) -> bool {
    block.items.iter().all(|item| {
        matches!(item, BlockItem::S(Stmt::Compound { block }) if renders_empty(block))
    })
}

/// Assignment at statement level binds directly, anywhere else it needs `:=`
fn format_stmt_expr(expr: &Expr) -> String {
    match expr {
        Expr::Assignment { target, value } => format!("{} = ( {} )", target, format_expr(value)),
        _ => format_expr(expr),
    }
}

fn format_expr(expr: &Expr) -> String {
    match expr {
        Expr::Constant(val) => val.to_string(),
        Expr::Var(name) => name.clone(),
        Expr::Assignment { target, value } => {
            format!("( {} := ( {} ) )", target, format_expr(value))
        }
        Expr::FunctionCall { name, args } if args.is_empty() => format!("{}()", name),
        Expr::FunctionCall { name, args } => {
            format!("{} ( {} )", name, args.iter().map(format_expr).join(", "))
        }
        // floor division would round negative quotients the wrong way
        Expr::Binary {
            op: BinaryOp::Divide,
            left,
            right,
        } => format!("int( {} / {} )", format_expr(left), format_expr(right)),
        Expr::Binary { op, left, right } => format!(
            "( {} {} {} )",
            format_expr(left),
            format_binary(op),
            format_expr(right)
        ),
        Expr::Unary { op, operand } => {
            format!("( {} {} )", format_unary(op), format_expr(operand))
        }
    }
}

fn format_unary(op: &UnaryOp) -> &'static str {
    match op {
        UnaryOp::Not => "not",
        UnaryOp::BitwiseNot => "~",
    }
}

fn format_binary(op: &BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Subtract => "-",
        BinaryOp::Multiply => "*",
        BinaryOp::Divide => "/",
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
        BinaryOp::Equal => "==",
        BinaryOp::NotEqual => "!=",
        BinaryOp::Less => "<",
        BinaryOp::LessEqual => "<=",
        BinaryOp::Greater => ">",
        BinaryOp::GreaterEqual => ">=",
        BinaryOp::BitwiseAnd => "&",
        BinaryOp::BitwiseOr => "|",
        BinaryOp::BitwiseXor => "^",
        BinaryOp::ShiftLeft => "<<",
        BinaryOp::ShiftRight => ">>",
    }
}
