use std::collections::{HashMap, HashSet};

use log::debug;

use ast::*;
use symbols::{LookupError, SymbolTable};
use unique_ident::LabelGenerator;

use crate::sem_err::{SemErr, SemanticResult};

// source name -> (name in the frame table, declared in the innermost scope)
#[derive(Clone)]
struct IdentEntry {
    unique_name: String,
    from_current_scope: bool,
}

type IdentMap = HashMap<String, IdentEntry>;

/// Add a file scope variable to the program wide table
pub fn declare_global(var: &VarDecl, globals: &mut SymbolTable) -> SemanticResult<()> {
    if globals.contains(&var.name) {
        return Err(SemErr::new(format!(
            "Conflicting global declarations for variable: '{}'",
            var.name
        )));
    }

    globals.declare_global(var.name.clone());
    Ok(())
}

/// Declaration/scope pass for one function.
///
/// Builds the function's frame table (visible globals, parameters, then every local in
/// declaration order, nested blocks spliced in with `merge_all`) and resolves each variable
/// reference in `func` to its key in that table. A local whose name is already taken in the
/// table is renamed to a fresh `name.N`, so shadowing survives the single flat frame.
pub fn explore(func: &mut FuncDecl, globals: &SymbolTable) -> SemanticResult<SymbolTable> {
    explore_with(func, globals, LabelGenerator::make_temp_name)
}

/// Same resolution as [`explore`], except that renamed locals are spelled `name_N` so the
/// rewritten function stays valid in languages where `.` cannot appear in a name.
pub fn explore_identifiers(
    func: &mut FuncDecl,
    globals: &SymbolTable,
) -> SemanticResult<SymbolTable> {
    explore_with(func, globals, LabelGenerator::make_identifier)
}

type Rename = fn(&mut LabelGenerator, &str) -> String;

fn explore_with(
    func: &mut FuncDecl,
    globals: &SymbolTable,
    rename: Rename,
) -> SemanticResult<SymbolTable> {
    let mut explorer = Explorer::new(globals, rename);
    let mut table = SymbolTable::new();
    table.merge_globals(globals);

    // parameters share the scope of the outermost block
    let mut ident_map = explorer.global_map(globals);

    for param in &mut func.params {
        *param = explorer.declare(param, &mut ident_map, &mut table)?;
    }

    explorer.resolve_block_items(&mut func.body, &mut ident_map, &mut table)?;

    debug!(
        "explored '{}': {} bytes of locals",
        func.name,
        table.frame_size()
    );

    Ok(table)
}

struct Explorer {
    taken: HashSet<String>,
    names: LabelGenerator,
    rename: Rename,
}

impl Explorer {
    fn new(globals: &SymbolTable, rename: Rename) -> Self {
        Self {
            taken: globals.globals().cloned().collect(),
            names: LabelGenerator::new(),
            rename,
        }
    }

    fn global_map(&self, globals: &SymbolTable) -> IdentMap {
        globals
            .globals()
            .map(|name| {
                (
                    name.clone(),
                    IdentEntry {
                        unique_name: name.clone(),
                        from_current_scope: false,
                    },
                )
            })
            .collect()
    }

    fn declare(
        &mut self,
        name: &str,
        ident_map: &mut IdentMap,
        table: &mut SymbolTable,
    ) -> SemanticResult<String> {
        if let Some(prev_entry) = ident_map.get(name) {
            if prev_entry.from_current_scope {
                return Err(SemErr::new(format!(
                    "Conflicting local declarations for variable: '{}'",
                    name
                )));
            }
        }

        let mut unique_name = name.to_string();
        while self.taken.contains(&unique_name) {
            unique_name = (self.rename)(&mut self.names, name);
        }

        self.taken.insert(unique_name.clone());
        ident_map.insert(
            name.to_string(),
            IdentEntry {
                unique_name: unique_name.clone(),
                from_current_scope: true,
            },
        );
        table.declare_local(unique_name.clone());

        Ok(unique_name)
    }

    fn resolve_block_items(
        &mut self,
        block: &mut Block,
        ident_map: &mut IdentMap,
        table: &mut SymbolTable,
    ) -> SemanticResult<()> {
        for item in &mut block.items {
            match item {
                BlockItem::D(var) => {
                    var.name = self.declare(&var.name, ident_map, table)?;

                    if let Some(init) = &mut var.init {
                        resolve_expr(init, ident_map)?;
                    }
                }
                BlockItem::S(stmt) => self.resolve_stmt(stmt, ident_map, table)?,
            }
        }

        Ok(())
    }

    fn resolve_stmt(
        &mut self,
        stmt: &mut Stmt,
        ident_map: &mut IdentMap,
        table: &mut SymbolTable,
    ) -> SemanticResult<()> {
        match stmt {
            Stmt::Expression { expr } | Stmt::Return { expr } => resolve_expr(expr, ident_map),
            Stmt::If {
                condition,
                then,
                otherwise,
            } => {
                resolve_expr(condition, ident_map)?;
                self.resolve_stmt(then, ident_map, table)?;

                if let Some(otherwise) = otherwise {
                    self.resolve_stmt(otherwise, ident_map, table)?;
                }

                Ok(())
            }
            Stmt::While { condition, body } => {
                resolve_expr(condition, ident_map)?;
                self.resolve_stmt(body, ident_map, table)
            }
            Stmt::Compound { block } => {
                let mut inner_map = copy_ident_map(ident_map);
                let mut inner_table = SymbolTable::new();

                self.resolve_block_items(block, &mut inner_map, &mut inner_table)?;

                let shift = table.next_offset();
                table.merge_all(inner_table, shift);

                Ok(())
            }
            Stmt::Null => Ok(()),
        }
    }
}

fn resolve_expr(expr: &mut Expr, ident_map: &IdentMap) -> SemanticResult<()> {
    match expr {
        Expr::Constant(_) => Ok(()),
        Expr::Var(name) => {
            *name = resolve_name(name, ident_map)?;
            Ok(())
        }
        Expr::Assignment { target, value } => {
            *target = resolve_name(target, ident_map)?;
            resolve_expr(value, ident_map)
        }
        Expr::FunctionCall { args, .. } => {
            for arg in args {
                resolve_expr(arg, ident_map)?;
            }
            Ok(())
        }
        Expr::Binary { left, right, .. } => {
            resolve_expr(left, ident_map)?;
            resolve_expr(right, ident_map)
        }
        Expr::Unary { operand, .. } => resolve_expr(operand, ident_map),
    }
}

fn resolve_name(name: &str, ident_map: &IdentMap) -> SemanticResult<String> {
    match ident_map.get(name) {
        Some(entry) => Ok(entry.unique_name.clone()),
        None => Err(LookupError::Undeclared(name.to_string()).into()),
    }
}

fn copy_ident_map(ident_map: &IdentMap) -> IdentMap {
    ident_map
        .iter()
        .map(|(name, entry)| {
            (
                name.clone(),
                IdentEntry {
                    unique_name: entry.unique_name.clone(),
                    from_current_scope: false,
                },
            )
        })
        .collect()
}
