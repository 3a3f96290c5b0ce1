//! Volcado textual de AST e IR.
//!
//! Ambos formatos existen únicamente para diagnóstico y comparación
//! contra archivos dorados: son estables para una misma entrada, una
//! línea por constructo u hoja, y no están pensados para re-análisis.
//! El recorrido es preorden en profundidad con una unidad de sangría
//! de cuatro espacios por nivel.

use std::io::{self, Write};

use crate::{
    ir,
    parse::{CompoundStmt, Decl, Expression, FunDecl, Program, Statement, VarDecl, Variable},
};

const INDENT: &str = "    ";

/// Escribe el árbol sintáctico completo.
pub fn ast<W: Write>(program: &Program, output: &mut W) -> io::Result<()> {
    writeln!(output, "Program {{")?;
    for decl in &program.decls {
        match decl {
            Decl::Var(var) => var_decl(var, "", output)?,
            Decl::Fun(fun) => fun_decl(fun, "", output)?,
        }
    }

    writeln!(output, "}}")
}

fn var_decl<W: Write>(node: &VarDecl, parent: &str, output: &mut W) -> io::Result<()> {
    let here = format!("{}{}", parent, INDENT);
    writeln!(output, "{}int", here)?;

    match node.size {
        None => writeln!(output, "{}{}{}", INDENT, here, node.name.as_ref()),
        Some(size) => {
            writeln!(output, "{}{}{} [", INDENT, here, node.name.as_ref())?;
            writeln!(output, "{}{}{}{}", INDENT, INDENT, here, size)?;
            writeln!(output, "{}{}]", INDENT, here)
        }
    }
}

fn fun_decl<W: Write>(node: &FunDecl, parent: &str, output: &mut W) -> io::Result<()> {
    let here = format!("{}{}", parent, INDENT);
    writeln!(output, "{}function {}", here, node.returns)?;
    writeln!(output, "{}{}{}", INDENT, here, node.name.as_ref())?;

    writeln!(output, "{}{}Params (", here, INDENT)?;
    for param in &node.params {
        let array = if param.array { "[]" } else { "" };
        writeln!(
            output,
            "{}{}{}int {}{}",
            INDENT,
            here,
            INDENT,
            param.name.as_ref(),
            array
        )?;
    }
    writeln!(output, "{}{})", here, INDENT)?;

    compound(&node.body, &here, output)
}

fn compound<W: Write>(node: &CompoundStmt, parent: &str, output: &mut W) -> io::Result<()> {
    let here = format!("{}{}", parent, INDENT);
    writeln!(output, "{}{{", here)?;

    for decl in &node.locals {
        var_decl(decl, &here, output)?;
    }

    for statement in &node.statements {
        self::statement(statement, &here, output)?;
    }

    writeln!(output, "{}}}", here)
}

fn statement<W: Write>(node: &Statement, parent: &str, output: &mut W) -> io::Result<()> {
    match node {
        // La sentencia vacía no deja rastro en el árbol
        Statement::Expression(None) => Ok(()),
        Statement::Expression(Some(inner)) => expression(inner, parent, output),

        Statement::Compound(body) => compound(body, parent, output),

        Statement::Selection {
            condition,
            consequent,
            alternative,
        } => {
            let here = format!("{}{}", INDENT, parent);
            writeln!(output, "{}if (", here)?;
            expression(condition, &here, output)?;
            writeln!(output, "{})", here)?;
            statement(consequent, &here, output)?;

            if let Some(alternative) = alternative {
                writeln!(output, "{}else", here)?;
                statement(alternative, &here, output)?;
            }

            Ok(())
        }

        Statement::Iteration { condition, body } => {
            let here = format!("{}{}", INDENT, parent);
            writeln!(output, "{}while", here)?;
            writeln!(output, "{}(", here)?;
            expression(condition, &here, output)?;
            writeln!(output, "{})", here)?;
            statement(body, &here, output)
        }

        Statement::Return(value) => {
            let here = format!("{}{}", INDENT, parent);
            writeln!(output, "{}return", here)?;
            if let Some(value) = value {
                expression(value, &here, output)?;
            }

            Ok(())
        }
    }
}

fn expression<W: Write>(node: &Expression, parent: &str, output: &mut W) -> io::Result<()> {
    match node {
        Expression::Assign { target, value } => {
            let here = format!("{}{}", INDENT, parent);
            writeln!(output, "{}=", here)?;
            variable(target, &here, output)?;
            expression(value, &here, output)
        }

        Expression::Binary { lhs, op, rhs } => {
            let here = format!("{}{}", parent, INDENT);
            writeln!(output, "{}{}", here, op)?;
            expression(lhs, &here, output)?;
            expression(rhs, &here, output)
        }

        Expression::Call { callee, args } => {
            let here = format!("{}{}", INDENT, parent);
            writeln!(output, "{}{}", here, callee.as_ref())?;
            writeln!(output, "{}(", here)?;
            for arg in args {
                expression(arg, &here, output)?;
            }
            writeln!(output, "{})", here)
        }

        Expression::Num(value) => writeln!(output, "{}{}{}", INDENT, parent, value),

        Expression::Var(var) => variable(var, parent, output),
    }
}

fn variable<W: Write>(node: &Variable, parent: &str, output: &mut W) -> io::Result<()> {
    let here = format!("{}{}", INDENT, parent);
    match &node.index {
        None => writeln!(output, "{}{}", here, node.name.as_ref()),
        Some(index) => {
            writeln!(output, "{}{} [", here, node.name.as_ref())?;
            expression(index, &here, output)?;
            writeln!(output, "{}]", here)
        }
    }
}

/// Escribe un módulo de IR completo.
pub fn module<W: Write>(module: &ir::Module, output: &mut W) -> io::Result<()> {
    for item in &module.items {
        match item {
            ir::Item::Data(data) => writeln!(output, "global {} {}", data.ty, data.name)?,
            ir::Item::Function(function) => self::function(function, output)?,
        }
    }

    Ok(())
}

fn function<W: Write>(function: &ir::Function, output: &mut W) -> io::Result<()> {
    let params = function
        .params
        .iter()
        .map(|param| format!("{}:{}", param.name, param.reg))
        .collect::<Vec<_>>()
        .join(", ");

    writeln!(
        output,
        "function {} {}({})",
        function.returns, function.name, params
    )?;

    for block in &function.blocks {
        writeln!(output, "  block {}:", block.id.0)?;
        for op in &block.ops {
            operation(op, output)?;
        }
    }

    Ok(())
}

fn operation<W: Write>(op: &ir::Operation, output: &mut W) -> io::Result<()> {
    let mut operands = Vec::new();
    operands.extend(op.dest.iter().map(|operand| operand.to_string()));
    operands.extend(op.srcs.iter().flatten().map(|operand| operand.to_string()));

    write!(output, "    {}", op.opcode)?;
    if !operands.is_empty() {
        write!(output, " {}", operands.join(", "))?;
    }

    if let Some(attr) = &op.attr {
        write!(output, " ; {}", attr)?;
    }

    writeln!(output)
}
