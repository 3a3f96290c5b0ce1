//! Descenso del AST a representación intermedia.
//!
//! Un único recorrido en profundidad del [`Program`] produce un
//! [`Module`]. Las declaraciones de nivel superior se procesan en
//! orden: cada variable global recibe la siguiente ranura de la tabla
//! global y cada función se desciende con las tablas acumuladas hasta
//! ese punto, por lo cual un nombre declarado después de un sitio de
//! uso no es visible en él.
//!
//! Dentro de una función los registros virtuales se asignan de forma
//! monótona y la tabla de locales es plana: las declaraciones de
//! bloques anidados conviven en un solo espacio de nombres y una
//! redeclaración religa el nombre a un registro nuevo.
//!
//! Los bloques básicos se crean bajo demanda. La rama else de una
//! selección se construye fuera de la cadena principal y se difiere;
//! al cerrar la función se anexan el bloque de retorno y luego las
//! cadenas diferidas, en orden de creación de sus cabezas.

use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::{
    ir::{
        self, Attr, BasicBlock, BlockId, Data, FuncParam, Function, Item, Module, Opcode, Operand,
        Operation, Reg, Ty,
    },
    lex::Identifier,
    parse::{
        BinOp, CompoundStmt, Decl, Expression, FunDecl, Program, ReturnKind, Statement, VarDecl,
        Variable,
    },
    source::Located,
};

pub type Lower<T> = Result<T, Located<SemanticError>>;

/// Error semántico durante el descenso.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SemanticError {
    #[error("Variable `{0}` is not declared at this point")]
    UndefinedVariable(Identifier),

    #[error("Function `{0}` is not declared at this point")]
    UndefinedFunction(Identifier),
}

impl Program {
    /// Desciende el programa completo a un módulo de IR.
    pub fn lower(&self) -> Lower<Module> {
        let mut globals = Globals::default();
        let mut items = Vec::with_capacity(self.decls.len());

        for decl in &self.decls {
            match decl {
                Decl::Var(var) => items.push(Item::Data(globals.define(var))),

                Decl::Fun(fun) => {
                    // El nombre se registra antes de descender el cuerpo,
                    // de modo que la recursión directa resuelve
                    globals.functions.insert(fun.name.as_ref().clone());
                    items.push(Item::Function(lower_function(&globals, fun)?));
                }
            }
        }

        Ok(Module { items })
    }
}

/// Tablas de nivel superior: ranura por variable global y conjunto de
/// funciones declaradas hasta el punto actual.
#[derive(Default)]
struct Globals {
    slots: HashMap<Identifier, u32>,
    functions: HashSet<Identifier>,
}

impl Globals {
    fn define(&mut self, decl: &VarDecl) -> Data {
        let slot = self.slots.len() as u32;
        self.slots.insert(decl.name.as_ref().clone(), slot);

        Data {
            ty: Ty::Int,
            name: decl.name.as_ref().to_string(),
        }
    }
}

/// Estado mutable del descenso de una única función.
struct FuncLowering<'a> {
    globals: &'a Globals,
    table: HashMap<Identifier, Reg>,
    next_reg: u32,
    blocks: Vec<BasicBlock>,
    chain: Vec<BlockId>,
    pending: Vec<Vec<BlockId>>,
    ret: BlockId,
}

impl<'a> FuncLowering<'a> {
    fn new(globals: &'a Globals) -> Self {
        FuncLowering {
            globals,
            table: HashMap::new(),
            next_reg: 0,
            blocks: Vec::new(),
            chain: Vec::new(),
            pending: Vec::new(),
            ret: BlockId(0),
        }
    }

    /// Asigna el siguiente registro virtual.
    fn fresh(&mut self) -> Reg {
        let reg = Reg(self.next_reg);
        self.next_reg += 1;
        reg
    }

    /// Crea un bloque vacío con el siguiente identificador denso.
    fn block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock {
            id,
            ops: Vec::new(),
        });

        id
    }

    /// Agrega una operación al final del bloque actual.
    fn emit(&mut self, operation: Operation) {
        let current = *self.chain.last().expect("emit with no current block");
        self.blocks[current.0 as usize].ops.push(operation);
    }
}

fn lower_function(globals: &Globals, fun: &FunDecl) -> Lower<Function> {
    let mut cx = FuncLowering::new(globals);

    // Los parámetros ligan los registros 0..k-1 en orden de declaración
    let params = fun
        .params
        .iter()
        .map(|param| {
            let reg = cx.fresh();
            cx.table.insert(param.name.as_ref().clone(), reg);

            FuncParam {
                name: param.name.as_ref().to_string(),
                reg,
            }
        })
        .collect();

    let entry = cx.block();
    cx.ret = cx.block();
    cx.chain.push(entry);

    let first = cx.block();
    cx.chain.push(first);

    lower_compound(&mut cx, &fun.body)?;

    // Disposición final: cadena principal, bloque de retorno, cadenas
    // diferidas en orden de creación de sus cabezas
    let ret = cx.ret;
    cx.chain.push(ret);

    cx.pending.sort_by_key(|chain| chain[0]);
    let pending = std::mem::take(&mut cx.pending);
    for chain in pending {
        cx.chain.extend(chain);
    }

    let mut arena: Vec<Option<BasicBlock>> = cx.blocks.into_iter().map(Some).collect();
    let blocks = cx
        .chain
        .iter()
        .map(|id| arena[id.0 as usize].take().expect("block laid out twice"))
        .collect();

    let returns = match fun.returns {
        ReturnKind::Int => Ty::Int,
        ReturnKind::Void => Ty::Void,
    };

    Ok(Function {
        name: fun.name.as_ref().to_string(),
        returns,
        params,
        locals: cx
            .table
            .iter()
            .map(|(name, &reg)| (name.to_string(), reg))
            .collect(),
        blocks,
        return_block: ret,
    })
}

fn lower_statement(cx: &mut FuncLowering<'_>, statement: &Statement) -> Lower<()> {
    match statement {
        Statement::Expression(None) => Ok(()),
        Statement::Expression(Some(expression)) => {
            lower_expression(cx, expression).map(|_| ())
        }

        Statement::Compound(body) => lower_compound(cx, body),

        Statement::Selection {
            condition,
            consequent,
            alternative,
        } => lower_selection(cx, condition, consequent, alternative.as_deref()),

        Statement::Iteration { condition, body } => lower_iteration(cx, condition, body),

        Statement::Return(value) => lower_return(cx, value.as_ref()),
    }
}

fn lower_compound(cx: &mut FuncLowering<'_>, body: &CompoundStmt) -> Lower<()> {
    // Tabla plana: las locales de cualquier profundidad se insertan en
    // el único espacio de nombres de la función
    for decl in &body.locals {
        let reg = cx.fresh();
        cx.table.insert(decl.name.as_ref().clone(), reg);
    }

    for statement in &body.statements {
        lower_statement(cx, statement)?;
    }

    Ok(())
}

fn lower_selection(
    cx: &mut FuncLowering<'_>,
    condition: &Expression,
    consequent: &Statement,
    alternative: Option<&Statement>,
) -> Lower<()> {
    let cond = lower_expression(cx, condition)?;

    let if_block = cx.block();
    let else_block = alternative.map(|_| cx.block());
    let post_block = cx.block();

    // Si la condición es falsa se salta la rama if
    let target = else_block.unwrap_or(post_block);
    cx.emit(
        Operation::new(Opcode::Beq)
            .src(0, Operand::Register(cond))
            .src(1, Operand::Immediate(0))
            .src(2, Operand::Block(target)),
    );

    cx.chain.push(if_block);
    lower_statement(cx, consequent)?;
    cx.chain.push(post_block);

    if let (Some(else_block), Some(alternative)) = (else_block, alternative) {
        // La rama else se construye fuera de la cadena principal y se
        // difiere hasta el cierre de la función
        let saved = std::mem::replace(&mut cx.chain, vec![else_block]);
        lower_statement(cx, alternative)?;
        cx.emit(Operation::new(Opcode::Jmp).src(0, Operand::Block(post_block)));

        let deferred = std::mem::replace(&mut cx.chain, saved);
        cx.pending.push(deferred);
    }

    Ok(())
}

fn lower_iteration(
    cx: &mut FuncLowering<'_>,
    condition: &Expression,
    body: &Statement,
) -> Lower<()> {
    // No hay bloque de encabezado: la condición se evalúa en el bloque
    // que precede al lazo
    let post_block = cx.block();

    let cond = lower_expression(cx, condition)?;
    cx.emit(
        Operation::new(Opcode::Beq)
            .src(0, Operand::Register(cond))
            .src(1, Operand::Immediate(0))
            .src(2, Operand::Block(post_block)),
    );

    let body_block = cx.block();
    cx.chain.push(body_block);
    lower_statement(cx, body)?;

    // La condición se desciende por segunda vez en la cola del cuerpo,
    // duplicando cualquier efecto secundario que contenga
    let again = lower_expression(cx, condition)?;
    cx.emit(
        Operation::new(Opcode::Bne)
            .src(0, Operand::Register(again))
            .src(1, Operand::Immediate(0))
            .src(2, Operand::Block(body_block)),
    );

    cx.chain.push(post_block);
    Ok(())
}

fn lower_return(cx: &mut FuncLowering<'_>, value: Option<&Expression>) -> Lower<()> {
    if let Some(value) = value {
        let reg = lower_expression(cx, value)?;
        cx.emit(
            Operation::new(Opcode::Assign)
                .dest(Operand::Macro(ir::RET_SLOT))
                .src(0, Operand::Register(reg)),
        );
    }

    // Todo return desemboca en el único bloque terminal de la función
    cx.emit(Operation::new(Opcode::Jmp).src(0, Operand::Block(cx.ret)));
    Ok(())
}

fn lower_expression(cx: &mut FuncLowering<'_>, expression: &Expression) -> Lower<Reg> {
    match expression {
        Expression::Num(value) => {
            let reg = cx.fresh();
            cx.emit(
                Operation::new(Opcode::Assign)
                    .dest(Operand::Register(reg))
                    .src(0, Operand::Immediate(*value)),
            );

            Ok(reg)
        }

        Expression::Var(variable) => lower_read(cx, variable),

        Expression::Assign { target, value } => lower_assign(cx, target, value),

        Expression::Binary { lhs, op, rhs } => {
            // Ambos operandos se evalúan por completo; ningún operador
            // corta circuito
            let lhs = lower_expression(cx, lhs)?;
            let rhs = lower_expression(cx, rhs)?;

            let dest = cx.fresh();
            cx.emit(
                Operation::new(opcode_for(*op))
                    .dest(Operand::Register(dest))
                    .src(0, Operand::Register(lhs))
                    .src(1, Operand::Register(rhs)),
            );

            Ok(dest)
        }

        Expression::Call { callee, args } => lower_call(cx, callee, args),
    }
}

fn lower_read(cx: &mut FuncLowering<'_>, variable: &Variable) -> Lower<Reg> {
    // Esta IR no tiene operaciones de direccionamiento: un acceso
    // indexado se resuelve igual que la referencia a su base
    let name = variable.name.as_ref();

    if let Some(&reg) = cx.table.get(name) {
        // El registro de una local es siempre su valor vigente
        return Ok(reg);
    }

    if cx.globals.slots.contains_key(name) {
        let reg = cx.fresh();
        cx.emit(
            Operation::new(Opcode::Load)
                .dest(Operand::Register(reg))
                .src(0, Operand::Global(name.to_string())),
        );

        Ok(reg)
    } else {
        Err(Located::at(
            SemanticError::UndefinedVariable(name.clone()),
            variable.name.location().clone(),
        ))
    }
}

fn lower_assign(cx: &mut FuncLowering<'_>, target: &Variable, value: &Expression) -> Lower<Reg> {
    let rhs = lower_expression(cx, value)?;
    let name = target.name.as_ref();

    if let Some(&reg) = cx.table.get(name) {
        cx.emit(
            Operation::new(Opcode::Assign)
                .dest(Operand::Register(reg))
                .src(0, Operand::Register(rhs)),
        );

        Ok(reg)
    } else if cx.globals.slots.contains_key(name) {
        // Las globales no tienen registro propio; el valor de la
        // asignación es el registro del lado derecho
        cx.emit(
            Operation::new(Opcode::Store)
                .src(0, Operand::Register(rhs))
                .src(1, Operand::Global(name.to_string())),
        );

        Ok(rhs)
    } else {
        Err(Located::at(
            SemanticError::UndefinedVariable(name.clone()),
            target.name.location().clone(),
        ))
    }
}

fn lower_call(
    cx: &mut FuncLowering<'_>,
    callee: &Located<Identifier>,
    args: &[Expression],
) -> Lower<Reg> {
    if !cx.globals.functions.contains(callee.as_ref()) {
        return Err(Located::at(
            SemanticError::UndefinedFunction(callee.as_ref().clone()),
            callee.location().clone(),
        ));
    }

    for (position, arg) in args.iter().enumerate() {
        let reg = lower_expression(cx, arg)?;
        cx.emit(
            Operation::new(Opcode::Pass)
                .src(0, Operand::Register(reg))
                .attr(Attr::ArgPos(position as u32)),
        );
    }

    cx.emit(
        Operation::new(Opcode::Call)
            .src(0, Operand::Global(callee.as_ref().to_string()))
            .attr(Attr::ArgCount(args.len() as u32)),
    );

    // El valor de retorno viaja por la pseudoubicación dedicada
    let reg = cx.fresh();
    cx.emit(
        Operation::new(Opcode::Assign)
            .dest(Operand::Register(reg))
            .src(0, Operand::Macro(ir::RET_SLOT)),
    );

    Ok(reg)
}

fn opcode_for(op: BinOp) -> Opcode {
    match op {
        BinOp::Add => Opcode::Add,
        BinOp::Sub => Opcode::Sub,
        BinOp::Mul => Opcode::Mul,
        BinOp::Div => Opcode::Div,
        BinOp::Lt => Opcode::Lt,
        BinOp::Lte => Opcode::Lte,
        BinOp::Gt => Opcode::Gt,
        BinOp::Gte => Opcode::Gte,
        BinOp::Eq => Opcode::Eq,
        BinOp::Neq => Opcode::Neq,
    }
}
