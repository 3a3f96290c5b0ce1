//! Representación intermedia.
//!
//! Un [`Module`] contiene datos globales y funciones en orden de
//! declaración. Cada función es una secuencia de bloques básicos de
//! operaciones de tres direcciones sobre registros virtuales. Los
//! sucesores de un bloque no se representan aparte: están codificados
//! únicamente en los operandos de bloque de sus saltos.

use std::{
    collections::HashMap,
    fmt::{self, Display},
};

/// Nombre de la pseudoubicación que transporta el valor de retorno.
pub const RET_SLOT: &str = "RetReg";

/// Cantidad de ranuras de operando fuente por operación.
pub const SRC_SLOTS: usize = 3;

/// Registro virtual, denso desde 0 dentro de cada función.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Reg(pub u32);

impl Display for Reg {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "r{}", self.0)
    }
}

/// Identificador de bloque básico, denso en orden de creación.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl Display for BlockId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "b{}", self.0)
    }
}

/// Los dos tipos del lenguaje.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Ty {
    Int,
    Void,
}

impl Display for Ty {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Int => fmt.write_str("int"),
            Ty::Void => fmt.write_str("void"),
        }
    }
}

/// Operando de una operación.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    /// Registro virtual.
    Register(Reg),

    /// Constante entera.
    Immediate(i32),

    /// Destino de salto.
    Block(BlockId),

    /// Dato global o función, por nombre.
    Global(String),

    /// Pseudoubicación simbólica, como [`RET_SLOT`].
    Macro(&'static str),
}

impl Display for Operand {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(reg) => reg.fmt(fmt),
            Operand::Immediate(value) => value.fmt(fmt),
            Operand::Block(block) => block.fmt(fmt),
            Operand::Global(name) => write!(fmt, "@{}", name),
            Operand::Macro(name) => write!(fmt, "%{}", name),
        }
    }
}

/// Código de operación.
///
/// `Beq` salta si su primer operando es igual a cero, `Bne` si es
/// distinto de cero; ambos llevan el destino en la tercera ranura.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Neq,
    Assign,
    Load,
    Store,
    Pass,
    Call,
    Beq,
    Bne,
    Jmp,
}

impl Display for Opcode {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Opcode::*;

        let string = match self {
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Lt => "lt",
            Lte => "lte",
            Gt => "gt",
            Gte => "gte",
            Eq => "eq",
            Neq => "neq",
            Assign => "assign",
            Load => "load",
            Store => "store",
            Pass => "pass",
            Call => "call",
            Beq => "beq",
            Bne => "bne",
            Jmp => "jmp",
        };

        fmt.write_str(string)
    }
}

/// Atributo opcional de una operación.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Attr {
    /// Posición de un argumento, desde 0.
    ArgPos(u32),

    /// Cantidad de argumentos de una llamada.
    ArgCount(u32),
}

impl Display for Attr {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attr::ArgPos(position) => write!(fmt, "arg={}", position),
            Attr::ArgCount(count) => write!(fmt, "argc={}", count),
        }
    }
}

/// Operación de tres direcciones: una ranura de destino y hasta
/// [`SRC_SLOTS`] ranuras de fuente.
#[derive(Clone, Debug)]
pub struct Operation {
    pub opcode: Opcode,
    pub dest: Option<Operand>,
    pub srcs: [Option<Operand>; SRC_SLOTS],
    pub attr: Option<Attr>,
}

impl Operation {
    pub fn new(opcode: Opcode) -> Self {
        Operation {
            opcode,
            dest: None,
            srcs: [None, None, None],
            attr: None,
        }
    }

    pub fn dest(mut self, operand: Operand) -> Self {
        self.dest = Some(operand);
        self
    }

    pub fn src(mut self, slot: usize, operand: Operand) -> Self {
        self.srcs[slot] = Some(operand);
        self
    }

    pub fn attr(mut self, attr: Attr) -> Self {
        self.attr = Some(attr);
        self
    }
}

/// Secuencia lineal de operaciones que termina en a lo sumo un salto.
#[derive(Debug)]
pub struct BasicBlock {
    pub id: BlockId,
    pub ops: Vec<Operation>,
}

/// Parámetro formal ligado a su registro.
#[derive(Debug)]
pub struct FuncParam {
    pub name: String,
    pub reg: Reg,
}

/// Función descendida.
///
/// `blocks` está en el orden final de disposición: marcador de entrada,
/// cadena principal, el bloque de retorno (exactamente una vez) y las
/// cadenas diferidas. `locals` es la tabla plana de la función, que
/// incluye a los parámetros.
#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub returns: Ty,
    pub params: Vec<FuncParam>,
    pub locals: HashMap<String, Reg>,
    pub blocks: Vec<BasicBlock>,
    pub return_block: BlockId,
}

impl Function {
    /// Busca un bloque por identificador.
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.iter().find(|block| block.id == id)
    }
}

/// Dato global. El lenguaje solo tiene datos enteros.
#[derive(Debug)]
pub struct Data {
    pub ty: Ty,
    pub name: String,
}

/// Elemento de un módulo, en orden de declaración.
#[derive(Debug)]
pub enum Item {
    Data(Data),
    Function(Function),
}

/// Unidad completa de compilación.
#[derive(Debug)]
pub struct Module {
    pub items: Vec<Item>,
}

impl Module {
    /// Busca una función por nombre.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.items.iter().find_map(|item| match item {
            Item::Function(function) if function.name == name => Some(function),
            _ => None,
        })
    }

    /// Itera los datos globales en orden de declaración.
    pub fn globals(&self) -> impl Iterator<Item = &Data> {
        self.items.iter().filter_map(|item| match item {
            Item::Data(data) => Some(data),
            _ => None,
        })
    }
}
