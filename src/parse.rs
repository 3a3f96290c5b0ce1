//! Análisis sintáctico.
//!
//! Implementa un parser descendente recursivo predictivo (LL(1)) para
//! la gramática de C-minus, con un procedimiento por no terminal y un
//! solo token de lookahead. Las dos ambigüedades clásicas de la
//! gramática se resuelven por lookahead diferido:
//!
//! - Una declaración que comienza con `void` es siempre una función;
//!   una que comienza con `int ID` se decide con el siguiente token
//!   (`(` función, `[` o `;` variable).
//! - Un identificador en posición de expresión puede continuar como
//!   asignación, indexación, llamada o referencia simple según el
//!   token que le sigue.
//!
//! Los operadores relacionales admiten una única aplicación por nivel
//! (`a < b < c` es un error sintáctico), mientras que los aditivos y
//! multiplicativos asocian a la izquierda y la asignación asocia a la
//! derecha. El primer token que no calza con la gramática aborta el
//! análisis completo; no hay sincronización ni recuperación.

use std::fmt::{self, Display};
use thiserror::Error;

use crate::{
    lex::{Identifier, Keyword, Token, Tokens},
    source::Located,
};

/// Raíz del árbol sintáctico: las declaraciones en orden de aparición.
#[derive(Debug)]
pub struct Program {
    pub decls: Vec<Decl>,
}

/// Declaración de nivel superior.
#[derive(Debug)]
pub enum Decl {
    Var(VarDecl),
    Fun(FunDecl),
}

/// Declaración de variable, escalar o arreglo de tamaño fijo.
#[derive(Debug)]
pub struct VarDecl {
    pub name: Located<Identifier>,
    pub size: Option<i32>,
}

/// Declaración de función.
#[derive(Debug)]
pub struct FunDecl {
    pub returns: ReturnKind,
    pub name: Located<Identifier>,
    pub params: Vec<Param>,
    pub body: CompoundStmt,
}

/// Parámetro formal. `array` indica la forma `int x[]`.
#[derive(Debug)]
pub struct Param {
    pub name: Located<Identifier>,
    pub array: bool,
}

/// Tipo de retorno de una función.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReturnKind {
    Int,
    Void,
}

impl Display for ReturnKind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnKind::Int => fmt.write_str("int"),
            ReturnKind::Void => fmt.write_str("void"),
        }
    }
}

/// Sentencia.
#[derive(Debug)]
pub enum Statement {
    /// Expresión seguida de `;`. `None` es la sentencia vacía `;`.
    Expression(Option<Expression>),

    Compound(CompoundStmt),

    Selection {
        condition: Expression,
        consequent: Box<Statement>,
        alternative: Option<Box<Statement>>,
    },

    Iteration {
        condition: Expression,
        body: Box<Statement>,
    },

    Return(Option<Expression>),
}

/// Bloque `{ ... }` con declaraciones locales al frente.
#[derive(Debug)]
pub struct CompoundStmt {
    pub locals: Vec<VarDecl>,
    pub statements: Vec<Statement>,
}

/// Expresión.
#[derive(Debug)]
pub enum Expression {
    /// Asignación. El destino es siempre un identificador simple o
    /// indexado; la gramática no admite otra cosa a la izquierda.
    Assign {
        target: Variable,
        value: Box<Expression>,
    },

    Binary {
        lhs: Box<Expression>,
        op: BinOp,
        rhs: Box<Expression>,
    },

    Call {
        callee: Located<Identifier>,
        args: Vec<Expression>,
    },

    Num(i32),

    Var(Variable),
}

/// Referencia a una variable, con índice opcional.
#[derive(Debug)]
pub struct Variable {
    pub name: Located<Identifier>,
    pub index: Option<Box<Expression>>,
}

/// Operador binario.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
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
}

impl Display for BinOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use BinOp::*;

        let string = match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Lt => "<",
            Lte => "<=",
            Gt => ">",
            Gte => ">=",
            Eq => "==",
            Neq => "!=",
        };

        fmt.write_str(string)
    }
}

/// Error de análisis sintáctico.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SyntaxError {
    #[error("Expected {0}, found {1}")]
    UnexpectedToken(Token, Token),

    #[error("Expected an identifier, found {0}")]
    ExpectedId(Token),

    #[error("Expected an integer literal, found {0}")]
    ExpectedNumber(Token),

    #[error("Expected `int` or `void` to begin a declaration, found {0}")]
    ExpectedDeclaration(Token),

    #[error("Expected `;`, `[` or `(` after the declared name, found {0}")]
    BadDeclaration(Token),

    #[error("Expected `int`, `void` or `)` in parameter list, found {0}")]
    ExpectedParams(Token),

    #[error("Expected the beginning of a statement, found {0}")]
    ExpectedStatement(Token),

    #[error("Expected an expression, found {0}")]
    ExpectedExpression(Token),

    #[error("Expected `;`, `)`, `]` or `,` after expression, found {0}")]
    ExpectedExpressionEnd(Token),
}

/// Deriva el árbol sintáctico de un programa completo.
pub fn parse(tokens: Tokens) -> Result<Program, Located<SyntaxError>> {
    Parser { tokens }.program()
}

type Parse<T> = Result<T, Located<SyntaxError>>;

struct Parser {
    tokens: Tokens,
}

impl Parser {
    fn program(mut self) -> Parse<Program> {
        // program -> decl {decl} EOF; un programa vacío no es válido
        let mut decls = vec![self.declaration()?];

        while self.check(&Token::Keyword(Keyword::Int)) || self.check(&Token::Keyword(Keyword::Void))
        {
            decls.push(self.declaration()?);
        }

        self.expect(Token::Eof)?;
        Ok(Program { decls })
    }

    fn declaration(&mut self) -> Parse<Decl> {
        // decl -> void ID fun-decl | int ID decl'
        match self.peek() {
            Token::Keyword(Keyword::Void) => {
                self.advance();
                let name = self.ident()?;
                self.function(ReturnKind::Void, name).map(Decl::Fun)
            }

            Token::Keyword(Keyword::Int) => {
                self.advance();
                let name = self.ident()?;
                self.declaration_tail(name)
            }

            other => {
                let error = SyntaxError::ExpectedDeclaration(other.clone());
                self.fail(error)
            }
        }
    }

    fn declaration_tail(&mut self, name: Located<Identifier>) -> Parse<Decl> {
        // decl' -> var-decl | fun-decl, decidido por el siguiente token
        match self.peek() {
            Token::OpenBracket | Token::Semicolon => self.var_decl(name).map(Decl::Var),
            Token::OpenParen => self.function(ReturnKind::Int, name).map(Decl::Fun),

            other => {
                let error = SyntaxError::BadDeclaration(other.clone());
                self.fail(error)
            }
        }
    }

    fn var_decl(&mut self, name: Located<Identifier>) -> Parse<VarDecl> {
        // var-decl -> ["[" NUM "]"] ";"
        let size = if self.check(&Token::OpenBracket) {
            self.advance();
            let size = self.number()?;
            self.expect(Token::CloseBracket)?;
            Some(size.into_inner())
        } else {
            None
        };

        self.expect(Token::Semicolon)?;
        Ok(VarDecl { name, size })
    }

    fn function(&mut self, returns: ReturnKind, name: Located<Identifier>) -> Parse<FunDecl> {
        // fun-decl -> "(" params ")" compound-stmt
        self.expect(Token::OpenParen)?;
        let params = self.params()?;
        self.expect(Token::CloseParen)?;
        let body = self.compound_statement()?;

        Ok(FunDecl {
            returns,
            name,
            params,
            body,
        })
    }

    fn params(&mut self) -> Parse<Vec<Param>> {
        // params -> param-list | void | ε
        match self.peek() {
            Token::Keyword(Keyword::Int) => self.param_list(),

            Token::Keyword(Keyword::Void) => {
                self.advance();
                Ok(Vec::new())
            }

            Token::CloseParen => Ok(Vec::new()),

            other => {
                let error = SyntaxError::ExpectedParams(other.clone());
                self.fail(error)
            }
        }
    }

    fn param_list(&mut self) -> Parse<Vec<Param>> {
        let mut params = vec![self.param()?];
        while self.check(&Token::Comma) {
            self.advance();
            params.push(self.param()?);
        }

        Ok(params)
    }

    fn param(&mut self) -> Parse<Param> {
        // param -> int ID ["[" "]"]
        self.expect(Token::Keyword(Keyword::Int))?;
        let name = self.ident()?;

        let array = if self.check(&Token::OpenBracket) {
            self.advance();
            self.expect(Token::CloseBracket)?;
            true
        } else {
            false
        };

        Ok(Param { name, array })
    }

    fn compound_statement(&mut self) -> Parse<CompoundStmt> {
        // compound-stmt -> "{" local-declarations statement-list "}"
        self.expect(Token::OpenCurly)?;
        let locals = self.local_decls()?;
        let statements = self.statement_list()?;
        self.expect(Token::CloseCurly)?;

        Ok(CompoundStmt { locals, statements })
    }

    fn local_decls(&mut self) -> Parse<Vec<VarDecl>> {
        let mut locals = Vec::new();
        while self.check(&Token::Keyword(Keyword::Int)) {
            self.advance();
            let name = self.ident()?;
            locals.push(self.var_decl(name)?);
        }

        Ok(locals)
    }

    fn statement_list(&mut self) -> Parse<Vec<Statement>> {
        let mut statements = Vec::new();
        while self.starts_statement() {
            statements.push(self.statement()?);
        }

        Ok(statements)
    }

    fn starts_statement(&self) -> bool {
        matches!(
            self.peek(),
            Token::Id(_)
                | Token::IntLiteral(_)
                | Token::OpenParen
                | Token::Semicolon
                | Token::OpenCurly
                | Token::Keyword(Keyword::If)
                | Token::Keyword(Keyword::While)
                | Token::Keyword(Keyword::Return)
        )
    }

    fn statement(&mut self) -> Parse<Statement> {
        match self.peek() {
            Token::Id(_) | Token::IntLiteral(_) | Token::OpenParen | Token::Semicolon => {
                self.expression_statement()
            }

            Token::OpenCurly => self.compound_statement().map(Statement::Compound),
            Token::Keyword(Keyword::If) => self.selection_statement(),
            Token::Keyword(Keyword::While) => self.iteration_statement(),
            Token::Keyword(Keyword::Return) => self.return_statement(),

            other => {
                let error = SyntaxError::ExpectedStatement(other.clone());
                self.fail(error)
            }
        }
    }

    fn expression_statement(&mut self) -> Parse<Statement> {
        // expression-stmt -> [expression] ";"
        let expression = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };

        self.expect(Token::Semicolon)?;
        Ok(Statement::Expression(expression))
    }

    fn selection_statement(&mut self) -> Parse<Statement> {
        // selection-stmt -> if "(" expression ")" statement [else statement]
        //
        // El else ambiguo se asocia al if más cercano: el else de un if
        // anidado se consume antes de volver a este nivel.
        self.expect(Token::Keyword(Keyword::If))?;
        self.expect(Token::OpenParen)?;
        let condition = self.expression()?;
        self.expect(Token::CloseParen)?;
        let consequent = Box::new(self.statement()?);

        let alternative = if self.check(&Token::Keyword(Keyword::Else)) {
            self.advance();
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Statement::Selection {
            condition,
            consequent,
            alternative,
        })
    }

    fn iteration_statement(&mut self) -> Parse<Statement> {
        // iteration-stmt -> while "(" expression ")" statement
        self.expect(Token::Keyword(Keyword::While))?;
        self.expect(Token::OpenParen)?;
        let condition = self.expression()?;
        self.expect(Token::CloseParen)?;
        let body = Box::new(self.statement()?);

        Ok(Statement::Iteration { condition, body })
    }

    fn return_statement(&mut self) -> Parse<Statement> {
        // return-stmt -> return [expression] ";"
        self.expect(Token::Keyword(Keyword::Return))?;

        let value = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };

        self.expect(Token::Semicolon)?;
        Ok(Statement::Return(value))
    }

    fn expression(&mut self) -> Parse<Expression> {
        // expression -> ID expression' | NUM simple-expression'
        //             | "(" expression ")" simple-expression'
        match self.peek() {
            Token::Id(_) => {
                let id = self.ident()?;
                self.expression_tail(id)
            }

            Token::IntLiteral(_) => {
                let num = self.number()?;
                self.simple_tail(Expression::Num(num.into_inner()))
            }

            Token::OpenParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(Token::CloseParen)?;
                self.simple_tail(inner)
            }

            other => {
                let error = SyntaxError::ExpectedExpression(other.clone());
                self.fail(error)
            }
        }
    }

    fn expression_tail(&mut self, id: Located<Identifier>) -> Parse<Expression> {
        // expression' -> "=" expression | "[" expression "]" expression''
        //              | "(" args ")" simple-expression' | simple-expression'
        match self.peek() {
            Token::Assign => {
                self.advance();
                let value = self.expression()?;

                Ok(Expression::Assign {
                    target: Variable {
                        name: id,
                        index: None,
                    },
                    value: Box::new(value),
                })
            }

            Token::OpenBracket => {
                self.advance();
                let index = self.expression()?;
                self.expect(Token::CloseBracket)?;

                let target = Variable {
                    name: id,
                    index: Some(Box::new(index)),
                };

                self.subscript_tail(target)
            }

            Token::OpenParen => {
                let call = self.call(id)?;
                self.simple_tail(call)
            }

            _ => self.simple_tail(Expression::Var(Variable {
                name: id,
                index: None,
            })),
        }
    }

    fn subscript_tail(&mut self, target: Variable) -> Parse<Expression> {
        // expression'' -> "=" expression | simple-expression'
        match self.peek() {
            Token::Assign => {
                self.advance();
                let value = self.expression()?;

                Ok(Expression::Assign {
                    target,
                    value: Box::new(value),
                })
            }

            _ => self.simple_tail(Expression::Var(target)),
        }
    }

    fn simple_tail(&mut self, first: Expression) -> Parse<Expression> {
        // simple-expression' -> additive-expression' [relop additive-expression]
        //
        // El operador relacional se aplica a lo sumo una vez; el chequeo
        // del conjunto follow que sigue rechaza cadenas como `a < b < c`.
        let mut expression = first;

        if self.mul_op().is_some() || self.add_op().is_some() {
            expression = self.additive_tail(expression)?;
        }

        if let Some(op) = self.rel_op() {
            self.advance();
            let rhs = self.additive()?;

            expression = Expression::Binary {
                lhs: Box::new(expression),
                op,
                rhs: Box::new(rhs),
            };
        }

        match self.peek() {
            Token::Semicolon | Token::CloseParen | Token::CloseBracket | Token::Comma => {
                Ok(expression)
            }

            other => {
                let error = SyntaxError::ExpectedExpressionEnd(other.clone());
                self.fail(error)
            }
        }
    }

    fn additive(&mut self) -> Parse<Expression> {
        // additive-expression -> term {addop term}
        let mut lhs = self.term()?;

        while let Some(op) = self.add_op() {
            self.advance();
            let rhs = self.term()?;

            lhs = Expression::Binary {
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    fn additive_tail(&mut self, first: Expression) -> Parse<Expression> {
        // additive-expression' -> term' {addop term}
        let mut lhs = self.term_tail(first)?;

        while let Some(op) = self.add_op() {
            self.advance();
            let rhs = self.term()?;

            lhs = Expression::Binary {
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    fn term(&mut self) -> Parse<Expression> {
        // term -> factor {mulop factor}
        let first = self.factor()?;
        self.term_tail(first)
    }

    fn term_tail(&mut self, first: Expression) -> Parse<Expression> {
        // term' -> {mulop factor}
        let mut lhs = first;

        while let Some(op) = self.mul_op() {
            self.advance();
            let rhs = self.factor()?;

            lhs = Expression::Binary {
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    fn factor(&mut self) -> Parse<Expression> {
        // factor -> "(" expression ")" | ID varcall | NUM
        match self.peek() {
            Token::OpenParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(Token::CloseParen)?;
                Ok(inner)
            }

            Token::Id(_) => {
                let id = self.ident()?;
                self.suffix(id)
            }

            Token::IntLiteral(_) => {
                let num = self.number()?;
                Ok(Expression::Num(num.into_inner()))
            }

            other => {
                let error = SyntaxError::ExpectedExpression(other.clone());
                self.fail(error)
            }
        }
    }

    fn suffix(&mut self, id: Located<Identifier>) -> Parse<Expression> {
        // varcall -> "(" args ")" | "[" expression "]" | ε
        match self.peek() {
            Token::OpenParen => self.call(id),

            Token::OpenBracket => {
                self.advance();
                let index = self.expression()?;
                self.expect(Token::CloseBracket)?;

                Ok(Expression::Var(Variable {
                    name: id,
                    index: Some(Box::new(index)),
                }))
            }

            _ => Ok(Expression::Var(Variable {
                name: id,
                index: None,
            })),
        }
    }

    fn call(&mut self, callee: Located<Identifier>) -> Parse<Expression> {
        // "(" args ")", donde args puede ser vacío
        self.expect(Token::OpenParen)?;

        let args = if self.check(&Token::CloseParen) {
            Vec::new()
        } else {
            self.arg_list()?
        };

        self.expect(Token::CloseParen)?;
        Ok(Expression::Call { callee, args })
    }

    fn arg_list(&mut self) -> Parse<Vec<Expression>> {
        // arg-list -> expression {"," expression}
        let mut args = vec![self.expression()?];
        while self.check(&Token::Comma) {
            self.advance();
            args.push(self.expression()?);
        }

        Ok(args)
    }

    fn mul_op(&self) -> Option<BinOp> {
        match self.peek() {
            Token::Times => Some(BinOp::Mul),
            Token::Divide => Some(BinOp::Div),
            _ => None,
        }
    }

    fn add_op(&self) -> Option<BinOp> {
        match self.peek() {
            Token::Plus => Some(BinOp::Add),
            Token::Minus => Some(BinOp::Sub),
            _ => None,
        }
    }

    fn rel_op(&self) -> Option<BinOp> {
        match self.peek() {
            Token::Less => Some(BinOp::Lt),
            Token::LessEqual => Some(BinOp::Lte),
            Token::Greater => Some(BinOp::Gt),
            Token::GreaterEqual => Some(BinOp::Gte),
            Token::Equal => Some(BinOp::Eq),
            Token::NotEqual => Some(BinOp::Neq),
            _ => None,
        }
    }

    fn peek(&self) -> &Token {
        self.tokens.peek().as_ref()
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn advance(&mut self) -> Located<Token> {
        self.tokens.next()
    }

    fn expect(&mut self, expected: Token) -> Parse<Located<Token>> {
        let found = self.tokens.next();
        if *found.as_ref() == expected {
            Ok(found)
        } else {
            let (location, found) = found.split();
            Err(Located::at(
                SyntaxError::UnexpectedToken(expected, found),
                location,
            ))
        }
    }

    fn ident(&mut self) -> Parse<Located<Identifier>> {
        let (location, token) = self.tokens.next().split();
        match token {
            Token::Id(id) => Ok(Located::at(id, location)),
            other => Err(Located::at(SyntaxError::ExpectedId(other), location)),
        }
    }

    fn number(&mut self) -> Parse<Located<i32>> {
        let (location, token) = self.tokens.next().split();
        match token {
            Token::IntLiteral(integer) => Ok(Located::at(integer, location)),
            other => Err(Located::at(SyntaxError::ExpectedNumber(other), location)),
        }
    }

    fn fail<T>(&self, error: SyntaxError) -> Parse<T> {
        Err(Located::at(error, self.tokens.peek().location().clone()))
    }
}
