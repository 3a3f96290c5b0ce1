//! Pruebas del análisis léxico y sintáctico.

use cminus::{
    lex::{self, LexerError, Tokens},
    parse::{self, BinOp, Decl, Expression, Program, ReturnKind, Statement, SyntaxError},
    source::{Located, Source},
};

fn scan(text: &str) -> Result<Tokens, Located<LexerError>> {
    lex::scan(&Source::new("<test>", text))
}

fn parse_text(text: &str) -> Result<Program, Located<SyntaxError>> {
    parse::parse(scan(text).expect("lexical failure"))
}

/// Extrae la primera sentencia del cuerpo de un `main` sintético.
fn statement_of(body: &str) -> Statement {
    let text = format!("void main(void) {{ {} }}", body);
    let mut program = parse_text(&text).expect("parse failure");

    match program.decls.pop() {
        Some(Decl::Fun(fun)) => fun
            .body
            .statements
            .into_iter()
            .next()
            .expect("empty body"),

        _ => panic!("expected a function"),
    }
}

fn expression_of(body: &str) -> Expression {
    match statement_of(body) {
        Statement::Expression(Some(expression)) => expression,
        other => panic!("expected an expression statement, got {:?}", other),
    }
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let expression = expression_of("2 + 3 * 4;");

    match expression {
        Expression::Binary {
            op: BinOp::Add,
            lhs,
            rhs,
        } => {
            assert!(matches!(*lhs, Expression::Num(2)));
            match *rhs {
                Expression::Binary {
                    op: BinOp::Mul,
                    lhs,
                    rhs,
                } => {
                    assert!(matches!(*lhs, Expression::Num(3)));
                    assert!(matches!(*rhs, Expression::Num(4)));
                }

                other => panic!("expected multiplication on the right, got {:?}", other),
            }
        }

        other => panic!("expected addition at the root, got {:?}", other),
    }
}

#[test]
fn assignment_nests_to_the_right() {
    let expression = expression_of("x = y = 3;");

    match expression {
        Expression::Assign { target, value } => {
            assert_eq!(target.name.as_ref().as_ref(), "x");
            assert!(target.index.is_none());

            match *value {
                Expression::Assign { target, value } => {
                    assert_eq!(target.name.as_ref().as_ref(), "y");
                    assert!(matches!(*value, Expression::Num(3)));
                }

                other => panic!("expected a nested assignment, got {:?}", other),
            }
        }

        other => panic!("expected an assignment, got {:?}", other),
    }
}

#[test]
fn relational_operators_do_not_chain() {
    let result = parse_text("void main(void) { a < b < c; }");
    let error = result.expect_err("a<b<c must not parse");

    assert!(matches!(
        error.as_ref(),
        SyntaxError::ExpectedExpressionEnd(_)
    ));
}

#[test]
fn relational_result_is_an_ordinary_value() {
    let expression = expression_of("x = a < b;");

    match expression {
        Expression::Assign { value, .. } => {
            assert!(matches!(
                *value,
                Expression::Binary { op: BinOp::Lt, .. }
            ));
        }

        other => panic!("expected an assignment, got {:?}", other),
    }
}

#[test]
fn call_continues_as_expression_head() {
    // Una llamada en cabeza de expresión admite cola aritmética
    let expression = expression_of("f() + 1;");

    match expression {
        Expression::Binary {
            op: BinOp::Add,
            lhs,
            rhs,
        } => {
            assert!(matches!(*lhs, Expression::Call { .. }));
            assert!(matches!(*rhs, Expression::Num(1)));
        }

        other => panic!("expected an addition over a call, got {:?}", other),
    }
}

#[test]
fn indexed_reference_keeps_its_identifier() {
    let expression = expression_of("x = a[i] * 2;");

    match expression {
        Expression::Assign { value, .. } => match *value {
            Expression::Binary { lhs, .. } => match *lhs {
                Expression::Var(variable) => {
                    assert_eq!(variable.name.as_ref().as_ref(), "a");
                    assert!(variable.index.is_some());
                }

                other => panic!("expected an indexed variable, got {:?}", other),
            },

            other => panic!("expected a multiplication, got {:?}", other),
        },

        other => panic!("expected an assignment, got {:?}", other),
    }
}

#[test]
fn indexed_assignment_target() {
    let expression = expression_of("a[i + 1] = 3;");

    match expression {
        Expression::Assign { target, .. } => {
            assert_eq!(target.name.as_ref().as_ref(), "a");
            assert!(matches!(
                target.index.as_deref(),
                Some(Expression::Binary {
                    op: BinOp::Add,
                    ..
                })
            ));
        }

        other => panic!("expected an assignment, got {:?}", other),
    }
}

#[test]
fn empty_statement_parses() {
    assert!(matches!(statement_of(";"), Statement::Expression(None)));
}

#[test]
fn dangling_else_binds_to_nearest_if() {
    let statement = statement_of("if (a) if (b) x = 1; else x = 2;");

    match statement {
        Statement::Selection {
            consequent,
            alternative,
            ..
        } => {
            assert!(alternative.is_none(), "else must bind to the inner if");
            assert!(matches!(
                *consequent,
                Statement::Selection {
                    alternative: Some(_),
                    ..
                }
            ));
        }

        other => panic!("expected a selection, got {:?}", other),
    }
}

#[test]
fn declaration_forms() {
    let program = parse_text(
        r#"
        int x;
        int a[10];

        int f(int n, int values[]) {
            return n;
        }

        void main(void) {
            ;
        }
        "#,
    )
    .expect("parse failure");

    assert_eq!(program.decls.len(), 4);

    match &program.decls[0] {
        Decl::Var(var) => assert!(var.size.is_none()),
        other => panic!("expected a scalar, got {:?}", other),
    }

    match &program.decls[1] {
        Decl::Var(var) => assert_eq!(var.size, Some(10)),
        other => panic!("expected an array, got {:?}", other),
    }

    match &program.decls[2] {
        Decl::Fun(fun) => {
            assert_eq!(fun.returns, ReturnKind::Int);
            assert_eq!(fun.params.len(), 2);
            assert!(!fun.params[0].array);
            assert!(fun.params[1].array);
        }

        other => panic!("expected a function, got {:?}", other),
    }

    match &program.decls[3] {
        Decl::Fun(fun) => {
            assert_eq!(fun.returns, ReturnKind::Void);
            assert!(fun.params.is_empty());
        }

        other => panic!("expected a function, got {:?}", other),
    }
}

#[test]
fn empty_and_multiple_arguments() {
    match expression_of("f();") {
        Expression::Call { args, .. } => assert!(args.is_empty()),
        other => panic!("expected a call, got {:?}", other),
    }

    match expression_of("g(1, x, h(2));") {
        Expression::Call { args, .. } => {
            assert_eq!(args.len(), 3);
            assert!(matches!(args[2], Expression::Call { .. }));
        }

        other => panic!("expected a call, got {:?}", other),
    }
}

#[test]
fn missing_semicolon_is_fatal() {
    // sin el token decisivo tras el nombre, la declaración no avanza
    let error = parse_text("int x").expect_err("must not parse");
    assert!(matches!(error.as_ref(), SyntaxError::BadDeclaration(_)));

    let error = parse_text("int x[3]").expect_err("must not parse");
    assert!(matches!(error.as_ref(), SyntaxError::UnexpectedToken(..)));
}

#[test]
fn empty_program_is_rejected() {
    let error = parse_text("").expect_err("must not parse");
    assert!(matches!(error.as_ref(), SyntaxError::ExpectedDeclaration(_)));
}

#[test]
fn comments_are_discarded() {
    let program = parse_text("int /* tamaño */ x; void main(void) { /* nada */ }")
        .expect("parse failure");

    assert_eq!(program.decls.len(), 2);
}

#[test]
fn lexical_error_forms() {
    let error = scan("int x1;").expect_err("digits in identifiers");
    assert!(matches!(error.as_ref(), LexerError::DigitInWord));

    let error = scan("123abc").expect_err("letters after numbers");
    assert!(matches!(error.as_ref(), LexerError::LetterInNumber));

    let error = scan("x ! y").expect_err("lone bang");
    assert!(matches!(error.as_ref(), LexerError::Expected('=')));

    let error = scan("9999999999;").expect_err("integer overflow");
    assert!(matches!(error.as_ref(), LexerError::IntOverflow));

    let error = scan("/* sin cierre").expect_err("unterminated comment");
    assert!(matches!(error.as_ref(), LexerError::UnterminatedComment));

    let error = scan("x # y").expect_err("bad character");
    assert!(matches!(error.as_ref(), LexerError::BadChar('#')));
}

#[test]
fn ast_dump_is_stable() {
    let program = parse_text("int x; void main(void) { x = 3; }").expect("parse failure");

    let mut buffer = Vec::new();
    cminus::dump::ast(&program, &mut buffer).expect("dump failure");

    let expected = "\
Program {
    int
        x
    function void
        main
        Params (
        )
        {
            =
                x
                3
        }
}
";

    assert_eq!(String::from_utf8(buffer).unwrap(), expected);
}

#[test]
fn ast_dump_covers_arrays_and_control_flow() {
    let program = parse_text(
        "int a[10]; int f(int n) { while (n) n = n - 1; if (n) return n; else return 0; }",
    )
    .expect("parse failure");

    let mut buffer = Vec::new();
    cminus::dump::ast(&program, &mut buffer).expect("dump failure");
    let text = String::from_utf8(buffer).unwrap();

    assert!(text.starts_with("Program {\n"));
    assert!(text.contains("        a [\n            10\n        ]\n"));
    assert!(text.contains("while\n"));
    assert!(text.contains("else\n"));
    assert!(text.ends_with("}\n"));
}
