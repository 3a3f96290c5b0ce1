//! Pruebas del descenso a representación intermedia.

use cminus::{
    ir::{self, Attr, BlockId, Function, Module, Opcode, Operand, Reg, Ty},
    lex,
    lower::SemanticError,
    parse,
    source::{Located, Source},
};

fn lower_text(text: &str) -> Result<Module, Located<SemanticError>> {
    let tokens = lex::scan(&Source::new("<test>", text)).expect("lexical failure");
    let program = parse::parse(tokens).expect("parse failure");
    program.lower()
}

fn lowered(text: &str) -> Module {
    lower_text(text).expect("lowering failure")
}

fn layout(function: &Function) -> Vec<u32> {
    function.blocks.iter().map(|block| block.id.0).collect()
}

fn count(function: &Function, opcode: Opcode) -> usize {
    function
        .blocks
        .iter()
        .flat_map(|block| &block.ops)
        .filter(|op| op.opcode == opcode)
        .count()
}

#[test]
fn global_store() {
    let module = lowered("int x; void main(void) { x = 3; }");

    let globals: Vec<_> = module.globals().map(|data| data.name.as_str()).collect();
    assert_eq!(globals, ["x"]);

    let main = module.function("main").expect("main missing");
    assert_eq!(main.returns, Ty::Void);

    // entrada, cuerpo, retorno
    assert_eq!(layout(main), [0, 2, 1]);

    let body = &main.blocks[1];
    assert_eq!(body.ops.len(), 2);

    assert_eq!(body.ops[0].opcode, Opcode::Assign);
    assert_eq!(body.ops[0].dest, Some(Operand::Register(Reg(0))));
    assert_eq!(body.ops[0].srcs[0], Some(Operand::Immediate(3)));

    assert_eq!(body.ops[1].opcode, Opcode::Store);
    assert_eq!(body.ops[1].srcs[0], Some(Operand::Register(Reg(0))));
    assert_eq!(body.ops[1].srcs[1], Some(Operand::Global("x".into())));
}

#[test]
fn global_slots_follow_declaration_order() {
    let module = lowered("int a; int b; int c; void main(void) { ; }");

    let globals: Vec<_> = module.globals().map(|data| data.name.as_str()).collect();
    assert_eq!(globals, ["a", "b", "c"]);
    assert!(module.globals().all(|data| data.ty == Ty::Int));
}

#[test]
fn parameter_addition() {
    let module = lowered("int inc(int a) { return a + 1; }");
    let inc = module.function("inc").expect("inc missing");

    assert_eq!(inc.returns, Ty::Int);
    assert_eq!(inc.params.len(), 1);
    assert_eq!(inc.params[0].name, "a");
    assert_eq!(inc.params[0].reg, Reg(0));

    let ops = &inc.blocks[1].ops;
    assert_eq!(ops.len(), 4);

    assert_eq!(ops[0].opcode, Opcode::Assign);
    assert_eq!(ops[0].dest, Some(Operand::Register(Reg(1))));
    assert_eq!(ops[0].srcs[0], Some(Operand::Immediate(1)));

    assert_eq!(ops[1].opcode, Opcode::Add);
    assert_eq!(ops[1].dest, Some(Operand::Register(Reg(2))));
    assert_eq!(ops[1].srcs[0], Some(Operand::Register(Reg(0))));
    assert_eq!(ops[1].srcs[1], Some(Operand::Register(Reg(1))));

    assert_eq!(ops[2].opcode, Opcode::Assign);
    assert_eq!(ops[2].dest, Some(Operand::Macro(ir::RET_SLOT)));
    assert_eq!(ops[2].srcs[0], Some(Operand::Register(Reg(2))));

    assert_eq!(ops[3].opcode, Opcode::Jmp);
    assert_eq!(ops[3].srcs[0], Some(Operand::Block(inc.return_block)));
}

#[test]
fn if_without_else_still_builds_post_block() {
    let module = lowered("int f(void) { if (1) return 1; return 0; }");
    let f = module.function("f").expect("f missing");

    // entrada 0, retorno 1, cuerpo 2, rama if 3, post 4
    assert_eq!(layout(f), [0, 2, 3, 4, 1]);

    let body = f.block(BlockId(2)).unwrap();
    let branch = body.ops.last().unwrap();
    assert_eq!(branch.opcode, Opcode::Beq);
    assert_eq!(branch.srcs[1], Some(Operand::Immediate(0)));
    assert_eq!(branch.srcs[2], Some(Operand::Block(BlockId(4))));

    // ambos retornos desembocan en el único bloque terminal
    let returns = f
        .blocks
        .iter()
        .flat_map(|block| &block.ops)
        .filter(|op| {
            op.opcode == Opcode::Jmp
                && op.srcs[0] == Some(Operand::Block(f.return_block))
        })
        .count();
    assert_eq!(returns, 2);
}

#[test]
fn return_block_appears_exactly_once() {
    let module = lowered(
        "int signo(int x) { if (x < 0) return 0 - 1; if (x > 0) return 1; return 0; }",
    );

    let f = module.function("signo").expect("signo missing");
    let occurrences = f
        .blocks
        .iter()
        .filter(|block| block.id == f.return_block)
        .count();

    assert_eq!(occurrences, 1);
    assert_eq!(count(f, Opcode::Jmp), 3);
}

#[test]
fn if_else_branches_merge_on_post_block() {
    let module = lowered("int f(int c) { if (c) c = 1; else c = 2; return c; }");
    let f = module.function("f").expect("f missing");

    // la cadena else (bloque 4) queda diferida al final
    let order = layout(f);
    assert_eq!(order, [0, 2, 3, 5, 1, 4]);

    let branch = f.block(BlockId(2)).unwrap().ops.last().unwrap();
    assert_eq!(branch.opcode, Opcode::Beq);
    assert_eq!(branch.srcs[2], Some(Operand::Block(BlockId(4))));

    // el else salta al post; la rama if cae en él por adyacencia
    let jump = f.block(BlockId(4)).unwrap().ops.last().unwrap();
    assert_eq!(jump.opcode, Opcode::Jmp);
    assert_eq!(jump.srcs[0], Some(Operand::Block(BlockId(5))));

    let if_position = order.iter().position(|&id| id == 3).unwrap();
    assert_eq!(order[if_position + 1], 5);
}

#[test]
fn deferred_chains_append_in_creation_order() {
    let module = lowered(
        "int f(int c, int d) {
            if (c) { c = 1; } else { if (d) { d = 1; } else { d = 2; } }
            return c;
        }",
    );

    let f = module.function("f").expect("f missing");
    assert_eq!(layout(f), [0, 2, 3, 5, 1, 4, 6, 8, 7]);

    // el else exterior contiene a la selección interior y cierra
    // saltando al post exterior desde el post interior
    let inner_post = f.block(BlockId(8)).unwrap();
    let jump = inner_post.ops.last().unwrap();
    assert_eq!(jump.opcode, Opcode::Jmp);
    assert_eq!(jump.srcs[0], Some(Operand::Block(BlockId(5))));

    let inner_else = f.block(BlockId(7)).unwrap();
    let jump = inner_else.ops.last().unwrap();
    assert_eq!(jump.opcode, Opcode::Jmp);
    assert_eq!(jump.srcs[0], Some(Operand::Block(BlockId(8))));
}

#[test]
fn while_condition_is_lowered_twice() {
    let module = lowered("void f(int n) { while (n < 10) n = n + 1; }");
    let f = module.function("f").expect("f missing");

    // post 3 se crea antes que el cuerpo 4
    assert_eq!(layout(f), [0, 2, 4, 3, 1]);

    // la condición aislada produce una comparación; el lazo, dos
    assert_eq!(count(f, Opcode::Lt), 2);
    assert_eq!(count(f, Opcode::Beq), 1);
    assert_eq!(count(f, Opcode::Bne), 1);

    let entry_branch = f.block(BlockId(2)).unwrap().ops.last().unwrap();
    assert_eq!(entry_branch.opcode, Opcode::Beq);
    assert_eq!(entry_branch.srcs[2], Some(Operand::Block(BlockId(3))));

    let back_branch = f.block(BlockId(4)).unwrap().ops.last().unwrap();
    assert_eq!(back_branch.opcode, Opcode::Bne);
    assert_eq!(back_branch.srcs[2], Some(Operand::Block(BlockId(4))));
}

#[test]
fn call_protocol() {
    let module =
        lowered("int add(int a, int b) { return a + b; } void main(void) { add(1, 2); }");

    let main = module.function("main").expect("main missing");
    let ops = &main.blocks[1].ops;

    let opcodes: Vec<Opcode> = ops.iter().map(|op| op.opcode).collect();
    assert_eq!(
        opcodes,
        [
            Opcode::Assign,
            Opcode::Pass,
            Opcode::Assign,
            Opcode::Pass,
            Opcode::Call,
            Opcode::Assign,
        ]
    );

    assert_eq!(ops[1].attr, Some(Attr::ArgPos(0)));
    assert_eq!(ops[3].attr, Some(Attr::ArgPos(1)));

    assert_eq!(ops[4].srcs[0], Some(Operand::Global("add".into())));
    assert_eq!(ops[4].attr, Some(Attr::ArgCount(2)));

    // el valor de retorno se lee de la pseudoubicación dedicada
    assert_eq!(ops[5].srcs[0], Some(Operand::Macro(ir::RET_SLOT)));
    assert_eq!(ops[5].dest, Some(Operand::Register(Reg(2))));
}

#[test]
fn global_reads_load_into_fresh_registers() {
    let module = lowered("int g; int get(void) { return g; }");
    let get = module.function("get").expect("get missing");

    let ops = &get.blocks[1].ops;
    assert_eq!(ops[0].opcode, Opcode::Load);
    assert_eq!(ops[0].dest, Some(Operand::Register(Reg(0))));
    assert_eq!(ops[0].srcs[0], Some(Operand::Global("g".into())));

    assert_eq!(ops[1].opcode, Opcode::Assign);
    assert_eq!(ops[1].dest, Some(Operand::Macro(ir::RET_SLOT)));
}

#[test]
fn locals_share_one_flat_namespace() {
    let module = lowered("void f(void) { int x; { int x; x = 1; } x = 2; }");
    let f = module.function("f").expect("f missing");

    // la redeclaración interior religa el nombre; la asignación
    // exterior posterior usa el registro nuevo
    assert_eq!(f.locals.len(), 1);

    let ops = &f.blocks[1].ops;
    assert_eq!(ops.len(), 4);
    assert_eq!(ops[1].dest, Some(Operand::Register(Reg(1))));
    assert_eq!(ops[3].dest, Some(Operand::Register(Reg(1))));
}

#[test]
fn undeclared_names_are_semantic_errors() {
    let error = lower_text("void main(void) { y; }").expect_err("y is undeclared");
    assert!(matches!(error.as_ref(), SemanticError::UndefinedVariable(_)));
    assert!(error.as_ref().to_string().contains("`y`"));

    let error = lower_text("void main(void) { y = 1; }").expect_err("y is undeclared");
    assert!(matches!(error.as_ref(), SemanticError::UndefinedVariable(_)));

    let error = lower_text("void main(void) { f(); }").expect_err("f is undeclared");
    assert!(matches!(error.as_ref(), SemanticError::UndefinedFunction(_)));
    assert!(error.as_ref().to_string().contains("`f`"));
}

#[test]
fn later_declarations_are_not_visible() {
    // la ranura global se asigna al encontrar la declaración; una
    // función textualmente anterior no la ve
    let error = lower_text("void f(void) { x = 1; } int x;").expect_err("x is later");
    assert!(matches!(error.as_ref(), SemanticError::UndefinedVariable(_)));

    let error =
        lower_text("void main(void) { f(); } void f(void) { ; }").expect_err("f is later");
    assert!(matches!(error.as_ref(), SemanticError::UndefinedFunction(_)));
}

#[test]
fn direct_recursion_resolves() {
    let module = lowered("int fact(int x) { if (x > 1) return x * fact(x - 1); return 1; }");
    let fact = module.function("fact").expect("fact missing");

    assert_eq!(count(fact, Opcode::Call), 1);
}

#[test]
fn complete_program_lowers() {
    let module = lowered(
        r#"
        int result;

        int fact(int x) {
            if (x > 1) {
                return x * fact(x - 1);
            } else {
                return 1;
            }
        }

        void main(void) {
            int n;
            n = 5;
            while (n > 0) {
                result = fact(n);
                n = n - 1;
            }
        }
        "#,
    );

    let globals: Vec<_> = module.globals().map(|data| data.name.as_str()).collect();
    assert_eq!(globals, ["result"]);

    let fact = module.function("fact").expect("fact missing");
    let unique = fact
        .blocks
        .iter()
        .filter(|block| block.id == fact.return_block)
        .count();
    assert_eq!(unique, 1);

    let main = module.function("main").expect("main missing");
    assert_eq!(main.returns, Ty::Void);

    // el cuerpo del lazo se desciende una vez; la condición, dos
    assert_eq!(count(main, Opcode::Call), 1);
    assert_eq!(count(main, Opcode::Store), 1);
    assert_eq!(count(main, Opcode::Gt), 2);
}
