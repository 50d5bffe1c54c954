// Snapshot test: lock the program listing to detect unintended changes to
// the IR surface or the structural-op planner.
//
// Uses an inline insta snapshot; run `cargo insta review` after intentional
// listing changes to update the baseline.

use lsk::expr::{Expr, Stmt};
use lsk::id::{ConstId, FuncId, NodeId};
use lsk::node::{ChildDecl, LocalDecl, NodeDef, PortDecl, RegisterDecl};
use lsk::ops::OpSet;
use lsk::program::{ConstDecl, ConstInit, ImportDecl, Program, SensorDecl};
use lsk::registry::Registry;
use lsk::types::{ScalarType, Type, TypeTable};
use lsk::value::Value;

fn listing_fixture() -> Program {
    let mut types = TypeTable::new();
    let i32_id = types.intern(Type::Scalar(ScalarType::I32));
    let bool_id = types.intern(Type::Scalar(ScalarType::Bool));
    let arr4 = types.intern(Type::Array {
        elem: i32_id,
        len: 4,
    });
    types.intern(Type::Synonym {
        name: "tCount".into(),
        target: i32_id,
    });

    Program {
        types,
        nodes: vec![
            NodeDef {
                name: "acc".into(),
                inputs: vec![PortDecl {
                    name: "i0".into(),
                    ty: arr4,
                }],
                outputs: vec![
                    PortDecl {
                        name: "o0".into(),
                        ty: arr4,
                    },
                    PortDecl {
                        name: "o1".into(),
                        ty: bool_id,
                    },
                ],
                locals: vec![],
                registers: vec![RegisterDecl {
                    name: "acc_reg".into(),
                    ty: arr4,
                    init: Value::Array(vec![Value::I32(0); 4]),
                    reset: Some(Value::Array(vec![Value::I32(0); 4])),
                }],
                children: vec![],
                uses_first_tick: false,
                user_defined_init: false,
                body: vec![
                    Stmt::SetOutput {
                        output: 0,
                        value: Expr::Register(0),
                    },
                    Stmt::SetOutput {
                        output: 1,
                        value: Expr::Eq {
                            ty: arr4,
                            lhs: Box::new(Expr::Input(0)),
                            rhs: Box::new(Expr::Register(0)),
                        },
                    },
                    Stmt::SetRegister {
                        register: 0,
                        value: Expr::Input(0),
                    },
                ],
            },
            NodeDef {
                name: "main".into(),
                inputs: vec![PortDecl {
                    name: "i0".into(),
                    ty: arr4,
                }],
                outputs: vec![PortDecl {
                    name: "o0".into(),
                    ty: arr4,
                }],
                locals: vec![
                    LocalDecl {
                        name: "acc_out".into(),
                        ty: arr4,
                    },
                    LocalDecl {
                        name: "acc_flag".into(),
                        ty: bool_id,
                    },
                    LocalDecl {
                        name: "biased".into(),
                        ty: i32_id,
                    },
                ],
                registers: vec![],
                children: vec![ChildDecl {
                    name: "acc1".into(),
                    node: NodeId(0),
                }],
                uses_first_tick: true,
                user_defined_init: false,
                body: vec![
                    Stmt::If {
                        cond: Expr::FirstTick,
                        then_body: vec![Stmt::ClearFirstTick],
                        else_body: vec![],
                    },
                    Stmt::StepChild {
                        child: 0,
                        inputs: vec![Expr::Input(0)],
                        results: vec![0, 1],
                    },
                    Stmt::CallImport {
                        func: FuncId(0),
                        args: vec![Expr::Const(ConstId(0))],
                        results: vec![2],
                    },
                    Stmt::SetOutput {
                        output: 0,
                        value: Expr::Local(0),
                    },
                ],
            },
        ],
        sensors: vec![SensorDecl {
            name: "sensor_flag".into(),
            ty: bool_id,
            init: Value::Bool(false),
        }],
        consts: vec![
            ConstDecl {
                name: "BIAS".into(),
                ty: i32_id,
                init: ConstInit::Literal(Value::I32(3)),
            },
            ConstDecl {
                name: "SEED".into(),
                ty: arr4,
                init: ConstInit::Elaborated,
            },
        ],
        imports: vec![ImportDecl {
            name: "succ".into(),
            params: vec![i32_id],
            results: vec![i32_id],
        }],
        elaboration: vec![
            lsk::elab::ElabStep::SetElement {
                dst: ConstId(1),
                index: 0,
                value: Expr::Lit {
                    ty: i32_id,
                    value: Value::I32(1),
                },
            },
            lsk::elab::ElabStep::Replicate {
                dst: ConstId(1),
                src_index: 0,
                start: 1,
            },
        ],
        entry: NodeId(1),
    }
}

#[test]
fn listing_is_stable() {
    let program = listing_fixture();
    lsk::verify::verify(&program).expect("fixture must verify");

    // The listing is independent of import bindings; still prove the
    // fixture binds cleanly against a real registry.
    let mut registry = Registry::new();
    registry
        .register("succ", |args| match args {
            [Value::I32(x)] => vec![Value::I32(x + 1)],
            other => panic!("bad arguments {:?}", other),
        })
        .unwrap();
    lsk::eval::Machine::new(&program, &registry).unwrap();

    let ops = OpSet::plan(&program);
    let listing = lsk::pretty::listing(&program, &ops);
    insta::assert_snapshot!(listing, @r###"
    program: entry n1 'main'
    types:
      t0 = i32
      t1 = bool
      t2 = [i32; 4]
      t3 = synonym tCount -> i32
    structural ops:
      eq: t0 t2
      copy: t0 t2
    sensors:
      s0 sensor_flag: bool
    consts:
      c0 BIAS: i32 = I32(3)
      c1 SEED: [i32; 4] (elaborated)
    imports:
      f0 succ(i32) -> (i32)
    nodes:
      n0 acc(i0: [i32; 4]) -> (o0: [i32; 4], o1: bool)
        register acc_reg: [i32; 4] (reset)
        body: 3 statements
      n1 main(i0: [i32; 4]) -> (o0: [i32; 4])
        first-tick flag
        child acc1: n0 'acc'
        body: 4 statements
    elaboration:
      0: set c1[0]
      1: replicate c1[1..] from [0]
    "###);
}
