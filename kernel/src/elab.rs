// elab.rs — Elaboration: one-time computation of derived constants
//
// Elaboration runs exactly once, before the first tick, and populates the
// constant table entries that need computation rather than a literal. The
// step repertoire matches what generated elaboration code actually does:
// assign a whole constant, write one element of an array constant, and
// fill the tail of an array constant by copying a previously computed
// element forward. Order is significant: a step may only read entries
// already complete.
//
// Elaboration expressions are the pure subset of the equation IR: no
// inputs, locals, registers, sensors, or flags exist yet.

use serde::{Deserialize, Serialize};

use crate::expr::{BinOp, Expr, UnOp};
use crate::id::ConstId;
use crate::ops::OpSet;
use crate::program::{ConstInit, Program};
use crate::types::Type;
use crate::value::{self, Value};

// ── Steps ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ElabStep {
    /// Evaluate and store a whole constant.
    Assign { dst: ConstId, value: Expr },
    /// Write one element of an array constant.
    SetElement {
        dst: ConstId,
        index: usize,
        value: Expr,
    },
    /// Fill elements `start..len` of an array constant by copying element
    /// `src_index` (already written earlier) forward.
    Replicate {
        dst: ConstId,
        src_index: usize,
        start: usize,
    },
}

// ── Pass ────────────────────────────────────────────────────────────────────

/// Run the elaboration schedule on fresh storage and return the finished
/// constant table. Deterministic: the same program always produces a
/// bit-identical table.
pub(crate) fn run(program: &Program, ops: &OpSet) -> Vec<Value> {
    let mut table: Vec<Value> = program
        .consts
        .iter()
        .map(|c| match &c.init {
            ConstInit::Literal(v) => v.clone(),
            ConstInit::Elaborated => Value::zero(&program.types, c.ty),
        })
        .collect();

    for step in &program.elaboration {
        match step {
            ElabStep::Assign { dst, value } => {
                let v = eval(program, ops, &table, value);
                table[dst.index()] = v;
            }
            ElabStep::SetElement { dst, index, value } => {
                let v = eval(program, ops, &table, value);
                match &mut table[dst.index()] {
                    Value::Array(elems) => elems[*index] = v,
                    other => panic!("SetElement on non-array constant {:?}", other),
                }
            }
            ElabStep::Replicate {
                dst,
                src_index,
                start,
            } => {
                let ty = program.const_decl(*dst).ty;
                let elem_ty = match program.types.get(program.types.resolve(ty)) {
                    Type::Array { elem, .. } => *elem,
                    other => panic!("Replicate on non-array constant type {:?}", other),
                };
                let composite = program.types.is_composite(elem_ty);
                match &mut table[dst.index()] {
                    Value::Array(elems) => {
                        let src = elems[*src_index].clone();
                        for i in *start..elems.len() {
                            if composite {
                                ops.copy_assign(elem_ty, &mut elems[i], &src);
                            } else {
                                elems[i] = src.clone();
                            }
                        }
                    }
                    other => panic!("Replicate on non-array constant {:?}", other),
                }
            }
        }
    }
    table
}

/// Evaluate one elaboration expression against the in-progress table.
fn eval(program: &Program, ops: &OpSet, table: &[Value], expr: &Expr) -> Value {
    match expr {
        Expr::Lit { value, .. } => value.clone(),
        Expr::Const(id) => table[id.index()].clone(),
        Expr::Unary { op, expr } => {
            let v = eval(program, ops, table, expr);
            match op {
                UnOp::Not => value::not(&v),
                UnOp::Neg => value::neg(&v),
            }
        }
        Expr::Binary { op, lhs, rhs } => {
            let l = eval(program, ops, table, lhs);
            let r = eval(program, ops, table, rhs);
            apply_binary(*op, &l, &r)
        }
        Expr::Eq { ty, lhs, rhs } => {
            let l = eval(program, ops, table, lhs);
            let r = eval(program, ops, table, rhs);
            Value::Bool(ops.equals(*ty, &l, &r))
        }
        Expr::Ne { ty, lhs, rhs } => {
            let l = eval(program, ops, table, lhs);
            let r = eval(program, ops, table, rhs);
            Value::Bool(!ops.equals(*ty, &l, &r))
        }
        Expr::Cast { to, expr } => value::cast(*to, &eval(program, ops, table, expr)),
        Expr::Element { array, index } => match eval(program, ops, table, array) {
            Value::Array(elems) => elems
                .into_iter()
                .nth(*index)
                .expect("element index verified in range"),
            other => panic!("element projection on non-array {:?}", other),
        },
        Expr::Field { base, field } => match eval(program, ops, table, base) {
            Value::Struct(vals) => vals
                .into_iter()
                .nth(*field)
                .expect("field index verified in range"),
            other => panic!("field projection on non-struct {:?}", other),
        },
        Expr::MakeArray { elems, .. } => {
            Value::Array(elems.iter().map(|e| eval(program, ops, table, e)).collect())
        }
        Expr::Replicate { ty, elem } => {
            let len = match program.types.get(program.types.resolve(*ty)) {
                Type::Array { len, .. } => *len,
                other => panic!("replicate at non-array type {:?}", other),
            };
            let v = eval(program, ops, table, elem);
            Value::Array(vec![v; len])
        }
        Expr::MakeStruct { fields, .. } => Value::Struct(
            fields
                .iter()
                .map(|e| eval(program, ops, table, e))
                .collect(),
        ),
        Expr::MakeEnum { tag, .. } => Value::Enum(*tag),
        Expr::MakeVariant { tag, payload, .. } => Value::Variant {
            tag: *tag,
            payload: Box::new(eval(program, ops, table, payload)),
        },
        Expr::Input(_)
        | Expr::Local(_)
        | Expr::Register(_)
        | Expr::Sensor(_)
        | Expr::FirstTick => {
            panic!("expression reads tick state; not available during elaboration")
        }
    }
}

/// Shared scalar binary dispatch for the elaboration evaluator.
pub(crate) fn apply_binary(op: BinOp, l: &Value, r: &Value) -> Value {
    match op {
        BinOp::Add => value::add(l, r),
        BinOp::Sub => value::sub(l, r),
        BinOp::Mul => value::mul(l, r),
        BinOp::Div => value::div(l, r),
        BinOp::Rem => value::rem(l, r),
        BinOp::And => Value::Bool(l.as_bool() && r.as_bool()),
        BinOp::Or => Value::Bool(l.as_bool() || r.as_bool()),
        BinOp::Lt => Value::Bool(value::lt(l, r)),
        BinOp::Le => Value::Bool(value::le(l, r)),
        BinOp::Gt => Value::Bool(value::gt(l, r)),
        BinOp::Ge => Value::Bool(value::ge(l, r)),
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::NodeId;
    use crate::program::ConstDecl;
    use crate::types::{ScalarType, TypeTable, VariantCase};

    /// An array of variants seeded at element 0 and copy-filled forward,
    /// plus a standalone variant constant.
    fn elaboration_program() -> Program {
        let mut types = TypeTable::new();
        let i32_id = types.intern(Type::Scalar(ScalarType::I32));
        let bool_id = types.intern(Type::Scalar(ScalarType::Bool));
        let bool_box = types.intern(Type::Array { elem: bool_id, len: 1 });
        let variant = types.intern(Type::Variant {
            name: "T_Variant".into(),
            cases: vec![
                VariantCase {
                    name: "T_int".into(),
                    payload: i32_id,
                },
                VariantCase {
                    name: "T_bool_box".into(),
                    payload: bool_box,
                },
            ],
        });
        let variant_array = types.intern(Type::Array {
            elem: variant,
            len: 4,
        });

        Program {
            types,
            nodes: vec![],
            sensors: vec![],
            consts: vec![
                ConstDecl {
                    name: "C1".into(),
                    ty: variant_array,
                    init: ConstInit::Elaborated,
                },
                ConstDecl {
                    name: "C2".into(),
                    ty: variant,
                    init: ConstInit::Elaborated,
                },
            ],
            imports: vec![],
            elaboration: vec![
                ElabStep::SetElement {
                    dst: ConstId(0),
                    index: 0,
                    value: Expr::MakeVariant {
                        ty: variant,
                        tag: 0,
                        payload: Box::new(Expr::Lit {
                            ty: i32_id,
                            value: Value::I32(9),
                        }),
                    },
                },
                ElabStep::Replicate {
                    dst: ConstId(0),
                    src_index: 0,
                    start: 1,
                },
                ElabStep::Assign {
                    dst: ConstId(1),
                    value: Expr::MakeVariant {
                        ty: variant,
                        tag: 1,
                        payload: Box::new(Expr::Lit {
                            ty: bool_box,
                            value: Value::Array(vec![Value::Bool(false)]),
                        }),
                    },
                },
            ],
            entry: NodeId(0),
        }
    }

    #[test]
    fn replication_copies_the_seed_element_forward() {
        let program = elaboration_program();
        let ops = OpSet::plan(&program);
        let table = run(&program, &ops);

        let seed = Value::Variant {
            tag: 0,
            payload: Box::new(Value::I32(9)),
        };
        assert_eq!(table[0], Value::Array(vec![seed; 4]));
        assert_eq!(
            table[1],
            Value::Variant {
                tag: 1,
                payload: Box::new(Value::Array(vec![Value::Bool(false)])),
            }
        );
    }

    #[test]
    fn elaboration_is_deterministic_on_fresh_storage() {
        let program = elaboration_program();
        let ops = OpSet::plan(&program);
        assert_eq!(run(&program, &ops), run(&program, &ops));
    }

    #[test]
    fn literal_constants_pass_through_untouched() {
        let mut program = elaboration_program();
        let i32_id = program.types.lookup(&Type::Scalar(ScalarType::I32)).unwrap();
        program.consts.push(ConstDecl {
            name: "LIT".into(),
            ty: i32_id,
            init: ConstInit::Literal(Value::I32(42)),
        });
        let ops = OpSet::plan(&program);
        let table = run(&program, &ops);
        assert_eq!(table[2], Value::I32(42));
    }
}
