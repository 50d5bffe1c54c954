// ops.rs — Generated structural equality and copy, planned per type
//
// One equality operation and one copy operation exist per distinct type,
// and only for types that something actually compares or copies. A planning
// pass walks a program, collects every site that uses a type by name, and
// requiring an operation for a type transitively requires it for every type
// nested inside, each planned exactly once. Using an unplanned operation is
// a contract violation.
//
// Semantics (identical for every user of a type):
//   equals — arrays compare all N elements (full traversal, logical AND);
//     structs compare every field in declaration order; enums compare
//     discriminants; variants compare tags first and the payload only under
//     a matching tag — a tag mismatch is unequal with no payload
//     inspection; synonyms delegate to their target.
//   copy — full structural deep copy, in place (element and field storage
//     is reused when the destination already has the right shape); for a
//     variant only the active payload is copied.

use std::collections::HashMap;

use crate::elab::ElabStep;
use crate::expr::Expr;
use crate::id::TypeId;
use crate::program::Program;
use crate::types::{Type, TypeTable};
use crate::value::Value;

// ── Per-type operation shape ────────────────────────────────────────────────

/// The traversal recipe recorded for one planned type. Nested ids are
/// guaranteed planned by the transitive requirement rule.
#[derive(Debug, Clone)]
enum OpShape {
    Scalar,
    Enum,
    Array { elem: TypeId, len: usize },
    Struct { fields: Vec<TypeId> },
    Variant { cases: Vec<TypeId> },
    Synonym { target: TypeId },
}

fn shape_of(table: &TypeTable, ty: TypeId) -> OpShape {
    match table.get(ty) {
        Type::Scalar(_) => OpShape::Scalar,
        Type::Enum { .. } => OpShape::Enum,
        Type::Array { elem, len } => OpShape::Array {
            elem: *elem,
            len: *len,
        },
        Type::Struct { fields, .. } => OpShape::Struct {
            fields: fields.iter().map(|f| f.ty).collect(),
        },
        Type::Variant { cases, .. } => OpShape::Variant {
            cases: cases.iter().map(|c| c.payload).collect(),
        },
        Type::Synonym { target, .. } => OpShape::Synonym { target: *target },
    }
}

// ── Op set ──────────────────────────────────────────────────────────────────

/// The structural operations generated for one program.
#[derive(Debug, Default)]
pub struct OpSet {
    eq: HashMap<TypeId, OpShape>,
    cp: HashMap<TypeId, OpShape>,
}

impl OpSet {
    /// Collect the operations a program needs: equality from every
    /// comparison site (which names its type), copy from every register
    /// that persists a composite value and every elaboration replication.
    pub fn plan(program: &Program) -> OpSet {
        let mut ops = OpSet::default();
        let table = &program.types;

        for def in &program.nodes {
            for reg in &def.registers {
                if table.is_composite(reg.ty) {
                    ops.require_copy(table, reg.ty);
                }
            }
            for stmt in &def.body {
                stmt.walk_exprs(&mut |e| ops.collect_expr(table, e));
            }
        }

        for step in &program.elaboration {
            match step {
                ElabStep::Assign { value, .. } | ElabStep::SetElement { value, .. } => {
                    value.walk(&mut |e| ops.collect_expr(table, e));
                }
                ElabStep::Replicate { dst, .. } => {
                    let ty = program.const_decl(*dst).ty;
                    if let Type::Array { elem, .. } = table.get(table.resolve(ty)) {
                        if table.is_composite(*elem) {
                            ops.require_copy(table, *elem);
                        }
                    }
                }
            }
        }
        ops
    }

    fn collect_expr(&mut self, table: &TypeTable, expr: &Expr) {
        if let Expr::Eq { ty, .. } | Expr::Ne { ty, .. } = expr {
            self.require_equals(table, *ty);
        }
    }

    /// Plan equality for `ty` and, transitively, for every nested type.
    pub fn require_equals(&mut self, table: &TypeTable, ty: TypeId) {
        if self.eq.contains_key(&ty) {
            return;
        }
        self.eq.insert(ty, shape_of(table, ty));
        for nested in table.get(ty).nested() {
            self.require_equals(table, nested);
        }
    }

    /// Plan copy for `ty` and, transitively, for every nested type.
    pub fn require_copy(&mut self, table: &TypeTable, ty: TypeId) {
        if self.cp.contains_key(&ty) {
            return;
        }
        self.cp.insert(ty, shape_of(table, ty));
        for nested in table.get(ty).nested() {
            self.require_copy(table, nested);
        }
    }

    pub fn has_equals(&self, ty: TypeId) -> bool {
        self.eq.contains_key(&ty)
    }

    pub fn has_copy(&self, ty: TypeId) -> bool {
        self.cp.contains_key(&ty)
    }

    /// Planned equality types in id order (listing/debug).
    pub fn planned_equals(&self) -> Vec<TypeId> {
        let mut ids: Vec<TypeId> = self.eq.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Planned copy types in id order (listing/debug).
    pub fn planned_copies(&self) -> Vec<TypeId> {
        let mut ids: Vec<TypeId> = self.cp.keys().copied().collect();
        ids.sort();
        ids
    }

    // ── Execution ───────────────────────────────────────────────────────

    /// Structural equality at `ty`. Panics if equality was never planned
    /// for `ty` (the operation does not exist).
    pub fn equals(&self, ty: TypeId, a: &Value, b: &Value) -> bool {
        let op = self
            .eq
            .get(&ty)
            .unwrap_or_else(|| panic!("structural equality not generated for type t{}", ty.0));
        match op {
            OpShape::Scalar | OpShape::Enum => a == b,
            OpShape::Array { elem, len } => match (a, b) {
                (Value::Array(xs), Value::Array(ys)) => {
                    let mut eq = true;
                    for i in 0..*len {
                        let e = self.equals(*elem, &xs[i], &ys[i]);
                        eq = eq && e;
                    }
                    eq
                }
                _ => panic!("array equality applied to non-array values"),
            },
            OpShape::Struct { fields } => match (a, b) {
                (Value::Struct(xs), Value::Struct(ys)) => {
                    let mut eq = true;
                    for (i, fty) in fields.iter().enumerate() {
                        let e = self.equals(*fty, &xs[i], &ys[i]);
                        eq = eq && e;
                    }
                    eq
                }
                _ => panic!("struct equality applied to non-struct values"),
            },
            OpShape::Variant { cases } => match (a, b) {
                (
                    Value::Variant { tag: ta, payload: pa },
                    Value::Variant { tag: tb, payload: pb },
                ) => *ta == *tb && self.equals(cases[*ta], pa, pb),
                _ => panic!("variant equality applied to non-variant values"),
            },
            OpShape::Synonym { target } => self.equals(*target, a, b),
        }
    }

    /// Structural deep copy at `ty`, in place. Panics if copy was never
    /// planned for `ty`.
    pub fn copy_assign(&self, ty: TypeId, dst: &mut Value, src: &Value) {
        let op = self
            .cp
            .get(&ty)
            .unwrap_or_else(|| panic!("structural copy not generated for type t{}", ty.0));
        match op {
            OpShape::Scalar | OpShape::Enum => *dst = src.clone(),
            OpShape::Array { elem, .. } => match (dst, src) {
                (Value::Array(ds), Value::Array(ss)) => {
                    for (d, s) in ds.iter_mut().zip(ss) {
                        self.copy_assign(*elem, d, s);
                    }
                }
                _ => panic!("array copy applied to non-array values"),
            },
            OpShape::Struct { fields } => match (dst, src) {
                (Value::Struct(ds), Value::Struct(ss)) => {
                    for (i, fty) in fields.iter().enumerate() {
                        self.copy_assign(*fty, &mut ds[i], &ss[i]);
                    }
                }
                _ => panic!("struct copy applied to non-struct values"),
            },
            OpShape::Variant { cases } => match (dst, src) {
                (
                    Value::Variant { tag: dt, payload: dp },
                    Value::Variant { tag: st, payload: sp },
                ) => {
                    if *dt == *st {
                        self.copy_assign(cases[*st], dp, sp);
                    } else {
                        *dt = *st;
                        *dp = sp.clone();
                    }
                }
                _ => panic!("variant copy applied to non-variant values"),
            },
            OpShape::Synonym { target } => self.copy_assign(*target, dst, src),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ScalarType, StructField, VariantCase};

    fn variant_table() -> (TypeTable, TypeId, TypeId, TypeId) {
        let mut table = TypeTable::new();
        let i32_id = table.intern(Type::Scalar(ScalarType::I32));
        let bool_id = table.intern(Type::Scalar(ScalarType::Bool));
        let boxed = table.intern(Type::Array { elem: bool_id, len: 1 });
        let variant = table.intern(Type::Variant {
            name: "T_Variant".into(),
            cases: vec![
                VariantCase {
                    name: "T_int".into(),
                    payload: i32_id,
                },
                VariantCase {
                    name: "T_bool_box".into(),
                    payload: boxed,
                },
            ],
        });
        (table, variant, i32_id, boxed)
    }

    #[test]
    fn requirement_is_transitive_and_exactly_once() {
        let (table, variant, i32_id, boxed) = variant_table();
        let mut ops = OpSet::default();
        ops.require_equals(&table, variant);
        ops.require_equals(&table, variant);

        assert!(ops.has_equals(variant));
        assert!(ops.has_equals(i32_id));
        assert!(ops.has_equals(boxed));
        // variant + both payloads + the bool element, nothing else, once each
        assert_eq!(ops.planned_equals().len(), 4);
    }

    #[test]
    fn variant_tag_mismatch_is_unequal_without_payload_comparison() {
        let (table, variant, ..) = variant_table();
        let mut ops = OpSet::default();
        ops.require_equals(&table, variant);

        let int_case = Value::Variant {
            tag: 0,
            payload: Box::new(Value::I32(9)),
        };
        let box_case = Value::Variant {
            tag: 1,
            payload: Box::new(Value::Array(vec![Value::Bool(false)])),
        };
        // Payload shapes differ; comparing them would panic on kind
        // mismatch, so a false here proves the payloads were never read.
        assert!(!ops.equals(variant, &int_case, &box_case));
        assert!(ops.equals(variant, &int_case, &int_case.clone()));
    }

    #[test]
    fn copy_preserves_equality() {
        let (table, variant, ..) = variant_table();
        let mut ops = OpSet::default();
        ops.require_equals(&table, variant);
        ops.require_copy(&table, variant);

        let src = Value::Variant {
            tag: 1,
            payload: Box::new(Value::Array(vec![Value::Bool(true)])),
        };
        let mut dst = Value::Variant {
            tag: 0,
            payload: Box::new(Value::I32(0)),
        };
        ops.copy_assign(variant, &mut dst, &src);
        assert!(ops.equals(variant, &dst, &src));
    }

    #[test]
    fn copy_reuses_destination_storage_in_place() {
        let (table, _, i32_id, _) = variant_table();
        let mut table = table;
        let arr = table.intern(Type::Array {
            elem: i32_id,
            len: 3,
        });
        let mut ops = OpSet::default();
        ops.require_copy(&table, arr);

        let src = Value::Array(vec![Value::I32(1), Value::I32(2), Value::I32(3)]);
        let mut dst = Value::Array(vec![Value::I32(0), Value::I32(0), Value::I32(0)]);
        ops.copy_assign(arr, &mut dst, &src);
        assert_eq!(dst, src);
    }

    #[test]
    #[should_panic(expected = "not generated for type")]
    fn unplanned_operation_is_a_contract_violation() {
        let (_, variant, ..) = variant_table();
        let ops = OpSet::default();
        ops.equals(variant, &Value::I32(0), &Value::I32(0));
    }
}
