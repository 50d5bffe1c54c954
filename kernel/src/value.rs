// value.rs — Runtime values
//
// A Value is one cell of data flowing through a program: exact-width
// scalars, fixed-length arrays, structs, enum discriminants, and variants.
// Variant is a true sum: only the active tag's payload exists, so reading
// an inactive payload is unrepresentable rather than merely forbidden.
//
// Arithmetic uses wrapping semantics for integers and IEEE semantics for
// floats. Kind mismatches are caller contract violations and panic; the
// program verifier rules them out for verified IR.

use serde::{Deserialize, Serialize};

use crate::id::TypeId;
use crate::types::{ScalarType, Type, TypeTable};

/// One runtime value. Enum values carry only their tag index; the verifier
/// keeps tags and the types they belong to consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Enum(usize),
    Array(Vec<Value>),
    Struct(Vec<Value>),
    Variant { tag: usize, payload: Box<Value> },
}

impl Value {
    /// Scalar kind of this value, if it is a scalar.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self {
            Value::Bool(_) => Some(ScalarType::Bool),
            Value::I8(_) => Some(ScalarType::I8),
            Value::I16(_) => Some(ScalarType::I16),
            Value::I32(_) => Some(ScalarType::I32),
            Value::I64(_) => Some(ScalarType::I64),
            Value::U8(_) => Some(ScalarType::U8),
            Value::U16(_) => Some(ScalarType::U16),
            Value::U32(_) => Some(ScalarType::U32),
            Value::U64(_) => Some(ScalarType::U64),
            Value::F32(_) => Some(ScalarType::F32),
            Value::F64(_) => Some(ScalarType::F64),
            _ => None,
        }
    }

    /// Canonical zero of a type: numeric zero, false, tag 0, zeroed
    /// elements/fields, and for variants tag 0 with a zeroed payload.
    pub fn zero(table: &TypeTable, ty: TypeId) -> Value {
        match table.get(table.resolve(ty)) {
            Type::Scalar(s) => match s {
                ScalarType::Bool => Value::Bool(false),
                ScalarType::I8 => Value::I8(0),
                ScalarType::I16 => Value::I16(0),
                ScalarType::I32 => Value::I32(0),
                ScalarType::I64 => Value::I64(0),
                ScalarType::U8 => Value::U8(0),
                ScalarType::U16 => Value::U16(0),
                ScalarType::U32 => Value::U32(0),
                ScalarType::U64 => Value::U64(0),
                ScalarType::F32 => Value::F32(0.0),
                ScalarType::F64 => Value::F64(0.0),
            },
            Type::Array { elem, len } => {
                Value::Array(vec![Value::zero(table, *elem); *len])
            }
            Type::Struct { fields, .. } => {
                Value::Struct(fields.iter().map(|f| Value::zero(table, f.ty)).collect())
            }
            Type::Enum { .. } => Value::Enum(0),
            Type::Variant { cases, .. } => Value::Variant {
                tag: 0,
                payload: Box::new(Value::zero(table, cases[0].payload)),
            },
            Type::Synonym { .. } => unreachable!("resolve() strips synonyms"),
        }
    }

    /// Structural shape check of a value against a declared type. Used at
    /// host boundaries (sensor writes, imported-function results, literal
    /// verification) where data enters from outside verified node code.
    pub fn conforms(table: &TypeTable, ty: TypeId, value: &Value) -> bool {
        match (table.get(table.resolve(ty)), value) {
            (Type::Scalar(s), v) => v.scalar_type() == Some(*s),
            (Type::Array { elem, len }, Value::Array(elems)) => {
                elems.len() == *len && elems.iter().all(|e| Value::conforms(table, *elem, e))
            }
            (Type::Struct { fields, .. }, Value::Struct(vals)) => {
                vals.len() == fields.len()
                    && fields
                        .iter()
                        .zip(vals)
                        .all(|(f, v)| Value::conforms(table, f.ty, v))
            }
            (Type::Enum { tags, .. }, Value::Enum(tag)) => *tag < tags.len(),
            (Type::Variant { cases, .. }, Value::Variant { tag, payload }) => {
                *tag < cases.len() && Value::conforms(table, cases[*tag].payload, payload)
            }
            _ => false,
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            other => panic!("expected bool, got {:?}", other),
        }
    }
}

// ── Scalar arithmetic ───────────────────────────────────────────────────────

macro_rules! arith {
    ($name:ident, $int:ident, $flt:tt) => {
        pub fn $name(a: &Value, b: &Value) -> Value {
            match (a, b) {
                (Value::I8(x), Value::I8(y)) => Value::I8(x.$int(*y)),
                (Value::I16(x), Value::I16(y)) => Value::I16(x.$int(*y)),
                (Value::I32(x), Value::I32(y)) => Value::I32(x.$int(*y)),
                (Value::I64(x), Value::I64(y)) => Value::I64(x.$int(*y)),
                (Value::U8(x), Value::U8(y)) => Value::U8(x.$int(*y)),
                (Value::U16(x), Value::U16(y)) => Value::U16(x.$int(*y)),
                (Value::U32(x), Value::U32(y)) => Value::U32(x.$int(*y)),
                (Value::U64(x), Value::U64(y)) => Value::U64(x.$int(*y)),
                (Value::F32(x), Value::F32(y)) => Value::F32(x $flt y),
                (Value::F64(x), Value::F64(y)) => Value::F64(x $flt y),
                (x, y) => panic!("scalar kind mismatch in arithmetic: {:?} vs {:?}", x, y),
            }
        }
    };
}

arith!(add, wrapping_add, +);
arith!(sub, wrapping_sub, -);
arith!(mul, wrapping_mul, *);
arith!(div, wrapping_div, /);
arith!(rem, wrapping_rem, %);

macro_rules! ordered {
    ($name:ident, $op:tt) => {
        pub fn $name(a: &Value, b: &Value) -> bool {
            match (a, b) {
                (Value::I8(x), Value::I8(y)) => x $op y,
                (Value::I16(x), Value::I16(y)) => x $op y,
                (Value::I32(x), Value::I32(y)) => x $op y,
                (Value::I64(x), Value::I64(y)) => x $op y,
                (Value::U8(x), Value::U8(y)) => x $op y,
                (Value::U16(x), Value::U16(y)) => x $op y,
                (Value::U32(x), Value::U32(y)) => x $op y,
                (Value::U64(x), Value::U64(y)) => x $op y,
                (Value::F32(x), Value::F32(y)) => x $op y,
                (Value::F64(x), Value::F64(y)) => x $op y,
                (x, y) => panic!("scalar kind mismatch in comparison: {:?} vs {:?}", x, y),
            }
        }
    };
}

ordered!(lt, <);
ordered!(le, <=);
ordered!(gt, >);
ordered!(ge, >=);

pub fn neg(v: &Value) -> Value {
    match v {
        Value::I8(x) => Value::I8(x.wrapping_neg()),
        Value::I16(x) => Value::I16(x.wrapping_neg()),
        Value::I32(x) => Value::I32(x.wrapping_neg()),
        Value::I64(x) => Value::I64(x.wrapping_neg()),
        Value::F32(x) => Value::F32(-x),
        Value::F64(x) => Value::F64(-x),
        other => panic!("negation of non-signed value {:?}", other),
    }
}

pub fn not(v: &Value) -> Value {
    Value::Bool(!v.as_bool())
}

fn widen_int(v: &Value) -> Option<i128> {
    match v {
        Value::Bool(b) => Some(*b as i128),
        Value::I8(x) => Some(*x as i128),
        Value::I16(x) => Some(*x as i128),
        Value::I32(x) => Some(*x as i128),
        Value::I64(x) => Some(*x as i128),
        Value::U8(x) => Some(*x as i128),
        Value::U16(x) => Some(*x as i128),
        Value::U32(x) => Some(*x as i128),
        Value::U64(x) => Some(*x as i128),
        Value::Enum(tag) => Some(*tag as i128),
        _ => None,
    }
}

fn widen_float(v: &Value) -> Option<f64> {
    match v {
        Value::F32(x) => Some(*x as f64),
        Value::F64(x) => Some(*x),
        _ => widen_int(v).map(|i| i as f64),
    }
}

/// Scalar conversion: integer/enum/bool sources convert with truncation
/// (modular for unsigned, two's-complement for signed), float-to-integer
/// saturates, integer-to-float rounds to nearest.
pub fn cast(to: ScalarType, v: &Value) -> Value {
    if to.is_float() {
        let f = widen_float(v).unwrap_or_else(|| panic!("cast of non-scalar {:?}", v));
        return match to {
            ScalarType::F32 => Value::F32(f as f32),
            _ => Value::F64(f),
        };
    }
    let i: i128 = match v {
        Value::F32(x) => *x as i128,
        Value::F64(x) => *x as i128,
        other => widen_int(other).unwrap_or_else(|| panic!("cast of non-scalar {:?}", other)),
    };
    match to {
        ScalarType::Bool => Value::Bool(i != 0),
        ScalarType::I8 => Value::I8(i as i8),
        ScalarType::I16 => Value::I16(i as i16),
        ScalarType::I32 => Value::I32(i as i32),
        ScalarType::I64 => Value::I64(i as i64),
        ScalarType::U8 => Value::U8(i as u8),
        ScalarType::U16 => Value::U16(i as u16),
        ScalarType::U32 => Value::U32(i as u32),
        ScalarType::U64 => Value::U64(i as u64),
        ScalarType::F32 | ScalarType::F64 => unreachable!(),
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn small_table() -> (TypeTable, TypeId) {
        let mut table = TypeTable::new();
        let i32_id = table.intern(Type::Scalar(ScalarType::I32));
        let arr = table.intern(Type::Array { elem: i32_id, len: 3 });
        (table, arr)
    }

    #[test]
    fn zero_builds_full_shape() {
        let (table, arr) = small_table();
        assert_eq!(
            Value::zero(&table, arr),
            Value::Array(vec![Value::I32(0), Value::I32(0), Value::I32(0)])
        );
    }

    #[test]
    fn conforms_checks_length_and_kind() {
        let (table, arr) = small_table();
        let good = Value::Array(vec![Value::I32(1), Value::I32(2), Value::I32(3)]);
        let short = Value::Array(vec![Value::I32(1)]);
        let wrong = Value::Array(vec![Value::F32(1.0), Value::F32(2.0), Value::F32(3.0)]);
        assert!(Value::conforms(&table, arr, &good));
        assert!(!Value::conforms(&table, arr, &short));
        assert!(!Value::conforms(&table, arr, &wrong));
    }

    #[test]
    fn integer_arithmetic_wraps() {
        assert_eq!(add(&Value::U8(255), &Value::U8(1)), Value::U8(0));
        assert_eq!(sub(&Value::I8(-128), &Value::I8(1)), Value::I8(127));
    }

    #[test]
    fn casts_truncate_and_saturate() {
        assert_eq!(cast(ScalarType::U8, &Value::I32(300)), Value::U8(44));
        assert_eq!(cast(ScalarType::I32, &Value::F32(3.9)), Value::I32(3));
        assert_eq!(cast(ScalarType::F64, &Value::I32(2)), Value::F64(2.0));
        assert_eq!(cast(ScalarType::I32, &Value::Enum(2)), Value::I32(2));
    }

    #[test]
    #[should_panic(expected = "scalar kind mismatch")]
    fn mixed_width_arithmetic_is_a_contract_violation() {
        add(&Value::I32(1), &Value::I64(1));
    }
}
