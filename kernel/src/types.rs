// types.rs — Type descriptors and the interned type table
//
// Types describe the fixed-size data a compiled program moves between
// nodes: scalars, bounded arrays, structs, payload-carrying variants,
// plain enums, and synonyms. Every shape is fixed at definition time.
// The table deduplicates by structural identity: interning the same shape
// twice yields the same TypeId, so one generated equality/copy operation
// serves every user of that shape.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::id::TypeId;

// ── Scalar kinds ────────────────────────────────────────────────────────────

/// Fixed-width scalar kinds. The closed set mirrors the wire types the
/// numeric backend provides; no platform-dependent widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl ScalarType {
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::I8 => "i8",
            ScalarType::I16 => "i16",
            ScalarType::I32 => "i32",
            ScalarType::I64 => "i64",
            ScalarType::U8 => "u8",
            ScalarType::U16 => "u16",
            ScalarType::U32 => "u32",
            ScalarType::U64 => "u64",
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarType::F32 | ScalarType::F64)
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            ScalarType::I8 | ScalarType::I16 | ScalarType::I32 | ScalarType::I64
        )
    }

    pub fn is_integer(self) -> bool {
        !self.is_float() && self != ScalarType::Bool
    }

    /// Numeric kinds admit arithmetic and ordered comparison; bool does not.
    pub fn is_numeric(self) -> bool {
        self != ScalarType::Bool
    }
}

// ── Type descriptors ────────────────────────────────────────────────────────

/// One named struct field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructField {
    pub name: String,
    pub ty: TypeId,
}

/// One variant case: a tag name plus the payload type live under that tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantCase {
    pub name: String,
    pub payload: TypeId,
}

/// A type descriptor. Composite descriptors refer to other table entries
/// by id; ids always point at earlier entries, so no descriptor can reach
/// itself (bounded nesting only).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Scalar(ScalarType),
    Array { elem: TypeId, len: usize },
    Struct { name: String, fields: Vec<StructField> },
    Enum { name: String, tags: Vec<String> },
    Variant { name: String, cases: Vec<VariantCase> },
    Synonym { name: String, target: TypeId },
}

impl Type {
    /// Ids of the types nested directly inside this descriptor.
    pub fn nested(&self) -> Vec<TypeId> {
        match self {
            Type::Scalar(_) | Type::Enum { .. } => Vec::new(),
            Type::Array { elem, .. } => vec![*elem],
            Type::Struct { fields, .. } => fields.iter().map(|f| f.ty).collect(),
            Type::Variant { cases, .. } => cases.iter().map(|c| c.payload).collect(),
            Type::Synonym { target, .. } => vec![*target],
        }
    }
}

// ── Type table ──────────────────────────────────────────────────────────────

/// Interned type table. Serialized as the bare entry list; the structural
/// index is rebuilt on deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Type>", into = "Vec<Type>")]
pub struct TypeTable {
    entries: Vec<Type>,
    index: HashMap<Type, TypeId>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a descriptor, deduplicating by structural identity.
    ///
    /// Referenced ids must already be in the table; this is what keeps the
    /// table acyclic and the nesting bounded.
    pub fn intern(&mut self, ty: Type) -> TypeId {
        for nested in ty.nested() {
            assert!(
                nested.index() < self.entries.len(),
                "type descriptor references unknown type t{}",
                nested.0
            );
        }
        if let Some(&id) = self.index.get(&ty) {
            return id;
        }
        let id = TypeId(self.entries.len() as u32);
        self.index.insert(ty.clone(), id);
        self.entries.push(ty);
        id
    }

    /// Find an already-interned descriptor without inserting.
    pub fn lookup(&self, ty: &Type) -> Option<TypeId> {
        self.index.get(ty).copied()
    }

    pub fn get(&self, id: TypeId) -> &Type {
        self.entries
            .get(id.index())
            .unwrap_or_else(|| panic!("unknown type t{}", id.0))
    }

    /// Follow synonym links to the underlying type id.
    pub fn resolve(&self, id: TypeId) -> TypeId {
        let mut cur = id;
        while let Type::Synonym { target, .. } = self.get(cur) {
            cur = *target;
        }
        cur
    }

    /// Scalar kind of a type, looking through synonyms.
    pub fn scalar_of(&self, id: TypeId) -> Option<ScalarType> {
        match self.get(self.resolve(id)) {
            Type::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    /// True for shapes that need generated structural operations
    /// (arrays, structs, variants); scalars and enums copy by assignment.
    pub fn is_composite(&self, id: TypeId) -> bool {
        matches!(
            self.get(self.resolve(id)),
            Type::Array { .. } | Type::Struct { .. } | Type::Variant { .. }
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &Type)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, t)| (TypeId(i as u32), t))
    }

    /// Human-readable rendering of a type, used in listings and errors.
    pub fn display_name(&self, id: TypeId) -> String {
        match self.get(id) {
            Type::Scalar(s) => s.name().to_string(),
            Type::Array { elem, len } => format!("[{}; {}]", self.display_name(*elem), len),
            Type::Struct { name, .. } => name.clone(),
            Type::Enum { name, .. } => name.clone(),
            Type::Variant { name, .. } => name.clone(),
            Type::Synonym { name, .. } => name.clone(),
        }
    }
}

impl From<Vec<Type>> for TypeTable {
    fn from(entries: Vec<Type>) -> Self {
        let mut index = HashMap::with_capacity(entries.len());
        for (i, ty) in entries.iter().enumerate() {
            index.entry(ty.clone()).or_insert(TypeId(i as u32));
        }
        TypeTable { entries, index }
    }
}

impl From<TypeTable> for Vec<Type> {
    fn from(table: TypeTable) -> Self {
        table.entries
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_deduplicates_by_structure() {
        let mut table = TypeTable::new();
        let i32_a = table.intern(Type::Scalar(ScalarType::I32));
        let i32_b = table.intern(Type::Scalar(ScalarType::I32));
        assert_eq!(i32_a, i32_b);

        let arr_a = table.intern(Type::Array { elem: i32_a, len: 4 });
        let arr_b = table.intern(Type::Array { elem: i32_b, len: 4 });
        let arr_c = table.intern(Type::Array { elem: i32_a, len: 5 });
        assert_eq!(arr_a, arr_b);
        assert_ne!(arr_a, arr_c);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn synonyms_resolve_to_target() {
        let mut table = TypeTable::new();
        let f32_id = table.intern(Type::Scalar(ScalarType::F32));
        let syn = table.intern(Type::Synonym {
            name: "floatType".into(),
            target: f32_id,
        });
        let syn2 = table.intern(Type::Synonym {
            name: "floatType2".into(),
            target: syn,
        });
        assert_eq!(table.resolve(syn2), f32_id);
        assert_eq!(table.scalar_of(syn2), Some(ScalarType::F32));
        assert!(!table.is_composite(syn2));
    }

    #[test]
    fn display_names_render_nested_arrays() {
        let mut table = TypeTable::new();
        let i32_id = table.intern(Type::Scalar(ScalarType::I32));
        let inner = table.intern(Type::Array { elem: i32_id, len: 2 });
        let outer = table.intern(Type::Array { elem: inner, len: 3 });
        assert_eq!(table.display_name(outer), "[[i32; 2]; 3]");
    }

    #[test]
    fn serde_roundtrip_rebuilds_index() {
        let mut table = TypeTable::new();
        let b = table.intern(Type::Scalar(ScalarType::Bool));
        table.intern(Type::Array { elem: b, len: 1 });

        let json = serde_json::to_string(&table).unwrap();
        let back: TypeTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.lookup(&Type::Scalar(ScalarType::Bool)), Some(b));
    }

    #[test]
    #[should_panic(expected = "references unknown type")]
    fn interning_rejects_dangling_references() {
        let mut table = TypeTable::new();
        table.intern(Type::Array {
            elem: TypeId(7),
            len: 2,
        });
    }
}
