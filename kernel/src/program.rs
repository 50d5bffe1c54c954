// program.rs — Compiled program IR
//
// A Program is the self-contained artifact a front end hands to the kernel:
// type table, node definitions, sensor and constant declarations, imported
// function signatures, the elaboration schedule, and the entry node. The
// kernel never consults anything upstream of this structure.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::elab::ElabStep;
use crate::id::{ConstId, NodeId, SensorId, TypeId};
use crate::node::NodeDef;
use crate::types::TypeTable;
use crate::value::Value;

// ── Declarations ────────────────────────────────────────────────────────────

/// A sensor: a typed process-wide value written by the host environment and
/// read-only from node code. `init` is the value observed before the host
/// first writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorDecl {
    pub name: String,
    pub ty: TypeId,
    pub init: Value,
}

/// How a constant table entry gets its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstInit {
    /// Literal value, available as-is from process start.
    Literal(Value),
    /// Computed by the elaboration pass before the first tick.
    Elaborated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstDecl {
    pub name: String,
    pub ty: TypeId,
    pub init: ConstInit,
}

/// Signature of an externally supplied pure function: typed inputs to typed
/// outputs, no context, no persistent state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDecl {
    pub name: String,
    pub params: Vec<TypeId>,
    pub results: Vec<TypeId>,
}

// ── Program ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub types: TypeTable,
    pub nodes: Vec<NodeDef>,
    pub sensors: Vec<SensorDecl>,
    pub consts: Vec<ConstDecl>,
    pub imports: Vec<ImportDecl>,
    /// Elaboration schedule; order is significant and fixed.
    pub elaboration: Vec<ElabStep>,
    /// The top-level node a host drives.
    pub entry: NodeId,
}

impl Program {
    pub fn node(&self, id: NodeId) -> &NodeDef {
        self.nodes
            .get(id.index())
            .unwrap_or_else(|| panic!("unknown node n{}", id.0))
    }

    pub fn sensor(&self, id: SensorId) -> &SensorDecl {
        self.sensors
            .get(id.index())
            .unwrap_or_else(|| panic!("unknown sensor s{}", id.0))
    }

    pub fn const_decl(&self, id: ConstId) -> &ConstDecl {
        self.consts
            .get(id.index())
            .unwrap_or_else(|| panic!("unknown constant c{}", id.0))
    }

    /// Sensor id by declared name.
    pub fn sensor_by_name(&self, name: &str) -> Option<SensorId> {
        self.sensors
            .iter()
            .position(|s| s.name == name)
            .map(|i| SensorId(i as u32))
    }

    /// Node id by declared name.
    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.name == name)
            .map(|i| NodeId(i as u32))
    }

    /// Canonical compact-JSON encoding. Field order is fixed by the struct
    /// declarations and the type table serializes as a bare list, so equal
    /// programs encode identically.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).expect("program IR is always serializable")
    }

    pub fn from_json(json: &str) -> Result<Program, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// SHA-256 over the canonical encoding, as lowercase hex.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_json().as_bytes());
        let hash = hasher.finalize();
        hash.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Expr, Stmt};
    use crate::node::PortDecl;
    use crate::types::{ScalarType, Type};

    fn passthrough() -> Program {
        let mut types = TypeTable::new();
        let i32_id = types.intern(Type::Scalar(ScalarType::I32));
        Program {
            types,
            nodes: vec![NodeDef {
                name: "pass".into(),
                inputs: vec![PortDecl {
                    name: "i0".into(),
                    ty: i32_id,
                }],
                outputs: vec![PortDecl {
                    name: "o0".into(),
                    ty: i32_id,
                }],
                locals: vec![],
                registers: vec![],
                children: vec![],
                uses_first_tick: false,
                user_defined_init: false,
                body: vec![Stmt::SetOutput {
                    output: 0,
                    value: Expr::Input(0),
                }],
            }],
            sensors: vec![],
            consts: vec![],
            imports: vec![],
            elaboration: vec![],
            entry: NodeId(0),
        }
    }

    #[test]
    fn json_roundtrip_preserves_program() {
        let program = passthrough();
        let json = program.canonical_json();
        let back = Program::from_json(&json).unwrap();
        assert_eq!(back, program);
    }

    #[test]
    fn fingerprint_is_stable_and_shape_sensitive() {
        let a = passthrough();
        let b = passthrough();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        let mut c = passthrough();
        c.nodes[0].name = "other".into();
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
