// node.rs — Node definitions, persistent contexts, and the runtime contract
//
// A node is one compiled unit of stateful computation. Its definition is
// pure data (ports, registers, child instances, body); its persistent state
// lives in a Context the owning program allocates once and threads through
// every call. The init/step/reset triple is the entire ABI a host or parent
// node depends on.

use serde::{Deserialize, Serialize};

use crate::expr::Stmt;
use crate::id::{NodeId, TypeId};
use crate::program::Program;
use crate::value::Value;
use crate::world::World;

// ── Declarations ────────────────────────────────────────────────────────────

/// An input or output port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDecl {
    pub name: String,
    pub ty: TypeId,
}

/// A body local (scratch slot, not carried across ticks).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDecl {
    pub name: String,
    pub ty: TypeId,
}

/// A register: a value carried from one tick to the next.
///
/// `init` is the starting value written by `init`. `reset` names the value
/// restored by `reset`, for the subset of registers that represent pending
/// state (delay lines, latches); registers with `reset: None` keep their
/// contents across a reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterDecl {
    pub name: String,
    pub ty: TypeId,
    pub init: Value,
    pub reset: Option<Value>,
}

/// One child node instance. Two instances of the same definition are
/// independent state; the name is unique within the parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildDecl {
    pub name: String,
    pub node: NodeId,
}

/// A compiled node definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub name: String,
    pub inputs: Vec<PortDecl>,
    pub outputs: Vec<PortDecl>,
    pub locals: Vec<LocalDecl>,
    pub registers: Vec<RegisterDecl>,
    pub children: Vec<ChildDecl>,
    /// True when first-tick behavior differs from subsequent ticks; the
    /// context then carries an initialization flag the body may branch on.
    pub uses_first_tick: bool,
    /// True when the host supplies this node's initial register contents
    /// itself; generated `init` then leaves the registers alone (it still
    /// arms the flag and recurses into children).
    pub user_defined_init: bool,
    pub body: Vec<Stmt>,
}

// ── Context ─────────────────────────────────────────────────────────────────

/// The persistent state cell of one node instance: registers, the
/// initialization flag, and one nested context per child instance.
///
/// A context is allocated once, owned singly by its parent (or the host,
/// for the root), and never deallocated or restructured. It remembers which
/// definition it was allocated for; passing it to another node's operations
/// is a contract violation caught by assertion.
#[derive(Debug, Clone)]
pub struct Context {
    node: NodeId,
    pub(crate) registers: Vec<Value>,
    pub(crate) first_tick: bool,
    pub(crate) children: Vec<Context>,
}

impl Context {
    /// Allocate the full context tree for one instance of `node`,
    /// registers seeded with their declared starting values.
    pub fn allocate(program: &Program, node: NodeId) -> Context {
        let def = program.node(node);
        Context {
            node,
            registers: def.registers.iter().map(|r| r.init.clone()).collect(),
            first_tick: def.uses_first_tick,
            children: def
                .children
                .iter()
                .map(|c| Context::allocate(program, c.node))
                .collect(),
        }
    }

    /// The definition this context belongs to.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Whether the initialization flag is still armed.
    pub fn first_tick(&self) -> bool {
        self.first_tick
    }

    pub fn register(&self, index: usize) -> &Value {
        &self.registers[index]
    }

    /// Child context by declaration position.
    pub fn child(&self, index: usize) -> &Context {
        &self.children[index]
    }

    /// Mutable register access for hosts seeding a `user_defined_init`
    /// node's state.
    pub fn register_mut(&mut self, index: usize) -> &mut Value {
        &mut self.registers[index]
    }

    pub fn child_mut(&mut self, index: usize) -> &mut Context {
        &mut self.children[index]
    }
}

// ── Runtime contract ────────────────────────────────────────────────────────

/// The three-operation protocol every computational unit implements.
///
/// None of the operations may fail under well-formed input: there are no
/// error paths in this layer, only caller contract violations, which panic.
pub trait Node {
    /// Set every register and nested child context to its starting state
    /// and arm the initialization flag. Idempotent.
    fn init(&self, ctx: &mut Context);

    /// Compute one logical tick: a pure function of `inputs` and the
    /// pre-call contents of `ctx`, plus sensor and constant reads from
    /// `world`. Child contexts fire in the fixed order the body encodes.
    fn step(&self, inputs: &[Value], ctx: &mut Context, world: &World) -> Vec<Value>;

    /// Restore pending/initialization state (re-arm the flag, rewrite the
    /// registers that declare a reset value) without touching the rest,
    /// recursively over children. Idempotent.
    fn reset(&self, ctx: &mut Context);
}
