// expr.rs — Equation IR for compiled node bodies
//
// A node body is a flat statement list, already scheduled by the front end:
// statement order is the fixed topological order in which child instances
// fire and registers are read and overwritten. Nothing here is resolved at
// run time. Structural comparison sites carry the TypeId they compare at,
// the way generated code names its comparator per type, and constructors
// carry the type they build.

use serde::{Deserialize, Serialize};

use crate::id::{ConstId, FuncId, SensorId, TypeId};
use crate::types::ScalarType;
use crate::value::Value;

// ── Operators ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    /// Logical negation (bool).
    Not,
    /// Arithmetic negation (signed integer or float).
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Lt,
    Le,
    Gt,
    Ge,
}

// ── Expressions ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Typed literal. Composite literals are permitted (constant folding
    /// happens in the front end).
    Lit { ty: TypeId, value: Value },
    /// Read input port by position.
    Input(usize),
    /// Read a body local. Must be assigned earlier on every path.
    Local(usize),
    /// Read a register: always the pre-overwrite value at this point in
    /// statement order.
    Register(usize),
    /// Read the current sensor snapshot.
    Sensor(SensorId),
    /// Read an elaborated or literal constant.
    Const(ConstId),
    /// True on the tick where the initialization flag is still armed.
    FirstTick,
    Unary {
        op: UnOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Structural equality at type `ty`.
    Eq {
        ty: TypeId,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Structural inequality at type `ty`.
    Ne {
        ty: TypeId,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Scalar conversion.
    Cast {
        to: ScalarType,
        expr: Box<Expr>,
    },
    /// Array element projection at a compile-time index.
    Element {
        array: Box<Expr>,
        index: usize,
    },
    /// Struct field projection by field position.
    Field {
        base: Box<Expr>,
        field: usize,
    },
    /// Build an array of type `ty` from one expression per element.
    MakeArray {
        ty: TypeId,
        elems: Vec<Expr>,
    },
    /// Build an array of type `ty` by replicating one element value.
    Replicate {
        ty: TypeId,
        elem: Box<Expr>,
    },
    /// Build a struct of type `ty`, one expression per field in order.
    MakeStruct {
        ty: TypeId,
        fields: Vec<Expr>,
    },
    /// Enum constant of type `ty`.
    MakeEnum {
        ty: TypeId,
        tag: usize,
    },
    /// Build a variant of type `ty` with the given active tag.
    MakeVariant {
        ty: TypeId,
        tag: usize,
        payload: Box<Expr>,
    },
}

impl Expr {
    /// Pre-order walk over this expression tree.
    pub fn walk(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Lit { .. }
            | Expr::Input(_)
            | Expr::Local(_)
            | Expr::Register(_)
            | Expr::Sensor(_)
            | Expr::Const(_)
            | Expr::FirstTick
            | Expr::MakeEnum { .. } => {}
            Expr::Unary { expr, .. } | Expr::Cast { expr, .. } => expr.walk(f),
            Expr::Binary { lhs, rhs, .. }
            | Expr::Eq { lhs, rhs, .. }
            | Expr::Ne { lhs, rhs, .. } => {
                lhs.walk(f);
                rhs.walk(f);
            }
            Expr::Element { array, .. } => array.walk(f),
            Expr::Field { base, .. } => base.walk(f),
            Expr::MakeArray { elems, .. } => {
                for e in elems {
                    e.walk(f);
                }
            }
            Expr::Replicate { elem, .. } => elem.walk(f),
            Expr::MakeStruct { fields, .. } => {
                for e in fields {
                    e.walk(f);
                }
            }
            Expr::MakeVariant { payload, .. } => payload.walk(f),
        }
    }
}

// ── Statements ──────────────────────────────────────────────────────────────

/// One arm of a variant dispatch: fires when the scrutinee carries `tag`,
/// optionally binding the payload to a body local first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchArm {
    pub tag: usize,
    pub binding: Option<usize>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// Assign a body local.
    Let { local: usize, value: Expr },
    /// Assign an output port.
    SetOutput { output: usize, value: Expr },
    /// Overwrite a register. Reads of the same register earlier in
    /// statement order observed the pre-overwrite value.
    SetRegister { register: usize, value: Expr },
    /// Two-way branch; exactly one side executes.
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    /// Variant tag dispatch; arms must cover every tag of `ty`.
    Match {
        ty: TypeId,
        scrutinee: Expr,
        arms: Vec<MatchArm>,
    },
    /// Fire one child instance: evaluate inputs, step the child's context,
    /// store its outputs into body locals.
    StepChild {
        child: usize,
        inputs: Vec<Expr>,
        results: Vec<usize>,
    },
    /// Call an imported pure function, storing its results into body locals.
    CallImport {
        func: FuncId,
        args: Vec<Expr>,
        results: Vec<usize>,
    },
    /// Disarm the initialization flag; irreversible until reset.
    ClearFirstTick,
}

impl Stmt {
    /// Walk every expression under this statement (recursing into nested
    /// statement blocks).
    pub fn walk_exprs(&self, f: &mut impl FnMut(&Expr)) {
        match self {
            Stmt::Let { value, .. }
            | Stmt::SetOutput { value, .. }
            | Stmt::SetRegister { value, .. } => value.walk(f),
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                cond.walk(f);
                for s in then_body.iter().chain(else_body) {
                    s.walk_exprs(f);
                }
            }
            Stmt::Match {
                scrutinee, arms, ..
            } => {
                scrutinee.walk(f);
                for arm in arms {
                    for s in &arm.body {
                        s.walk_exprs(f);
                    }
                }
            }
            Stmt::StepChild { inputs, .. } => {
                for e in inputs {
                    e.walk(f);
                }
            }
            Stmt::CallImport { args, .. } => {
                for e in args {
                    e.walk(f);
                }
            }
            Stmt::ClearFirstTick => {}
        }
    }
}
