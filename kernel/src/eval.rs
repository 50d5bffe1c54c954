// eval.rs — The step evaluator
//
// A Machine binds a verified program to its imported function
// implementations and carries the planned structural operations. It
// executes the init/step/reset protocol recursively over a context tree:
// one step call is one complete, non-interruptible traversal in the fixed
// order the body statements encode. Child contexts fire where their
// StepChild statement sits; register reads earlier in statement order
// observe pre-overwrite values, which is what makes unit delays work.
//
// Nothing in this layer can fail under well-formed input. Identity and
// shape assertions catch caller contract violations; there are no
// recoverable error paths.

use std::fmt;

use crate::elab;
use crate::expr::{Expr, Stmt, UnOp};
use crate::id::NodeId;
use crate::node::{Context, Node, NodeDef};
use crate::ops::OpSet;
use crate::program::Program;
use crate::registry::{HostFn, Registry};
use crate::types::Type;
use crate::value::{self, Value};
use crate::world::World;

// ── Bind errors ─────────────────────────────────────────────────────────────

/// Errors binding a program to its host environment.
#[derive(Debug)]
pub enum BindError {
    UnboundImport { name: String },
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::UnboundImport { name } => {
                write!(f, "imported function '{}' has no registered implementation", name)
            }
        }
    }
}

impl std::error::Error for BindError {}

// ── Machine ─────────────────────────────────────────────────────────────────

/// A program bound to its imported functions, with structural operations
/// planned. The machine itself is stateless: all per-instance state lives
/// in contexts owned by the caller.
pub struct Machine<'p> {
    program: &'p Program,
    funcs: Vec<&'p HostFn>,
    ops: OpSet,
}

impl<'p> std::fmt::Debug for Machine<'p> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("program", &self.program)
            .field("funcs", &format_args!("<{} host fns>", self.funcs.len()))
            .field("ops", &self.ops)
            .finish()
    }
}

impl<'p> Machine<'p> {
    /// Bind a program against a registry. Fails if any declared import has
    /// no implementation.
    pub fn new(program: &'p Program, registry: &'p Registry) -> Result<Machine<'p>, BindError> {
        let mut funcs = Vec::with_capacity(program.imports.len());
        for import in &program.imports {
            match registry.get(&import.name) {
                Some(f) => funcs.push(f),
                None => {
                    return Err(BindError::UnboundImport {
                        name: import.name.clone(),
                    })
                }
            }
        }
        Ok(Machine {
            program,
            funcs,
            ops: OpSet::plan(program),
        })
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn ops(&self) -> &OpSet {
        &self.ops
    }

    /// Run elaboration on fresh storage and return the resulting world.
    /// This is the only constructor of World: a host cannot step a node
    /// without having elaborated first, and cannot re-elaborate an
    /// existing world.
    pub fn elaborate(&self) -> World {
        let consts = elab::run(self.program, &self.ops);
        let sensors = self
            .program
            .sensors
            .iter()
            .map(|s| s.init.clone())
            .collect();
        World::new(sensors, consts)
    }

    /// Handle to one node definition, implementing the Node trait.
    pub fn bind(&self, id: NodeId) -> BoundNode<'_, 'p> {
        BoundNode { machine: self, id }
    }

    /// Handle to the program's entry node.
    pub fn entry(&self) -> BoundNode<'_, 'p> {
        self.bind(self.program.entry)
    }

    // ── Protocol operations ─────────────────────────────────────────────

    pub fn init(&self, id: NodeId, ctx: &mut Context) {
        let def = self.check_identity(id, ctx, "init");
        if !def.user_defined_init {
            for (i, reg) in def.registers.iter().enumerate() {
                if self.program.types.is_composite(reg.ty) {
                    self.ops.copy_assign(reg.ty, &mut ctx.registers[i], &reg.init);
                } else {
                    ctx.registers[i] = reg.init.clone();
                }
            }
        }
        ctx.first_tick = def.uses_first_tick;
        for (i, child) in def.children.iter().enumerate() {
            self.init(child.node, &mut ctx.children[i]);
        }
    }

    pub fn reset(&self, id: NodeId, ctx: &mut Context) {
        let def = self.check_identity(id, ctx, "reset");
        for (i, reg) in def.registers.iter().enumerate() {
            if let Some(reset) = &reg.reset {
                if self.program.types.is_composite(reg.ty) {
                    self.ops.copy_assign(reg.ty, &mut ctx.registers[i], reset);
                } else {
                    ctx.registers[i] = reset.clone();
                }
            }
        }
        ctx.first_tick = def.uses_first_tick;
        for (i, child) in def.children.iter().enumerate() {
            self.reset(child.node, &mut ctx.children[i]);
        }
    }

    pub fn step(
        &self,
        id: NodeId,
        inputs: &[Value],
        ctx: &mut Context,
        world: &World,
    ) -> Vec<Value> {
        let def = self.check_identity(id, ctx, "step");
        assert_eq!(
            inputs.len(),
            def.inputs.len(),
            "node '{}' stepped with {} inputs, expects {}",
            def.name,
            inputs.len(),
            def.inputs.len()
        );
        let mut frame = Frame {
            inputs,
            locals: vec![None; def.locals.len()],
            outputs: vec![None; def.outputs.len()],
        };
        self.exec_block(def, &def.body, &mut frame, ctx, world);
        frame
            .outputs
            .into_iter()
            .zip(&def.outputs)
            .map(|(v, port)| {
                v.unwrap_or_else(|| {
                    panic!("node '{}' did not assign output '{}'", def.name, port.name)
                })
            })
            .collect()
    }

    fn check_identity(&self, id: NodeId, ctx: &Context, op: &str) -> &'p NodeDef {
        assert_eq!(
            ctx.node(),
            id,
            "{} of node n{} called with a context allocated for n{}",
            op,
            id.0,
            ctx.node().0
        );
        self.program.node(id)
    }

    // ── Statement execution ─────────────────────────────────────────────

    fn exec_block(
        &self,
        def: &NodeDef,
        stmts: &[Stmt],
        frame: &mut Frame<'_>,
        ctx: &mut Context,
        world: &World,
    ) {
        for stmt in stmts {
            self.exec_stmt(def, stmt, frame, ctx, world);
        }
    }

    fn exec_stmt(
        &self,
        def: &NodeDef,
        stmt: &Stmt,
        frame: &mut Frame<'_>,
        ctx: &mut Context,
        world: &World,
    ) {
        match stmt {
            Stmt::Let { local, value } => {
                let v = self.eval(def, value, frame, ctx, world);
                frame.locals[*local] = Some(v);
            }
            Stmt::SetOutput { output, value } => {
                let v = self.eval(def, value, frame, ctx, world);
                frame.outputs[*output] = Some(v);
            }
            Stmt::SetRegister { register, value } => {
                let v = self.eval(def, value, frame, ctx, world);
                let reg = &def.registers[*register];
                if self.program.types.is_composite(reg.ty) {
                    self.ops.copy_assign(reg.ty, &mut ctx.registers[*register], &v);
                } else {
                    ctx.registers[*register] = v;
                }
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                if self.eval(def, cond, frame, ctx, world).as_bool() {
                    self.exec_block(def, then_body, frame, ctx, world);
                } else {
                    self.exec_block(def, else_body, frame, ctx, world);
                }
            }
            Stmt::Match {
                scrutinee, arms, ..
            } => {
                let (tag, payload) = match self.eval(def, scrutinee, frame, ctx, world) {
                    Value::Variant { tag, payload } => (tag, payload),
                    other => panic!("variant dispatch on non-variant value {:?}", other),
                };
                let arm = arms
                    .iter()
                    .find(|a| a.tag == tag)
                    .unwrap_or_else(|| panic!("no arm for tag {} (arms are exhaustive)", tag));
                if let Some(binding) = arm.binding {
                    frame.locals[binding] = Some(*payload);
                }
                self.exec_block(def, &arm.body, frame, ctx, world);
            }
            Stmt::StepChild {
                child,
                inputs,
                results,
            } => {
                let vals: Vec<Value> = inputs
                    .iter()
                    .map(|e| self.eval(def, e, frame, ctx, world))
                    .collect();
                let child_node = def.children[*child].node;
                let out = self.step(child_node, &vals, &mut ctx.children[*child], world);
                for (local, v) in results.iter().zip(out) {
                    frame.locals[*local] = Some(v);
                }
            }
            Stmt::CallImport {
                func,
                args,
                results,
            } => {
                let import = &self.program.imports[func.index()];
                let vals: Vec<Value> = args
                    .iter()
                    .map(|e| self.eval(def, e, frame, ctx, world))
                    .collect();
                let out = (self.funcs[func.index()])(&vals);
                assert_eq!(
                    out.len(),
                    import.results.len(),
                    "imported function '{}' returned {} results, declared {}",
                    import.name,
                    out.len(),
                    import.results.len()
                );
                for (v, ty) in out.iter().zip(&import.results) {
                    assert!(
                        Value::conforms(&self.program.types, *ty, v),
                        "imported function '{}' returned a result of the wrong shape: {:?}",
                        import.name,
                        v
                    );
                }
                for (local, v) in results.iter().zip(out) {
                    frame.locals[*local] = Some(v);
                }
            }
            Stmt::ClearFirstTick => {
                ctx.first_tick = false;
            }
        }
    }

    // ── Expression evaluation ───────────────────────────────────────────

    fn eval(
        &self,
        def: &NodeDef,
        expr: &Expr,
        frame: &Frame<'_>,
        ctx: &Context,
        world: &World,
    ) -> Value {
        match expr {
            Expr::Lit { value, .. } => value.clone(),
            Expr::Input(i) => frame.inputs[*i].clone(),
            Expr::Local(i) => frame.locals[*i]
                .as_ref()
                .unwrap_or_else(|| {
                    panic!("local '{}' read before assignment", def.locals[*i].name)
                })
                .clone(),
            Expr::Register(i) => ctx.registers[*i].clone(),
            Expr::Sensor(id) => world.sensor(*id).clone(),
            Expr::Const(id) => world.constant(*id).clone(),
            Expr::FirstTick => Value::Bool(ctx.first_tick),
            Expr::Unary { op, expr } => {
                let v = self.eval(def, expr, frame, ctx, world);
                match op {
                    UnOp::Not => value::not(&v),
                    UnOp::Neg => value::neg(&v),
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let l = self.eval(def, lhs, frame, ctx, world);
                let r = self.eval(def, rhs, frame, ctx, world);
                elab::apply_binary(*op, &l, &r)
            }
            Expr::Eq { ty, lhs, rhs } => {
                let l = self.eval(def, lhs, frame, ctx, world);
                let r = self.eval(def, rhs, frame, ctx, world);
                Value::Bool(self.ops.equals(*ty, &l, &r))
            }
            Expr::Ne { ty, lhs, rhs } => {
                let l = self.eval(def, lhs, frame, ctx, world);
                let r = self.eval(def, rhs, frame, ctx, world);
                Value::Bool(!self.ops.equals(*ty, &l, &r))
            }
            Expr::Cast { to, expr } => value::cast(*to, &self.eval(def, expr, frame, ctx, world)),
            Expr::Element { array, index } => {
                match self.eval(def, array, frame, ctx, world) {
                    Value::Array(elems) => elems
                        .into_iter()
                        .nth(*index)
                        .expect("element index verified in range"),
                    other => panic!("element projection on non-array {:?}", other),
                }
            }
            Expr::Field { base, field } => match self.eval(def, base, frame, ctx, world) {
                Value::Struct(vals) => vals
                    .into_iter()
                    .nth(*field)
                    .expect("field index verified in range"),
                other => panic!("field projection on non-struct {:?}", other),
            },
            Expr::MakeArray { elems, .. } => Value::Array(
                elems
                    .iter()
                    .map(|e| self.eval(def, e, frame, ctx, world))
                    .collect(),
            ),
            Expr::Replicate { ty, elem } => {
                let len = match self.program.types.get(self.program.types.resolve(*ty)) {
                    Type::Array { len, .. } => *len,
                    other => panic!("replicate at non-array type {:?}", other),
                };
                let v = self.eval(def, elem, frame, ctx, world);
                Value::Array(vec![v; len])
            }
            Expr::MakeStruct { fields, .. } => Value::Struct(
                fields
                    .iter()
                    .map(|e| self.eval(def, e, frame, ctx, world))
                    .collect(),
            ),
            Expr::MakeEnum { tag, .. } => Value::Enum(*tag),
            Expr::MakeVariant { tag, payload, .. } => Value::Variant {
                tag: *tag,
                payload: Box::new(self.eval(def, payload, frame, ctx, world)),
            },
        }
    }
}

/// Per-call evaluation frame: borrowed inputs, write-once locals and
/// outputs. Locals are scratch only; nothing here survives the call.
struct Frame<'a> {
    inputs: &'a [Value],
    locals: Vec<Option<Value>>,
    outputs: Vec<Option<Value>>,
}

// ── Bound node handle ───────────────────────────────────────────────────────

/// One node definition of a bound machine, viewed through the runtime
/// contract. This is what a host program or a parent node depends on.
pub struct BoundNode<'m, 'p> {
    machine: &'m Machine<'p>,
    id: NodeId,
}

impl<'m, 'p> BoundNode<'m, 'p> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn def(&self) -> &'p NodeDef {
        self.machine.program.node(self.id)
    }
}

impl Node for BoundNode<'_, '_> {
    fn init(&self, ctx: &mut Context) {
        self.machine.init(self.id, ctx);
    }

    fn step(&self, inputs: &[Value], ctx: &mut Context, world: &World) -> Vec<Value> {
        self.machine.step(self.id, inputs, ctx, world)
    }

    fn reset(&self, ctx: &mut Context) {
        self.machine.reset(self.id, ctx);
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::BinOp;
    use crate::id::FuncId;
    use crate::node::{LocalDecl, PortDecl, RegisterDecl};
    use crate::program::ImportDecl;
    use crate::types::{ScalarType, TypeTable};

    /// The registered-delay sample: `o0 = f(i0) + reg; reg' = i1` with an
    /// imported `f`. Statement order is the whole point: the register read
    /// happens strictly before the overwrite.
    fn delay_program() -> Program {
        let mut types = TypeTable::new();
        let i32_id = types.intern(Type::Scalar(ScalarType::I32));
        Program {
            types,
            nodes: vec![NodeDef {
                name: "oper_delay".into(),
                inputs: vec![
                    PortDecl { name: "i0".into(), ty: i32_id },
                    PortDecl { name: "i1".into(), ty: i32_id },
                ],
                outputs: vec![PortDecl { name: "o0".into(), ty: i32_id }],
                locals: vec![LocalDecl { name: "tmp".into(), ty: i32_id }],
                registers: vec![RegisterDecl {
                    name: "i1_reg".into(),
                    ty: i32_id,
                    init: Value::I32(0),
                    reset: Some(Value::I32(0)),
                }],
                children: vec![],
                uses_first_tick: false,
                user_defined_init: false,
                body: vec![
                    Stmt::CallImport {
                        func: FuncId(0),
                        args: vec![Expr::Input(0)],
                        results: vec![0],
                    },
                    Stmt::SetOutput {
                        output: 0,
                        value: Expr::Binary {
                            op: BinOp::Add,
                            lhs: Box::new(Expr::Local(0)),
                            rhs: Box::new(Expr::Register(0)),
                        },
                    },
                    Stmt::SetRegister {
                        register: 0,
                        value: Expr::Input(1),
                    },
                ],
            }],
            sensors: vec![],
            consts: vec![],
            imports: vec![ImportDecl {
                name: "succ".into(),
                params: vec![i32_id],
                results: vec![i32_id],
            }],
            elaboration: vec![],
            entry: NodeId(0),
        }
    }

    fn succ_registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register("succ", |args| match args {
                [Value::I32(x)] => vec![Value::I32(x + 1)],
                other => panic!("bad arguments {:?}", other),
            })
            .unwrap();
        registry
    }

    #[test]
    fn registered_delay_reads_before_overwriting() {
        let program = delay_program();
        let registry = succ_registry();
        let machine = Machine::new(&program, &registry).unwrap();
        let world = machine.elaborate();
        let mut ctx = Context::allocate(&program, program.entry);
        machine.init(program.entry, &mut ctx);

        let out1 = machine.step(program.entry, &[Value::I32(5), Value::I32(7)], &mut ctx, &world);
        assert_eq!(out1, vec![Value::I32(6)]); // f(5) + 0
        let out2 = machine.step(program.entry, &[Value::I32(3), Value::I32(2)], &mut ctx, &world);
        assert_eq!(out2, vec![Value::I32(11)]); // f(3) + 7
    }

    #[test]
    fn reset_restores_initial_observable_behavior() {
        let program = delay_program();
        let registry = succ_registry();
        let machine = Machine::new(&program, &registry).unwrap();
        let world = machine.elaborate();
        let mut ctx = Context::allocate(&program, program.entry);
        machine.init(program.entry, &mut ctx);

        let first = machine.step(program.entry, &[Value::I32(5), Value::I32(7)], &mut ctx, &world);
        machine.step(program.entry, &[Value::I32(1), Value::I32(9)], &mut ctx, &world);
        machine.reset(program.entry, &mut ctx);
        let replay = machine.step(program.entry, &[Value::I32(5), Value::I32(7)], &mut ctx, &world);
        assert_eq!(first, replay);
    }

    #[test]
    fn unbound_import_fails_to_bind() {
        let program = delay_program();
        let registry = Registry::new();
        let err = Machine::new(&program, &registry).unwrap_err();
        assert_eq!(
            format!("{}", err),
            "imported function 'succ' has no registered implementation"
        );
    }

    #[test]
    #[should_panic(expected = "called with a context allocated for")]
    fn foreign_context_is_a_contract_violation() {
        let mut program = delay_program();
        program.nodes.push(program.nodes[0].clone());
        let registry = succ_registry();
        let machine = Machine::new(&program, &registry).unwrap();
        let world = machine.elaborate();
        let mut ctx = Context::allocate(&program, NodeId(1));
        machine.step(NodeId(0), &[Value::I32(0), Value::I32(0)], &mut ctx, &world);
    }
}
