// verify.rs — One-shot structural verification of a program
//
// A program arrives as data, so everything the execution model assumes is
// checked once here, before binding: index bounds, slot typing of every
// expression, write-before-read for locals and elaborated constants,
// outputs assigned on every path, exhaustive variant dispatch, and an
// acyclic instantiation graph. A verified program cannot reach any of the
// evaluator's panics through its own statements; remaining panics guard
// host-side contract violations only.
//
// Verification failure is a build-input error, not a runtime condition:
// the tick path itself has no error states.

use std::collections::HashSet;
use std::fmt;

use crate::elab::ElabStep;
use crate::expr::{BinOp, Expr, Stmt, UnOp};
use crate::id::TypeId;
use crate::node::NodeDef;
use crate::program::{ConstInit, Program};
use crate::types::{ScalarType, Type};
use crate::value::Value;

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum VerifyError {
    TypeTable { index: usize, detail: String },
    Entry { detail: String },
    Node { node: String, detail: String },
    Sensor { sensor: String, detail: String },
    Const { name: String, detail: String },
    Import { name: String, detail: String },
    Elaboration { step: usize, detail: String },
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyError::TypeTable { index, detail } => {
                write!(f, "type table entry {}: {}", index, detail)
            }
            VerifyError::Entry { detail } => write!(f, "{}", detail),
            VerifyError::Node { node, detail } => write!(f, "node '{}': {}", node, detail),
            VerifyError::Sensor { sensor, detail } => {
                write!(f, "sensor '{}': {}", sensor, detail)
            }
            VerifyError::Const { name, detail } => {
                write!(f, "constant '{}': {}", name, detail)
            }
            VerifyError::Import { name, detail } => {
                write!(f, "imported function '{}': {}", name, detail)
            }
            VerifyError::Elaboration { step, detail } => {
                write!(f, "elaboration step {}: {}", step, detail)
            }
        }
    }
}

impl std::error::Error for VerifyError {}

/// Verify a program. Returns the first defect found.
pub fn verify(program: &Program) -> Result<(), VerifyError> {
    Checker { program }.run()
}

// ── Checker ─────────────────────────────────────────────────────────────────

/// Synthesized type of an expression: either a table entry or a bare
/// scalar kind (comparison results, cast results). Equality goes through
/// canonicalization so synonyms and scalar entries compare correctly.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Ty {
    Id(TypeId),
    Scalar(ScalarType),
}

/// Where an expression is being checked: inside a node body, or inside the
/// elaboration schedule (where only constants are in scope and readability
/// depends on elaboration order).
enum Scope<'a> {
    Node {
        def: &'a NodeDef,
        assigned: &'a Assigned,
    },
    Elab {
        slots: &'a [ElabSlot],
    },
}

/// Must-assign state for one body path.
#[derive(Clone)]
struct Assigned {
    locals: Vec<bool>,
    outputs: Vec<bool>,
}

impl Assigned {
    fn merge(&mut self, other: &Assigned) {
        for (a, b) in self.locals.iter_mut().zip(&other.locals) {
            *a = *a && *b;
        }
        for (a, b) in self.outputs.iter_mut().zip(&other.outputs) {
            *a = *a && *b;
        }
    }
}

/// Write state of one constant during elaboration checking.
enum ElabSlot {
    /// Literal constant: readable from the first step.
    Literal,
    /// Elaborated: per-element write mask (one element for non-arrays).
    Pending(Vec<bool>),
}

impl ElabSlot {
    fn readable(&self) -> bool {
        match self {
            ElabSlot::Literal => true,
            ElabSlot::Pending(mask) => mask.iter().all(|w| *w),
        }
    }
}

struct Checker<'p> {
    program: &'p Program,
}

impl<'p> Checker<'p> {
    fn run(&self) -> Result<(), VerifyError> {
        self.check_type_table()?;
        self.check_sensors()?;
        self.check_consts()?;
        self.check_imports()?;
        if self.program.entry.index() >= self.program.nodes.len() {
            return Err(VerifyError::Entry {
                detail: format!("entry node n{} does not exist", self.program.entry.0),
            });
        }
        self.check_instantiation_graph()?;
        for def in &self.program.nodes {
            self.check_node(def)
                .map_err(|detail| VerifyError::Node {
                    node: def.name.clone(),
                    detail,
                })?;
        }
        self.check_elaboration()?;
        Ok(())
    }

    // ── Tables ──────────────────────────────────────────────────────────

    fn check_type_table(&self) -> Result<(), VerifyError> {
        let table = &self.program.types;
        let mut seen: HashSet<&Type> = HashSet::new();
        for (id, ty) in table.iter() {
            let index = id.index();
            let err = |detail: String| VerifyError::TypeTable { index, detail };
            if !seen.insert(ty) {
                return Err(err("structural duplicate breaks identity deduplication".into()));
            }
            for nested in ty.nested() {
                if nested.index() >= index {
                    return Err(err(format!(
                        "references t{}, which is not an earlier entry",
                        nested.0
                    )));
                }
            }
            match ty {
                Type::Array { len, .. } if *len == 0 => {
                    return Err(err("array length must be at least 1".into()));
                }
                Type::Enum { tags, .. } if tags.is_empty() => {
                    return Err(err("enum needs at least one tag".into()));
                }
                Type::Variant { cases, .. } if cases.is_empty() => {
                    return Err(err("variant needs at least one case".into()));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn check_sensors(&self) -> Result<(), VerifyError> {
        for s in &self.program.sensors {
            let err = |detail: String| VerifyError::Sensor {
                sensor: s.name.clone(),
                detail,
            };
            self.ty_in_range(s.ty).map_err(err)?;
            if !Value::conforms(&self.program.types, s.ty, &s.init) {
                return Err(err("initial value does not conform to declared type".into()));
            }
        }
        Ok(())
    }

    fn check_consts(&self) -> Result<(), VerifyError> {
        for c in &self.program.consts {
            let err = |detail: String| VerifyError::Const {
                name: c.name.clone(),
                detail,
            };
            self.ty_in_range(c.ty).map_err(err)?;
            if let ConstInit::Literal(v) = &c.init {
                if !Value::conforms(&self.program.types, c.ty, v) {
                    return Err(err("literal value does not conform to declared type".into()));
                }
            }
        }
        Ok(())
    }

    fn check_imports(&self) -> Result<(), VerifyError> {
        for im in &self.program.imports {
            let err = |detail: String| VerifyError::Import {
                name: im.name.clone(),
                detail,
            };
            for ty in im.params.iter().chain(&im.results) {
                self.ty_in_range(*ty).map_err(&err)?;
            }
            if im.results.is_empty() {
                return Err(err("imported function must declare at least one result".into()));
            }
        }
        Ok(())
    }

    /// Child-instantiation edges must form a DAG: a definition reachable
    /// from itself would need an infinite context tree.
    fn check_instantiation_graph(&self) -> Result<(), VerifyError> {
        const WHITE: u8 = 0;
        const GRAY: u8 = 1;
        const BLACK: u8 = 2;
        let n = self.program.nodes.len();
        let mut color = vec![WHITE; n];

        fn visit(
            program: &Program,
            color: &mut [u8],
            i: usize,
        ) -> Result<(), VerifyError> {
            color[i] = GRAY;
            for child in &program.nodes[i].children {
                let j = child.node.index();
                if j >= color.len() {
                    return Err(VerifyError::Node {
                        node: program.nodes[i].name.clone(),
                        detail: format!("child '{}' references unknown node n{}", child.name, child.node.0),
                    });
                }
                if color[j] == GRAY {
                    return Err(VerifyError::Node {
                        node: program.nodes[i].name.clone(),
                        detail: format!("recursive instantiation through child '{}'", child.name),
                    });
                }
                if color[j] == WHITE {
                    visit(program, color, j)?;
                }
            }
            color[i] = BLACK;
            Ok(())
        }

        for i in 0..n {
            if color[i] == WHITE {
                visit(self.program, &mut color, i)?;
            }
        }
        Ok(())
    }

    // ── Nodes ───────────────────────────────────────────────────────────

    fn check_node(&self, def: &NodeDef) -> Result<(), String> {
        for port in def.inputs.iter().chain(&def.outputs) {
            self.ty_in_range(port.ty)?;
        }
        for local in &def.locals {
            self.ty_in_range(local.ty)?;
        }
        for reg in &def.registers {
            self.ty_in_range(reg.ty)?;
            if !Value::conforms(&self.program.types, reg.ty, &reg.init) {
                return Err(format!(
                    "register '{}' init value does not conform to its type",
                    reg.name
                ));
            }
            if let Some(reset) = &reg.reset {
                if !Value::conforms(&self.program.types, reg.ty, reset) {
                    return Err(format!(
                        "register '{}' reset value does not conform to its type",
                        reg.name
                    ));
                }
            }
        }
        let mut child_names = HashSet::new();
        for child in &def.children {
            if !child_names.insert(child.name.as_str()) {
                return Err(format!("duplicate child instance name '{}'", child.name));
            }
        }

        let mut assigned = Assigned {
            locals: vec![false; def.locals.len()],
            outputs: vec![false; def.outputs.len()],
        };
        self.check_block(def, &def.body, &mut assigned)?;
        for (i, done) in assigned.outputs.iter().enumerate() {
            if !done {
                return Err(format!(
                    "output '{}' is not assigned on every path",
                    def.outputs[i].name
                ));
            }
        }
        Ok(())
    }

    fn check_block(
        &self,
        def: &NodeDef,
        stmts: &[Stmt],
        assigned: &mut Assigned,
    ) -> Result<(), String> {
        for stmt in stmts {
            self.check_stmt(def, stmt, assigned)?;
        }
        Ok(())
    }

    fn check_stmt(
        &self,
        def: &NodeDef,
        stmt: &Stmt,
        assigned: &mut Assigned,
    ) -> Result<(), String> {
        match stmt {
            Stmt::Let { local, value } => {
                let decl = def
                    .locals
                    .get(*local)
                    .ok_or_else(|| format!("assignment to unknown local #{}", local))?;
                self.check_expr(def, assigned, value, Ty::Id(decl.ty))?;
                assigned.locals[*local] = true;
                Ok(())
            }
            Stmt::SetOutput { output, value } => {
                let decl = def
                    .outputs
                    .get(*output)
                    .ok_or_else(|| format!("assignment to unknown output #{}", output))?;
                self.check_expr(def, assigned, value, Ty::Id(decl.ty))?;
                assigned.outputs[*output] = true;
                Ok(())
            }
            Stmt::SetRegister { register, value } => {
                let decl = def
                    .registers
                    .get(*register)
                    .ok_or_else(|| format!("assignment to unknown register #{}", register))?;
                self.check_expr(def, assigned, value, Ty::Id(decl.ty))
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                self.check_expr(def, assigned, cond, Ty::Scalar(ScalarType::Bool))?;
                let mut then_assigned = assigned.clone();
                let mut else_assigned = assigned.clone();
                self.check_block(def, then_body, &mut then_assigned)?;
                self.check_block(def, else_body, &mut else_assigned)?;
                then_assigned.merge(&else_assigned);
                *assigned = then_assigned;
                Ok(())
            }
            Stmt::Match {
                ty,
                scrutinee,
                arms,
            } => {
                self.ty_in_range(*ty)?;
                self.check_expr(def, assigned, scrutinee, Ty::Id(*ty))?;
                let cases = match self.program.types.get(self.program.types.resolve(*ty)) {
                    Type::Variant { cases, .. } => cases,
                    _ => return Err("variant dispatch at a non-variant type".into()),
                };
                let mut covered = vec![false; cases.len()];
                let mut merged: Option<Assigned> = None;
                for arm in arms {
                    if arm.tag >= cases.len() {
                        return Err(format!("match arm for unknown tag {}", arm.tag));
                    }
                    if covered[arm.tag] {
                        return Err(format!("duplicate match arm for tag {}", arm.tag));
                    }
                    covered[arm.tag] = true;
                    let mut arm_assigned = assigned.clone();
                    if let Some(binding) = arm.binding {
                        let decl = def.locals.get(binding).ok_or_else(|| {
                            format!("match binding targets unknown local #{}", binding)
                        })?;
                        if !self.ty_eq(Ty::Id(decl.ty), Ty::Id(cases[arm.tag].payload)) {
                            return Err(format!(
                                "match binding '{}' does not have the payload type of tag {}",
                                decl.name, arm.tag
                            ));
                        }
                        arm_assigned.locals[binding] = true;
                    }
                    self.check_block(def, &arm.body, &mut arm_assigned)?;
                    match &mut merged {
                        None => merged = Some(arm_assigned),
                        Some(m) => m.merge(&arm_assigned),
                    }
                }
                if covered.iter().any(|c| !c) {
                    return Err("variant dispatch does not cover every tag".into());
                }
                if let Some(m) = merged {
                    *assigned = m;
                }
                Ok(())
            }
            Stmt::StepChild {
                child,
                inputs,
                results,
            } => {
                let decl = def
                    .children
                    .get(*child)
                    .ok_or_else(|| format!("step of unknown child #{}", child))?;
                let callee = self.program.node(decl.node);
                if inputs.len() != callee.inputs.len() {
                    return Err(format!(
                        "child '{}' takes {} inputs, got {}",
                        decl.name,
                        callee.inputs.len(),
                        inputs.len()
                    ));
                }
                for (expr, port) in inputs.iter().zip(&callee.inputs) {
                    self.check_expr(def, assigned, expr, Ty::Id(port.ty))?;
                }
                if results.len() != callee.outputs.len() {
                    return Err(format!(
                        "child '{}' produces {} outputs, got {} result slots",
                        decl.name,
                        callee.outputs.len(),
                        results.len()
                    ));
                }
                self.bind_results(def, assigned, results, |i| Ty::Id(callee.outputs[i].ty))
            }
            Stmt::CallImport {
                func,
                args,
                results,
            } => {
                let import = self
                    .program
                    .imports
                    .get(func.index())
                    .ok_or_else(|| format!("call of unknown imported function f{}", func.0))?;
                if args.len() != import.params.len() {
                    return Err(format!(
                        "imported function '{}' takes {} arguments, got {}",
                        import.name,
                        import.params.len(),
                        args.len()
                    ));
                }
                for (expr, ty) in args.iter().zip(&import.params) {
                    self.check_expr(def, assigned, expr, Ty::Id(*ty))?;
                }
                if results.len() != import.results.len() {
                    return Err(format!(
                        "imported function '{}' produces {} results, got {} result slots",
                        import.name,
                        import.results.len(),
                        results.len()
                    ));
                }
                let tys = import.results.clone();
                self.bind_results(def, assigned, results, |i| Ty::Id(tys[i]))
            }
            Stmt::ClearFirstTick => {
                if !def.uses_first_tick {
                    return Err("ClearFirstTick in a node without first-tick behavior".into());
                }
                Ok(())
            }
        }
    }

    fn bind_results(
        &self,
        def: &NodeDef,
        assigned: &mut Assigned,
        results: &[usize],
        result_ty: impl Fn(usize) -> Ty,
    ) -> Result<(), String> {
        for (i, local) in results.iter().enumerate() {
            let decl = def
                .locals
                .get(*local)
                .ok_or_else(|| format!("result bound to unknown local #{}", local))?;
            if !self.ty_eq(Ty::Id(decl.ty), result_ty(i)) {
                return Err(format!(
                    "result #{} does not match the type of local '{}'",
                    i, decl.name
                ));
            }
            assigned.locals[*local] = true;
        }
        Ok(())
    }

    // ── Expressions ─────────────────────────────────────────────────────

    fn check_expr(
        &self,
        def: &NodeDef,
        assigned: &Assigned,
        expr: &Expr,
        expected: Ty,
    ) -> Result<(), String> {
        let scope = Scope::Node { def, assigned };
        let got = self.synth(&scope, expr)?;
        self.expect_ty(expected, got)
    }

    fn expect_ty(&self, expected: Ty, got: Ty) -> Result<(), String> {
        if self.ty_eq(expected, got) {
            Ok(())
        } else {
            Err(format!(
                "expected {}, found {}",
                self.ty_name(expected),
                self.ty_name(got)
            ))
        }
    }

    fn synth(&self, scope: &Scope<'_>, expr: &Expr) -> Result<Ty, String> {
        match expr {
            Expr::Lit { ty, value } => {
                self.ty_in_range(*ty)?;
                if !Value::conforms(&self.program.types, *ty, value) {
                    return Err(format!(
                        "literal does not conform to {}",
                        self.program.types.display_name(*ty)
                    ));
                }
                Ok(Ty::Id(*ty))
            }
            Expr::Input(i) => match scope {
                Scope::Node { def, .. } => def
                    .inputs
                    .get(*i)
                    .map(|p| Ty::Id(p.ty))
                    .ok_or_else(|| format!("read of unknown input #{}", i)),
                Scope::Elab { .. } => Err("inputs are not available during elaboration".into()),
            },
            Expr::Local(i) => match scope {
                Scope::Node { def, assigned } => {
                    let decl = def
                        .locals
                        .get(*i)
                        .ok_or_else(|| format!("read of unknown local #{}", i))?;
                    if !assigned.locals[*i] {
                        return Err(format!(
                            "local '{}' read before assignment on some path",
                            decl.name
                        ));
                    }
                    Ok(Ty::Id(decl.ty))
                }
                Scope::Elab { .. } => Err("locals are not available during elaboration".into()),
            },
            Expr::Register(i) => match scope {
                Scope::Node { def, .. } => def
                    .registers
                    .get(*i)
                    .map(|r| Ty::Id(r.ty))
                    .ok_or_else(|| format!("read of unknown register #{}", i)),
                Scope::Elab { .. } => {
                    Err("registers are not available during elaboration".into())
                }
            },
            Expr::Sensor(id) => match scope {
                Scope::Node { .. } => self
                    .program
                    .sensors
                    .get(id.index())
                    .map(|s| Ty::Id(s.ty))
                    .ok_or_else(|| format!("read of unknown sensor s{}", id.0)),
                Scope::Elab { .. } => Err("sensors are not available during elaboration".into()),
            },
            Expr::Const(id) => {
                let decl = self
                    .program
                    .consts
                    .get(id.index())
                    .ok_or_else(|| format!("read of unknown constant c{}", id.0))?;
                if let Scope::Elab { slots } = scope {
                    if !slots[id.index()].readable() {
                        return Err(format!(
                            "constant '{}' read before it is fully elaborated",
                            decl.name
                        ));
                    }
                }
                Ok(Ty::Id(decl.ty))
            }
            Expr::FirstTick => match scope {
                Scope::Node { def, .. } if def.uses_first_tick => {
                    Ok(Ty::Scalar(ScalarType::Bool))
                }
                Scope::Node { .. } => {
                    Err("FirstTick read in a node without first-tick behavior".into())
                }
                Scope::Elab { .. } => {
                    Err("the initialization flag is not available during elaboration".into())
                }
            },
            Expr::Unary { op, expr } => {
                let ty = self.synth(scope, expr)?;
                match op {
                    UnOp::Not => {
                        self.expect_ty(Ty::Scalar(ScalarType::Bool), ty)?;
                        Ok(Ty::Scalar(ScalarType::Bool))
                    }
                    UnOp::Neg => match self.canon(ty) {
                        Ty::Scalar(s) if s.is_signed() || s.is_float() => Ok(Ty::Scalar(s)),
                        other => Err(format!("negation of {}", self.ty_name(other))),
                    },
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let l = self.canon(self.synth(scope, lhs)?);
                let r = self.canon(self.synth(scope, rhs)?);
                match op {
                    BinOp::And | BinOp::Or => {
                        self.expect_ty(Ty::Scalar(ScalarType::Bool), l)?;
                        self.expect_ty(Ty::Scalar(ScalarType::Bool), r)?;
                        Ok(Ty::Scalar(ScalarType::Bool))
                    }
                    BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => {
                        match (l, r) {
                            (Ty::Scalar(a), Ty::Scalar(b)) if a == b && a.is_numeric() => {
                                Ok(Ty::Scalar(a))
                            }
                            _ => Err(format!(
                                "arithmetic needs matching numeric scalars, found {} and {}",
                                self.ty_name(l),
                                self.ty_name(r)
                            )),
                        }
                    }
                    BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => match (l, r) {
                        (Ty::Scalar(a), Ty::Scalar(b)) if a == b && a.is_numeric() => {
                            Ok(Ty::Scalar(ScalarType::Bool))
                        }
                        _ => Err(format!(
                            "comparison needs matching numeric scalars, found {} and {}",
                            self.ty_name(l),
                            self.ty_name(r)
                        )),
                    },
                }
            }
            Expr::Eq { ty, lhs, rhs } | Expr::Ne { ty, lhs, rhs } => {
                self.ty_in_range(*ty)?;
                let l = self.synth(scope, lhs)?;
                let r = self.synth(scope, rhs)?;
                self.expect_ty(Ty::Id(*ty), l)?;
                self.expect_ty(Ty::Id(*ty), r)?;
                Ok(Ty::Scalar(ScalarType::Bool))
            }
            Expr::Cast { to, expr } => {
                let ty = self.canon(self.synth(scope, expr)?);
                let castable = match ty {
                    Ty::Scalar(_) => true,
                    Ty::Id(id) => matches!(self.program.types.get(id), Type::Enum { .. }),
                };
                if !castable {
                    return Err(format!("cast of non-scalar {}", self.ty_name(ty)));
                }
                Ok(Ty::Scalar(*to))
            }
            Expr::Element { array, index } => {
                let ty = self.canon(self.synth(scope, array)?);
                match ty {
                    Ty::Id(id) => match self.program.types.get(id) {
                        Type::Array { elem, len } => {
                            if index >= len {
                                return Err(format!(
                                    "element index {} out of range for {}",
                                    index,
                                    self.program.types.display_name(id)
                                ));
                            }
                            Ok(Ty::Id(*elem))
                        }
                        _ => Err("element projection on a non-array".into()),
                    },
                    Ty::Scalar(_) => Err("element projection on a scalar".into()),
                }
            }
            Expr::Field { base, field } => {
                let ty = self.canon(self.synth(scope, base)?);
                match ty {
                    Ty::Id(id) => match self.program.types.get(id) {
                        Type::Struct { fields, .. } => fields
                            .get(*field)
                            .map(|f| Ty::Id(f.ty))
                            .ok_or_else(|| format!("unknown field #{}", field)),
                        _ => Err("field projection on a non-struct".into()),
                    },
                    Ty::Scalar(_) => Err("field projection on a scalar".into()),
                }
            }
            Expr::MakeArray { ty, elems } => {
                self.ty_in_range(*ty)?;
                match self.program.types.get(self.program.types.resolve(*ty)) {
                    Type::Array { elem, len } => {
                        if elems.len() != *len {
                            return Err(format!(
                                "array constructor has {} elements, type has {}",
                                elems.len(),
                                len
                            ));
                        }
                        for e in elems {
                            let got = self.synth(scope, e)?;
                            self.expect_ty(Ty::Id(*elem), got)?;
                        }
                        Ok(Ty::Id(*ty))
                    }
                    _ => Err("array constructor at a non-array type".into()),
                }
            }
            Expr::Replicate { ty, elem } => {
                self.ty_in_range(*ty)?;
                match self.program.types.get(self.program.types.resolve(*ty)) {
                    Type::Array { elem: elem_ty, .. } => {
                        let got = self.synth(scope, elem)?;
                        self.expect_ty(Ty::Id(*elem_ty), got)?;
                        Ok(Ty::Id(*ty))
                    }
                    _ => Err("replication at a non-array type".into()),
                }
            }
            Expr::MakeStruct { ty, fields } => {
                self.ty_in_range(*ty)?;
                match self.program.types.get(self.program.types.resolve(*ty)) {
                    Type::Struct { fields: decls, .. } => {
                        if fields.len() != decls.len() {
                            return Err(format!(
                                "struct constructor has {} fields, type has {}",
                                fields.len(),
                                decls.len()
                            ));
                        }
                        for (e, decl) in fields.iter().zip(decls) {
                            let got = self.synth(scope, e)?;
                            self.expect_ty(Ty::Id(decl.ty), got)?;
                        }
                        Ok(Ty::Id(*ty))
                    }
                    _ => Err("struct constructor at a non-struct type".into()),
                }
            }
            Expr::MakeEnum { ty, tag } => {
                self.ty_in_range(*ty)?;
                match self.program.types.get(self.program.types.resolve(*ty)) {
                    Type::Enum { tags, .. } => {
                        if *tag >= tags.len() {
                            return Err(format!("unknown enum tag {}", tag));
                        }
                        Ok(Ty::Id(*ty))
                    }
                    _ => Err("enum constant at a non-enum type".into()),
                }
            }
            Expr::MakeVariant { ty, tag, payload } => {
                self.ty_in_range(*ty)?;
                match self.program.types.get(self.program.types.resolve(*ty)) {
                    Type::Variant { cases, .. } => {
                        let case = cases
                            .get(*tag)
                            .ok_or_else(|| format!("unknown variant tag {}", tag))?;
                        let got = self.synth(scope, payload)?;
                        self.expect_ty(Ty::Id(case.payload), got)?;
                        Ok(Ty::Id(*ty))
                    }
                    _ => Err("variant constructor at a non-variant type".into()),
                }
            }
        }
    }

    // ── Elaboration schedule ────────────────────────────────────────────

    fn check_elaboration(&self) -> Result<(), VerifyError> {
        let mut slots: Vec<ElabSlot> = self
            .program
            .consts
            .iter()
            .map(|c| match &c.init {
                ConstInit::Literal(_) => ElabSlot::Literal,
                ConstInit::Elaborated => {
                    let n = match self.program.types.get(self.program.types.resolve(c.ty)) {
                        Type::Array { len, .. } => *len,
                        _ => 1,
                    };
                    ElabSlot::Pending(vec![false; n])
                }
            })
            .collect();

        for (step_index, step) in self.program.elaboration.iter().enumerate() {
            self.check_elab_step(step, &mut slots)
                .map_err(|detail| VerifyError::Elaboration {
                    step: step_index,
                    detail,
                })?;
        }

        for (c, slot) in self.program.consts.iter().zip(&slots) {
            if !slot.readable() {
                return Err(VerifyError::Const {
                    name: c.name.clone(),
                    detail: "declared elaborated but never fully written".into(),
                });
            }
        }
        Ok(())
    }

    fn check_elab_step(&self, step: &ElabStep, slots: &mut [ElabSlot]) -> Result<(), String> {
        let dst_id = match step {
            ElabStep::Assign { dst, .. }
            | ElabStep::SetElement { dst, .. }
            | ElabStep::Replicate { dst, .. } => *dst,
        };
        let decl = self
            .program
            .consts
            .get(dst_id.index())
            .ok_or_else(|| format!("write to unknown constant c{}", dst_id.0))?;
        if matches!(decl.init, ConstInit::Literal(_)) {
            return Err(format!("write to literal constant '{}'", decl.name));
        }

        match step {
            ElabStep::Assign { value, .. } => {
                let got = self.synth(&Scope::Elab { slots }, value)?;
                self.expect_ty(Ty::Id(decl.ty), got)?;
                let ElabSlot::Pending(mask) = &mut slots[dst_id.index()] else {
                    unreachable!("literal writes rejected above");
                };
                mask.iter_mut().for_each(|w| *w = true);
                Ok(())
            }
            ElabStep::SetElement { index, value, .. } => {
                let elem_ty = match self.program.types.get(self.program.types.resolve(decl.ty)) {
                    Type::Array { elem, len } => {
                        if index >= len {
                            return Err(format!(
                                "element index {} out of range for '{}'",
                                index, decl.name
                            ));
                        }
                        *elem
                    }
                    _ => {
                        return Err(format!(
                            "element write to non-array constant '{}'",
                            decl.name
                        ))
                    }
                };
                let got = self.synth(&Scope::Elab { slots }, value)?;
                self.expect_ty(Ty::Id(elem_ty), got)?;
                let ElabSlot::Pending(mask) = &mut slots[dst_id.index()] else {
                    unreachable!("literal writes rejected above");
                };
                mask[*index] = true;
                Ok(())
            }
            ElabStep::Replicate {
                src_index, start, ..
            } => {
                let len = match self.program.types.get(self.program.types.resolve(decl.ty)) {
                    Type::Array { len, .. } => *len,
                    _ => {
                        return Err(format!(
                            "replication into non-array constant '{}'",
                            decl.name
                        ))
                    }
                };
                if *start > len || *src_index >= len {
                    return Err(format!(
                        "replication range {}.. from element {} out of bounds for '{}'",
                        start, src_index, decl.name
                    ));
                }
                if src_index >= start {
                    return Err("replication source must precede the filled range".into());
                }
                let ElabSlot::Pending(mask) = &mut slots[dst_id.index()] else {
                    unreachable!("literal writes rejected above");
                };
                if !mask[*src_index] {
                    return Err(format!(
                        "replication source element {} not yet written",
                        src_index
                    ));
                }
                for w in &mut mask[*start..] {
                    *w = true;
                }
                Ok(())
            }
        }
    }

    // ── Type helpers ────────────────────────────────────────────────────

    fn ty_in_range(&self, ty: TypeId) -> Result<(), String> {
        if ty.index() < self.program.types.len() {
            Ok(())
        } else {
            Err(format!("reference to unknown type t{}", ty.0))
        }
    }

    fn canon(&self, ty: Ty) -> Ty {
        match ty {
            Ty::Scalar(s) => Ty::Scalar(s),
            Ty::Id(id) => {
                let resolved = self.program.types.resolve(id);
                match self.program.types.get(resolved) {
                    Type::Scalar(s) => Ty::Scalar(*s),
                    _ => Ty::Id(resolved),
                }
            }
        }
    }

    fn ty_eq(&self, a: Ty, b: Ty) -> bool {
        self.canon(a) == self.canon(b)
    }

    fn ty_name(&self, ty: Ty) -> String {
        match self.canon(ty) {
            Ty::Scalar(s) => s.name().to_string(),
            Ty::Id(id) => self.program.types.display_name(id),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::MatchArm;
    use crate::id::{ConstId, NodeId};
    use crate::node::{ChildDecl, LocalDecl, PortDecl};
    use crate::program::ConstDecl;
    use crate::types::{TypeTable, VariantCase};

    fn i32_program(body: Vec<Stmt>, locals: Vec<LocalDecl>) -> Program {
        let mut types = TypeTable::new();
        let i32_id = types.intern(Type::Scalar(ScalarType::I32));
        Program {
            types,
            nodes: vec![NodeDef {
                name: "n".into(),
                inputs: vec![PortDecl { name: "i0".into(), ty: i32_id }],
                outputs: vec![PortDecl { name: "o0".into(), ty: i32_id }],
                locals,
                registers: vec![],
                children: vec![],
                uses_first_tick: false,
                user_defined_init: false,
                body,
            }],
            sensors: vec![],
            consts: vec![],
            imports: vec![],
            elaboration: vec![],
            entry: NodeId(0),
        }
    }

    #[test]
    fn accepts_a_simple_node() {
        let program = i32_program(
            vec![Stmt::SetOutput { output: 0, value: Expr::Input(0) }],
            vec![],
        );
        assert!(verify(&program).is_ok());
    }

    #[test]
    fn rejects_output_unassigned_on_one_path() {
        let mut types = TypeTable::new();
        let i32_id = types.intern(Type::Scalar(ScalarType::I32));
        let bool_id = types.intern(Type::Scalar(ScalarType::Bool));
        let mut program = i32_program(
            vec![Stmt::If {
                cond: Expr::Lit { ty: bool_id, value: Value::Bool(true) },
                then_body: vec![Stmt::SetOutput { output: 0, value: Expr::Input(0) }],
                else_body: vec![],
            }],
            vec![],
        );
        program.types = types;
        let err = verify(&program).unwrap_err();
        assert!(format!("{}", err).contains("not assigned on every path"), "{}", err);
        let _ = i32_id;
    }

    #[test]
    fn rejects_local_read_before_assignment() {
        let mut program = i32_program(
            vec![Stmt::SetOutput { output: 0, value: Expr::Local(0) }],
            vec![],
        );
        let i32_id = program.types.lookup(&Type::Scalar(ScalarType::I32)).unwrap();
        program.nodes[0].locals.push(LocalDecl { name: "tmp".into(), ty: i32_id });
        let err = verify(&program).unwrap_err();
        assert!(format!("{}", err).contains("read before assignment"), "{}", err);
    }

    #[test]
    fn rejects_type_mismatch_in_assignment() {
        let mut program = i32_program(vec![], vec![]);
        let bool_id = program.types.intern(Type::Scalar(ScalarType::Bool));
        program.nodes[0].body = vec![Stmt::SetOutput {
            output: 0,
            value: Expr::Lit { ty: bool_id, value: Value::Bool(false) },
        }];
        let err = verify(&program).unwrap_err();
        assert!(format!("{}", err).contains("expected i32, found bool"), "{}", err);
    }

    #[test]
    fn rejects_non_exhaustive_variant_dispatch() {
        let mut program = i32_program(
            vec![Stmt::SetOutput { output: 0, value: Expr::Input(0) }],
            vec![],
        );
        let i32_id = program.types.lookup(&Type::Scalar(ScalarType::I32)).unwrap();
        let bool_id = program.types.intern(Type::Scalar(ScalarType::Bool));
        let variant = program.types.intern(Type::Variant {
            name: "V".into(),
            cases: vec![
                VariantCase { name: "A".into(), payload: i32_id },
                VariantCase { name: "B".into(), payload: bool_id },
            ],
        });
        program.nodes[0].body.push(Stmt::Match {
            ty: variant,
            scrutinee: Expr::MakeVariant {
                ty: variant,
                tag: 0,
                payload: Box::new(Expr::Input(0)),
            },
            arms: vec![MatchArm { tag: 0, binding: None, body: vec![] }],
        });
        let err = verify(&program).unwrap_err();
        assert!(format!("{}", err).contains("does not cover every tag"), "{}", err);
    }

    #[test]
    fn rejects_recursive_instantiation() {
        let mut program = i32_program(
            vec![Stmt::SetOutput { output: 0, value: Expr::Input(0) }],
            vec![],
        );
        program.nodes[0].children.push(ChildDecl {
            name: "self_loop".into(),
            node: NodeId(0),
        });
        let err = verify(&program).unwrap_err();
        assert!(format!("{}", err).contains("recursive instantiation"), "{}", err);
    }

    #[test]
    fn rejects_elaboration_read_before_write() {
        let mut program = i32_program(
            vec![Stmt::SetOutput { output: 0, value: Expr::Input(0) }],
            vec![],
        );
        let i32_id = program.types.lookup(&Type::Scalar(ScalarType::I32)).unwrap();
        program.consts = vec![
            ConstDecl { name: "A".into(), ty: i32_id, init: ConstInit::Elaborated },
            ConstDecl { name: "B".into(), ty: i32_id, init: ConstInit::Elaborated },
        ];
        // A is computed from B, but B only gets written afterwards.
        program.elaboration = vec![
            ElabStep::Assign { dst: ConstId(0), value: Expr::Const(ConstId(1)) },
            ElabStep::Assign {
                dst: ConstId(1),
                value: Expr::Lit { ty: i32_id, value: Value::I32(1) },
            },
        ];
        let err = verify(&program).unwrap_err();
        assert!(format!("{}", err).contains("before it is fully elaborated"), "{}", err);
    }

    #[test]
    fn rejects_structurally_duplicate_type_entries() {
        let mut program = i32_program(
            vec![Stmt::SetOutput { output: 0, value: Expr::Input(0) }],
            vec![],
        );
        let duplicated: Vec<Type> = vec![
            Type::Scalar(ScalarType::I32),
            Type::Scalar(ScalarType::I32),
        ];
        program.types = TypeTable::from(duplicated);
        let err = verify(&program).unwrap_err();
        assert!(format!("{}", err).contains("structural duplicate"), "{}", err);
    }
}
