// pretty.rs — Deterministic program listing
//
// Renders a program's inventory the way a reader would skim the generated
// sources: the type table with the structural operations that actually got
// planned for it, sensor/constant/import declarations, node signatures with
// their persistent state, and the elaboration schedule. Output is stable
// line by line; snapshot tests lock it.

use std::fmt::Write;

use crate::elab::ElabStep;
use crate::ops::OpSet;
use crate::program::{ConstInit, Program};
use crate::types::Type;

pub fn listing(program: &Program, ops: &OpSet) -> String {
    let mut out = String::new();
    let t = &program.types;

    let _ = writeln!(
        out,
        "program: entry n{} '{}'",
        program.entry.0,
        program.node(program.entry).name
    );

    let _ = writeln!(out, "types:");
    for (id, ty) in t.iter() {
        let rendered = match ty {
            Type::Scalar(_) | Type::Array { .. } => t.display_name(id),
            Type::Struct { name, fields } => {
                let body: Vec<String> = fields
                    .iter()
                    .map(|f| format!("{}: {}", f.name, t.display_name(f.ty)))
                    .collect();
                format!("struct {} {{ {} }}", name, body.join(", "))
            }
            Type::Enum { name, tags } => {
                format!("enum {} {{ {} }}", name, tags.join(", "))
            }
            Type::Variant { name, cases } => {
                let body: Vec<String> = cases
                    .iter()
                    .map(|c| format!("{}: {}", c.name, t.display_name(c.payload)))
                    .collect();
                format!("variant {} {{ {} }}", name, body.join(", "))
            }
            Type::Synonym { name, target } => {
                format!("synonym {} -> {}", name, t.display_name(*target))
            }
        };
        let _ = writeln!(out, "  t{} = {}", id.0, rendered);
    }

    let _ = writeln!(out, "structural ops:");
    let _ = writeln!(out, "  eq: {}", id_list(ops.planned_equals()));
    let _ = writeln!(out, "  copy: {}", id_list(ops.planned_copies()));

    if !program.sensors.is_empty() {
        let _ = writeln!(out, "sensors:");
        for (i, s) in program.sensors.iter().enumerate() {
            let _ = writeln!(out, "  s{} {}: {}", i, s.name, t.display_name(s.ty));
        }
    }

    if !program.consts.is_empty() {
        let _ = writeln!(out, "consts:");
        for (i, c) in program.consts.iter().enumerate() {
            match &c.init {
                ConstInit::Literal(v) => {
                    let _ = writeln!(
                        out,
                        "  c{} {}: {} = {:?}",
                        i,
                        c.name,
                        t.display_name(c.ty),
                        v
                    );
                }
                ConstInit::Elaborated => {
                    let _ = writeln!(
                        out,
                        "  c{} {}: {} (elaborated)",
                        i,
                        c.name,
                        t.display_name(c.ty)
                    );
                }
            }
        }
    }

    if !program.imports.is_empty() {
        let _ = writeln!(out, "imports:");
        for (i, im) in program.imports.iter().enumerate() {
            let params: Vec<String> = im.params.iter().map(|p| t.display_name(*p)).collect();
            let results: Vec<String> = im.results.iter().map(|r| t.display_name(*r)).collect();
            let _ = writeln!(
                out,
                "  f{} {}({}) -> ({})",
                i,
                im.name,
                params.join(", "),
                results.join(", ")
            );
        }
    }

    let _ = writeln!(out, "nodes:");
    for (i, def) in program.nodes.iter().enumerate() {
        let ins: Vec<String> = def
            .inputs
            .iter()
            .map(|p| format!("{}: {}", p.name, t.display_name(p.ty)))
            .collect();
        let outs: Vec<String> = def
            .outputs
            .iter()
            .map(|p| format!("{}: {}", p.name, t.display_name(p.ty)))
            .collect();
        let _ = writeln!(
            out,
            "  n{} {}({}) -> ({})",
            i,
            def.name,
            ins.join(", "),
            outs.join(", ")
        );
        for reg in &def.registers {
            let reset = if reg.reset.is_some() { " (reset)" } else { "" };
            let _ = writeln!(
                out,
                "    register {}: {}{}",
                reg.name,
                t.display_name(reg.ty),
                reset
            );
        }
        if def.uses_first_tick {
            let _ = writeln!(out, "    first-tick flag");
        }
        if def.user_defined_init {
            let _ = writeln!(out, "    user-defined init");
        }
        for child in &def.children {
            let _ = writeln!(
                out,
                "    child {}: n{} '{}'",
                child.name,
                child.node.0,
                program.node(child.node).name
            );
        }
        let _ = writeln!(out, "    body: {} statements", def.body.len());
    }

    if !program.elaboration.is_empty() {
        let _ = writeln!(out, "elaboration:");
        for (i, step) in program.elaboration.iter().enumerate() {
            let rendered = match step {
                ElabStep::Assign { dst, .. } => format!("assign c{}", dst.0),
                ElabStep::SetElement { dst, index, .. } => {
                    format!("set c{}[{}]", dst.0, index)
                }
                ElabStep::Replicate {
                    dst,
                    src_index,
                    start,
                } => format!("replicate c{}[{}..] from [{}]", dst.0, start, src_index),
            };
            let _ = writeln!(out, "  {}: {}", i, rendered);
        }
    }

    out
}

fn id_list(ids: Vec<crate::id::TypeId>) -> String {
    if ids.is_empty() {
        return "(none)".into();
    }
    ids.iter()
        .map(|id| format!("t{}", id.0))
        .collect::<Vec<_>>()
        .join(" ")
}
