// lsk — Lockstep Synchronous Kernel
//
// Library root. Executes compiled synchronous dataflow node programs:
// a verified program IR binds into a machine, elaboration produces the
// constant table, and the init/step/reset protocol drives one logical
// tick at a time over an owned context tree.

pub mod driver;
pub mod elab;
pub mod eval;
pub mod expr;
pub mod id;
pub mod node;
pub mod ops;
pub mod pretty;
pub mod program;
pub mod registry;
pub mod types;
pub mod value;
pub mod verify;
pub mod world;
