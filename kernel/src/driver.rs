// driver.rs — Host driver loop
//
// The end-to-end host contract: verify, bind, elaborate exactly once, init
// once, then step on every clock tick, with reset available as an operator
// command between ticks. The driver owns the world and the root context;
// the machine stays stateless.

use std::fmt;

use crate::eval::{BindError, Machine};
use crate::id::SensorId;
use crate::node::Context;
use crate::program::Program;
use crate::registry::Registry;
use crate::value::Value;
use crate::verify::{self, VerifyError};
use crate::world::World;

#[derive(Debug)]
pub enum DriverError {
    Verify(VerifyError),
    Bind(BindError),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::Verify(e) => write!(f, "verification failed: {}", e),
            DriverError::Bind(e) => write!(f, "binding failed: {}", e),
        }
    }
}

impl std::error::Error for DriverError {}

pub struct Driver<'p> {
    machine: Machine<'p>,
    world: World,
    ctx: Context,
    ticks: u64,
}

impl<'p> Driver<'p> {
    /// Verify the program, bind imports, run elaboration, allocate the
    /// root context, and init it. After this the driver is ready to tick.
    pub fn new(program: &'p Program, registry: &'p Registry) -> Result<Driver<'p>, DriverError> {
        verify::verify(program).map_err(DriverError::Verify)?;
        let machine = Machine::new(program, registry).map_err(DriverError::Bind)?;
        let world = machine.elaborate();
        let mut ctx = Context::allocate(program, program.entry);
        machine.init(program.entry, &mut ctx);
        Ok(Driver {
            machine,
            world,
            ctx,
            ticks: 0,
        })
    }

    /// One logical tick of the entry node.
    pub fn tick(&mut self, inputs: &[Value]) -> Vec<Value> {
        let entry = self.machine.program().entry;
        self.ticks += 1;
        self.machine.step(entry, inputs, &mut self.ctx, &self.world)
    }

    /// Operator reset: restore the entry subtree's pending state.
    pub fn reset(&mut self) {
        let entry = self.machine.program().entry;
        self.machine.reset(entry, &mut self.ctx);
    }

    pub fn set_sensor(&mut self, id: SensorId, value: Value) {
        self.world.set_sensor(self.machine.program(), id, value);
    }

    /// Set a sensor by declared name; false if no such sensor exists.
    pub fn set_sensor_by_name(&mut self, name: &str, value: Value) -> bool {
        match self.machine.program().sensor_by_name(name) {
            Some(id) => {
                self.set_sensor(id, value);
                true
            }
            None => false,
        }
    }

    /// Ticks completed since construction (resets do not count).
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn machine(&self) -> &Machine<'p> {
        &self.machine
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
