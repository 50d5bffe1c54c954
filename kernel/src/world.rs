// world.rs — Process-wide state: sensor snapshot and constant table
//
// A World holds everything node code reads besides its own inputs and
// context: the host-written sensor snapshot and the elaborated constant
// table. The only way to obtain a World is to run elaboration (see
// Machine::elaborate), so "step before elaboration" is unrepresentable and
// a given world can never be elaborated twice.
//
// Sensors are written by the host between ticks and read-only from node
// code; no synchronization is provided. The host guarantees a stable
// snapshot for the duration of one step call.

use sha2::{Digest, Sha256};

use crate::id::{ConstId, SensorId};
use crate::program::Program;
use crate::value::Value;

pub struct World {
    sensors: Vec<Value>,
    consts: Vec<Value>,
}

impl World {
    pub(crate) fn new(sensors: Vec<Value>, consts: Vec<Value>) -> World {
        World { sensors, consts }
    }

    /// Current value of a sensor.
    pub fn sensor(&self, id: SensorId) -> &Value {
        self.sensors
            .get(id.index())
            .unwrap_or_else(|| panic!("unknown sensor s{}", id.0))
    }

    /// Host write of a sensor. The value must conform to the declared
    /// type; a mismatch is a host contract violation.
    pub fn set_sensor(&mut self, program: &Program, id: SensorId, value: Value) {
        let decl = program.sensor(id);
        assert!(
            Value::conforms(&program.types, decl.ty, &value),
            "sensor '{}' written with a value of the wrong shape: {:?}",
            decl.name,
            value
        );
        self.sensors[id.index()] = value;
    }

    /// Constant table entry, read-only after elaboration.
    pub fn constant(&self, id: ConstId) -> &Value {
        self.consts
            .get(id.index())
            .unwrap_or_else(|| panic!("unknown constant c{}", id.0))
    }

    /// SHA-256 over the canonical encoding of the constant table, as
    /// lowercase hex. Two elaborations of the same program agree on this.
    pub fn fingerprint(&self) -> String {
        let json =
            serde_json::to_string(&self.consts).expect("constant table is always serializable");
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        let hash = hasher.finalize();
        hash.iter().map(|b| format!("{:02x}", b)).collect()
    }
}
