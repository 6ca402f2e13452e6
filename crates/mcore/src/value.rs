//! Tagged payload for per-substrate opaque data (SPEC_FULL.md §3 design note: "a tagged `Value`
//! enum instead of dynamic dispatch for the polymorphic ... notification capability set").
//!
//! The core objects that actually own a substrate's data slot (`mcore_task::Stack`,
//! `mcore_alloc::AllocMetric`) store it as a bare `u64` — the slot is opaque to the core either
//! way, and a raw `u64` is cheaper to carry in a hot arena than an enum. `Value` only appears at
//! the facade boundary, where [`Runtime`](crate::Runtime) reinterprets a slot for a substrate
//! notification call; which variant applies is up to the substrate's own convention for that
//! slot, so `as_u64` is the one lossless way back to the storage representation.

/// One substrate-owned value, tagged so a [`Substrate`](crate::Substrate) callback can read it
/// back as whichever type it originally stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    U64(u64),
    I64(i64),
    F64(f64),
    Bool(bool),
}

impl Value {
    /// The bit-identical round trip to the `u64` a core object's data slot actually stores.
    pub fn as_u64(self) -> u64 {
        match self {
            Value::U64(v) => v,
            Value::I64(v) => v as u64,
            Value::F64(v) => v.to_bits(),
            Value::Bool(v) => v as u64,
        }
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::U64(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_u64_round_trips_through_bit_patterns() {
        assert_eq!(Value::U64(42).as_u64(), 42);
        assert_eq!(Value::Bool(true).as_u64(), 1);
        assert_eq!(Value::F64(1.5).as_u64(), 1.5f64.to_bits());
    }
}
