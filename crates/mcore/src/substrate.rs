//! Substrate notification surface (spec.md §6): the callback set [`Runtime`](crate::Runtime)
//! invokes around its own operations. Every method defaults to a no-op, so a concrete substrate
//! only overrides the hooks it cares about — these are observers of the core's state transitions,
//! never participants in them ("otherwise pure-functional from the core's perspective").

use mcore_io::ParadigmId;
use mcore_task::{RegionHandle, TaskId};

use crate::value::Value;
use crate::LocationId;

/// One registered substrate. `Runtime::register_substrate` adds one; every substrate sees every
/// notification, in registration order.
pub trait Substrate: Send + Sync {
    fn enter_region(&self, location: LocationId, timestamp: u64, region: RegionHandle) {
        let _ = (location, timestamp, region);
    }

    fn exit_region(&self, location: LocationId, timestamp: u64, region: RegionHandle) {
        let _ = (location, timestamp, region);
    }

    fn track_alloc(
        &self,
        address: u64,
        size: u64,
        substrate_data: &[Value],
        total_bytes_this_tracker: u64,
        total_bytes_process: u64,
    ) {
        let _ = (address, size, substrate_data, total_bytes_this_tracker, total_bytes_process);
    }

    fn track_realloc(
        &self,
        address: u64,
        size: u64,
        substrate_data: &[Value],
        total_bytes_this_tracker: u64,
        total_bytes_process: u64,
    ) {
        let _ = (address, size, substrate_data, total_bytes_this_tracker, total_bytes_process);
    }

    fn track_free(
        &self,
        address: u64,
        size: u64,
        substrate_data: &[Value],
        total_bytes_this_tracker: u64,
        total_bytes_process: u64,
    ) {
        let _ = (address, size, substrate_data, total_bytes_this_tracker, total_bytes_process);
    }

    fn leaked_memory(&self, address: u64, size: u64, substrate_data: &[Value]) {
        let _ = (address, size, substrate_data);
    }

    fn io_paradigm_enter(&self, location: LocationId, paradigm: ParadigmId) {
        let _ = (location, paradigm);
    }

    fn io_paradigm_leave(&self, location: LocationId, paradigm: ParadigmId) {
        let _ = (location, paradigm);
    }

    fn core_task_create(&self, location: LocationId, task: TaskId) {
        let _ = (location, task);
    }

    fn core_task_complete(&self, location: LocationId, task: TaskId) {
        let _ = (location, task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting(std::sync::atomic::AtomicU64);

    impl Substrate for Counting {
        fn enter_region(&self, _location: LocationId, _timestamp: u64, _region: RegionHandle) {
            self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    }

    #[test]
    fn unimplemented_hooks_default_to_a_no_op() {
        let substrate = Counting(std::sync::atomic::AtomicU64::new(0));
        substrate.exit_region(0, 0, 0);
        substrate.track_free(0, 0, &[], 0, 0);
        assert_eq!(substrate.0.load(std::sync::atomic::Ordering::Relaxed), 0);
        substrate.enter_region(0, 0, 0);
        assert_eq!(substrate.0.load(std::sync::atomic::Ordering::Relaxed), 1);
    }
}
