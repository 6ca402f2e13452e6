//! The process-wide handle wiring every component together (SPEC_FULL.md §3's "explicitly
//! constructed Runtime handle" design note).

use std::sync::{Arc, OnceLock};

use nohash_hasher::IntMap;
use parking_lot::{Mutex, RwLock};

use mcore_alloc::AllocMetric;
use mcore_filter::Filter;
use mcore_io::IoManager;
use mcore_profile::Tree;
use mcore_task::{RegionHandle, Stack, TaskId};
use mcore_timer::Timer;

use crate::config::Config;
use crate::definitions::{AddrInfo, AddrToLineOracle, DefinitionCache, DefinitionSink, RegionKey};
use crate::substrate::Substrate;
use crate::value::Value;
use crate::{LocationId, ParadigmId};

/// Owns every core component for one measurement run: a [`Stack`] per location, the process-wide
/// [`IoManager`], profile [`Tree`], [`Filter`], [`Timer`], named allocation trackers, the
/// registered [`Substrate`]s, and the definition-sink/address-to-line caches. Construct directly
/// for tests that want several independent runtimes side by side; [`Runtime::global`] is the
/// common single-process entry point.
pub struct Runtime {
    config: Config,
    filter: Filter,
    timer: Timer,
    num_substrates: usize,
    substrates: RwLock<Vec<Arc<dyn Substrate>>>,
    tasks: Mutex<IntMap<LocationId, Stack>>,
    io: Mutex<IoManager>,
    profile: Mutex<Tree>,
    allocators: Mutex<ahash::AHashMap<String, Arc<AllocMetric>>>,
    definitions: DefinitionCache,
    definition_sink: RwLock<Option<Arc<dyn DefinitionSink>>>,
    addr_oracle: RwLock<Option<Arc<dyn AddrToLineOracle>>>,
}

static GLOBAL: OnceLock<Runtime> = OnceLock::new();

impl Runtime {
    /// `num_substrates` fixes how many per-substrate data slots every task and allocation gets;
    /// it must cover every substrate ever passed to [`register_substrate`](Self::register_substrate)
    /// for this runtime's lifetime, the same fixed-at-init contract `SCOREP_Task_Create` and
    /// `SCOREP_AllocMetric_New` rely on for their `substrate_data[]` arrays.
    pub fn new(config: Config, filter: Filter, num_substrates: usize, num_dense_metrics: usize) -> Self {
        let timer = Timer::init(config.timer.resolve());
        Self {
            config,
            filter,
            timer,
            num_substrates,
            substrates: RwLock::new(Vec::new()),
            tasks: Mutex::new(IntMap::default()),
            io: Mutex::new(IoManager::new()),
            profile: Mutex::new(Tree::new(num_dense_metrics)),
            allocators: Mutex::new(ahash::AHashMap::default()),
            definitions: DefinitionCache::default(),
            definition_sink: RwLock::new(None),
            addr_oracle: RwLock::new(None),
        }
    }

    /// Install (or fetch, if already installed) the process-wide `Runtime`. Mirrors spec.md §9's
    /// `OnceLock`/`OnceInit` wrapper: the common case is one runtime per process, initialized
    /// exactly once by whoever measures first.
    pub fn global(init: impl FnOnce() -> Runtime) -> &'static Runtime {
        GLOBAL.get_or_init(init)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn register_substrate(&self, substrate: Arc<dyn Substrate>) {
        self.substrates.write().push(substrate);
    }

    pub fn set_definition_sink(&self, sink: Arc<dyn DefinitionSink>) {
        *self.definition_sink.write() = Some(sink);
    }

    pub fn set_addr_to_line_oracle(&self, oracle: Arc<dyn AddrToLineOracle>) {
        *self.addr_oracle.write() = Some(oracle);
    }

    fn notify(&self, mut f: impl FnMut(&dyn Substrate)) {
        for substrate in self.substrates.read().iter() {
            f(substrate.as_ref());
        }
    }

    fn with_location_stack<R>(&self, location: LocationId, f: impl FnOnce(&mut Stack) -> R) -> R {
        let mut tasks = self.tasks.lock();
        let stack = tasks.entry(location).or_insert_with(|| Stack::new(self.num_substrates, 0));
        f(stack)
    }

    /// `SCOREP_EnterRegion`: push `region` onto `location`'s current task, then notify every
    /// registered substrate.
    pub fn enter_region(&self, location: LocationId, region: RegionHandle) {
        let timestamp = self.timer.get_ticks();
        self.with_location_stack(location, |stack| {
            let task = stack.current_task();
            stack.enter(task, region);
        });
        self.notify(|s| s.enter_region(location, timestamp, region));
    }

    /// `SCOREP_ExitRegion`: pop the current task's top region. Fatal (via `mcore_task::Stack`) if
    /// the stack was already empty, per spec.md §7 kind 1.
    pub fn exit_region(&self, location: LocationId, region: RegionHandle) {
        let timestamp = self.timer.get_ticks();
        self.with_location_stack(location, |stack| {
            let task = stack.current_task();
            stack.exit(task);
        });
        self.notify(|s| s.exit_region(location, timestamp, region));
    }

    /// `SCOREP_Task_Create` at the given location, then notify every substrate.
    pub fn core_task_create(&self, location: LocationId, thread_id: u32, generation_number: u32) -> TaskId {
        let task = self.with_location_stack(location, |stack| stack.task_create(thread_id, generation_number));
        self.notify(|s| s.core_task_create(location, task));
        task
    }

    /// `SCOREP_Task_Complete` at the given location, then notify every substrate.
    pub fn core_task_complete(&self, location: LocationId, task: TaskId) {
        self.with_location_stack(location, |stack| stack.task_complete(task));
        self.notify(|s| s.core_task_complete(location, task));
    }

    pub fn io_paradigm_enter(&self, location: LocationId, paradigm: ParadigmId) {
        self.notify(|s| s.io_paradigm_enter(location, paradigm));
    }

    pub fn io_paradigm_leave(&self, location: LocationId, paradigm: ParadigmId) {
        self.notify(|s| s.io_paradigm_leave(location, paradigm));
    }

    pub fn io(&self) -> &Mutex<IoManager> {
        &self.io
    }

    pub fn profile(&self) -> &Mutex<Tree> {
        &self.profile
    }

    /// Fetch (creating on first use) the named allocation tracker. Matches the source's "one
    /// `SCOREP_AllocationMetric` per named heap" model (e.g. a separate tracker for each
    /// user-registered memory pool, plus the implicit process-wide one).
    pub fn allocator(&self, name: &str) -> Arc<AllocMetric> {
        self.allocators
            .lock()
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(AllocMetric::new(name.to_owned(), self.num_substrates)))
            .clone()
    }

    /// `track_alloc`: record the allocation against `tracker`, then notify every substrate with
    /// the resulting totals.
    pub fn track_alloc(&self, tracker: &Arc<AllocMetric>, address: u64, size: u64) {
        let allocation = tracker.handle_alloc(address, size);
        let total_this_tracker = tracker.total_allocated_memory();
        let total_process = mcore_alloc::process_allocated_memory();
        let slots: Vec<Value> =
            (0..self.num_substrates).map(|slot| Value::U64(tracker.substrate_data(allocation, slot))).collect();
        self.notify(|s| s.track_alloc(address, size, &slots, total_this_tracker, total_process));
    }

    /// `track_realloc`: resize/relocate the allocation at `address` from `tracker`, then notify
    /// every substrate with the totals `handle_realloc` snapshotted — for a relocating realloc
    /// that's the transient peak between the add and the subtract (spec.md §4.4), not the
    /// converged post-free total.
    pub fn track_realloc(
        &self,
        tracker: &Arc<AllocMetric>,
        address: u64,
        size: u64,
        prev: Option<mcore_alloc::AllocationId>,
    ) {
        let outcome = tracker.handle_realloc(address, size, prev);
        let slots: Vec<Value> =
            (0..self.num_substrates).map(|slot| Value::U64(tracker.substrate_data(outcome.id, slot))).collect();
        self.notify(|s| {
            s.track_realloc(
                address,
                size,
                &slots,
                outcome.total_allocated_memory,
                outcome.process_allocated_memory,
            )
        });
    }

    /// `track_free`: release the allocation at `address` from `tracker` (a warning-and-no-op if
    /// it was never tracked, per spec.md §7 kind 2), then notify every substrate.
    pub fn track_free(&self, tracker: &Arc<AllocMetric>, address: u64) {
        let Some(allocation) = tracker.acquire_alloc(address) else { return };
        let size = tracker.handle_free(allocation);
        let total_this_tracker = tracker.total_allocated_memory();
        let total_process = mcore_alloc::process_allocated_memory();
        self.notify(|s| s.track_free(address, size, &[], total_this_tracker, total_process));
    }

    /// `leaked_memory`: walk every tracker's still-live allocations at finalization, notifying
    /// once per leak.
    pub fn report_leaks(&self) {
        let allocators: Vec<_> = self.allocators.lock().values().cloned().collect();
        for tracker in allocators {
            tracker.report_leaked(|address, size| {
                self.notify(|s| s.leaked_memory(address, size, &[]));
            });
        }
    }

    pub fn new_region(&self, key: RegionKey) -> RegionHandle {
        let sink = self.definition_sink.read();
        match sink.as_deref() {
            Some(sink) => self.definitions.new_region(sink, key),
            None => mcore_err::fatal("new_region called with no definition sink installed"),
        }
    }

    pub fn new_source_file(&self, path: &str) -> mcore_io::FileId {
        let sink = self.definition_sink.read();
        match sink.as_deref() {
            Some(sink) => self.definitions.new_source_file(sink, path),
            None => mcore_err::fatal("new_source_file called with no definition sink installed"),
        }
    }

    pub fn lookup_addr(&self, pc: u64) -> AddrInfo {
        let oracle = self.addr_oracle.read();
        match oracle.as_deref() {
            Some(oracle) => self.definitions.lookup_addr(oracle, pc),
            None => mcore_err::fatal("lookup_addr called with no address-to-line oracle installed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Recorder {
        enters: AtomicU64,
        exits: AtomicU64,
    }

    impl Substrate for Recorder {
        fn enter_region(&self, _location: LocationId, _timestamp: u64, _region: RegionHandle) {
            self.enters.fetch_add(1, Ordering::Relaxed);
        }

        fn exit_region(&self, _location: LocationId, _timestamp: u64, _region: RegionHandle) {
            self.exits.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn enter_exit_region_pushes_pops_and_notifies() {
        let runtime = Runtime::new(Config::default(), Filter::new(), 0, 0);
        let recorder = Arc::new(Recorder { enters: AtomicU64::new(0), exits: AtomicU64::new(0) });
        runtime.register_substrate(recorder.clone());

        runtime.enter_region(0, 42);
        runtime.exit_region(0, 42);

        assert_eq!(recorder.enters.load(Ordering::Relaxed), 1);
        assert_eq!(recorder.exits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn allocator_is_created_once_per_name_and_tracks_totals() {
        let runtime = Runtime::new(Config::default(), Filter::new(), 0, 0);
        let a = runtime.allocator("heap");
        let b = runtime.allocator("heap");
        assert!(Arc::ptr_eq(&a, &b));

        runtime.track_alloc(&a, 0x1000, 64);
        assert_eq!(a.total_allocated_memory(), 64);
        runtime.track_free(&a, 0x1000);
        assert_eq!(a.total_allocated_memory(), 0);
    }

    #[test]
    fn track_realloc_to_a_new_address_is_reachable_through_the_runtime() {
        let runtime = Runtime::new(Config::default(), Filter::new(), 0, 0);
        let tracker = runtime.allocator("heap");
        runtime.track_alloc(&tracker, 0x1000, 100);

        let prev = tracker.acquire_alloc(0x1000).unwrap();
        runtime.track_realloc(&tracker, 0x2000, 60, Some(prev));
        assert_eq!(tracker.total_allocated_memory(), 60);
    }

    #[test]
    #[should_panic(expected = "no definition sink installed")]
    fn new_region_without_a_sink_is_fatal() {
        let runtime = Runtime::new(Config::default(), Filter::new(), 0, 0);
        runtime.new_region(RegionKey {
            display_name: "foo".into(),
            canonical_name: "foo".into(),
            file: None,
            first_line: 0,
            last_line: 0,
            paradigm: 0,
            role: 0,
        });
    }
}
