//! The two "the core calls out, never interprets what comes back" collaborators from spec.md §6:
//! the region/string/file definition sink and the address-to-line oracle. Both are supplied by
//! whatever instrumentation/symbolization infrastructure embeds this core; [`Runtime`](crate::Runtime)
//! only caches what they return.

use ahash::AHashMap;
use parking_lot::Mutex;

use mcore_io::FileId;
use mcore_task::RegionHandle;

/// A region's defining attributes, used only as a cache key — the core never inspects these
/// beyond comparing them for equality, per spec.md §6 ("the core caches returned handles; it
/// never interprets them").
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RegionKey {
    pub display_name: String,
    pub canonical_name: String,
    pub file: Option<FileId>,
    pub first_line: u32,
    pub last_line: u32,
    pub paradigm: u32,
    pub role: u32,
}

/// `new_region`/`new_source_file`, called by the definition sink (spec.md §6). Implemented by
/// whatever instrumentation layer embeds this core; the core only ever holds handles this returns
/// and never branches on their value.
pub trait DefinitionSink: Send + Sync {
    fn new_region(&self, key: &RegionKey) -> RegionHandle;
    fn new_source_file(&self, path: &str) -> FileId;
}

/// A symbolized program counter, per spec.md §6's address-to-line oracle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddrInfo {
    pub so_handle: u64,
    pub so_file: String,
    pub so_base: u64,
    pub so_token: u64,
    pub ok: bool,
    pub file: String,
    pub function: String,
    pub line: u32,
}

/// `lookup_addr(pc)`. The core demangles via a named demangle oracle itself (spec.md §6: "the
/// core is responsible for de-mangling"); this trait only resolves a raw program counter to a
/// source location and a (possibly still mangled) function name.
pub trait AddrToLineOracle: Send + Sync {
    fn lookup_addr(&self, pc: u64) -> AddrInfo;
}

/// Caches definition-sink and address-to-line lookups so a hot call path never re-enters the
/// collaborator for the same key twice. Neither cache is ever evicted: definitions and resolved
/// addresses are both bounded by the static shape of the instrumented program, not by run length.
#[derive(Default)]
pub(crate) struct DefinitionCache {
    regions: Mutex<AHashMap<RegionKey, RegionHandle>>,
    source_files: Mutex<AHashMap<String, FileId>>,
    addrs: Mutex<AHashMap<u64, AddrInfo>>,
}

impl DefinitionCache {
    pub(crate) fn new_region(&self, sink: &dyn DefinitionSink, key: RegionKey) -> RegionHandle {
        if let Some(&handle) = self.regions.lock().get(&key) {
            return handle;
        }
        let handle = sink.new_region(&key);
        self.regions.lock().insert(key, handle);
        handle
    }

    pub(crate) fn new_source_file(&self, sink: &dyn DefinitionSink, path: &str) -> FileId {
        if let Some(&id) = self.source_files.lock().get(path) {
            return id;
        }
        let id = sink.new_source_file(path);
        self.source_files.lock().insert(path.to_owned(), id);
        id
    }

    pub(crate) fn lookup_addr(&self, oracle: &dyn AddrToLineOracle, pc: u64) -> AddrInfo {
        if let Some(info) = self.addrs.lock().get(&pc) {
            return info.clone();
        }
        let info = oracle.lookup_addr(pc);
        self.addrs.lock().insert(pc, info.clone());
        info
    }
}
