//! Per-paradigm I/O handle registry: the handle-creation/duplication state machine, lookup by
//! opaque paradigm-specific payload, and the shared file-path cache (spec.md §4.3).
//!
//! A registered I/O paradigm (POSIX, MPI-I/O, …) owns one [`Paradigm`] handle table; handles
//! are created through the per-location [`LocationIo`] creation stack so that nested/recursive
//! creation calls from wrapped library calls (`open` calling `open64` calling the real syscall)
//! collapse onto a single handle instead of minting one per wrapper layer.

mod file_table;
mod handle;
mod paradigm;
mod stack;

pub use file_table::FileTable;
pub use handle::{AccessMode, FileId, HandleFlags, HandleId, ParadigmId, StatusFlags};
pub use stack::LocationIo;

use handle::HandleData;
use mcore_hashtable::jenkins;
use paradigm::Paradigm;

/// Owns every registered paradigm's handle table and the arena backing every live
/// [`HandleId`]. One instance per process, shared across locations (handle creation for a given
/// location is serialized by that location's [`LocationIo`]; cross-location handle *lookup* is
/// expected to run under whatever lock the caller already holds around I/O paradigm callbacks,
/// mirroring the source's per-paradigm `SCOREP_IoMgmt_LockIoParadigm`/`Unlock` pair, which this
/// crate doesn't reimplement since it has no counterpart file in the retrieved pack).
#[derive(Default)]
pub struct IoManager {
    paradigms: Vec<Option<Paradigm>>,
    handles: Vec<HandleData>,
    free_handles: Vec<HandleId>,
}

impl IoManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn paradigm(&self, paradigm: ParadigmId) -> Option<&Paradigm> {
        self.paradigms.get(paradigm).and_then(|slot| slot.as_ref())
    }

    fn paradigm_mut(&mut self, paradigm: ParadigmId) -> &mut Paradigm {
        self.paradigms[paradigm].as_mut().expect("paradigm registered, checked by caller")
    }

    /// `SCOREP_IoMgmt_RegisterParadigm`.
    pub fn register_paradigm(&mut self, paradigm: ParadigmId) {
        if self.paradigms.len() <= paradigm {
            self.paradigms.resize_with(paradigm + 1, || None);
        }
        mcore_err::bug_on(self.paradigms[paradigm].is_some(), "I/O paradigm already registered");
        self.paradigms[paradigm] = Some(Paradigm::new());
    }

    /// `SCOREP_IoMgmt_DeregisterParadigm`.
    pub fn deregister_paradigm(&mut self, paradigm: ParadigmId) {
        mcore_err::bug_on(self.paradigm(paradigm).is_none(), "deregistering an unregistered I/O paradigm");
        self.paradigms[paradigm] = None;
    }

    fn alloc_handle(&mut self, data: HandleData) -> HandleId {
        if let Some(id) = self.free_handles.pop() {
            self.handles[id.0] = data;
            id
        } else {
            self.handles.push(data);
            HandleId(self.handles.len() - 1)
        }
    }

    /// `scorep_io_mgmt_begin_handle_creation`: push a new in-progress handle onto `location`'s
    /// creation stack, unless the stack top is already creating a handle for the *same*
    /// paradigm, in which case this call is a nested/recursive re-entry and only bumps that
    /// entry's counter — a different paradigm always gets its own independent stack entry.
    #[allow(clippy::too_many_arguments)]
    pub fn begin_creation(
        &mut self,
        location: &mut LocationIo,
        paradigm: ParadigmId,
        scope: u32,
        flags: HandleFlags,
        access_mode: AccessMode,
        status_flags: StatusFlags,
    ) {
        mcore_err::bug_on(self.paradigm(paradigm).is_none(), "creating a handle for an unregistered I/O paradigm");
        if let Some(top) = location.top_mut() {
            if top.paradigm == paradigm {
                top.recursive_creation_counter += 1;
                return;
            }
        }
        let parent = location.top().map(|entry| entry.handle);
        let handle = self.alloc_handle(HandleData {
            paradigm,
            file: None,
            flags,
            scope,
            parent,
            access_mode,
            status_flags,
            unify_key: 0,
            payload: Vec::new(),
            payload_hash: 0,
            next_in_bucket: None,
        });
        location.push(stack::StackEntry { handle, paradigm, recursive_creation_counter: 0 });
    }

    /// `scorep_io_mgmt_complete_handle_creation`: finalize the handle at the top of `location`'s
    /// creation stack with its paradigm-specific payload bytes, insert it into its paradigm's
    /// table, and return it. Returns `None` without popping anything but the recursive counter
    /// when this call is closing a nested re-entry rather than the outermost creation call.
    /// `access_mode`/`status_flags` were already set by [`begin_creation`](Self::begin_creation)
    /// and are left untouched here.
    pub fn complete_creation(
        &mut self,
        location: &mut LocationIo,
        payload: &[u8],
        file: Option<FileId>,
        unify_key: u32,
    ) -> Option<HandleId> {
        mcore_err::bug_on(location.is_empty(), "no I/O handle on the creation stack to finalize");
        if let Some(top) = location.top_mut() {
            if top.recursive_creation_counter > 0 {
                top.recursive_creation_counter -= 1;
                return None;
            }
        }
        let entry = location.pop().expect("checked non-empty above");
        let hash = jenkins::hash_bytes(payload, 0);
        {
            let data = &mut self.handles[entry.handle.0];
            data.payload = payload.to_vec();
            data.payload_hash = hash;
            data.file = file;
            data.unify_key = unify_key;
        }
        self.insert_handle(entry.paradigm, entry.handle);
        Some(entry.handle)
    }

    /// `scorep_io_mgmt_drop_incomplete_handle`: the in-progress handle at the top of the stack
    /// is abandoned (the wrapped call failed) rather than finalized. Its arena slot returns to
    /// the free list without ever being linked into a paradigm's bucket chain.
    pub fn drop_incomplete(&mut self, location: &mut LocationIo) {
        mcore_err::bug_on(location.is_empty(), "no I/O handle on the creation stack to drop");
        let entry = location.pop().expect("checked non-empty above");
        self.free_handles.push(entry.handle);
    }

    /// `scorep_io_mgmt_begin_handle_duplication`: like [`begin_creation`](Self::begin_creation),
    /// but the new handle copies `source`'s descriptive fields (paradigm, file, scope, parent)
    /// instead of taking them as arguments. It never inherits `source`'s flags (e.g.
    /// [`HandleFlags::PRE_CREATED`]) or its access mode — both start at their empty/zero default
    /// on the duplicate, the same way `SCOREP_IoMgmt_BeginHandleDuplication` passes
    /// `SCOREP_IO_HANDLE_FLAG_NONE` rather than the source handle's flags.
    pub fn begin_duplication(&mut self, location: &mut LocationIo, source: HandleId) {
        let (paradigm, file, scope, parent) = {
            let src = &self.handles[source.0];
            (src.paradigm, src.file, src.scope, src.parent)
        };
        let handle = self.alloc_handle(HandleData {
            paradigm,
            file,
            flags: HandleFlags::empty(),
            scope,
            parent,
            access_mode: AccessMode::default(),
            status_flags: StatusFlags::default(),
            unify_key: 0,
            payload: Vec::new(),
            payload_hash: 0,
            next_in_bucket: None,
        });
        location.push(stack::StackEntry { handle, paradigm, recursive_creation_counter: 0 });
    }

    /// `scorep_io_mgmt_complete_handle_duplication`: duplication finalizes exactly like ordinary
    /// creation once the payload bytes for the duplicate handle are known.
    pub fn complete_duplication(
        &mut self,
        location: &mut LocationIo,
        payload: &[u8],
        file: Option<FileId>,
        unify_key: u32,
    ) -> Option<HandleId> {
        self.complete_creation(location, payload, file, unify_key)
    }

    /// `SCOREP_IoMgmt_CreatePreCreatedHandle`: build and insert a handle in one step, bypassing
    /// the creation stack entirely. Used for handles the paradigm already knows about at init
    /// time (stdin/stdout/stderr and the like), which is also why `access_mode`/`status_flags`
    /// are known upfront rather than discovered through the normal creation stack.
    #[allow(clippy::too_many_arguments)]
    pub fn create_pre_created_handle(
        &mut self,
        paradigm: ParadigmId,
        payload: &[u8],
        file: Option<FileId>,
        scope: u32,
        unify_key: u32,
        access_mode: AccessMode,
        status_flags: StatusFlags,
    ) -> HandleId {
        mcore_err::bug_on(self.paradigm(paradigm).is_none(), "creating a handle for an unregistered I/O paradigm");
        let hash = jenkins::hash_bytes(payload, 0);
        let handle = self.alloc_handle(HandleData {
            paradigm,
            file,
            flags: HandleFlags::PRE_CREATED,
            scope,
            parent: None,
            access_mode,
            status_flags,
            unify_key,
            payload: payload.to_vec(),
            payload_hash: hash,
            next_in_bucket: None,
        });
        self.insert_handle(paradigm, handle);
        handle
    }

    /// `get_handle_ref`/`SCOREP_IoMgmt_GetIoHandle`: find the handle already registered for
    /// `payload` under `paradigm`, if any.
    pub fn get(&self, paradigm: ParadigmId, payload: &[u8]) -> Option<HandleId> {
        let table = self.paradigm(paradigm)?;
        let hash = jenkins::hash_bytes(payload, 0);
        let mut cursor = table.buckets[Paradigm::bucket_idx(hash)];
        while let Some(id) = cursor {
            let data = &self.handles[id.0];
            if data.payload_hash == hash && data.payload == payload {
                return Some(id);
            }
            cursor = data.next_in_bucket;
        }
        None
    }

    /// `SCOREP_IoMgmt_RemoveHandle`: splice the handle for `payload` out of `paradigm`'s table.
    /// Warns and returns `None` (spec.md §7 kind 2) if no such handle is registered — removing
    /// something that was never (successfully) inserted is a recoverable inconsistency, not a
    /// programmer bug, since it can happen on a close() for a handle whose open() failed.
    pub fn remove(&mut self, paradigm: ParadigmId, payload: &[u8]) -> Option<HandleId> {
        let hash = jenkins::hash_bytes(payload, 0);
        let idx = Paradigm::bucket_idx(hash);
        let table = self.paradigm_mut(paradigm);
        let mut cursor = table.buckets[idx];
        let mut prev: Option<HandleId> = None;
        while let Some(id) = cursor {
            let (matches, next) = {
                let data = &self.handles[id.0];
                (data.payload_hash == hash && data.payload == payload, data.next_in_bucket)
            };
            if matches {
                match prev {
                    Some(p) => self.handles[p.0].next_in_bucket = next,
                    None => self.paradigm_mut(paradigm).buckets[idx] = next,
                }
                self.handles[id.0].next_in_bucket = None;
                return Some(id);
            }
            prev = Some(id);
            cursor = next;
        }
        mcore_err::Recoverable::NotFound { what: "I/O handle" }.warn();
        None
    }

    /// `SCOREP_IoMgmt_ReinsertHandle`: put a handle that was previously [`remove`](Self::remove)d
    /// back into its paradigm's table, under its already-cached payload hash. Fatal if the
    /// handle never had a payload hash computed (it was never completed), since reinserting an
    /// incomplete handle can't be a legitimate caller action.
    pub fn reinsert(&mut self, handle: HandleId) {
        let (paradigm, hash) = {
            let data = &self.handles[handle.0];
            (data.paradigm, data.payload_hash)
        };
        mcore_err::bug_on(hash == 0, "cannot reinsert a handle with no payload hash");
        self.insert_handle(paradigm, handle);
    }

    fn insert_handle(&mut self, paradigm: ParadigmId, handle: HandleId) {
        let hash = self.handles[handle.0].payload_hash;
        let idx = Paradigm::bucket_idx(hash);

        // Splice out an existing entry with the exact same payload, if present: the paradigm is
        // re-announcing a handle it already told us about (a duplicate completion), not adding a
        // second independent one.
        let mut cursor = self.paradigm(paradigm).and_then(|t| t.buckets[idx]);
        let mut prev: Option<HandleId> = None;
        while let Some(id) = cursor {
            if id == handle {
                break;
            }
            let (duplicate, next) = {
                let data = &self.handles[id.0];
                (data.payload_hash == hash && data.payload == self.handles[handle.0].payload, data.next_in_bucket)
            };
            if duplicate {
                match prev {
                    Some(p) => self.handles[p.0].next_in_bucket = next,
                    None => self.paradigm_mut(paradigm).buckets[idx] = next,
                }
                mcore_err::Recoverable::DuplicateInsert { table: "io_handle" }.warn();
                break;
            }
            prev = Some(id);
            cursor = next;
        }

        let head = self.paradigm(paradigm).and_then(|t| t.buckets[idx]);
        self.handles[handle.0].next_in_bucket = head;
        self.paradigm_mut(paradigm).buckets[idx] = Some(handle);
    }

    pub fn paradigm_of(&self, handle: HandleId) -> ParadigmId {
        self.handles[handle.0].paradigm
    }

    pub fn file_of(&self, handle: HandleId) -> Option<FileId> {
        self.handles[handle.0].file
    }

    pub fn parent_of(&self, handle: HandleId) -> Option<HandleId> {
        self.handles[handle.0].parent
    }

    pub fn flags_of(&self, handle: HandleId) -> HandleFlags {
        self.handles[handle.0].flags
    }

    pub fn scope_of(&self, handle: HandleId) -> u32 {
        self.handles[handle.0].scope
    }

    pub fn access_mode_of(&self, handle: HandleId) -> AccessMode {
        self.handles[handle.0].access_mode
    }

    pub fn status_flags_of(&self, handle: HandleId) -> StatusFlags {
        self.handles[handle.0].status_flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POSIX: ParadigmId = 0;
    const MPI: ParadigmId = 1;

    fn manager_with_posix() -> IoManager {
        let mut mgr = IoManager::new();
        mgr.register_paradigm(POSIX);
        mgr
    }

    #[test]
    fn create_then_get_round_trips() {
        let mut mgr = manager_with_posix();
        let mut loc = LocationIo::new();
        mgr.begin_creation(&mut loc, POSIX, 0, HandleFlags::empty(), 0, 0);
        let handle = mgr.complete_creation(&mut loc, b"/tmp/a.dat:3", None, 0).unwrap();
        assert_eq!(mgr.get(POSIX, b"/tmp/a.dat:3"), Some(handle));
        assert_eq!(mgr.paradigm_of(handle), POSIX);
    }

    #[test]
    fn recursive_creation_for_the_same_paradigm_collapses_to_one_handle() {
        let mut mgr = manager_with_posix();
        let mut loc = LocationIo::new();
        mgr.begin_creation(&mut loc, POSIX, 0, HandleFlags::empty(), 0, 0);
        mgr.begin_creation(&mut loc, POSIX, 0, HandleFlags::empty(), 0, 0);
        // the inner call's completion only decrements the recursive counter
        assert_eq!(mgr.complete_creation(&mut loc, b"unused", None, 0), None);
        let handle = mgr.complete_creation(&mut loc, b"/tmp/a.dat:4", None, 0).unwrap();
        assert_eq!(mgr.get(POSIX, b"/tmp/a.dat:4"), Some(handle));
    }

    #[test]
    fn a_different_paradigm_gets_its_own_independent_stack_entry() {
        let mut mgr = manager_with_posix();
        mgr.register_paradigm(MPI);
        let mut loc = LocationIo::new();
        mgr.begin_creation(&mut loc, POSIX, 0, HandleFlags::empty(), 0, 0);
        mgr.begin_creation(&mut loc, MPI, 0, HandleFlags::empty(), 0, 0);
        let inner = mgr.complete_creation(&mut loc, b"mpi-file:1", None, 0).unwrap();
        let outer = mgr.complete_creation(&mut loc, b"/tmp/a.dat:5", None, 0).unwrap();
        // inner was created while the POSIX handle was still on the stack, so it chains to it
        // as its parent even though it belongs to a different paradigm.
        assert_eq!(mgr.parent_of(inner), Some(outer));
        assert_eq!(mgr.paradigm_of(outer), POSIX);
    }

    #[test]
    fn reinserting_a_duplicate_payload_evicts_the_older_entry_with_a_warning() {
        let mut mgr = manager_with_posix();
        let mut loc = LocationIo::new();
        mgr.begin_creation(&mut loc, POSIX, 0, HandleFlags::empty(), 0, 0);
        let first = mgr.complete_creation(&mut loc, b"/tmp/a.dat:6", None, 0).unwrap();
        mgr.begin_creation(&mut loc, POSIX, 0, HandleFlags::empty(), 0, 0);
        let second = mgr.complete_creation(&mut loc, b"/tmp/a.dat:6", None, 0).unwrap();
        assert_ne!(first, second);
        assert_eq!(mgr.get(POSIX, b"/tmp/a.dat:6"), Some(second));
    }

    #[test]
    fn remove_then_reinsert_round_trips() {
        let mut mgr = manager_with_posix();
        let mut loc = LocationIo::new();
        mgr.begin_creation(&mut loc, POSIX, 0, HandleFlags::empty(), 0, 0);
        let handle = mgr.complete_creation(&mut loc, b"/tmp/a.dat:7", None, 0).unwrap();
        assert_eq!(mgr.remove(POSIX, b"/tmp/a.dat:7"), Some(handle));
        assert_eq!(mgr.get(POSIX, b"/tmp/a.dat:7"), None);
        mgr.reinsert(handle);
        assert_eq!(mgr.get(POSIX, b"/tmp/a.dat:7"), Some(handle));
    }

    #[test]
    fn removing_an_unknown_handle_is_recoverable_not_fatal() {
        let mut mgr = manager_with_posix();
        assert_eq!(mgr.remove(POSIX, b"never-opened"), None);
    }

    #[test]
    fn drop_incomplete_discards_the_in_progress_handle() {
        let mut mgr = manager_with_posix();
        let mut loc = LocationIo::new();
        mgr.begin_creation(&mut loc, POSIX, 0, HandleFlags::empty(), 0, 0);
        mgr.drop_incomplete(&mut loc);
        assert!(loc.is_empty());
    }

    #[test]
    fn begin_creation_stores_access_mode_and_status_flags_for_complete_creation_to_preserve() {
        let mut mgr = manager_with_posix();
        let mut loc = LocationIo::new();
        mgr.begin_creation(&mut loc, POSIX, 0, HandleFlags::empty(), 7, 3);
        let handle = mgr.complete_creation(&mut loc, b"/tmp/a.dat:9", None, 0).unwrap();
        assert_eq!(mgr.access_mode_of(handle), 7);
        assert_eq!(mgr.status_flags_of(handle), 3);
    }

    #[test]
    fn pre_created_handles_carry_their_own_access_mode_and_status_flags() {
        let mut mgr = manager_with_posix();
        let handle = mgr.create_pre_created_handle(POSIX, b"stdin", None, 0, 0, 1, 2);
        assert_eq!(mgr.access_mode_of(handle), 1);
        assert_eq!(mgr.status_flags_of(handle), 2);
        assert!(mgr.flags_of(handle).contains(HandleFlags::PRE_CREATED));
    }

    #[test]
    fn duplication_copies_descriptive_fields_but_not_pre_created_flag() {
        let mut mgr = manager_with_posix();
        let mut loc = LocationIo::new();
        mgr.begin_creation(&mut loc, POSIX, 42, HandleFlags::PRE_CREATED, 5, 6);
        let source = mgr.complete_creation(&mut loc, b"/tmp/a.dat:8", Some(1), 0).unwrap();

        mgr.begin_duplication(&mut loc, source);
        let dup = mgr.complete_duplication(&mut loc, b"/tmp/a.dat:8-dup", None, 0).unwrap();
        assert_eq!(mgr.scope_of(dup), 42);
        assert_eq!(mgr.access_mode_of(dup), 0);
        assert_eq!(mgr.status_flags_of(dup), 0);
        assert_eq!(mgr.flags_of(dup), HandleFlags::empty());
    }
}
