/// An arena index into [`crate::IoManager`]'s handle pool. Opaque to callers; mint one only by
/// calling [`crate::IoManager::complete_creation`] or
/// [`crate::IoManager::create_pre_created_handle`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct HandleId(pub(crate) usize);

pub type ParadigmId = usize;
pub type FileId = u32;

bitflags::bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct HandleFlags: u32 {
        const PRE_CREATED = 1 << 0;
        const CLOSED      = 1 << 1;
    }
}

/// Opaque paradigm-specific access mode (e.g. `SCOREP_IoAccessMode`'s read/write/append enum).
pub type AccessMode = u32;
/// Opaque paradigm-specific status flags (e.g. `SCOREP_IoStatusFlag`'s append/close-on-exec/…
/// bitset).
pub type StatusFlags = u32;

/// One I/O handle. Mirrors `SCOREP_IoHandleDef`'s fixed fields plus its trailing
/// paradigm-specific payload, except the payload here is an owned `Vec<u8>` rather than a
/// variable-length struct tail.
pub(crate) struct HandleData {
    pub(crate) paradigm: ParadigmId,
    pub(crate) file: Option<FileId>,
    pub(crate) flags: HandleFlags,
    pub(crate) scope: u32,
    pub(crate) parent: Option<HandleId>,
    pub(crate) access_mode: AccessMode,
    pub(crate) status_flags: StatusFlags,
    pub(crate) unify_key: u32,
    pub(crate) payload: Vec<u8>,
    pub(crate) payload_hash: u32,
    pub(crate) next_in_bucket: Option<HandleId>,
}
