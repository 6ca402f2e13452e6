use crate::handle::{HandleId, ParadigmId};

/// One entry on a location's handle-creation stack: a handle in the middle of being built (or
/// duplicated), plus the recursive-creation counter `begin_creation` bumps when the same
/// paradigm starts creation again before the current one finishes (`io_mgmt_location_data`'s
/// `handle_stack_entry`, `recursive_creation_counter`).
pub(crate) struct StackEntry {
    pub(crate) handle: HandleId,
    pub(crate) paradigm: ParadigmId,
    pub(crate) recursive_creation_counter: u32,
}

/// Per-location handle-creation stack. A plain `Vec` rather than the source's intrusive
/// linked list plus a separate `unused_handle_stack_entries` free list: `Vec::push`/`pop`
/// already recycles its backing storage, so there is nothing a manual free list would buy here
/// (see `DESIGN.md`'s C4 entry).
#[derive(Default)]
pub struct LocationIo {
    pub(crate) stack: Vec<StackEntry>,
}

impl LocationIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn top(&self) -> Option<&StackEntry> {
        self.stack.last()
    }

    pub(crate) fn top_mut(&mut self) -> Option<&mut StackEntry> {
        self.stack.last_mut()
    }

    pub(crate) fn push(&mut self, entry: StackEntry) {
        self.stack.push(entry);
    }

    pub(crate) fn pop(&mut self) -> Option<StackEntry> {
        self.stack.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}
