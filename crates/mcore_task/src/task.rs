use crate::frame::FrameId;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct TaskId(pub(crate) usize);

/// spec.md §3's Task data model: `{ current_frame, current_index, thread_id,
/// generation_number, parent_hash, next_recycle, substrate_data[] }`. `next_recycle` isn't
/// stored inline here — [`crate::Stack`] keeps recycled task ids in an explicit `Vec` free list
/// instead of threading a linked list through the tasks themselves, same substitution as
/// [`crate::frame::FrameArena`].
pub(crate) struct TaskData {
    pub(crate) current_frame: Option<FrameId>,
    pub(crate) current_index: usize,
    pub(crate) thread_id: u32,
    pub(crate) generation_number: u32,
    pub(crate) parent_hash: u32,
    pub(crate) substrate_data: Vec<u64>,
}

impl TaskData {
    pub(crate) fn fresh(thread_id: u32, generation_number: u32, parent_hash: u32, num_substrates: usize) -> Self {
        Self {
            current_frame: None,
            current_index: crate::frame::FRAMES_CAPACITY - 1,
            thread_id,
            generation_number,
            parent_hash,
            substrate_data: vec![0; num_substrates],
        }
    }
}
