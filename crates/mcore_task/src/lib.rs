//! Per-location task management: the chunked region stack each task pushes/pops regions on
//! (spec.md §4.2), plus task creation/completion and recycling. One [`Stack`] is owned per
//! location; tasks never cross locations, so its free lists are uncontested by construction
//! (spec.md §4.2 "Concurrency").
//!
//! Frames and tasks live in arenas addressed by [`FrameId`]/[`TaskId`] rather than linked by
//! pointer, per the arena+index design note — the same substitution used in
//! [`mcore_skiplist`](../mcore_skiplist).

mod frame;
mod region;
mod task;

pub use frame::{FrameId, FRAMES_CAPACITY};
pub use region::{RegionHandle, FILTERED_REGION};
pub use task::TaskId;

use frame::FrameArena;
use task::TaskData;

/// Owns every frame and task for one location. Constructed once per location at
/// `task_subsystem_init_location` time; `implicit_task` is created immediately, seeded with the
/// parent location's last-fork hash the way `task_subsystem_init_location` does, since there is
/// no "current task" yet to derive a parent hash from generically.
pub struct Stack {
    frames: FrameArena,
    tasks: Vec<TaskData>,
    free_tasks: Vec<TaskId>,
    current_task: TaskId,
    implicit_task: TaskId,
    num_substrates: usize,
}

impl Stack {
    pub fn new(num_substrates: usize, parent_fork_hash: u32) -> Self {
        let implicit = TaskData::fresh(0, 0, parent_fork_hash, num_substrates);
        Self {
            frames: FrameArena::default(),
            tasks: vec![implicit],
            free_tasks: Vec::new(),
            current_task: TaskId(0),
            implicit_task: TaskId(0),
            num_substrates,
        }
    }

    pub fn implicit_task(&self) -> TaskId {
        self.implicit_task
    }

    pub fn current_task(&self) -> TaskId {
        self.current_task
    }

    /// `scorep_task_switch`: record which task subsequent `enter`/`exit`/`top` calls on "the
    /// current task" should target. Callers that already hold a `TaskId` may bypass this and
    /// call the per-task methods directly; `switch_to` only matters to code that tracks "the
    /// current task" the way the source's thread-local `current_task` does.
    pub fn switch_to(&mut self, task: TaskId) {
        self.current_task = task;
    }

    /// `scorep_task_create`: reuse a recycled task or allocate a fresh one, deriving
    /// `parent_hash` from the current task's region-stack hash (0 if there is no current task
    /// yet for this location).
    pub fn task_create(&mut self, thread_id: u32, generation_number: u32) -> TaskId {
        let parent_hash = self.region_stack_hash(self.current_task);
        let fresh = TaskData::fresh(thread_id, generation_number, parent_hash, self.num_substrates);
        if let Some(id) = self.free_tasks.pop() {
            self.tasks[id.0] = fresh;
            id
        } else {
            self.tasks.push(fresh);
            TaskId(self.tasks.len() - 1)
        }
    }

    /// `scorep_task_complete`: the caller has already notified substrates of completion; this
    /// just returns the task to the per-location recycle list.
    pub fn task_complete(&mut self, task: TaskId) {
        self.free_tasks.push(task);
    }

    pub fn thread_id(&self, task: TaskId) -> u32 {
        self.tasks[task.0].thread_id
    }

    pub fn generation_number(&self, task: TaskId) -> u32 {
        self.tasks[task.0].generation_number
    }

    pub fn substrate_data(&self, task: TaskId, slot: usize) -> u64 {
        self.tasks[task.0].substrate_data[slot]
    }

    pub fn set_substrate_data(&mut self, task: TaskId, slot: usize, value: u64) {
        self.tasks[task.0].substrate_data[slot] = value;
    }

    /// `SCOREP_Task_Enter`: push `region` onto `task`'s stack, chaining a new frame once the
    /// current one is full.
    pub fn enter(&mut self, task: TaskId, region: RegionHandle) {
        let t = &self.tasks[task.0];
        if let Some(frame_id) = t.current_frame {
            if t.current_index < FRAMES_CAPACITY - 1 {
                let new_index = t.current_index + 1;
                self.tasks[task.0].current_index = new_index;
                self.frames.get_mut(frame_id).regions[new_index] = region;
                return;
            }
        }
        let prev = self.tasks[task.0].current_frame;
        let new_frame = self.frames.alloc(prev);
        self.frames.get_mut(new_frame).regions[0] = region;
        self.tasks[task.0].current_frame = Some(new_frame);
        self.tasks[task.0].current_index = 0;
    }

    /// `SCOREP_Task_Exit` / `task_pop_stack`: pop the top region. Fatal if the stack is already
    /// empty (stack underflow is a programming error, never a legitimate runtime state).
    pub fn exit(&mut self, task: TaskId) {
        let frame_id = self.tasks[task.0].current_frame;
        mcore_err::bug_on(frame_id.is_none(), "task stack underflow");
        let frame_id = frame_id.expect("checked above");
        if self.tasks[task.0].current_index == 0 {
            let prev = self.frames.get(frame_id).prev;
            self.tasks[task.0].current_frame = prev;
            self.tasks[task.0].current_index = FRAMES_CAPACITY - 1;
            self.frames.recycle(frame_id);
        } else {
            self.tasks[task.0].current_index -= 1;
        }
    }

    /// `SCOREP_Task_GetTopRegion`.
    pub fn top(&self, task: TaskId) -> Option<RegionHandle> {
        let t = &self.tasks[task.0];
        t.current_frame.map(|f| self.frames.get(f).regions[t.current_index])
    }

    /// `SCOREP_Task_ExitAllRegions`: pop until the stack is empty, calling `on_leave` for every
    /// popped region except [`FILTERED_REGION`], which pops silently (spec.md §7 kind 3).
    pub fn exit_all(&mut self, task: TaskId, mut on_leave: impl FnMut(RegionHandle)) {
        while self.tasks[task.0].current_frame.is_some() {
            let region = self.top(task).expect("current_frame is Some");
            self.exit(task);
            if region != FILTERED_REGION {
                on_leave(region);
            }
        }
    }

    /// `SCOREP_Task_ClearStack`: like `exit_all` but never emits leave events, for teardown.
    pub fn clear(&mut self, task: TaskId) {
        while let Some(frame_id) = self.tasks[task.0].current_frame {
            let prev = self.frames.get(frame_id).prev;
            self.tasks[task.0].current_frame = prev;
            self.frames.recycle(frame_id);
        }
        self.tasks[task.0].current_index = FRAMES_CAPACITY - 1;
    }

    /// `SCOREP_Task_GetRegionStackHash`: fold every region on the stack, bottom (oldest frame,
    /// starting from `parent_hash`) to top, through the Jenkins one-at-a-time hash. Ancestor
    /// frames are always full (`0..=FRAMES_CAPACITY-1`); only the newest frame is bounded by
    /// `current_index`, mirroring `stack_frame_aggregation`'s recursion exactly (it recurses to
    /// the oldest frame first, then folds forward).
    pub fn region_stack_hash(&self, task: TaskId) -> u32 {
        let t = &self.tasks[task.0];
        let Some(newest) = t.current_frame else {
            return 0;
        };
        let mut chain = vec![newest];
        let mut cursor = newest;
        while let Some(prev) = self.frames.get(cursor).prev {
            chain.push(prev);
            cursor = prev;
        }
        chain.reverse(); // oldest first
        let newest_position = chain.len() - 1;

        let mut seed = t.parent_hash;
        for (position, &frame_id) in chain.iter().enumerate() {
            let limit = if position == newest_position {
                t.current_index
            } else {
                FRAMES_CAPACITY - 1
            };
            let regions = &self.frames.get(frame_id).regions;
            for region in ®ions[..=limit] {
                seed = mcore_hashtable::jenkins::hash_bytes(®ion.to_le_bytes(), seed);
            }
        }
        seed
    }
}
