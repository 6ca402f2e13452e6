/// A registered source region's handle (spec.md §3's "small unsigned handle"). The region
/// registry itself — name, file, line range, paradigm, role — lives outside this crate; a task
/// stack only ever stores and hashes the handle.
pub type RegionHandle = u32;

/// The shared sentinel a filtered region collapses to (spec.md §7 kind 3: silent filtering).
/// Pushing and popping it behaves like any other region for stack-depth bookkeeping, but
/// [`crate::Stack::exit_all`] skips emitting a leave event for it and it contributes a fixed hash
/// contribution rather than a real region's.
pub const FILTERED_REGION: RegionHandle = RegionHandle::MAX;
