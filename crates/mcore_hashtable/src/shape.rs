//! The instantiation parameters a table needs, gathered into one trait instead of the macro
//! parameter list (`bucket_idx`, `equals`, `value_ctor`, …) the original template takes.

/// The user-supplied policy for one hash-table instantiation: how to bucket a key, how to
/// compare keys, and how to construct a value the first time a key is seen.
pub trait TableShape {
    type Key: Clone;
    type Value: Clone;
    /// Extra data threaded through to [`TableShape::construct`] on a miss — the template's
    /// `ctorData`.
    type CtorArg;

    /// Map `key` into `[0, table_size)`. An out-of-range result is a programming error: the
    /// table aborts rather than indexing out of bounds.
    fn bucket_idx(key: &Self::Key, table_size: usize) -> usize;

    fn equals(a: &Self::Key, b: &Self::Key) -> bool;

    /// Build the value stored for a freshly-inserted `key`. `key` is the to-be-stored key
    /// itself (mirroring the template's `<prefix>_value_ctor(&key, ctorData)`), so a `construct`
    /// that derives state from the key doesn't need to re-derive it from `ctor_arg`.
    fn construct(key: &Self::Key, ctor_arg: Self::CtorArg) -> Self::Value;

    /// Called when a key/value pair leaves the table (non-monotonic tables only). Default is a
    /// no-op: most value types need no side effect on removal beyond ordinary `Drop`.
    fn destroy(_key: Self::Key, _value: Self::Value) {}
}
