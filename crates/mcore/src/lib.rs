//! `mcore`: the measurement-core facade. Re-exports every component crate and wires them behind
//! one explicitly-constructed [`Runtime`] (spec.md §9's arena+`OnceLock` design note), carrying
//! configuration ingress, the substrate notification surface, and the definition-sink/
//! address-to-line collaborator traits spec.md §6 calls "external interfaces".
//!
//! Nothing in the other ten crates depends on this one; it only depends on them. A caller who
//! wants direct access to one component (say, `mcore_profile::Tree` for an offline analysis tool
//! with no live substrate) is free to depend on that crate alone instead of this facade.

mod config;
mod definitions;
mod runtime;
mod substrate;
mod value;

pub use config::{Config, TimerChoice};
pub use definitions::{AddrInfo, AddrToLineOracle, DefinitionSink, RegionKey};
pub use runtime::Runtime;
pub use substrate::Substrate;
pub use value::Value;

/// A process-local location id (thread, process rank, GPU stream, …). Not re-exported from any
/// component crate — `mcore_profile::LocationId` is the same underlying representation but this
/// alias is the one the facade's own signatures use, so it's defined once here.
pub type LocationId = u32;

pub use mcore_io::ParadigmId;

pub use mcore_alloc as alloc;
pub use mcore_err as err;
pub use mcore_filter as filter;
pub use mcore_hashtable as hashtable;
pub use mcore_io as io;
pub use mcore_log as log;
pub use mcore_profile as profile;
pub use mcore_skiplist as skiplist;
pub use mcore_task as task;
pub use mcore_timer as timer;
