//! Bit-exact definitions of the on-disk structures this reader understands,
//! each with a `valid()` predicate gating whether traversal may follow it.
//! Invalid structures may exist in a buffer (unallocated slots, torn
//! writes) but are never dereferenced.

pub mod blkptr;
pub mod dnode;
pub mod dsl;
pub mod dump;
pub mod dva;
pub mod mzap;
pub mod objset;
pub mod uberblock;
pub mod znode;

pub use blkptr::{Blkptr, CompressionMethod, DNodeType};
pub use dnode::DNode;
pub use dsl::{DslDataSet, DslDir};
pub use dump::DumpFlags;
pub use dva::Dva;
pub use mzap::{MZapEntry, MZapHeader};
pub use objset::{ObjSet, ObjSetType};
pub use uberblock::Uberblock;
pub use znode::ZNode;
