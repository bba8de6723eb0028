//! Read-only forensic reader for a ZFS storage pool image held in a single
//! file: locate the most recent consistent uberblock, walk the Meta Object
//! Set down to the root dataset, traverse the Dataset and Snapshot Layer to
//! the root filesystem's object set, and resolve directory/file dnodes via
//! their indirect block trees.
//!
//! This crate only reads. Checksum verification, write support, RAID-Z,
//! encryption, dedup, and multi-device vdev trees are out of scope — see
//! `DESIGN.md` for what was kept, dropped, and why.

#![allow(clippy::too_many_arguments)]

pub mod block;
pub mod byte_iter;
pub mod dataset;
pub mod error;
pub mod extract;
pub mod indirect;
pub mod lz4;
pub mod physical;
pub mod pool;
pub mod zap;

pub use error::Error;
