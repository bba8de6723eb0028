//! Extractor (C7): depth-first walk of the root filesystem's directory
//! tree, writing files and directories through a [`Sink`].
//!
//! The filesystem write-out itself stays external: this module only knows
//! about the [`Sink`] trait, not `std::fs`.

use std::collections::HashSet;
use std::io::{Read, Seek};
use std::path::Path;

use crate::dataset::{decode_dir_entry, DirEntryKind};
use crate::error::Error;
use crate::indirect::{IndirectBlockTree, TreeShape, TypedObjectTree};
use crate::physical::blkptr::DNodeType;
use crate::physical::dnode::DNode;
use crate::physical::znode::ZNode;
use crate::physical::Blkptr;
use crate::zap::MicroZap;

/// The filesystem write-out, external to the core. The binary crate
/// supplies a `std::fs`-backed implementation; tests use an in-memory one
/// so extraction is exercised without touching disk.
pub trait Sink {
    fn create_dir(&mut self, path: &Path) -> Result<(), Error>;
    fn write_file(&mut self, path: &Path, data: &[u8]) -> Result<(), Error>;
}

#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// When false, ignores `ZNode.size` and writes full leaf blocks
    /// instead — a fallback for ZPL-version skew in the bonus payload
    /// layout.
    pub use_znode_size: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            use_znode_size: true,
        }
    }
}

/// Recursively extracts the filesystem rooted at `root_dir_obj_id` into
/// `sink`. Per-entry failures are logged and skipped; the walk itself only
/// fails if the root directory dnode can't be read at all.
pub fn extract<R, S>(
    dsl_tree: &mut TypedObjectTree<'_, R, DNode>,
    root_dir_obj_id: u64,
    sink: &mut S,
    options: &ExtractOptions,
) -> Result<(), Error>
where
    R: Read + Seek,
    S: Sink,
{
    let mut visited = HashSet::new();
    extract_dir(
        dsl_tree,
        root_dir_obj_id,
        Path::new(""),
        sink,
        &mut visited,
        options,
    )?;
    report_dangling(dsl_tree, &visited);
    Ok(())
}

fn extract_dir<R, S>(
    dsl_tree: &mut TypedObjectTree<'_, R, DNode>,
    obj_id: u64,
    rel_path: &Path,
    sink: &mut S,
    visited: &mut HashSet<u64>,
    options: &ExtractOptions,
) -> Result<(), Error>
where
    R: Read + Seek,
    S: Sink,
{
    if !visited.insert(obj_id) {
        log::warn!("directory dnode {obj_id} was already visited, skipping to avoid a cycle");
        return Ok(());
    }

    let dnode = dsl_tree
        .object_by_id(obj_id)?
        .filter(DNode::valid)
        .ok_or_else(|| Error::Corrupt(format!("directory dnode {obj_id} is invalid")))?;
    if !matches!(dnode.typ, DNodeType::DirectoryContents) {
        return Err(Error::Corrupt(format!(
            "dnode {obj_id} is not a directory (type {:?})",
            dnode.typ
        )));
    }

    sink.create_dir(rel_path)?;

    let zap = read_zap(dsl_tree, &dnode)?;
    for entry in zap.entries() {
        let name = entry.name_str();
        let child_path = rel_path.join(name);
        match decode_dir_entry(entry.value) {
            Some((child_id, DirEntryKind::Directory)) => {
                if let Err(e) =
                    extract_dir(dsl_tree, child_id, &child_path, sink, visited, options)
                {
                    log::warn!("skipping subdirectory {name} (dnode {child_id}): {e}");
                }
            }
            Some((child_id, DirEntryKind::File)) => {
                visited.insert(child_id);
                if let Err(e) = extract_file(dsl_tree, child_id, &child_path, sink, options) {
                    log::warn!("skipping file {name} (dnode {child_id}): {e}");
                }
            }
            None => {
                log::warn!(
                    "zap entry {name:?} has an unrecognized top-bit flag ({:#018x}), skipping",
                    entry.value
                );
            }
        }
    }
    Ok(())
}

fn extract_file<R, S>(
    dsl_tree: &mut TypedObjectTree<'_, R, DNode>,
    obj_id: u64,
    rel_path: &Path,
    sink: &mut S,
    options: &ExtractOptions,
) -> Result<(), Error>
where
    R: Read + Seek,
    S: Sink,
{
    let dnode = dsl_tree
        .object_by_id(obj_id)?
        .filter(DNode::valid)
        .ok_or_else(|| Error::Corrupt(format!("file dnode {obj_id} is invalid")))?;
    if !matches!(dnode.typ, DNodeType::PlainFileContents) {
        return Err(Error::Corrupt(format!(
            "dnode {obj_id} is not a plain file (type {:?})",
            dnode.typ
        )));
    }

    let shape = TreeShape {
        nlevels: dnode.nlevels,
        indirect_blockshift: dnode.indirect_blockshift,
        leaf_block_size: dnode.data_block_size(),
        max_block_id: dnode.max_block_id,
    };
    let total_logical = shape.num_data_blocks() as usize * shape.leaf_block_size;

    let znode = ZNode::from_bytes_le(&mut dnode.bonus().iter().copied());
    let true_size = if options.use_znode_size {
        match znode {
            Some(z) => z.size as usize,
            None => {
                log::warn!(
                    "dnode {obj_id} has no parsable ZNode bonus, falling back to full leaf blocks"
                );
                total_logical
            }
        }
    } else {
        total_logical
    }
    .min(total_logical);

    let root_bp = dnode.block_pointers.first().cloned().flatten();
    let mut data = Vec::with_capacity(true_size);
    {
        let pool = dsl_tree.pool();
        let mut file_tree = IndirectBlockTree::new(pool, root_bp, shape);
        for block_id in 0..shape.num_data_blocks() {
            if data.len() >= true_size {
                break;
            }
            let block = file_tree.leaf_block(block_id)?;
            let remaining = true_size - data.len();
            let take = remaining.min(block.len());
            data.extend_from_slice(&block.as_bytes()[..take]);
        }
    }

    sink.write_file(rel_path, &data)
}

fn read_zap<R: Read + Seek>(
    dsl_tree: &mut TypedObjectTree<'_, R, DNode>,
    dnode: &DNode,
) -> Result<MicroZap, Error> {
    let bp = dnode
        .block_pointers
        .first()
        .cloned()
        .flatten()
        .filter(Blkptr::valid)
        .ok_or_else(|| Error::InvalidPointer("directory dnode has no valid zap block pointer".into()))?;
    let block = dsl_tree.pool().read_block_any_dva(&bp)?;
    MicroZap::parse(&block)
}

/// Logs any valid dnode in the DSL object set that the walk never reached —
/// a malformed or partially-deleted tree left behind an object nothing
/// references anymore.
fn report_dangling<R: Read + Seek>(
    dsl_tree: &mut TypedObjectTree<'_, R, DNode>,
    visited: &HashSet<u64>,
) {
    for (id, dnode) in dsl_tree.objects() {
        let Ok(Some(dnode)) = dnode else { continue };
        if id <= 1 || visited.contains(&id) {
            continue;
        }
        if dnode.valid() {
            log::warn!("dangling dnode {id} (type {:?}) was never referenced by the directory walk", dnode.typ);
        }
    }
}
