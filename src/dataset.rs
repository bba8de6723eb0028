//! Dataset traversal (C6): uberblock -> MOS -> object directory -> root
//! dataset -> head DSL -> master node -> ROOT directory.

use std::io::{Read, Seek};

use crate::error::Error;
use crate::indirect::{IndirectBlockTree, TreeShape, TypedObjectTree};
use crate::physical::blkptr::DNodeType;
use crate::physical::dnode::DNode;
use crate::physical::dsl::{DslDataSet, DslDir};
use crate::physical::objset::ObjSet;
use crate::physical::uberblock::Uberblock;
use crate::pool::PoolReader;
use crate::zap::MicroZap;

const ROOT_DATASET_ZAP_KEY: &str = "root_dataset";
const ROOT_DIR_ZAP_KEY: &str = "ROOT";

/// The directory-bit and file-bit flags a directory ZAP entry value carries
/// in its top nibble.
const ENTRY_DIR_FLAG: u64 = 0x4000_0000_0000_0000;
const ENTRY_FILE_FLAG: u64 = 0x8000_0000_0000_0000;
const ENTRY_ID_MASK: u64 = 0x0FFF_FFFF_FFFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirEntryKind {
    Directory,
    File,
}

pub struct DirEntry {
    pub name: String,
    pub object_id: u64,
    pub kind: DirEntryKind,
}

/// Decodes a directory ZAP entry's value into its referenced object id and
/// directory/file kind. Returns `None` (and the caller should log and skip)
/// when neither top-bit flag is set — the taxonomy of top bits observed in
/// the wild is incomplete.
pub fn decode_dir_entry(value: u64) -> Option<(u64, DirEntryKind)> {
    let object_id = value & ENTRY_ID_MASK;
    if value & ENTRY_FILE_FLAG != 0 {
        Some((object_id, DirEntryKind::File))
    } else if value & ENTRY_DIR_FLAG != 0 {
        Some((object_id, DirEntryKind::Directory))
    } else {
        None
    }
}

fn object_tree_shape(dnode: &DNode) -> TreeShape {
    TreeShape {
        nlevels: dnode.nlevels,
        indirect_blockshift: dnode.indirect_blockshift,
        leaf_block_size: dnode.data_block_size(),
        max_block_id: dnode.max_block_id,
    }
}

fn open_object_tree<'p, R: Read + Seek>(
    pool: &'p mut PoolReader<R>,
    metadnode: &DNode,
) -> TypedObjectTree<'p, R, DNode> {
    let shape = object_tree_shape(metadnode);
    let root_bp = metadnode.block_pointers.first().cloned().flatten();
    let tree = IndirectBlockTree::new(pool, root_bp, shape);
    TypedObjectTree::new(tree, DNode::ONDISK_SIZE)
}

fn read_objset<R: Read + Seek>(
    pool: &mut PoolReader<R>,
    bp: &crate::physical::Blkptr,
) -> Result<ObjSet, Error> {
    if !matches!(bp.typ, DNodeType::ObjSet) {
        return Err(Error::Corrupt(format!(
            "expected an object set block pointer, got type {:?}",
            bp.typ
        )));
    }
    let block = pool.read_block_any_dva(bp)?;
    block
        .as_single::<ObjSet>()
        .ok_or_else(|| Error::Corrupt("object set block is truncated".into()))
}

fn read_first_bp_zap<R: Read + Seek>(
    pool: &mut PoolReader<R>,
    dnode: &DNode,
) -> Result<MicroZap, Error> {
    let bp = dnode
        .block_pointers
        .first()
        .cloned()
        .flatten()
        .filter(crate::physical::Blkptr::valid)
        .ok_or_else(|| Error::InvalidPointer("dnode has no valid zap block pointer".into()))?;
    let block = pool.read_block_any_dva(&bp)?;
    MicroZap::parse(&block)
}

/// The result of a full uberblock -> root filesystem traversal: the typed
/// dnode tree over the root filesystem's object set, plus the object id of
/// its root directory dnode.
pub struct RootFilesystem<'p, R> {
    pub dsl_tree: TypedObjectTree<'p, R, DNode>,
    pub root_dir_obj_id: u64,
}

/// Walks the full chain from an uberblock down to a root directory object
/// id, scanning past object-directory dnodes that turn out not to carry a
/// `root_dataset` entry rather than failing on the first candidate.
pub fn open_root_filesystem<R: Read + Seek>(
    pool: &mut PoolReader<R>,
    uberblock: &Uberblock,
) -> Result<RootFilesystem<'_, R>, Error> {
    let mos_objset = read_objset(pool, &uberblock.rootbp)?;

    let root_dataset_id = {
        let mut mos = open_object_tree(pool, &mos_objset.metadnode);
        let mut found = None;
        let num_objects = mos.num_objects();
        for id in 0..num_objects {
            let Ok(Some(dnode)) = mos.object_by_id(id) else { continue };
            if !dnode.valid() || !matches!(dnode.typ, DNodeType::ObjectDirectory) {
                continue;
            }
            match read_first_bp_zap(mos.pool(), &dnode) {
                Ok(zap) => {
                    if let Some(value) = zap.find(ROOT_DATASET_ZAP_KEY) {
                        found = Some(value);
                        break;
                    }
                    log::warn!("object directory dnode {id} has no root_dataset entry, scanning further MOS dnodes");
                }
                Err(e) => {
                    log::warn!("object directory dnode {id} zap lookup failed: {e}, scanning further MOS dnodes");
                }
            }
        }
        found.ok_or_else(|| Error::NotFound("no object directory with a root_dataset entry".into()))?
    };

    let mut mos = open_object_tree(pool, &mos_objset.metadnode);
    let root_dataset_dnode = mos
        .object_by_id(root_dataset_id)?
        .filter(DNode::valid)
        .ok_or_else(|| Error::Corrupt(format!("root dataset dnode {root_dataset_id} is invalid")))?;
    let dsl_dir = DslDir::from_bytes_le(&mut root_dataset_dnode.bonus().iter().copied())
        .ok_or_else(|| Error::Corrupt("root dataset dnode bonus is not a valid DSLDir".into()))?;

    let head_dataset_dnode = mos
        .object_by_id(dsl_dir.head_dataset_obj)?
        .filter(DNode::valid)
        .ok_or_else(|| {
            Error::Corrupt(format!(
                "head dataset dnode {} is invalid",
                dsl_dir.head_dataset_obj
            ))
        })?;
    let dsl_dataset = DslDataSet::from_bytes_le(&mut head_dataset_dnode.bonus().iter().copied())
        .ok_or_else(|| Error::Corrupt("head dataset dnode bonus is not a valid DSLDataSet".into()))?;

    let fs_objset = read_objset(pool, &dsl_dataset.bp)?;
    let mut dsl_tree = open_object_tree(pool, &fs_objset.metadnode);

    let master_node_dnode = dsl_tree
        .object_by_id(1)?
        .filter(DNode::valid)
        .ok_or_else(|| Error::Corrupt("master node (object id 1) is invalid".into()))?;
    let master_zap = read_first_bp_zap(dsl_tree.pool(), &master_node_dnode)?;
    let root_dir_obj_id = master_zap
        .find(ROOT_DIR_ZAP_KEY)
        .ok_or_else(|| Error::NotFound("master node has no ROOT entry".into()))?
        & ENTRY_ID_MASK;

    Ok(RootFilesystem {
        dsl_tree,
        root_dir_obj_id,
    })
}
