//! Indirect block tree (C4): the lazy multi-level blkptr walker.
//!
//! Walks from the top level down to the leaf by repeatedly computing a
//! `(level, coordinate)` pair, where `coordinate = block_id >> (level *
//! shift)` — the coordinate at a given level uniquely names the indirect
//! (or leaf) block covering that block id, which doubles as the cache key:
//! repeated reads of the same block id return the same underlying buffer.

use std::collections::HashMap;
use std::io::{Read, Seek};
use std::rc::Rc;

use crate::block::OwnedBlock;
use crate::error::Error;
use crate::physical::Blkptr;
use crate::pool::PoolReader;

const BLKPTR_SIZE: usize = Blkptr::ONDISK_SIZE;

/// Parameters describing one dnode's indirect-block tree, independent of
/// what the leaf blocks mean (opaque data vs. a packed object array).
#[derive(Debug, Clone, Copy)]
pub struct TreeShape {
    pub nlevels: u8,
    pub indirect_blockshift: u8,
    pub leaf_block_size: usize,
    pub max_block_id: u64,
}

impl TreeShape {
    /// `shift` such that each indirect level has `1 << shift` children.
    fn shift(&self) -> u32 {
        (self.indirect_blockshift as u32).saturating_sub(7)
    }

    fn mask(&self) -> u64 {
        (1u64 << self.shift()) - 1
    }

    pub fn num_data_blocks(&self) -> u64 {
        self.max_block_id + 1
    }
}

/// Lazily walks one dnode's indirect-block tree, caching every block it has
/// read by `(level, coordinate)` so repeated visits are free and so the
/// whole tree's lifetime owns exactly one copy of each block.
pub struct IndirectBlockTree<'p, R> {
    pool: &'p mut PoolReader<R>,
    root_bp: Option<Blkptr>,
    shape: TreeShape,
    cache: HashMap<(u8, u64), Rc<OwnedBlock>>,
}

impl<'p, R: Read + Seek> IndirectBlockTree<'p, R> {
    pub fn new(pool: &'p mut PoolReader<R>, root_bp: Option<Blkptr>, shape: TreeShape) -> Self {
        IndirectBlockTree {
            pool,
            root_bp,
            shape,
            cache: HashMap::new(),
        }
    }

    pub fn shape(&self) -> TreeShape {
        self.shape
    }

    /// Access to the pool reader this tree borrows, for callers that need
    /// to read a block pointer found inside a leaf (e.g. a ZAP block
    /// pointer sitting in a dnode's own `block_pointers`, not part of this
    /// tree's own indirect structure).
    pub fn pool(&mut self) -> &mut PoolReader<R> {
        self.pool
    }

    fn resolve_bp(&mut self, level: u8, coord: u64) -> Result<Blkptr, Error> {
        if level + 1 == self.shape.nlevels {
            return self
                .root_bp
                .clone()
                .filter(Blkptr::valid)
                .ok_or_else(|| Error::InvalidPointer("dnode has no valid root block pointer".into()));
        }
        let parent_coord = coord >> self.shape.shift();
        let parent = self.read_block(level + 1, parent_coord)?;
        let index = (coord & self.shape.mask()) as usize;
        let bps: Vec<Option<Blkptr>> = parent.as_array(BLKPTR_SIZE);
        bps.get(index)
            .cloned()
            .flatten()
            .filter(Blkptr::valid)
            .ok_or_else(|| {
                Error::InvalidPointer(format!(
                    "indirect block at level {} has no valid pointer at index {index}",
                    level + 1
                ))
            })
    }

    /// Reads the block at `(level, coord)`, using and populating the cache.
    fn read_block(&mut self, level: u8, coord: u64) -> Result<Rc<OwnedBlock>, Error> {
        if let Some(cached) = self.cache.get(&(level, coord)) {
            return Ok(Rc::clone(cached));
        }
        let bp = self.resolve_bp(level, coord)?;
        let block = Rc::new(self.pool.read_block_any_dva(&bp)?);
        self.cache.insert((level, coord), Rc::clone(&block));
        Ok(block)
    }

    /// Resolves the leaf (level-0) block holding logical block id `block_id`.
    pub fn leaf_block(&mut self, block_id: u64) -> Result<Rc<OwnedBlock>, Error> {
        if block_id > self.shape.max_block_id {
            return Err(Error::InvalidPointer(format!(
                "block id {block_id} is past max_block_id {}",
                self.shape.max_block_id
            )));
        }
        self.read_block(0, block_id)
    }

    /// Iterates leaf blocks `0..num_data_blocks` in strictly ascending id
    /// order.
    pub fn blocks(&mut self) -> impl Iterator<Item = (u64, Result<Rc<OwnedBlock>, Error>)> + '_ {
        let n = self.shape.num_data_blocks();
        (0..n).map(move |id| (id, self.leaf_block(id)))
    }
}

/// A view over an [`IndirectBlockTree`] whose leaf blocks are packed arrays
/// of `T`, addressable by object id rather than block id.
pub struct TypedObjectTree<'p, R, T> {
    tree: IndirectBlockTree<'p, R>,
    elem_size: usize,
    _marker: std::marker::PhantomData<T>,
}

impl<'p, R: Read + Seek, T> TypedObjectTree<'p, R, T>
where
    T: crate::byte_iter::FromBytesLE<std::vec::IntoIter<u8>> + Clone,
{
    pub fn new(tree: IndirectBlockTree<'p, R>, elem_size: usize) -> Self {
        TypedObjectTree {
            tree,
            elem_size,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn pool(&mut self) -> &mut PoolReader<R> {
        self.tree.pool()
    }

    fn entries_per_leaf(&self) -> usize {
        self.tree.shape.leaf_block_size / self.elem_size
    }

    pub fn num_objects(&self) -> u64 {
        self.tree.shape.num_data_blocks() * self.entries_per_leaf() as u64
    }

    /// Locates and decodes the object with the given id:
    /// `obj_id / (leaf_block_size / sizeof(T))` selects the leaf, the
    /// remainder selects the entry within it.
    pub fn object_by_id(&mut self, obj_id: u64) -> Result<Option<T>, Error> {
        let per_leaf = self.entries_per_leaf() as u64;
        let block_id = obj_id / per_leaf;
        let index = (obj_id % per_leaf) as usize;
        let block = self.tree.leaf_block(block_id)?;
        let entries: Vec<Option<T>> = block.as_array(self.elem_size);
        Ok(entries.get(index).cloned().flatten())
    }

    /// Iterates `0..num_objects` in strictly ascending id order.
    pub fn objects(&mut self) -> impl Iterator<Item = (u64, Result<Option<T>, Error>)> + '_ {
        let n = self.num_objects();
        (0..n).map(move |id| (id, self.object_by_id(id)))
    }
}
