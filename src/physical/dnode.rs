use std::io::{self, Write};

use crate::byte_iter::{ByteIter, FromBytesLE};
use crate::physical::blkptr::{Blkptr, DNodeType};
use crate::physical::dump::{self, DumpFlags};

/// 512-byte object descriptor. The tail (448 bytes past the fixed header) is
/// aliased on disk as either three block pointers, one block pointer plus a
/// bonus buffer, or two block pointers plus a spill block pointer; we store
/// it uniformly as `block_pointers` (exactly `nblkptr` entries) followed by
/// whatever raw bytes remain, and expose named accessors over that
/// remainder rather than blind transmutes.
#[derive(Debug, Clone)]
pub struct DNode {
    pub typ: DNodeType,
    pub indirect_blockshift: u8,
    pub nlevels: u8,
    pub nblkptr: u8,
    pub bonus_type: DNodeType,
    pub checksum_method: u8,
    pub compression_method: u8,
    pub flags: u8,
    pub data_block_size_sectors: u16,
    pub bonus_len: u16,
    pub max_block_id: u64,
    pub secphys_used: u64,
    pub block_pointers: Vec<Option<Blkptr>>,
    /// Raw bytes after `block_pointers`, up to the 512-byte slot boundary.
    /// Only the first `bonus_len` bytes are meaningful bonus payload; the
    /// rest is unused tail space (or, when `nblkptr == 2`, may hold a spill
    /// block pointer in its first 128 bytes).
    pub tail: Vec<u8>,
}

impl DNode {
    pub const ONDISK_SIZE: usize = 512;
    const HEADER_SIZE: usize = 64;
    const TAIL_SIZE: usize = Self::ONDISK_SIZE - Self::HEADER_SIZE;

    pub fn data_block_size(&self) -> usize {
        (self.data_block_size_sectors as usize) << 9
    }

    pub fn indirect_block_size(&self) -> usize {
        1usize << self.indirect_blockshift
    }

    pub fn valid(&self) -> bool {
        self.typ.valid() && (1..=3).contains(&self.nblkptr)
    }

    pub fn bonus(&self) -> &[u8] {
        let len = (self.bonus_len as usize).min(self.tail.len());
        &self.tail[..len]
    }

    /// The spill block pointer, present only when exactly two block
    /// pointers are in use and the remainder of the tail holds one more.
    pub fn spill_blkptr(&self) -> Option<Blkptr> {
        if self.nblkptr != 2 {
            return None;
        }
        if self.tail.len() < Blkptr::ONDISK_SIZE {
            return None;
        }
        Blkptr::from_bytes_le(&mut self.tail[..Blkptr::ONDISK_SIZE].iter().copied())
    }

    pub fn dump(&self, w: &mut dyn Write, flags: DumpFlags, depth: usize) -> io::Result<()> {
        dump::indent(w, depth)?;
        if !self.valid() && !flags.allows_invalid() {
            return writeln!(w, "DNode: invalid");
        }
        writeln!(w, "DNode:")?;
        let body = depth + 1;
        dump::indent(w, body)?;
        writeln!(w, "type                = {:?}", self.typ)?;
        dump::indent(w, body)?;
        writeln!(w, "bonustype           = {:?}", self.bonus_type)?;
        dump::indent(w, body)?;
        writeln!(w, "nblkptr             = {}", self.nblkptr)?;
        dump::indent(w, body)?;
        writeln!(w, "nlevels             = {}", self.nlevels)?;
        dump::indent(w, body)?;
        writeln!(w, "indblkshift         = {}", self.indirect_blockshift)?;
        dump::indent(w, body)?;
        writeln!(w, "data_blk_size_secs  = {}", self.data_block_size_sectors)?;
        dump::indent(w, body)?;
        writeln!(w, "bonuslen            = {}", self.bonus_len)?;
        dump::indent(w, body)?;
        writeln!(w, "max_block_id        = {:#x}", self.max_block_id)?;
        dump::indent(w, body)?;
        writeln!(w, "secphys_used        = {:#x}", self.secphys_used)?;
        for (i, bp) in self.block_pointers.iter().enumerate() {
            dump::indent(w, body)?;
            writeln!(w, "bps[{i}]:")?;
            match bp {
                Some(bp) => bp.dump(w, flags, body + 1)?,
                None => {
                    dump::indent(w, body + 1)?;
                    writeln!(w, "(unallocated)")?;
                }
            }
        }
        Ok(())
    }
}

impl<It> FromBytesLE<It> for DNode
where
    It: Iterator<Item = u8> + Clone,
{
    fn from_bytes_le(data: &mut It) -> Option<Self> {
        let typ = DNodeType::from_value(data.next()?)?;
        let indirect_blockshift = data.next()?;
        let nlevels = data.next()?;
        let nblkptr = data.next()?;
        let bonus_type = DNodeType::from_value(data.next()?)?;
        let checksum_method = data.next()?;
        let compression_method = data.next()?;
        let flags = data.next()?;
        let data_block_size_sectors = data.read_u16_le()?;
        let bonus_len = data.read_u16_le()?;
        data.skip_n_bytes(4)?; // padding
        let max_block_id = data.read_u64_le()?;
        let secphys_used = data.read_u64_le()?;
        data.skip_n_bytes(4 * core::mem::size_of::<u64>())?; // padding

        let nbp = nblkptr.clamp(0, 3) as usize;
        let mut block_pointers = Vec::with_capacity(nbp);
        for _ in 0..nbp {
            // Unallocated block pointer slots are all-zero and fail
            // validation; we still advance by a fixed stride either way.
            let bp = Blkptr::from_bytes_le(&mut data.clone());
            data.skip_n_bytes(Blkptr::ONDISK_SIZE)?;
            block_pointers.push(bp);
        }

        let tail_size = Self::TAIL_SIZE - nbp * Blkptr::ONDISK_SIZE;
        let mut tail = Vec::with_capacity(tail_size);
        for _ in 0..tail_size {
            tail.push(data.next()?);
        }

        Some(DNode {
            typ,
            indirect_blockshift,
            nlevels,
            nblkptr,
            bonus_type,
            checksum_method,
            compression_method,
            flags,
            data_block_size_sectors,
            bonus_len,
            max_block_id,
            secphys_used,
            block_pointers,
            tail,
        })
    }
}

static_assertions::const_assert_eq!(DNode::ONDISK_SIZE, 512);
static_assertions::const_assert_eq!(DNode::TAIL_SIZE, 448);
