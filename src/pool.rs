//! Pool reader (C1): file-backed random access to a single-file vdev image,
//! label/uberblock location, and single-block read + decompress.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::block::OwnedBlock;
use crate::byte_iter::ByteIter;
use crate::error::Error;
use crate::lz4;
use crate::physical::{Blkptr, CompressionMethod, Dva, Uberblock};

/// Bytes between the start of the file and the first usable offset; DVA
/// addresses and label 0/1 offsets are both relative to this boundary.
pub const BOOT_BLOCK_SIZE: u64 = 4 * 1024 * 1024;
const LABEL_SIZE: u64 = 256 * 1024;
const UBERBLOCK_RING_OFFSET: u64 = 128 * 1024;
const UBERBLOCK_SLOT_SIZE: u64 = 1024;
pub const NUM_LABELS: usize = 4;
pub const NUM_UBERBLOCK_SLOTS: usize = 128;

/// Random access over a ZFS pool image. Owns the one byte source; every
/// other component reads through it.
pub struct PoolReader<R> {
    source: R,
    file_size: u64,
}

impl PoolReader<File> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let file =
            File::open(path).map_err(|e| Error::io(format!("opening {}", path.display()), e))?;
        Self::from_source(file)
    }
}

impl<R: Read + Seek> PoolReader<R> {
    pub fn from_source(mut source: R) -> Result<Self, Error> {
        let file_size = source
            .seek(SeekFrom::End(0))
            .map_err(|e| Error::io("seeking to end of pool image", e))?;
        Ok(PoolReader { source, file_size })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    fn label_offset(&self, label_index: usize) -> Option<u64> {
        match label_index {
            0 => Some(0),
            1 => Some(LABEL_SIZE),
            2 => self.file_size.checked_sub(2 * LABEL_SIZE),
            3 => self.file_size.checked_sub(LABEL_SIZE),
            _ => None,
        }
    }

    fn read_exact_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, Error> {
        self.source
            .seek(SeekFrom::Start(offset))
            .map_err(|e| Error::io(format!("seeking to offset {offset:#x}"), e))?;
        let mut buf = vec![0u8; len];
        self.source
            .read_exact(&mut buf)
            .map_err(|e| Error::io(format!("reading {len} bytes at offset {offset:#x}"), e))?;
        Ok(buf)
    }

    /// Reads and validates one uberblock slot. A magic mismatch is not an
    /// I/O failure; it means the slot is unused or this isn't an uberblock
    /// ring at all, so it fails softly with `NotFound`.
    pub fn read_uberblock(
        &mut self,
        label_index: usize,
        ub_index: usize,
    ) -> Result<Uberblock, Error> {
        if ub_index >= NUM_UBERBLOCK_SLOTS {
            return Err(Error::NotFound(format!(
                "uberblock slot {ub_index} out of range"
            )));
        }
        let label_offset = self
            .label_offset(label_index)
            .ok_or_else(|| Error::NotFound(format!("label {label_index} out of range")))?;
        let slot_offset =
            label_offset + UBERBLOCK_RING_OFFSET + (ub_index as u64) * UBERBLOCK_SLOT_SIZE;
        let bytes = self.read_exact_at(slot_offset, Uberblock::SIGNIFICANT_SIZE)?;
        let ub = Uberblock::from_bytes_le(&mut bytes.into_iter())
            .ok_or_else(|| Error::NotFound("uberblock slot truncated".into()))?;
        if !ub.valid() {
            return Err(Error::NotFound(format!(
                "uberblock magic mismatch at label {label_index} slot {ub_index}"
            )));
        }
        Ok(ub)
    }

    /// Reads and decompresses the block named by `bp.dva(dva_index)`.
    pub fn read_block(&mut self, bp: &Blkptr, dva_index: usize) -> Result<OwnedBlock, Error> {
        if !bp.valid() {
            return Err(Error::InvalidPointer(
                "block pointer has invalid type".into(),
            ));
        }
        if !bp.little_endian {
            return Err(Error::Unsupported(
                "big-endian block pointers are not supported".into(),
            ));
        }
        let dva = bp
            .dva(dva_index)
            .filter(Dva::valid)
            .ok_or_else(|| Error::InvalidPointer(format!("dva[{dva_index}] is invalid")))?;
        if dva.gang {
            return Err(Error::Unsupported("gang blocks are not supported".into()));
        }

        let lsize = bp.logical_size();
        let psize = bp.physical_size();

        let bytes = match bp.compression {
            CompressionMethod::Off => {
                if lsize != psize || psize as u64 != dva.allocated_size() {
                    return Err(Error::Corrupt(format!(
                        "uncompressed block size mismatch: lsize={lsize} psize={psize} asize={}",
                        dva.allocated_size()
                    )));
                }
                self.read_exact_at(dva.address(), lsize)?
            }
            CompressionMethod::Lz4 | CompressionMethod::On | CompressionMethod::Inherit => {
                let staging = self.read_exact_at(dva.address(), psize)?;
                let mut it = staging.into_iter();
                let n = it
                    .read_u32_be()
                    .ok_or_else(|| Error::CorruptCompressed("missing LZ4 length prefix".into()))?
                    as usize;
                if n + 4 >= lsize {
                    return Err(Error::CorruptCompressed(format!(
                        "LZ4 payload length {n} is inconsistent with logical size {lsize}"
                    )));
                }
                let mut payload = it.take(n);
                lz4::decompress_blocks(&mut payload)
            }
            other => {
                return Err(Error::Unsupported(format!(
                    "unsupported compression method {other:?}"
                )))
            }
        };

        Ok(OwnedBlock::new(bytes))
    }

    /// All uberblock slots in one label that carry a matching magic,
    /// labeled with their slot index. Used by `--list-uberblocks`.
    pub fn list_uberblocks(&mut self, label_index: usize) -> Vec<(usize, Uberblock)> {
        (0..NUM_UBERBLOCK_SLOTS)
            .filter_map(|idx| self.read_uberblock(label_index, idx).ok().map(|ub| (idx, ub)))
            .collect()
    }

    /// The most recent consistent uberblock across all four labels: the
    /// valid slot with the greatest `txg`, ties broken by the highest slot
    /// index (scanning labels 0..4 then slots 0..128 in order and only
    /// replacing the current best on `>=` makes the last-seen winner of a
    /// tie the one with the higher index).
    pub fn find_active_uberblock(&mut self) -> Result<(usize, usize, Uberblock), Error> {
        let mut best: Option<(usize, usize, Uberblock)> = None;
        for label in 0..NUM_LABELS {
            for idx in 0..NUM_UBERBLOCK_SLOTS {
                let Ok(ub) = self.read_uberblock(label, idx) else {
                    continue;
                };
                let replace = match &best {
                    None => true,
                    Some((_, _, current)) => ub.txg >= current.txg,
                };
                if replace {
                    best = Some((label, idx, ub));
                }
            }
        }
        best.ok_or_else(|| Error::NotFound("no valid uberblock found in any label".into()))
    }

    /// Tries each DVA of `bp` in turn, returning the first that resolves.
    /// Gang/invalid DVAs that simply don't exist for this block pointer are
    /// not worth logging; real read failures are.
    pub fn read_block_any_dva(&mut self, bp: &Blkptr) -> Result<OwnedBlock, Error> {
        let mut last_err = None;
        for dva_index in 0..3 {
            if bp.dva(dva_index).is_none() {
                continue;
            }
            match self.read_block(bp, dva_index) {
                Ok(block) => return Ok(block),
                Err(e) => {
                    log::warn!("dva[{dva_index}] of block pointer failed: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::InvalidPointer("block pointer has no DVAs".into())))
    }
}
