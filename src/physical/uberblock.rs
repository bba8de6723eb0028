use std::io::{self, Write};

use crate::byte_iter::{ByteIter, FromBytesLE};
use crate::physical::blkptr::Blkptr;
use crate::physical::dump::{self, DumpFlags};

pub const UBERBLOCK_MAGIC: u64 = 0x00BAB10C;

/// 1 KiB on-disk superblock candidate. Only the first ~208 bytes carry
/// meaning; the rest of the slot is reserved padding we never read.
#[derive(Debug, Clone)]
pub struct Uberblock {
    pub magic: u64,
    pub spa_version: u64,
    pub txg: u64,
    pub guid_sum: u64,
    pub timestamp: u64,
    pub rootbp: Blkptr,
}

impl Uberblock {
    /// Bytes of significant content at the front of each 1 KiB slot.
    pub const SIGNIFICANT_SIZE: usize = 8 * 5 + Blkptr::ONDISK_SIZE;
    pub const SLOT_SIZE: usize = 1024;

    pub fn valid(&self) -> bool {
        self.magic == UBERBLOCK_MAGIC
    }

    pub fn dump(&self, w: &mut dyn Write, flags: DumpFlags, depth: usize) -> io::Result<()> {
        dump::indent(w, depth)?;
        if !self.valid() && !flags.allows_invalid() {
            return writeln!(w, "Uberblock: invalid");
        }
        writeln!(w, "Uberblock {:#x}:", self.txg)?;
        let body = depth + 1;
        dump::indent(w, body)?;
        writeln!(w, "timestamp     = {:#x}", self.timestamp)?;
        dump::indent(w, body)?;
        writeln!(w, "spa_version   = {:#x}", self.spa_version)?;
        dump::indent(w, body)?;
        writeln!(w, "guid_sum      = {:#x}", self.guid_sum)?;
        dump::indent(w, body)?;
        writeln!(w, "rootbp:")?;
        self.rootbp.dump(w, flags, body + 1)
    }
}

impl<It> FromBytesLE<It> for Uberblock
where
    It: Iterator<Item = u8> + Clone,
{
    fn from_bytes_le(data: &mut It) -> Option<Self> {
        let magic = data.read_u64_le()?;
        let spa_version = data.read_u64_le()?;
        let txg = data.read_u64_le()?;
        let guid_sum = data.read_u64_le()?;
        let timestamp = data.read_u64_le()?;
        let rootbp = Blkptr::from_bytes_le(data)?;
        Some(Uberblock { magic, spa_version, txg, guid_sum, timestamp, rootbp })
    }
}

static_assertions::const_assert_eq!(Uberblock::SIGNIFICANT_SIZE, 168);
