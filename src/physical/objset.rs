use std::io::{self, Write};

use crate::byte_iter::{ByteIter, FromBytesLE};
use crate::physical::dnode::DNode;
use crate::physical::dump::{self, DumpFlags};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjSetType {
    None = 0,
    Meta = 1,
    Zfs = 2,
    ZVol = 3,
    Unknown = -1,
}

impl ObjSetType {
    pub fn from_value(value: u64) -> ObjSetType {
        match value {
            0 => Self::None,
            1 => Self::Meta,
            2 => Self::Zfs,
            3 => Self::ZVol,
            _ => Self::Unknown,
        }
    }
}

/// 2048-byte container holding a meta-dnode whose leaf blocks are arrays of
/// dnodes. `userused_dnode`/`groupused_dnode` are decoded for completeness
/// but never consulted by traversal or extraction.
#[derive(Debug, Clone)]
pub struct ObjSet {
    pub metadnode: DNode,
    pub typ: ObjSetType,
    pub flags: u64,
    pub userused_dnode: DNode,
    pub groupused_dnode: DNode,
}

impl ObjSet {
    pub const ONDISK_SIZE: usize = 2048;
    const ZIL_HEADER_SIZE: usize = 8 * 8;
    const PAD_AFTER_FLAGS: usize = 432;

    pub fn valid(&self) -> bool {
        self.metadnode.valid()
    }

    pub fn dump(&self, w: &mut dyn Write, flags: DumpFlags, depth: usize) -> io::Result<()> {
        dump::indent(w, depth)?;
        if !self.valid() && !flags.allows_invalid() {
            return writeln!(w, "ObjSet: invalid");
        }
        writeln!(w, "ObjSet:")?;
        let body = depth + 1;
        dump::indent(w, body)?;
        writeln!(w, "type          = {:?}", self.typ)?;
        dump::indent(w, body)?;
        writeln!(w, "metadnode:")?;
        self.metadnode.dump(w, flags, body + 1)
    }
}

impl<It> FromBytesLE<It> for ObjSet
where
    It: Iterator<Item = u8> + Clone,
{
    fn from_bytes_le(data: &mut It) -> Option<Self> {
        let metadnode = DNode::from_bytes_le(data)?;
        data.skip_n_bytes(ObjSet::ZIL_HEADER_SIZE)?; // zil_header, not replayed
        let typ = ObjSetType::from_value(data.read_u64_le()?);
        let flags = data.read_u64_le()?;
        data.skip_n_bytes(ObjSet::PAD_AFTER_FLAGS)?;
        let userused_dnode = DNode::from_bytes_le(data)?;
        let groupused_dnode = DNode::from_bytes_le(data)?;
        Some(ObjSet { metadnode, typ, flags, userused_dnode, groupused_dnode })
    }
}

static_assertions::const_assert_eq!(
    DNode::ONDISK_SIZE * 3 + ObjSet::ZIL_HEADER_SIZE + 16 + ObjSet::PAD_AFTER_FLAGS,
    ObjSet::ONDISK_SIZE
);
