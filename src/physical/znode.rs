use crate::byte_iter::ByteIter;

/// ZNode bonus payload (ZPL file/directory metadata). Only `size` is
/// consulted by extraction (to truncate the last leaf block of a file),
/// the rest is carried for `dump()`.
///
/// The exact field order is known to vary across ZPL versions in the wild;
/// callers that hit implausible sizes should fall back to the
/// `--no-znode-size` mode rather than trust this struct.
#[derive(Debug, Clone, Copy)]
pub struct ZNode {
    pub atime: (u64, u64),
    pub mtime: (u64, u64),
    pub ctime: (u64, u64),
    pub crtime: (u64, u64),
    pub gen_txg: u64,
    pub mode: u64,
    pub size: u64,
    pub parent_obj: u64,
    pub links: u64,
    pub xattr: u64,
    pub rdev: u64,
    pub flags: u64,
    pub uid: u64,
    pub gid: u64,
}

impl ZNode {
    /// Bytes of significant content; the remainder of the bonus buffer up
    /// to `bonus_len` is an inline ACL, never read by this reader.
    pub const SIGNIFICANT_SIZE: usize = 8 * (8 + 10);

    pub fn from_bytes_le(data: &mut impl Iterator<Item = u8>) -> Option<ZNode> {
        let mut time_pair = || -> Option<(u64, u64)> {
            Some((data.read_u64_le()?, data.read_u64_le()?))
        };
        let atime = time_pair()?;
        let mtime = time_pair()?;
        let ctime = time_pair()?;
        let crtime = time_pair()?;
        Some(ZNode {
            atime,
            mtime,
            ctime,
            crtime,
            gen_txg: data.read_u64_le()?,
            mode: data.read_u64_le()?,
            size: data.read_u64_le()?,
            parent_obj: data.read_u64_le()?,
            links: data.read_u64_le()?,
            xattr: data.read_u64_le()?,
            rdev: data.read_u64_le()?,
            flags: data.read_u64_le()?,
            uid: data.read_u64_le()?,
            gid: data.read_u64_le()?,
        })
    }
}
