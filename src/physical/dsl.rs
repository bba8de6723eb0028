use crate::byte_iter::{ByteIter, FromBytesLE};
use crate::physical::blkptr::Blkptr;

/// DSLDir bonus payload, 256 bytes. Field order follows the original
/// on-disk layout, including the five used-breakdown counters and trailing
/// reserved padding.
#[derive(Debug, Clone)]
pub struct DslDir {
    pub creation_time: u64,
    pub head_dataset_obj: u64,
    pub parent_obj: u64,
    pub origin_obj: u64,
    pub child_dir_zapobj: u64,
    pub used_bytes: u64,
    pub compressed_bytes: u64,
    pub uncompressed_bytes: u64,
    pub quota: u64,
    pub reserved: u64,
    pub props_zapobj: u64,
    pub deleg_zapobj: u64,
    pub flags: u64,
    pub used_breakdown: [u64; 5],
    pub clones: u64,
}

impl DslDir {
    pub const ONDISK_SIZE: usize = 256;
}

impl<It> FromBytesLE<It> for DslDir
where
    It: Iterator<Item = u8>,
{
    fn from_bytes_le(data: &mut It) -> Option<Self> {
        let dir = DslDir {
            creation_time: data.read_u64_le()?,
            head_dataset_obj: data.read_u64_le()?,
            parent_obj: data.read_u64_le()?,
            origin_obj: data.read_u64_le()?,
            child_dir_zapobj: data.read_u64_le()?,
            used_bytes: data.read_u64_le()?,
            compressed_bytes: data.read_u64_le()?,
            uncompressed_bytes: data.read_u64_le()?,
            quota: data.read_u64_le()?,
            reserved: data.read_u64_le()?,
            props_zapobj: data.read_u64_le()?,
            deleg_zapobj: data.read_u64_le()?,
            flags: data.read_u64_le()?,
            used_breakdown: [
                data.read_u64_le()?,
                data.read_u64_le()?,
                data.read_u64_le()?,
                data.read_u64_le()?,
                data.read_u64_le()?,
            ],
            clones: data.read_u64_le()?,
        };
        data.skip_n_bytes(13 * 8)?; // reserved
        Some(dir)
    }
}

/// DSLDataSet bonus payload. Carries an embedded block pointer to the
/// dataset's own object set.
#[derive(Debug, Clone)]
pub struct DslDataSet {
    pub dir_obj: u64,
    pub prev_snap_obj: u64,
    pub prev_snap_txg: u64,
    pub next_snap_obj: u64,
    pub snapnames_zapobj: u64,
    pub nchildren: u64,
    pub creation_time: u64,
    pub creation_txg: u64,
    pub deadlist_obj: u64,
    pub referenced_bytes: u64,
    pub compressed_bytes: u64,
    pub uncompressed_bytes: u64,
    pub unique_bytes: u64,
    pub fsid_guid: u64,
    pub guid: u64,
    pub flags: u64,
    pub bp: Blkptr,
    pub next_clones_obj: u64,
    pub props_obj: u64,
    pub userrefs_obj: u64,
}

impl<It> FromBytesLE<It> for DslDataSet
where
    It: Iterator<Item = u8> + Clone,
{
    fn from_bytes_le(data: &mut It) -> Option<Self> {
        let ds = DslDataSet {
            dir_obj: data.read_u64_le()?,
            prev_snap_obj: data.read_u64_le()?,
            prev_snap_txg: data.read_u64_le()?,
            next_snap_obj: data.read_u64_le()?,
            snapnames_zapobj: data.read_u64_le()?,
            nchildren: data.read_u64_le()?,
            creation_time: data.read_u64_le()?,
            creation_txg: data.read_u64_le()?,
            deadlist_obj: data.read_u64_le()?,
            referenced_bytes: data.read_u64_le()?,
            compressed_bytes: data.read_u64_le()?,
            uncompressed_bytes: data.read_u64_le()?,
            unique_bytes: data.read_u64_le()?,
            fsid_guid: data.read_u64_le()?,
            guid: data.read_u64_le()?,
            flags: data.read_u64_le()?,
            bp: Blkptr::from_bytes_le(data)?,
            next_clones_obj: data.read_u64_le()?,
            props_obj: data.read_u64_le()?,
            userrefs_obj: data.read_u64_le()?,
        };
        data.skip_n_bytes(5 * 8)?; // reserved
        Some(ds)
    }
}

static_assertions::const_assert_eq!(DslDir::ONDISK_SIZE, 256);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsl_dir_round_trip() {
        let mut bytes = vec![0u8; DslDir::ONDISK_SIZE];
        bytes[8..16].copy_from_slice(&42u64.to_le_bytes()); // head_dataset_obj
        let dir = DslDir::from_bytes_le(&mut bytes.into_iter()).unwrap();
        assert_eq!(dir.head_dataset_obj, 42);
    }
}
