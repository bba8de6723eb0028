//! ZAP lookup (C5): the micro-ZAP directory variant only. The fat-ZAP
//! leaf/header format is out of scope; any block whose type discriminant
//! doesn't match micro-ZAP fails with `Unsupported`.

use crate::block::OwnedBlock;
use crate::error::Error;
use crate::physical::mzap::{MZapEntry, MZapHeader, ZBT_MICRO_ZAP};

/// A parsed micro-ZAP block: a validated header plus every entry whose
/// first name byte is non-zero.
pub struct MicroZap {
    entries: Vec<MZapEntry>,
}

impl MicroZap {
    pub fn parse(block: &OwnedBlock) -> Result<MicroZap, Error> {
        let (header, raw_entries): (MZapHeader, Vec<Option<MZapEntry>>) =
            block
                .as_header_and_entries(MZapHeader::ONDISK_SIZE, MZapEntry::ONDISK_SIZE)
                .ok_or_else(|| Error::Corrupt("micro-zap block is truncated".into()))?;
        if !header.valid() {
            return Err(Error::Unsupported(format!(
                "non-micro zap block type {:#x} (expected {:#x})",
                header.block_type, ZBT_MICRO_ZAP
            )));
        }
        let entries = raw_entries
            .into_iter()
            .flatten()
            .filter(MZapEntry::valid)
            .collect();
        Ok(MicroZap { entries })
    }

    /// Linear scan by name.
    pub fn find(&self, name: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|entry| entry.name_str() == name)
            .map(|entry| entry.value)
    }

    pub fn entries(&self) -> impl Iterator<Item = &MZapEntry> {
        self.entries.iter()
    }
}
