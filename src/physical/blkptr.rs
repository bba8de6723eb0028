use std::io::{self, Write};

use crate::byte_iter::{ByteIter, FromBytesLE};
use crate::physical::dump::{self, DumpFlags};
use crate::physical::dva::Dva;

/// Object type tag carried in a dnode and mirrored in a block pointer's
/// property word. Named and valued to match the on-disk encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DNodeType {
    Invalid = 0,
    ObjectDirectory = 1,
    ObjectArray = 2,
    PackedNvList = 3,
    PackedNvListSize = 4,
    BlockPointerList = 5,
    BlockPointerListHeader = 6,
    SpaceMapHeader = 7,
    SpaceMap = 8,
    IntentLog = 9,
    DNode = 10,
    ObjSet = 11,
    DslDataset = 12,
    DslDatasetChildMap = 13,
    ObjSetSnapshotMap = 14,
    DslProperties = 15,
    DslDirectory = 16,
    ZNode = 17,
    AccessControlList = 18,
    PlainFileContents = 19,
    DirectoryContents = 20,
    MasterNode = 21,
    DeleteQueue = 22,
    ZVol = 23,
    ZVolProperties = 24,
}

impl DNodeType {
    pub fn from_value(value: u8) -> Option<DNodeType> {
        Some(match value {
            0 => Self::Invalid,
            1 => Self::ObjectDirectory,
            2 => Self::ObjectArray,
            3 => Self::PackedNvList,
            4 => Self::PackedNvListSize,
            5 => Self::BlockPointerList,
            6 => Self::BlockPointerListHeader,
            7 => Self::SpaceMapHeader,
            8 => Self::SpaceMap,
            9 => Self::IntentLog,
            10 => Self::DNode,
            11 => Self::ObjSet,
            12 => Self::DslDataset,
            13 => Self::DslDatasetChildMap,
            14 => Self::ObjSetSnapshotMap,
            15 => Self::DslProperties,
            16 => Self::DslDirectory,
            17 => Self::ZNode,
            18 => Self::AccessControlList,
            19 => Self::PlainFileContents,
            20 => Self::DirectoryContents,
            21 => Self::MasterNode,
            22 => Self::DeleteQueue,
            23 => Self::ZVol,
            24 => Self::ZVolProperties,
            _ => return None,
        })
    }

    pub fn valid(&self) -> bool {
        !matches!(self, DNodeType::Invalid)
    }
}

/// Compression method. Only `Off`/`Lz4`/`On`/`Inherit` are handled by the
/// pool reader; every other value is rejected as `Unsupported`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Inherit = 0,
    On = 1,
    Off = 2,
    Lzjb = 3,
    Empty = 4,
    Gzip1 = 5,
    Gzip2 = 6,
    Gzip3 = 7,
    Gzip4 = 8,
    Gzip5 = 9,
    Gzip6 = 10,
    Gzip7 = 11,
    Gzip8 = 12,
    Gzip9 = 13,
    Zle = 14,
    Lz4 = 15,
    Zstd = 16,
}

impl CompressionMethod {
    pub fn from_value(value: u8) -> Option<CompressionMethod> {
        Some(match value {
            0 => Self::Inherit,
            1 => Self::On,
            2 => Self::Off,
            3 => Self::Lzjb,
            4 => Self::Empty,
            5 => Self::Gzip1,
            6 => Self::Gzip2,
            7 => Self::Gzip3,
            8 => Self::Gzip4,
            9 => Self::Gzip5,
            10 => Self::Gzip6,
            11 => Self::Gzip7,
            12 => Self::Gzip8,
            13 => Self::Gzip9,
            14 => Self::Zle,
            15 => Self::Lz4,
            16 => Self::Zstd,
            _ => return None,
        })
    }
}

/// 128-byte on-disk block pointer: three mirror DVAs, a property word, birth
/// txg, fill count, and a 32-byte checksum (never verified by this reader).
#[derive(Debug, Clone)]
pub struct Blkptr {
    pub dvas: [Option<Dva>; 3],
    pub logical_size_sectors: u16,
    pub physical_size_sectors: u16,
    pub compression: CompressionMethod,
    pub embedded: bool,
    pub checksum_method: u8,
    pub typ: DNodeType,
    pub level: u8,
    pub encrypted: bool,
    pub dedup: bool,
    pub little_endian: bool,
    pub birth_txg: u64,
    pub fill: u64,
    pub checksum: [u64; 4],
}

impl Blkptr {
    pub const ONDISK_SIZE: usize = 128;

    pub fn logical_size(&self) -> usize {
        (self.logical_size_sectors as usize + 1) << 9
    }

    pub fn physical_size(&self) -> usize {
        (self.physical_size_sectors as usize + 1) << 9
    }

    pub fn valid(&self) -> bool {
        self.typ.valid()
    }

    pub fn dva(&self, index: usize) -> Option<Dva> {
        self.dvas.get(index).copied().flatten()
    }

    pub fn dump(&self, w: &mut dyn Write, flags: DumpFlags, depth: usize) -> io::Result<()> {
        dump::indent(w, depth)?;
        if !self.valid() && !flags.allows_invalid() {
            return writeln!(w, "BLKPTR: invalid");
        }
        writeln!(
            w,
            "BLKPTR <L:{:#x}, P:{:#x}>:",
            self.logical_size(),
            self.physical_size()
        )?;
        let body = depth + 1;
        dump::indent(w, body)?;
        writeln!(w, "type          = {:?}", self.typ)?;
        dump::indent(w, body)?;
        writeln!(w, "comp          = {:?}", self.compression)?;
        dump::indent(w, body)?;
        writeln!(w, "endian        = {}", if self.little_endian { "little" } else { "big" })?;
        dump::indent(w, body)?;
        writeln!(w, "cksum         = {:#x}", self.checksum_method)?;
        dump::indent(w, body)?;
        writeln!(w, "fill          = {:#x}", self.fill)?;
        dump::indent(w, body)?;
        writeln!(w, "birth_txg     = {:#x}", self.birth_txg)?;
        for (i, dva) in self.dvas.iter().enumerate() {
            dump::indent(w, body)?;
            writeln!(w, "dva[{i}]:")?;
            match dva {
                Some(dva) => dva.dump(w, flags, body + 1)?,
                None => {
                    dump::indent(w, body + 1)?;
                    writeln!(w, "(unused)")?;
                }
            }
        }
        Ok(())
    }
}

impl<It> FromBytesLE<It> for Blkptr
where
    It: Iterator<Item = u8> + Clone,
{
    fn from_bytes_le(data: &mut It) -> Option<Self> {
        let dva0 = Dva::from_bytes_le(&mut data.clone());
        data.skip_n_bytes(Dva::ONDISK_SIZE)?;
        let dva1 = Dva::from_bytes_le(&mut data.clone());
        data.skip_n_bytes(Dva::ONDISK_SIZE)?;
        let dva2 = Dva::from_bytes_le(&mut data.clone());
        data.skip_n_bytes(Dva::ONDISK_SIZE)?;

        // Property word: {lsize:16, psize:16, comp:7, embedded:1, cksum:8,
        // type:8, lvl:5, encrypt:1, dedup:1, endian:1}, packed LE into one u64.
        let info = data.read_u64_le()?;
        let logical_size_sectors = (info & 0xFFFF) as u16;
        let physical_size_sectors = ((info >> 16) & 0xFFFF) as u16;
        let compression = CompressionMethod::from_value(((info >> 32) & 0x7F) as u8)?;
        let embedded = (info >> 39) & 1 != 0;
        let checksum_method = ((info >> 40) & 0xFF) as u8;
        let typ = DNodeType::from_value(((info >> 48) & 0xFF) as u8)?;
        let level = ((info >> 56) & 0b1_1111) as u8;
        let encrypted = (info >> 61) & 1 != 0;
        let dedup = (info >> 62) & 1 != 0;
        let little_endian = (info >> 63) & 1 != 0;

        data.skip_n_bytes(24)?; // reserved padding
        let birth_txg = data.read_u64_le()?;
        let fill = data.read_u64_le()?;
        let checksum = [
            data.read_u64_le()?,
            data.read_u64_le()?,
            data.read_u64_le()?,
            data.read_u64_le()?,
        ];

        Some(Blkptr {
            dvas: [dva0, dva1, dva2],
            logical_size_sectors,
            physical_size_sectors,
            compression,
            embedded,
            checksum_method,
            typ,
            level,
            encrypted,
            dedup,
            little_endian,
            birth_txg,
            fill,
            checksum,
        })
    }
}

static_assertions::const_assert_eq!(Blkptr::ONDISK_SIZE, 128);
