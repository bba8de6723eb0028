//! End-to-end test: a hand-built single-file pool image carried all the way
//! from "raw bytes" through uberblock selection, the MOS/DSL chain, and the
//! extractor, into an in-memory sink. This exercises the same path
//! `zfsread`'s binary drives against a real image, just small enough to
//! construct by hand.
//!
//! Image layout (ground truth for every offset below): one unused leading
//! sector, then the MOS object set, the MOS dnode array, the object
//! directory's micro-ZAP, the filesystem's own object set, its dnode array,
//! the master-node micro-ZAP, the root directory's micro-ZAP, and finally
//! one file's leaf data block.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use zfsread::dataset::open_root_filesystem;
use zfsread::extract::{extract, ExtractOptions, Sink};
use zfsread::physical::blkptr::DNodeType;
use zfsread::physical::mzap::ZBT_MICRO_ZAP;
use zfsread::physical::uberblock::UBERBLOCK_MAGIC;
use zfsread::pool::PoolReader;
use zfsread::Error;

const BASE: u64 = 4 * 1024 * 1024;
const COMPRESSION_OFF: u64 = 2;
const DIR_FLAG: u64 = 0x4000_0000_0000_0000;
const FILE_FLAG: u64 = 0x8000_0000_0000_0000;

/// Small little-endian byte-buffer builder, just enough to lay out the
/// on-disk structs field by field in the order their `FromBytesLE` impls
/// expect.
#[derive(Default)]
struct Buf(Vec<u8>);

impl Buf {
    fn u8(&mut self, v: u8) -> &mut Self {
        self.0.push(v);
        self
    }
    fn u16(&mut self, v: u16) -> &mut Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }
    fn u32(&mut self, v: u32) -> &mut Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }
    fn u64(&mut self, v: u64) -> &mut Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }
    fn bytes(&mut self, b: &[u8]) -> &mut Self {
        self.0.extend_from_slice(b);
        self
    }
    fn zeros(&mut self, n: usize) -> &mut Self {
        self.0.extend(std::iter::repeat(0u8).take(n));
        self
    }
    fn pad_to(&mut self, n: usize) -> &mut Self {
        let rem = n - self.0.len();
        self.zeros(rem)
    }
    fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

fn dva_bytes(offset_sectors: u64, asize_sectors: u32) -> Vec<u8> {
    let mut b = Buf::default();
    b.u32(asize_sectors); // grid = 0
    b.u32(0); // vdev
    b.u64(offset_sectors); // gang = 0
    b.into_vec()
}

/// One 128-byte block pointer, single DVA, little-endian, `Off` compression
/// (so `lsize == psize == asize` and no decompression is needed).
fn blkptr_bytes(offset_sectors: u64, size_bytes: usize, typ: DNodeType, birth_txg: u64) -> Vec<u8> {
    assert_eq!(size_bytes % 512, 0);
    let asize_sectors = (size_bytes / 512) as u32;
    let size_sectors = (size_bytes / 512 - 1) as u64;

    let mut b = Buf::default();
    b.bytes(&dva_bytes(offset_sectors, asize_sectors));
    b.zeros(16); // dva[1], unused
    b.zeros(16); // dva[2], unused
    let info: u64 = size_sectors // lsize
        | (size_sectors << 16) // psize
        | (COMPRESSION_OFF << 32)
        | ((typ as u64) << 48)
        | (1u64 << 63); // little_endian
    b.u64(info);
    b.zeros(24); // reserved
    b.u64(birth_txg);
    b.u64(0); // fill
    b.zeros(32); // checksum
    let bytes = b.into_vec();
    assert_eq!(bytes.len(), 128);
    bytes
}

fn invalid_blkptr_bytes() -> Vec<u8> {
    vec![0u8; 128]
}

struct DnodeSpec<'a> {
    typ: DNodeType,
    nlevels: u8,
    nblkptr: u8,
    bonus_type: DNodeType,
    data_block_size_sectors: u16,
    bonus_len: u16,
    max_block_id: u64,
    block_pointers: &'a [Vec<u8>],
    bonus: &'a [u8],
}

fn dnode_bytes(spec: &DnodeSpec) -> Vec<u8> {
    let mut b = Buf::default();
    b.u8(spec.typ as u8);
    b.u8(0); // indirect_blockshift, unused at nlevels == 1
    b.u8(spec.nlevels);
    b.u8(spec.nblkptr);
    b.u8(spec.bonus_type as u8);
    b.u8(0); // checksum_method
    b.u8(0); // compression_method
    b.u8(0); // flags
    b.u16(spec.data_block_size_sectors);
    b.u16(spec.bonus_len);
    b.zeros(4); // padding
    b.u64(spec.max_block_id);
    b.u64(0); // secphys_used
    b.zeros(32); // padding
    for bp in spec.block_pointers {
        assert_eq!(bp.len(), 128);
        b.bytes(bp);
    }
    let tail_size = 448 - spec.block_pointers.len() * 128;
    assert!(spec.bonus.len() <= tail_size);
    b.bytes(spec.bonus);
    b.zeros(tail_size - spec.bonus.len());
    let bytes = b.into_vec();
    assert_eq!(bytes.len(), 512);
    bytes
}

fn zero_dnode_bytes() -> Vec<u8> {
    vec![0u8; 512]
}

fn micro_zap_block(entries: &[(&str, u64)]) -> Vec<u8> {
    let mut b = Buf::default();
    b.u64(ZBT_MICRO_ZAP);
    b.u64(0); // salt
    b.u64(0); // normflags
    b.zeros(40); // reserved
    for (name, value) in entries {
        b.u64(*value);
        b.u32(0); // cd
        b.zeros(2); // padding
        let name_bytes = name.as_bytes();
        assert!(name_bytes.len() < 50);
        b.bytes(name_bytes);
        b.zeros(50 - name_bytes.len());
    }
    b.pad_to(512);
    b.into_vec()
}

fn dsl_dir_bytes(head_dataset_obj: u64) -> Vec<u8> {
    let mut b = Buf::default();
    b.u64(0); // creation_time
    b.u64(head_dataset_obj);
    b.zeros(8 * 11); // parent_obj .. flags
    b.zeros(8 * 5); // used_breakdown
    b.u64(0); // clones
    b.zeros(8 * 13); // reserved
    let bytes = b.into_vec();
    assert_eq!(bytes.len(), 256);
    bytes
}

fn dsl_dataset_bytes(objset_bp: &[u8]) -> Vec<u8> {
    assert_eq!(objset_bp.len(), 128);
    let mut b = Buf::default();
    b.zeros(8 * 16); // dir_obj .. flags
    b.bytes(objset_bp);
    b.zeros(8 * 3); // next_clones_obj, props_obj, userrefs_obj
    b.zeros(8 * 5); // reserved
    let bytes = b.into_vec();
    assert_eq!(bytes.len(), 320);
    bytes
}

fn znode_bytes(size: u64) -> Vec<u8> {
    let mut b = Buf::default();
    b.zeros(8 * 8); // atime, mtime, ctime, crtime
    b.u64(0); // gen_txg
    b.u64(0o100644); // mode
    b.u64(size);
    b.u64(0); // parent_obj
    b.u64(1); // links
    b.u64(0); // xattr
    b.u64(0); // rdev
    b.u64(0); // flags
    b.u64(0); // uid
    b.u64(0); // gid
    let bytes = b.into_vec();
    assert_eq!(bytes.len(), 144);
    bytes
}

fn objset_bytes(metadnode: &[u8], typ: u64) -> Vec<u8> {
    assert_eq!(metadnode.len(), 512);
    let mut b = Buf::default();
    b.bytes(metadnode);
    b.zeros(64); // zil_header
    b.u64(typ);
    b.u64(0); // flags
    b.zeros(432);
    b.bytes(&zero_dnode_bytes()); // userused_dnode
    b.bytes(&zero_dnode_bytes()); // groupused_dnode
    let bytes = b.into_vec();
    assert_eq!(bytes.len(), 2048);
    bytes
}

/// Appends `block` (whose length must already be a multiple of 512 bytes)
/// to `content` and returns the `(offset_sectors, size_bytes)` a block
/// pointer needs to address it, relative to the DVA base bias.
fn place(content: &mut Vec<u8>, block: Vec<u8>) -> (u64, usize) {
    assert_eq!(block.len() % 512, 0);
    let offset_sectors = (content.len() / 512) as u64;
    let size = block.len();
    content.extend(block);
    (offset_sectors, size)
}

/// Builds the full pool image bytes: label 0's uberblock ring plus, past the
/// 4 MiB DVA bias, every block making up a one-file filesystem.
fn build_image() -> Vec<u8> {
    const FILE_CONTENTS: &[u8] = b"hello";
    const FS_ID_MASTER_NODE: u64 = 1;
    const FS_ID_ROOT_DIR: u64 = 2;
    const FS_ID_FILE: u64 = 3;
    const MOS_ID_OBJECT_DIRECTORY: u64 = 1;
    const MOS_ID_ROOT_DATASET: u64 = 2;
    const MOS_ID_HEAD_DATASET: u64 = 3;

    let mut content = Vec::new();
    place(&mut content, vec![0u8; 512]); // unused leading sector, keeps every real DVA offset != 0

    // --- filesystem object set's own dnode array (ids 0..4) ---
    let mut file_data = FILE_CONTENTS.to_vec();
    file_data.resize(512, 0);
    let (file_data_off, file_data_len) = place(&mut content, file_data);

    let file_dnode = dnode_bytes(&DnodeSpec {
        typ: DNodeType::PlainFileContents,
        nlevels: 1,
        nblkptr: 1,
        bonus_type: DNodeType::ZNode,
        data_block_size_sectors: 1,
        bonus_len: 144,
        max_block_id: 0,
        block_pointers: &[blkptr_bytes(
            file_data_off,
            file_data_len,
            DNodeType::PlainFileContents,
            1,
        )],
        bonus: &znode_bytes(FILE_CONTENTS.len() as u64),
    });

    let root_dir_zap = micro_zap_block(&[("hello.txt", FILE_FLAG | FS_ID_FILE)]);
    let (root_dir_zap_off, root_dir_zap_len) = place(&mut content, root_dir_zap);
    let root_dir_dnode = dnode_bytes(&DnodeSpec {
        typ: DNodeType::DirectoryContents,
        nlevels: 1,
        nblkptr: 1,
        bonus_type: DNodeType::Invalid,
        data_block_size_sectors: 0,
        bonus_len: 0,
        max_block_id: 0,
        block_pointers: &[blkptr_bytes(
            root_dir_zap_off,
            root_dir_zap_len,
            DNodeType::ObjectArray,
            1,
        )],
        bonus: &[],
    });

    let master_zap = micro_zap_block(&[("ROOT", DIR_FLAG | FS_ID_ROOT_DIR)]);
    let (master_zap_off, master_zap_len) = place(&mut content, master_zap);
    let master_dnode = dnode_bytes(&DnodeSpec {
        typ: DNodeType::MasterNode,
        nlevels: 1,
        nblkptr: 1,
        bonus_type: DNodeType::Invalid,
        data_block_size_sectors: 0,
        bonus_len: 0,
        max_block_id: 0,
        block_pointers: &[blkptr_bytes(
            master_zap_off,
            master_zap_len,
            DNodeType::ObjectArray,
            1,
        )],
        bonus: &[],
    });

    let fs_dnode_array = [
        zero_dnode_bytes(),
        master_dnode,
        root_dir_dnode,
        file_dnode,
    ]
    .concat();
    assert_eq!(fs_dnode_array.len(), 2048);
    let (fs_dnode_array_off, fs_dnode_array_len) = place(&mut content, fs_dnode_array);

    let fs_metadnode = dnode_bytes(&DnodeSpec {
        typ: DNodeType::DNode,
        nlevels: 1,
        nblkptr: 1,
        bonus_type: DNodeType::Invalid,
        data_block_size_sectors: 4,
        bonus_len: 0,
        max_block_id: 0,
        block_pointers: &[blkptr_bytes(
            fs_dnode_array_off,
            fs_dnode_array_len,
            DNodeType::DNode,
            1,
        )],
        bonus: &[],
    });
    let fs_objset = objset_bytes(&fs_metadnode, 2 /* ObjSetType::Zfs */);
    let (fs_objset_off, fs_objset_len) = place(&mut content, fs_objset);

    // --- MOS dnode array (ids 0..4) ---
    let head_dataset_dnode = dnode_bytes(&DnodeSpec {
        typ: DNodeType::DslDataset,
        nlevels: 1,
        nblkptr: 1,
        bonus_type: DNodeType::DslDataset,
        data_block_size_sectors: 0,
        bonus_len: 320,
        max_block_id: 0,
        block_pointers: &[invalid_blkptr_bytes()],
        bonus: &dsl_dataset_bytes(&blkptr_bytes(
            fs_objset_off,
            fs_objset_len,
            DNodeType::ObjSet,
            1,
        )),
    });

    let root_dataset_dnode = dnode_bytes(&DnodeSpec {
        typ: DNodeType::DslDirectory,
        nlevels: 1,
        nblkptr: 1,
        bonus_type: DNodeType::DslDirectory,
        data_block_size_sectors: 0,
        bonus_len: 256,
        max_block_id: 0,
        block_pointers: &[invalid_blkptr_bytes()],
        bonus: &dsl_dir_bytes(MOS_ID_HEAD_DATASET),
    });

    let object_directory_zap = micro_zap_block(&[("root_dataset", MOS_ID_ROOT_DATASET)]);
    let (object_directory_zap_off, object_directory_zap_len) =
        place(&mut content, object_directory_zap);
    let object_directory_dnode = dnode_bytes(&DnodeSpec {
        typ: DNodeType::ObjectDirectory,
        nlevels: 1,
        nblkptr: 1,
        bonus_type: DNodeType::Invalid,
        data_block_size_sectors: 0,
        bonus_len: 0,
        max_block_id: 0,
        block_pointers: &[blkptr_bytes(
            object_directory_zap_off,
            object_directory_zap_len,
            DNodeType::ObjectArray,
            1,
        )],
        bonus: &[],
    });

    let mos_dnode_array = [
        zero_dnode_bytes(),
        object_directory_dnode,
        root_dataset_dnode,
        head_dataset_dnode,
    ]
    .concat();
    assert_eq!(mos_dnode_array.len(), 2048);
    let (mos_dnode_array_off, mos_dnode_array_len) = place(&mut content, mos_dnode_array);

    let mos_metadnode = dnode_bytes(&DnodeSpec {
        typ: DNodeType::DNode,
        nlevels: 1,
        nblkptr: 1,
        bonus_type: DNodeType::Invalid,
        data_block_size_sectors: 4,
        bonus_len: 0,
        max_block_id: 0,
        block_pointers: &[blkptr_bytes(
            mos_dnode_array_off,
            mos_dnode_array_len,
            DNodeType::DNode,
            1,
        )],
        bonus: &[],
    });
    let mos_objset = objset_bytes(&mos_metadnode, 1 /* ObjSetType::Meta */);
    let (mos_objset_off, mos_objset_len) = place(&mut content, mos_objset);

    let uberblock = {
        let mut b = Buf::default();
        b.u64(UBERBLOCK_MAGIC);
        b.u64(5000); // spa_version
        b.u64(1); // txg
        b.u64(0); // guid_sum
        b.u64(0); // timestamp
        b.bytes(&blkptr_bytes(mos_objset_off, mos_objset_len, DNodeType::ObjSet, 1));
        b.into_vec()
    };

    let mut image = vec![0u8; (BASE as usize) + content.len()];
    let ring_slot0 = 128 * 1024;
    image[ring_slot0..ring_slot0 + uberblock.len()].copy_from_slice(&uberblock);
    image[BASE as usize..].copy_from_slice(&content);

    let _ = (MOS_ID_OBJECT_DIRECTORY, FS_ID_MASTER_NODE);
    image
}

struct MemSink {
    dirs: Vec<PathBuf>,
    files: HashMap<PathBuf, Vec<u8>>,
}

impl Sink for MemSink {
    fn create_dir(&mut self, path: &Path) -> Result<(), Error> {
        self.dirs.push(path.to_path_buf());
        Ok(())
    }

    fn write_file(&mut self, path: &Path, data: &[u8]) -> Result<(), Error> {
        self.files.insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }
}

#[test]
fn extracts_single_file_from_synthetic_pool_image() {
    let image = build_image();
    let mut pool = PoolReader::from_source(Cursor::new(image)).unwrap();

    let (label, index, ub) = pool.find_active_uberblock().unwrap();
    assert_eq!((label, index), (0, 0));

    let mut root_fs = open_root_filesystem(&mut pool, &ub).unwrap();
    assert_eq!(root_fs.root_dir_obj_id, 2);

    let mut sink = MemSink {
        dirs: Vec::new(),
        files: HashMap::new(),
    };
    extract(
        &mut root_fs.dsl_tree,
        root_fs.root_dir_obj_id,
        &mut sink,
        &ExtractOptions::default(),
    )
    .unwrap();

    assert_eq!(sink.dirs, vec![PathBuf::from("")]);
    assert_eq!(sink.files.get(Path::new("hello.txt")).unwrap(), b"hello");
}

#[test]
fn no_znode_size_falls_back_to_full_leaf_block() {
    let image = build_image();
    let mut pool = PoolReader::from_source(Cursor::new(image)).unwrap();
    let (_, _, ub) = pool.find_active_uberblock().unwrap();
    let mut root_fs = open_root_filesystem(&mut pool, &ub).unwrap();

    let mut sink = MemSink {
        dirs: Vec::new(),
        files: HashMap::new(),
    };
    let options = ExtractOptions {
        use_znode_size: false,
    };
    extract(&mut root_fs.dsl_tree, root_fs.root_dir_obj_id, &mut sink, &options).unwrap();

    let written = sink.files.get(Path::new("hello.txt")).unwrap();
    assert_eq!(written.len(), 512);
    assert_eq!(&written[..5], b"hello");
    assert!(written[5..].iter().all(|&b| b == 0));
}
