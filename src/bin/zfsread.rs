//! CLI front-end (C9/C10/C11): argument parsing, logging setup, and the
//! `std::fs`-backed [`Sink`] the extractor writes through. All three are
//! external collaborators and live in the binary crate so the library
//! stays disk- and stdout-free.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use clap::Parser;

use zfsread::dataset::open_root_filesystem;
use zfsread::extract::{extract, ExtractOptions, Sink};
use zfsread::pool::PoolReader;
use zfsread::Error;

/// Read-only forensic reader for a ZFS storage pool image.
#[derive(Parser, Debug)]
#[command(name = "zfsread")]
struct Cli {
    /// Path to the pool image file.
    image_path: PathBuf,

    /// List every uberblock slot found in the active label instead of extracting.
    #[arg(long = "list-uberblocks", conflicts_with = "extract")]
    list_uberblocks: bool,

    /// Extract the filesystem tree. Defaults to the highest-txg uberblock;
    /// pass a slot index to pin a specific one.
    #[arg(long = "extract", value_name = "UB_INDEX", num_args = 0..=1, default_missing_value = "highest-txg")]
    extract: Option<String>,

    /// Directory to extract into.
    #[arg(long = "out-dir", default_value = "extracted")]
    out_dir: PathBuf,

    /// Ignore ZNode.size and write full leaf blocks — the fallback for ZPL
    /// versions whose bonus payload layout varies from the one assumed here.
    #[arg(long = "no-znode-size")]
    no_znode_size: bool,

    /// Raise log verbosity (-v, -vv).
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();
}

/// `std::fs`-backed [`Sink`]: directories get 0o777 (subject to umask),
/// files are created/truncated and written in full. No xattrs or mtimes
/// are preserved.
struct FsSink {
    out_dir: PathBuf,
}

impl FsSink {
    fn new(out_dir: &Path) -> Self {
        FsSink {
            out_dir: out_dir.to_path_buf(),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.out_dir.join(path)
    }
}

impl Sink for FsSink {
    fn create_dir(&mut self, path: &Path) -> Result<(), Error> {
        let full = self.resolve(path);
        fs::create_dir_all(&full).map_err(|e| Error::Sink {
            path: full.clone(),
            source: e,
        })?;
        let mut perms = fs::metadata(&full)
            .map_err(|e| Error::Sink {
                path: full.clone(),
                source: e,
            })?
            .permissions();
        perms.set_mode(0o777);
        fs::set_permissions(&full, perms).map_err(|e| Error::Sink { path: full, source: e })
    }

    fn write_file(&mut self, path: &Path, data: &[u8]) -> Result<(), Error> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::Sink {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        fs::write(&full, data).map_err(|e| Error::Sink { path: full, source: e })
    }
}

fn run(cli: &Cli) -> Result<(), Error> {
    let mut pool = PoolReader::open(&cli.image_path)?;

    if cli.list_uberblocks {
        let (active_label, active_index, _) = pool.find_active_uberblock()?;
        let mut slots = pool.list_uberblocks(active_label);
        slots.sort_unstable_by_key(|(idx, _)| *idx);
        for (idx, ub) in slots {
            let marker = if idx == active_index { '*' } else { ' ' };
            println!("{marker} label {active_label} slot {idx:3}: txg={}", ub.txg);
        }
        return Ok(());
    }

    let pinned_index = match cli.extract.as_deref() {
        Some("highest-txg") | None => None,
        Some(raw) => Some(raw.parse::<usize>().map_err(|_| {
            Error::NotFound(format!("'{raw}' is not a valid uberblock slot index"))
        })?),
    };
    let (label, index, uberblock) = match pinned_index {
        Some(idx) => {
            let ub = pool.read_uberblock(0, idx)?;
            (0, idx, ub)
        }
        None => pool.find_active_uberblock()?,
    };
    log::info!("using uberblock at label {label} slot {index} (txg {})", uberblock.txg);

    let mut root_fs = open_root_filesystem(&mut pool, &uberblock)?;
    log::info!("root directory is dnode {}", root_fs.root_dir_obj_id);

    let mut sink = FsSink::new(&cli.out_dir);
    let options = ExtractOptions {
        use_znode_size: !cli.no_znode_size,
    };
    extract(&mut root_fs.dsl_tree, root_fs.root_dir_obj_id, &mut sink, &options)
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match run(&cli) {
        Ok(()) => 0,
        Err(e) => {
            log::error!("{e}");
            1
        }
    };
    std::process::exit(code);
}
