mod hash;
mod ivfc;
mod layout;
mod overlay;
mod read;
mod rehash;
mod romfs;
#[cfg(test)]
mod testutil;
mod util;

use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context, Result};
use argp::{FromArgs, HelpStyle};
use log::info;

use crate::{
    hash::format_digest,
    rehash::{rehash_image, RehashMode},
};

#[derive(FromArgs, Debug)]
/// Rebuilds the IVFC hash tree of a modified, decrypted RomFS image.
struct TopLevel {
    #[argp(positional)]
    /// The RomFS image to fix.
    file: PathBuf,
    #[argp(switch, short = 'n')]
    /// Compute the hashes without writing anything.
    dry_run: bool,
    #[argp(switch)]
    /// Write each level as soon as it is hashed instead of all at the end.
    in_place: bool,
    #[argp(switch, short = 'v')]
    /// Enable debug logging.
    verbose: bool,
}

impl TopLevel {
    fn mode(&self) -> Result<RehashMode> {
        ensure!(!(self.dry_run && self.in_place), "--dry-run and --in-place are mutually exclusive");
        Ok(if self.dry_run {
            RehashMode::DryRun
        } else if self.in_place {
            RehashMode::InPlace
        } else {
            RehashMode::Staged
        })
    }
}

/// Opens the image for writing unless `mode` never writes.
fn open_image(path: &Path, mode: RehashMode) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(mode != RehashMode::DryRun)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))
}

fn init_logging(max_level: &str) {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(max_level));
}

fn main() -> Result<()> {
    let args: TopLevel = argp::parse_args_or_exit(&HelpStyle::default());
    init_logging(if args.verbose { "debug" } else { "info" });
    let mode = args.mode()?;

    let mut file = open_image(&args.file, mode)?;
    info!("Rebuilding {} ({mode})", args.file.display());
    let report = rehash_image(&mut file, mode)
        .with_context(|| format!("Failed to rebuild hashes of {}", args.file.display()))?;

    let [level0, level1, level2] = report.digest_counts;
    info!(
        "Rebuilt {level2} + {level1} + {level0} block hashes ({}); root covers {:#x} bytes",
        report.mode,
        report.layout.master_region_size()
    );
    println!("Superblock Hash: {}", format_digest(&report.root_digest));
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Seek, SeekFrom, Write};

    use super::*;
    use crate::testutil::{patterned_body, SyntheticImage};

    fn args(dry_run: bool, in_place: bool) -> TopLevel {
        TopLevel { file: PathBuf::from("romfs.bin"), dry_run, in_place, verbose: false }
    }

    #[test]
    fn mode_from_switches() {
        assert_eq!(args(false, false).mode().unwrap(), RehashMode::Staged);
        assert_eq!(args(true, false).mode().unwrap(), RehashMode::DryRun);
        assert_eq!(args(false, true).mode().unwrap(), RehashMode::InPlace);
        assert!(args(true, true).mode().is_err());
    }

    #[test]
    fn dry_run_on_read_only_file() {
        let image = SyntheticImage::new(&patterned_body(0x5000), 12);
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&image.data).unwrap();
        tmp.flush().unwrap();

        let mut file = open_image(tmp.path(), RehashMode::DryRun).unwrap();
        assert!(file.write_all(b"x").is_err());
        let dry = rehash_image(&mut file, RehashMode::DryRun).unwrap();

        let mut on_disk = Vec::new();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.read_to_end(&mut on_disk).unwrap();
        assert_eq!(on_disk, image.data);

        let mut file = open_image(tmp.path(), RehashMode::Staged).unwrap();
        let staged = rehash_image(&mut file, RehashMode::Staged).unwrap();
        assert_eq!(dry.root_digest, staged.root_digest);
    }

    #[test]
    fn missing_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_image(&dir.path().join("romfs.bin"), RehashMode::Staged).unwrap_err();
        assert!(err.to_string().starts_with("Failed to open"));
    }
}
