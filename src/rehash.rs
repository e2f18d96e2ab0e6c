use std::{
    fmt::{Display, Formatter},
    io::{Read, Seek, SeekFrom, Write},
};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::{
    hash::{rehash_level, root_digest, Digest},
    ivfc::{read_ivfc_header, IVFC_LEVEL_COUNT},
    layout::IvfcLayout,
    overlay::OverlayStream,
    romfs::read_romfs_header,
};

/// How rebuilt hash tables reach the image.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum RehashMode {
    /// Stage every level in memory and write them out once the root digest is known.
    #[default]
    Staged,
    /// Overwrite each level's hash table as soon as it is computed.
    InPlace,
    /// Compute everything, write nothing.
    DryRun,
}

impl RehashMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RehashMode::Staged => "staged",
            RehashMode::InPlace => "in-place",
            RehashMode::DryRun => "dry run",
        }
    }
}

impl Display for RehashMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// Outcome of a successful run.
#[derive(Clone, Debug)]
pub struct RehashReport {
    pub layout: IvfcLayout,
    /// Digests written per level, indexed like `layout.levels`.
    pub digest_counts: [usize; IVFC_LEVEL_COUNT],
    /// Hash over the header and master hash region. Belongs in whatever
    /// container references this image.
    pub root_digest: Digest,
    pub mode: RehashMode,
}

/// Rebuilds every IVFC hash table of a decrypted RomFS image and returns the
/// new root digest.
///
/// The header is fully validated before anything is written. In
/// [`RehashMode::InPlace`] an I/O error part way through leaves the image
/// with some levels stale.
pub fn rehash_image<S>(stream: &mut S, mode: RehashMode) -> Result<RehashReport>
where S: Read + Write + Seek + ?Sized {
    let header = read_ivfc_header(stream)?;
    let layout = IvfcLayout::from_header(&header)?;
    for (idx, level) in layout.levels.iter().enumerate() {
        debug!("IVFC level #{idx}: {level}");
    }
    let stream_len = stream.seek(SeekFrom::End(0)).context("Failed to determine image size")?;
    layout.check_within(stream_len)?;
    check_romfs_header(stream, &layout)?;

    let (digest_counts, root_digest) = match mode {
        RehashMode::InPlace => {
            let result = rebuild_tree(stream, &layout)?;
            stream.flush().context("Failed to flush image")?;
            result
        }
        RehashMode::Staged | RehashMode::DryRun => {
            let mut overlay = OverlayStream::new(&mut *stream);
            let result = rebuild_tree(&mut overlay, &layout)?;
            if mode == RehashMode::Staged {
                debug!("Committing {:#x} staged bytes", overlay.staged_len());
                overlay.commit().context("Failed to write rebuilt hash tables")?;
            }
            result
        }
    };
    Ok(RehashReport { layout, digest_counts, root_digest, mode })
}

fn rebuild_tree<S>(
    stream: &mut S,
    layout: &IvfcLayout,
) -> Result<([usize; IVFC_LEVEL_COUNT], Digest)>
where
    S: Read + Write + Seek + ?Sized,
{
    let mut digest_counts = [0; IVFC_LEVEL_COUNT];
    // Each level hashes the table the previous iteration wrote.
    for idx in (0..IVFC_LEVEL_COUNT).rev() {
        info!("Generating level #{idx} IVFC hashes...");
        let digests = rehash_level(stream, &layout.levels[idx])
            .with_context(|| format!("Failed to rebuild level {idx} hashes"))?;
        debug!("Level #{idx}: wrote {} hashes", digests.len());
        digest_counts[idx] = digests.len();
    }
    let root = root_digest(stream, layout.master_hash_size)
        .context("Failed to hash master hash region")?;
    Ok((digest_counts, root))
}

/// Returns whether a well-formed RomFS header starts the IVFC body. Only warns
/// otherwise.
fn check_romfs_header<R>(reader: &mut R, layout: &IvfcLayout) -> Result<bool>
where R: Read + Seek + ?Sized {
    match read_romfs_header(reader, layout.levels[2].data_offset)? {
        Some(header) => match header.verify() {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!("{e:#}; rebuilding hashes anyway");
                Ok(false)
            }
        },
        None => {
            warn!("Image ends before the RomFS header");
            Ok(false)
        }
    }
}
