//! Zip snapshot of the workspace uploaded to every analysis endpoint.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tempfile::TempPath;
use tracing::{debug, info, instrument, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use archdocs_shared::{ArchDocsError, ArchiveConfig, Result};

/// Extensions never worth sending for source analysis.
const BINARY_EXTENSIONS: &[&str] = &[
    "exe", "dll", "so", "dylib", "bin", "obj", "o", "a", // executables and objects
    "png", "jpg", "jpeg", "gif", "ico", "svg", "webp", // images
    "mp3", "mp4", "avi", "mov", // media
    "zip", "tar", "gz", "bz2", "rar", "7z", // archives
    "woff", "woff2", "ttf", "eot", // fonts
    "pdf", "doc", "docx",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    /// Files written into the archive.
    pub files: usize,
    /// Regular files left out (binary, oversized or unreadable).
    pub skipped: usize,
    /// Size of the finished archive in bytes.
    pub bytes: u64,
}

/// Archive `workspace` into a temporary `repo-*.zip`, removed when the returned path drops.
pub fn archive_to_temp(workspace: &Path, config: &ArchiveConfig) -> Result<(TempPath, ArchiveStats)> {
    let temp = tempfile::Builder::new()
        .prefix("repo-")
        .suffix(".zip")
        .tempfile()
        .map_err(|e| ArchDocsError::io(std::env::temp_dir(), e))?
        .into_temp_path();
    let stats = create_archive(workspace, &temp, config)?;
    Ok((temp, stats))
}

/// Write a deflated zip of `workspace` to `dest`.
///
/// Hidden entries, the configured skip directories, binary extensions and
/// files above `max_file_size` are left out. Entry names are
/// workspace-relative with `/` separators.
#[instrument(skip_all, fields(workspace = %workspace.display()))]
pub fn create_archive(workspace: &Path, dest: &Path, config: &ArchiveConfig) -> Result<ArchiveStats> {
    let file = File::create(dest).map_err(|e| ArchDocsError::io(dest, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let zip_err = |e: zip::result::ZipError| ArchDocsError::io(dest, io::Error::other(e));

    let skip_dirs = config.skip_dirs.clone();
    let walker = WalkBuilder::new(workspace)
        .standard_filters(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            if name.starts_with('.') {
                return false;
            }
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !(is_dir && skip_dirs.iter().any(|d| *d == name))
        })
        .build();

    let mut stats = ArchiveStats::default();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable workspace entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let path = entry.path();
        if is_binary(path) {
            stats.skipped += 1;
            continue;
        }

        let size = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping file without metadata");
                stats.skipped += 1;
                continue;
            }
        };
        if size > config.max_file_size {
            debug!(path = %path.display(), size, "skipping oversized file");
            stats.skipped += 1;
            continue;
        }

        let mut source = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable file");
                stats.skipped += 1;
                continue;
            }
        };

        zip.start_file(entry_name(workspace, path), options)
            .map_err(zip_err)?;
        io::copy(&mut source, &mut zip).map_err(|e| ArchDocsError::io(path, e))?;
        stats.files += 1;
    }

    let mut out = zip.finish().map_err(zip_err)?;
    out.flush().map_err(|e| ArchDocsError::io(dest, e))?;
    stats.bytes = std::fs::metadata(dest)
        .map(|m| m.len())
        .map_err(|e| ArchDocsError::io(dest, e))?;

    info!(
        files = stats.files,
        skipped = stats.skipped,
        mb = format_args!("{:.2}", stats.bytes as f64 / (1024.0 * 1024.0)),
        "archive created"
    );
    Ok(stats)
}

fn is_binary(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| BINARY_EXTENSIONS.contains(&ext.as_str()))
}

fn entry_name(workspace: &Path, path: &Path) -> String {
    let relative: PathBuf = path.strip_prefix(workspace).unwrap_or(path).to_path_buf();
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
