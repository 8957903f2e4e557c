//! Extraction of source-distribution archives.
//!
//! Registries hand out sdists as `.tar.gz`, `.tar.bz2`, `.tar.xz`, plain
//! `.tar` or `.zip`, and the
//! file name is not a reliable hint (mirrors rename files, old uploads carry
//! odd suffixes). The format is therefore sniffed from the leading bytes, and
//! only files whose extension passes an [`ExtensionFilter`] are written out.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use xz2::read::XzDecoder;

pub type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("unsupported archive format for {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("corrupt zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("archive entry escapes the extraction root: {path:?}")]
    UnsafePath { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    TarGz,
    TarBz2,
    TarXz,
    Zip,
}

/// Case-insensitive allow-list of file extensions (without the leading dot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

#[derive(Clone, Debug)]
pub struct Archive {
    path: PathBuf,
}

impl Archive {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Identify the container format from magic bytes.
    pub fn format(&self) -> Result<ArchiveFormat> {
        let mut head = [0u8; 512];
        let mut file = File::open(&self.path)?;
        let n = read_up_to(&mut file, &mut head)?;
        sniff(&head[..n]).ok_or_else(|| ArchiveError::UnsupportedFormat {
            path: self.path.clone(),
        })
    }

    /// Extract every regular file accepted by `filter` into `dest`, keeping
    /// the archive-relative layout. Returns the number of files written.
    ///
    /// Links and special entries are skipped; absolute or `..` paths abort the
    /// extraction with [`ArchiveError::UnsafePath`].
    pub fn extract_filtered(&self, dest: &Path, filter: &ExtensionFilter) -> Result<usize> {
        let format = self.format()?;
        fs::create_dir_all(dest)?;

        let written = match format {
            ArchiveFormat::Tar => extract_tar(File::open(&self.path)?, dest, filter)?,
            ArchiveFormat::TarGz => {
                extract_tar(GzDecoder::new(File::open(&self.path)?), dest, filter)?
            }
            ArchiveFormat::TarBz2 => {
                extract_tar(BzDecoder::new(File::open(&self.path)?), dest, filter)?
            }
            ArchiveFormat::TarXz => {
                extract_tar(XzDecoder::new(File::open(&self.path)?), dest, filter)?
            }
            ArchiveFormat::Zip => extract_zip(File::open(&self.path)?, dest, filter)?,
        };

        tracing::debug!(
            target: "vintage.archive",
            archive = %self.path.display(),
            ?format,
            files = written,
            "extracted archive"
        );
        Ok(written)
    }
}

fn sniff(head: &[u8]) -> Option<ArchiveFormat> {
    if head.starts_with(&[0x1f, 0x8b]) {
        return Some(ArchiveFormat::TarGz);
    }
    if head.starts_with(b"BZh") {
        return Some(ArchiveFormat::TarBz2);
    }
    if head.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
        return Some(ArchiveFormat::TarXz);
    }
    if head.starts_with(b"PK\x03\x04") || head.starts_with(b"PK\x05\x06") {
        return Some(ArchiveFormat::Zip);
    }
    if head.get(257..262) == Some(b"ustar".as_slice()) {
        return Some(ArchiveFormat::Tar);
    }
    None
}

fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

fn validate_relative_path(path: &Path) -> Result<()> {
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(ArchiveError::UnsafePath {
                    path: path.to_path_buf(),
                })
            }
        }
    }
    Ok(())
}

fn write_entry(dest: &Path, rel: &Path, reader: &mut impl Read) -> Result<()> {
    let out_path = dest.join(rel);
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = File::create(&out_path)?;
    io::copy(reader, &mut out)?;
    Ok(())
}

fn extract_tar(reader: impl Read, dest: &Path, filter: &ExtensionFilter) -> Result<usize> {
    let mut archive = tar::Archive::new(reader);
    let mut written = 0usize;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let rel = entry.path()?.into_owned();
        validate_relative_path(&rel)?;

        match entry.header().entry_type() {
            tar::EntryType::Regular | tar::EntryType::Continuous => {}
            _ => continue,
        }
        if !filter.matches(&rel) {
            continue;
        }

        write_entry(dest, &rel, &mut entry)?;
        written += 1;
    }

    Ok(written)
}

fn extract_zip(file: File, dest: &Path, filter: &ExtensionFilter) -> Result<usize> {
    let mut zip = zip::ZipArchive::new(file)?;
    let mut written = 0usize;

    for idx in 0..zip.len() {
        let mut entry = zip.by_index(idx)?;
        if entry.is_dir() {
            continue;
        }
        // Symlinks are stored as regular entries whose unix mode says otherwise.
        if entry
            .unix_mode()
            .is_some_and(|mode| mode & 0o170000 == 0o120000)
        {
            continue;
        }
        let Some(rel) = entry.enclosed_name() else {
            return Err(ArchiveError::UnsafePath {
                path: PathBuf::from(entry.name()),
            });
        };
        validate_relative_path(&rel)?;
        if !filter.matches(&rel) {
            continue;
        }

        write_entry(dest, &rel, &mut entry)?;
        written += 1;
    }

    Ok(written)
}
