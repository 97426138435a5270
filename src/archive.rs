//! Streaming access to image tarballs.
//!
//! [`open_archive`] opens a plain or gzip-wrapped tarball for a single forward
//! pass. [`scan_members`] walks its 512-byte header blocks itself, parsing each
//! one with [`tar_rs::Header`]. GNU long-name and pax records stay attached to
//! the header they describe instead of being folded away, which is what lets the
//! copy pass forward them byte for byte. A pax `size` record still decides how
//! much content follows the header, as it must for members over 8 GiB.

use crate::error::{DiffError, Result};
use flate2::read::GzDecoder;
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use tar_rs::{Header, PaxExtensions};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const BLOCK_SIZE: u64 = 512;

/// Opens a tarball for reading, decompressing it on the fly when it starts with
/// the gzip magic bytes.
///
/// The file handle is owned by the returned stream and closed when it drops.
pub fn open_archive(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).map_err(|source| DiffError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = BufReader::new(file);
    let gzipped = reader
        .fill_buf()
        .map_err(|source| DiffError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .starts_with(&GZIP_MAGIC);

    let stream: Box<dyn Read> = if gzipped {
        log::debug!("{} is gzip compressed", path.display());
        Box::new(GzDecoder::new(reader))
    } else {
        Box::new(reader)
    };

    Ok(stream)
}

/// A GNU long-name/long-link or pax local record preceding a header.
#[derive(Clone)]
pub struct Extension {
    pub header: Header,
    pub data: Vec<u8>,
}

/// One archive member as seen by a pass.
pub struct Member<'a> {
    /// Effective path: long name, then pax `path`, then the header name.
    pub path: String,
    /// Stored content length: pax `size` when present, else the header's size.
    pub size: u64,
    pub header: &'a Header,
    /// Records that must be written immediately before `header`.
    pub extensions: &'a [Extension],
}

impl Member<'_> {
    /// Directory entries, plus old-style members whose name ends in `/`.
    pub fn is_dir(&self) -> bool {
        self.header.entry_type().is_dir() || (!self.is_global() && self.path.ends_with('/'))
    }

    /// Pax global headers apply to the whole archive, not to one layer.
    pub fn is_global(&self) -> bool {
        self.header.entry_type().is_pax_global_extensions()
    }
}

/// Walks every member of the tar stream in `reader` in order, calling `visit`
/// with the member and a reader over its stored content.
///
/// Content the visitor leaves unread is skipped. Only the extension records of
/// the current member are buffered. The walk ends at the first all-zero block or
/// at a clean end of stream; a header with a bad checksum or content cut short
/// is a format error.
pub fn scan_members<R, F>(mut reader: R, source: &Path, mut visit: F) -> Result<()>
where
    R: Read,
    F: FnMut(Member<'_>, &mut dyn Read) -> Result<()>,
{
    let scan_err = |e: io::Error| DiffError::from_scan(source, e);
    let mut pending: Vec<Extension> = Vec::new();

    while let Some(header) = next_header(&mut reader).map_err(scan_err)? {
        let entry_type = header.entry_type();

        if entry_type.is_gnu_longname()
            || entry_type.is_gnu_longlink()
            || entry_type.is_pax_local_extensions()
        {
            let size = header.entry_size().map_err(scan_err)?;
            let mut data = Vec::new();
            let mut content = (&mut reader).take(size);
            content.read_to_end(&mut data).map_err(scan_err)?;
            let unread = content.limit();
            finish_content(&mut reader, unread, size).map_err(scan_err)?;
            pending.push(Extension { header, data });
            continue;
        }

        let size = match pax_size(&pending).map_err(scan_err)? {
            Some(size) => size,
            None => header.entry_size().map_err(scan_err)?,
        };
        let path = effective_path(&header, &pending);
        log::trace!("{}: {:?} {} ({} bytes)", source.display(), entry_type, path, size);

        let mut content = (&mut reader).take(size);
        visit(
            Member {
                path,
                size,
                header: &header,
                extensions: &pending,
            },
            &mut content,
        )?;
        io::copy(&mut content, &mut io::sink()).map_err(scan_err)?;
        let unread = content.limit();
        finish_content(&mut reader, unread, size).map_err(scan_err)?;
        pending.clear();
    }

    if !pending.is_empty() {
        return Err(DiffError::Format {
            path: source.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::InvalidData,
                "archive ends with extension records but no entry",
            ),
        });
    }

    Ok(())
}

/// Reads the next header block. `None` at the end-of-archive marker or when the
/// stream ends exactly on a block boundary.
fn next_header<R: Read>(reader: &mut R) -> io::Result<Option<Header>> {
    let mut block = [0u8; BLOCK_SIZE as usize];
    let mut filled = 0;
    while filled < block.len() {
        match reader.read(&mut block[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }

    if filled == 0 || block.iter().all(|&b| b == 0) {
        return Ok(None);
    }
    if filled < block.len() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "archive ends inside a header block",
        ));
    }

    let header = Header::from_byte_slice(&block).clone();
    let stored = header.cksum()?;
    let computed = block[..148]
        .iter()
        .chain(&[b' '; 8])
        .chain(&block[156..])
        .fold(0u32, |sum, &b| sum + u32::from(b));
    if stored != computed {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("header checksum mismatch: stored {stored}, computed {computed}"),
        ));
    }

    Ok(Some(header))
}

/// Checks that all `size` content bytes were present, then skips the padding up
/// to the next block boundary.
fn finish_content<R: Read>(reader: &mut R, unread: u64, size: u64) -> io::Result<()> {
    if unread != 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("entry content truncated: {unread} of {size} bytes missing"),
        ));
    }
    let padding = (BLOCK_SIZE - size % BLOCK_SIZE) % BLOCK_SIZE;
    let skipped = io::copy(&mut reader.by_ref().take(padding), &mut io::sink())?;
    if skipped != padding {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "archive ends inside entry padding",
        ));
    }
    Ok(())
}

/// The last pax `size` record among `extensions`, if any.
fn pax_size(extensions: &[Extension]) -> io::Result<Option<u64>> {
    let mut size = None;
    for ext in extensions
        .iter()
        .filter(|ext| ext.header.entry_type().is_pax_local_extensions())
    {
        for field in PaxExtensions::new(&ext.data) {
            let field = field?;
            if field.key_bytes() != b"size" {
                continue;
            }
            let value = field
                .value()
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "invalid pax size: {}",
                            String::from_utf8_lossy(field.value_bytes())
                        ),
                    )
                })?;
            size = Some(value);
        }
    }
    Ok(size)
}

fn effective_path(header: &Header, extensions: &[Extension]) -> String {
    let mut long_name: Option<&[u8]> = None;
    let mut pax_path: Option<&[u8]> = None;

    for ext in extensions {
        let entry_type = ext.header.entry_type();
        if entry_type.is_gnu_longname() {
            long_name = Some(trim_nul(&ext.data));
        } else if entry_type.is_pax_local_extensions() {
            if let Some(value) = PaxExtensions::new(&ext.data)
                .filter_map(|field| field.ok())
                .find(|field| field.key_bytes() == b"path")
                .map(|field| field.value_bytes())
            {
                pax_path = Some(value);
            }
        }
    }

    let bytes = match long_name.or(pax_path) {
        Some(bytes) => Cow::Borrowed(bytes),
        None => header.path_bytes(),
    };
    String::from_utf8_lossy(&bytes).into_owned()
}

fn trim_nul(data: &[u8]) -> &[u8] {
    let end = data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &data[..end]
}
