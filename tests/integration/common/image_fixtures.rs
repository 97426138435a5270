//! Builds small image tarballs on the fly and reads them back.
//!
//! Short names are written straight into the ustar name field so directory
//! entries keep exactly the spelling a test asks for (with or without the
//! trailing slash). Long names go through a GNU long-name record or a pax
//! `path` record.

use anyhow::Result;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use tar_rs::{Archive, Builder, EntryType, Header};

pub enum Item {
    Dir(String),
    File(String, Vec<u8>),
    /// Name stored through a GNU long-name record.
    LongFile(String, Vec<u8>),
    /// Name stored through a pax `path` record.
    PaxFile(String, Vec<u8>),
    /// Header size left at 0; the real length and any extra keys (uid, gid, ...)
    /// live in a pax record, the way large members are written.
    PaxSized(String, Vec<u8>, Vec<(String, String)>),
    /// Old-style directory: a regular member whose name ends in `/`.
    PlainDir(String),
}

pub fn dir(name: &str) -> Item {
    Item::Dir(name.to_string())
}

pub fn file(name: &str, data: &[u8]) -> Item {
    Item::File(name.to_string(), data.to_vec())
}

pub fn long_file(name: &str, data: &[u8]) -> Item {
    Item::LongFile(name.to_string(), data.to_vec())
}

pub fn pax_file(name: &str, data: &[u8]) -> Item {
    Item::PaxFile(name.to_string(), data.to_vec())
}

pub fn pax_sized_file(name: &str, data: &[u8], extra: &[(&str, &str)]) -> Item {
    let extra = extra
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Item::PaxSized(name.to_string(), data.to_vec(), extra)
}

pub fn plain_dir(name: &str) -> Item {
    assert!(name.ends_with('/'));
    Item::PlainDir(name.to_string())
}

fn raw_header(name: &str, entry_type: EntryType, size: u64) -> Header {
    assert!(name.len() <= 100, "use long_file or pax_file for {name}");
    let mut header = Header::new_gnu();
    header.as_old_mut().name[..name.len()].copy_from_slice(name.as_bytes());
    header.set_entry_type(entry_type);
    header.set_mode(if entry_type.is_dir() { 0o755 } else { 0o644 });
    header.set_size(size);
    header.set_mtime(1_700_000_000);
    header.set_cksum();
    header
}

pub fn pax_record(key: &str, value: &str) -> Vec<u8> {
    // "<len> <key>=<value>\n" where <len> counts its own digits
    let body = format!(" {key}={value}\n");
    let mut len = body.len() + 1;
    while len.to_string().len() + body.len() != len {
        len += 1;
    }
    format!("{len}{body}").into_bytes()
}

fn append_items<W: Write>(builder: &mut Builder<W>, items: &[Item]) -> Result<()> {
    for item in items {
        match item {
            Item::Dir(name) => {
                builder.append(&raw_header(name, EntryType::Directory, 0), std::io::empty())?;
            }
            Item::File(name, data) => {
                builder.append(
                    &raw_header(name, EntryType::Regular, data.len() as u64),
                    data.as_slice(),
                )?;
            }
            Item::LongFile(name, data) => {
                let mut header = Header::new_gnu();
                header.set_entry_type(EntryType::Regular);
                header.set_mode(0o644);
                header.set_size(data.len() as u64);
                builder.append_data(&mut header, name, data.as_slice())?;
            }
            Item::PaxFile(name, data) => {
                let record = pax_record("path", name);
                builder.append(
                    &raw_header("PaxHeaders/entry", EntryType::XHeader, record.len() as u64),
                    record.as_slice(),
                )?;
                let short: String = name.chars().take(100).collect();
                builder.append(
                    &raw_header(&short, EntryType::Regular, data.len() as u64),
                    data.as_slice(),
                )?;
            }
            Item::PaxSized(name, data, extra) => {
                let mut record = pax_record("size", &data.len().to_string());
                for (key, value) in extra {
                    record.extend(pax_record(key, value));
                }
                builder.append(
                    &raw_header("PaxHeaders/entry", EntryType::XHeader, record.len() as u64),
                    record.as_slice(),
                )?;
                builder.append(&raw_header(name, EntryType::Regular, 0), data.as_slice())?;
            }
            Item::PlainDir(name) => {
                builder.append(&raw_header(name, EntryType::Regular, 0), std::io::empty())?;
            }
        }
    }
    Ok(())
}

/// Writes a plain tarball holding `items` in order.
pub fn write_image(path: &Path, items: &[Item]) -> Result<()> {
    let mut builder = Builder::new(File::create(path)?);
    append_items(&mut builder, items)?;
    builder.into_inner()?.flush()?;
    Ok(())
}

/// The tarball [`write_image`] would write, in memory. Used for nested
/// `layer.tar` payloads.
pub fn tarball(items: &[Item]) -> Result<Vec<u8>> {
    let mut builder = Builder::new(Vec::new());
    append_items(&mut builder, items)?;
    Ok(builder.into_inner()?)
}

/// Writes the same tarball as [`write_image`], gzip compressed.
pub fn write_gzip_image(path: &Path, items: &[Item]) -> Result<()> {
    let encoder = GzEncoder::new(File::create(path)?, Compression::default());
    let mut builder = Builder::new(encoder);
    append_items(&mut builder, items)?;
    builder.into_inner()?.finish()?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadEntry {
    pub path: String,
    pub is_dir: bool,
    pub data: Vec<u8>,
}

/// Reads a tarball back through the `tar` crate's normal (non-raw) iterator.
pub fn read_image(path: &Path) -> Result<Vec<ReadEntry>> {
    let mut archive = Archive::new(File::open(path)?);
    let mut entries = Vec::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let is_dir = entry.header().entry_type().is_dir();
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        entries.push(ReadEntry { path, is_dir, data });
    }
    Ok(entries)
}

pub fn read_paths(path: &Path) -> Result<Vec<String>> {
    Ok(read_image(path)?.into_iter().map(|e| e.path).collect())
}

pub fn same_bytes(a: &Path, b: &Path) -> Result<bool> {
    Ok(fs::read(a)? == fs::read(b)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pax_record_length_counts_itself() {
        let record = pax_record("path", "a/b");
        assert_eq!(record, b"12 path=a/b\n".to_vec());
        assert_eq!(record.len(), 12);

        let record = pax_record("path", &"x".repeat(95));
        assert_eq!(record.len(), 105);
        assert!(record.starts_with(b"105 path="));
    }
}
