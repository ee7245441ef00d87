//! TRP reader.
//!
//! Parses and validates the header, then reads entry records and payloads
//! on demand. Every offset taken from the file is checked against the file
//! size before it is followed.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use binrw::BinReaderExt;
use sha1_smol::Sha1;

use super::structs::*;
use crate::error::TrophyError;

/// Streaming TRP reader.
///
/// ```ignore
/// let mut trp = TrpArchive::open_path("TROPHY00.TRP")?;
///
/// for entry in trp.entries() {
///     let entry = entry?;
///     println!("{entry}");
/// }
/// ```
pub struct TrpArchive<R: Read + Seek> {
    inner: R,
    header: TrpHeader,
    file_size: u64,
}

impl TrpArchive<BufReader<File>> {
    /// Open a TRP file from disk.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, TrophyError> {
        let file = File::open(path)?;
        Self::open(BufReader::new(file))
    }
}

impl<R: Read + Seek> TrpArchive<R> {
    /// Open a TRP and validate its header.
    ///
    /// Rejects the container on a magic mismatch before anything else is
    /// read, and when the declared entry table cannot fit in the file.
    pub fn open(mut inner: R) -> Result<Self, TrophyError> {
        let file_size = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;

        if file_size < TRP_HEADER_SIZE as u64 {
            return Err(TrophyError::FileTooSmall);
        }

        let magic: u32 = inner.read_be()?;
        if magic != TRP_MAGIC {
            return Err(TrophyError::InvalidMagic(magic));
        }

        inner.seek(SeekFrom::Start(0))?;
        let header: TrpHeader = inner.read_be()?;

        if (header.entry_size as usize) < TRP_ENTRY_SIZE {
            return Err(TrophyError::InvalidEntrySize(header.entry_size));
        }
        match header.entry_table_end() {
            Some(end) if end <= file_size => {}
            _ => return Err(TrophyError::EntryTableOverflow),
        }

        Ok(Self {
            inner,
            header,
            file_size,
        })
    }

    // -- accessors ----------------------------------------------------------

    /// Reference to the parsed header.
    pub const fn header(&self) -> &TrpHeader {
        &self.header
    }

    /// Number of entries declared in the header.
    pub const fn entry_count(&self) -> usize {
        self.header.entry_count as usize
    }

    /// Absolute offset of entry record `index`, `None` on overflow.
    pub const fn entry_offset(&self, index: usize) -> Option<u64> {
        self.header.entry_offset(index)
    }

    pub const fn file_size(&self) -> u64 {
        self.file_size
    }

    // -- entry table --------------------------------------------------------

    /// Read a single [`TrpEntry`] by index.
    pub fn read_entry(&mut self, index: usize) -> Result<TrpEntry, TrophyError> {
        if index >= self.entry_count() {
            return Err(TrophyError::EntryIndex(index));
        }

        let offset = self
            .entry_offset(index)
            .ok_or(TrophyError::EntryIndex(index))?;
        self.inner.seek(SeekFrom::Start(offset))?;
        let entry: TrpEntry = self.inner.read_be()?;
        Ok(entry)
    }

    /// Iterate over entries lazily, in table order.
    pub fn entries(&mut self) -> Entries<'_, R> {
        Entries::new(self)
    }

    /// Read every entry into a `Vec`.
    pub fn read_entries(&mut self) -> Result<Vec<TrpEntry>, TrophyError> {
        let mut out = Vec::with_capacity(self.entry_count());
        for entry in self.entries() {
            out.push(entry?);
        }
        Ok(out)
    }

    // -- payloads -----------------------------------------------------------

    /// Read an entry's complete payload, `[offset, offset + length)`.
    pub fn read_payload(&mut self, index: usize, entry: &TrpEntry) -> Result<Vec<u8>, TrophyError> {
        self.read_range(index, entry.offset, entry.length)
    }

    /// Read `len` bytes at absolute `offset`, attributing failures to entry
    /// `index`.
    pub fn read_range(&mut self, index: usize, offset: u64, len: u64) -> Result<Vec<u8>, TrophyError> {
        let end = offset
            .checked_add(len)
            .ok_or(TrophyError::EntryOutOfBounds { index })?;
        if end > self.file_size {
            return Err(TrophyError::EntryOutOfBounds { index });
        }

        self.inner.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len as usize];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    // -- integrity ----------------------------------------------------------

    /// Recompute the SHA-1 digest (with the digest field zeroed) and compare
    /// it against the header.
    pub fn verify_digest(&mut self) -> Result<bool, TrophyError> {
        self.inner.seek(SeekFrom::Start(0))?;

        let mut buf = Vec::with_capacity(self.file_size as usize);
        self.inner.read_to_end(&mut buf)?;
        buf.get_mut(TRP_DIGEST_OFFSET..TRP_DIGEST_OFFSET + 20)
            .ok_or(TrophyError::FileTooSmall)?
            .fill(0);

        Ok(Sha1::from(&buf).digest().bytes() == self.header.digest)
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

// -----------------------------------------------------------------------
// Iterator
// -----------------------------------------------------------------------

/// Iterator over `TrpEntry`s that borrows the archive.
pub struct Entries<'a, R: Read + Seek> {
    archive: &'a mut TrpArchive<R>,
    idx: usize,
    total: usize,
}

impl<'a, R: Read + Seek> Entries<'a, R> {
    fn new(archive: &'a mut TrpArchive<R>) -> Self {
        let total = archive.entry_count();
        Self {
            archive,
            idx: 0,
            total,
        }
    }
}

impl<R: Read + Seek> Iterator for Entries<'_, R> {
    type Item = Result<TrpEntry, TrophyError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.idx >= self.total {
            return None;
        }

        let i = self.idx;
        self.idx += 1;
        Some(self.archive.read_entry(i))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.total - self.idx;
        (rest, Some(rest))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
