//! NP communication ID lookup in `sce_sys/npbind.dat`.
//!
//! The binding file holds one `0x180`-byte record per trophy container,
//! starting at `0x84`. The first 12 bytes of each record are the NP
//! communication ID (e.g. `NPWR00001_00`) that keys the container's
//! encrypted documents.
//!
//! Record `n` belongs to the `n`-th entry of the title's trophy directory,
//! so the directory order and the record order must agree. See
//! [`crate::extractor::DirLister`].

use core::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Offset of the first record.
pub const NPBIND_BASE_OFFSET: u64 = 0x84;

/// Size of one record.
pub const NPBIND_RECORD_SIZE: u64 = 0x180;

/// Bytes of a record that form the communication ID.
pub const NP_COMM_ID_LEN: usize = 12;

/// Prefix every usable communication ID starts with.
pub const NP_COMM_ID_SENTINEL: [u8; 2] = *b"NP";

/// 16-byte key token: 12 bytes of communication ID, 4 bytes of zero.
///
/// An all-zero token means no binding data was found for the container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NpCommId([u8; 16]);

impl NpCommId {
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Build a token from a textual ID such as `NPWR00001_00`. Longer input
    /// is cut to 12 bytes.
    pub fn from_id(id: &str) -> Self {
        let mut raw = [0u8; 16];
        let len = id.len().min(NP_COMM_ID_LEN);
        raw[..len].copy_from_slice(&id.as_bytes()[..len]);
        Self(raw)
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Sentinel check: the token starts with `NP`.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0[..2] == NP_COMM_ID_SENTINEL
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Communication ID as a `&str`, stripping trailing NULs.
    pub fn as_str(&self) -> &str {
        let id = &self.0[..NP_COMM_ID_LEN];
        let end = id.iter().position(|&b| b == 0).unwrap_or(id.len());
        core::str::from_utf8(&id[..end]).unwrap_or("<invalid UTF-8>")
    }
}

impl fmt::Display for NpCommId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte range of record `index`, `None` on overflow.
fn record_range(index: usize) -> Option<(u64, u64)> {
    let start = (index as u64)
        .checked_mul(NPBIND_RECORD_SIZE)?
        .checked_add(NPBIND_BASE_OFFSET)?;
    let end = start.checked_add(NPBIND_RECORD_SIZE)?;
    Some((start, end))
}

/// Read the communication ID of record `index` from an open binding file.
///
/// A file too short to hold the whole record yields the zero token.
pub fn read_np_comm_id<R: Read + Seek>(reader: &mut R, index: usize) -> io::Result<NpCommId> {
    let Some((start, end)) = record_range(index) else {
        return Ok(NpCommId::default());
    };

    let file_size = reader.seek(SeekFrom::End(0))?;
    if file_size < end {
        #[cfg(feature = "logging")]
        {
            tracing::warn!(
                index,
                file_size,
                "npbind record {} lies past the end of the binding file",
                index
            );
        }
        return Ok(NpCommId::default());
    }

    reader.seek(SeekFrom::Start(start))?;
    let mut raw = [0u8; 16];
    reader.read_exact(&mut raw[..NP_COMM_ID_LEN])?;
    Ok(NpCommId(raw))
}

/// Resolve the key token for the container at position `index`.
///
/// Never fails: a missing, unreadable or short binding file resolves to the
/// zero token, which later disables decryption for that container.
pub fn resolve_np_comm_id(binding_path: &Path, index: usize) -> NpCommId {
    let Ok(mut file) = File::open(binding_path) else {
        return NpCommId::default();
    };

    match read_np_comm_id(&mut file, index) {
        Ok(id) => id,
        Err(_e) => {
            #[cfg(feature = "logging")]
            {
                tracing::warn!(
                    path = %binding_path.display(),
                    index,
                    "failed to seek to npbind record: {}",
                    _e
                );
            }
            NpCommId::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use super::*;

    /// Binding file with one record per id.
    fn build_npbind(ids: &[&str]) -> Vec<u8> {
        let size = NPBIND_BASE_OFFSET + ids.len() as u64 * NPBIND_RECORD_SIZE;
        let mut buf = vec![0u8; size as usize];
        let mut c = Cursor::new(&mut buf[..]);
        for (i, id) in ids.iter().enumerate() {
            c.set_position(NPBIND_BASE_OFFSET + i as u64 * NPBIND_RECORD_SIZE);
            c.write_all(id.as_bytes()).unwrap();
            // Bytes past the ID belong to the record, not the token.
            c.write_all(b"\xAA\xBB\xCC\xDD").unwrap();
        }
        buf
    }

    #[test]
    fn reads_record_by_index() {
        let buf = build_npbind(&["NPWR00001_00", "NPWR00002_00"]);
        let mut c = Cursor::new(buf);

        let first = read_np_comm_id(&mut c, 0).unwrap();
        assert_eq!(first.as_str(), "NPWR00001_00");
        assert_eq!(&first.as_bytes()[12..], &[0, 0, 0, 0]);
        assert!(first.is_valid());

        let second = read_np_comm_id(&mut c, 1).unwrap();
        assert_eq!(second.to_string(), "NPWR00002_00");
    }

    #[test]
    fn resolution_is_deterministic() {
        let buf = build_npbind(&["NPWR12345_00"]);
        let a = read_np_comm_id(&mut Cursor::new(buf.clone()), 0).unwrap();
        let b = read_np_comm_id(&mut Cursor::new(buf), 0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn short_file_yields_zero_token() {
        let buf = build_npbind(&["NPWR00001_00"]);
        let id = read_np_comm_id(&mut Cursor::new(buf.clone()), 1).unwrap();
        assert!(id.is_zero());
        assert!(!id.is_valid());

        // One byte short of a complete record.
        let truncated = buf[..buf.len() - 1].to_vec();
        let id = read_np_comm_id(&mut Cursor::new(truncated), 0).unwrap();
        assert!(id.is_zero());
    }

    #[test]
    fn missing_file_yields_zero_token() {
        let dir = tempfile::tempdir().unwrap();
        let id = resolve_np_comm_id(&dir.path().join("npbind.dat"), 0);
        assert!(id.is_zero());
    }

    #[test]
    fn resolves_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("npbind.dat");
        std::fs::write(&path, build_npbind(&["NPWR00001_00", "NPWR00002_00"])).unwrap();

        assert_eq!(resolve_np_comm_id(&path, 1).as_str(), "NPWR00002_00");
        assert!(resolve_np_comm_id(&path, 2).is_zero());
        assert!(resolve_np_comm_id(&path, usize::MAX).is_zero());
    }

    #[test]
    fn from_id_truncates_to_twelve_bytes() {
        let id = NpCommId::from_id("NPWR00001_00_EXTRA");
        assert_eq!(id.as_str(), "NPWR00001_00");
        assert_eq!(&id.as_bytes()[12..], &[0, 0, 0, 0]);
    }
}
