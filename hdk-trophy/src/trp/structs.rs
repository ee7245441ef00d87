//! TRP (trophy package) file format structures.
//!
//! A `.trp` file has the following high-level layout:
//!
//! | Region        | Offset                   | Notes                           |
//! |---------------|--------------------------|---------------------------------|
//! | Header        | `0x00`–`0x5F`            | Always plaintext                |
//! | Entry table   | `0x60`                   | `entry_count` × `entry_size`    |
//! | Payloads      | (absolute, per entry)    | PNG icons, ESFM/SFM documents   |
//!
//! Every integer is big-endian.

use core::fmt;

use binrw::{BinRead, BinWrite};

use crate::error::TrophyError;
use crate::npbind::NpCommId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// TRP magic, stored as `DC A2 4D 00`.
pub const TRP_MAGIC: u32 = 0xDCA2_4D00;

/// Size (in bytes) of the TRP header.
pub const TRP_HEADER_SIZE: usize = 0x60;

/// Size of one entry record as defined by the format. A header may declare
/// a larger record size, never a smaller one.
pub const TRP_ENTRY_SIZE: usize = 0x40;

/// Width of the fixed entry-name field.
pub const TRP_NAME_LEN: usize = 32;

/// Offset of the SHA-1 digest inside the header.
pub const TRP_DIGEST_OFFSET: usize = 0x1C;

/// Length of the IV stored in front of every encrypted payload.
pub const ESFM_IV_LEN: usize = 16;

/// Entry flag of a plain (unencrypted) image.
pub const FLAG_PLAIN: u32 = 0;

/// Entry flag of an encrypted metadata document.
pub const FLAG_ENCRYPTED: u32 = 3;

/// Substring identifying a trophy image asset.
pub const ICON_NAME_MARKER: &str = "TROP";

/// Marker in encrypted document names, replaced by [`XML_NAME_MARKER`] on
/// extraction.
pub const ESFM_NAME_MARKER: &str = "ESFM";

pub const XML_NAME_MARKER: &str = "XML";

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// TRP header (`0x00`–`0x5F`).
///
/// ```text
/// 0x00  u32       magic (0xDCA24D00)
/// 0x04  u32       version
/// 0x08  u64       file_size
/// 0x10  u32       entry_count
/// 0x14  u32       entry_size
/// 0x18  u32       dev_flag
/// 0x1C  [u8;20]   digest  (SHA-1 over the file with this field zeroed)
/// 0x30  u32       key_index
/// 0x34  [u8;44]   padding
/// ```
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(big)]
#[bw(big)]
pub struct TrpHeader {
    pub magic: u32,
    pub version: u32,
    pub file_size: u64,
    pub entry_count: u32,
    pub entry_size: u32,
    pub dev_flag: u32,
    pub digest: [u8; 20],
    pub key_index: u32,
    pub padding: [u8; 44],
}

impl TrpHeader {
    /// Validates the magic field.
    #[inline]
    pub const fn is_valid_magic(&self) -> bool {
        self.magic == TRP_MAGIC
    }

    #[inline]
    pub const fn is_dev(&self) -> bool {
        self.dev_flag == 1
    }

    /// Absolute offset of entry record `index`, `None` on overflow.
    #[inline]
    pub const fn entry_offset(&self, index: usize) -> Option<u64> {
        match (index as u64).checked_mul(self.entry_size as u64) {
            Some(rel) => rel.checked_add(TRP_HEADER_SIZE as u64),
            None => None,
        }
    }

    /// End offset of the whole entry table.
    #[inline]
    pub const fn entry_table_end(&self) -> Option<u64> {
        self.entry_offset(self.entry_count as usize)
    }
}

impl fmt::Display for TrpHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TrpHeader(version={}, file_size={}, entries={}, entry_size={:#x}, dev={})",
            self.version,
            self.file_size,
            self.entry_count,
            self.entry_size,
            self.is_dev(),
        )
    }
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// A single record of the TRP entry table (64 bytes).
///
/// ```text
/// 0x00  [u8;32]  name    (NUL-padded ASCII)
/// 0x20  u64      offset  (absolute)
/// 0x28  u64      length
/// 0x30  u32      flag    (0 = plain image, 3 = encrypted document)
/// 0x34  [u8;12]  padding
/// ```
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(big)]
#[bw(big)]
pub struct TrpEntry {
    pub name: [u8; TRP_NAME_LEN],
    pub offset: u64,
    pub length: u64,
    pub flag: u32,
    pub padding: [u8; 12],
}

/// How an entry is handled during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Plain trophy image, copied verbatim.
    Icon,
    /// Encrypted metadata document, decrypted and depadded.
    EncryptedMetadata,
    /// Anything else, including encrypted entries without a usable key.
    Ignore,
}

impl TrpEntry {
    /// Raw name bytes up to the first NUL.
    pub fn name_bytes(&self) -> &[u8] {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.name.len());
        &self.name[..end]
    }

    /// Entry name as a `&str`, stripping trailing NULs.
    pub fn name_str(&self) -> Result<&str, TrophyError> {
        core::str::from_utf8(self.name_bytes()).map_err(|_| {
            TrophyError::InvalidEntryName(String::from_utf8_lossy(self.name_bytes()).into_owned())
        })
    }

    #[inline]
    pub const fn is_encrypted(&self) -> bool {
        self.flag == FLAG_ENCRYPTED
    }

    /// End offset of the payload, `None` on overflow.
    #[inline]
    pub const fn payload_end(&self) -> Option<u64> {
        self.offset.checked_add(self.length)
    }

    /// Decide what extraction does with this entry.
    ///
    /// Encrypted entries are only routed to decryption when `key` carries the
    /// `NP` sentinel; otherwise they are ignored. A name that is not UTF-8
    /// rejects the entry whatever its flag.
    pub fn classify(&self, key: &NpCommId) -> Result<EntryKind, TrophyError> {
        let name = self.name_str()?;
        Ok(match self.flag {
            FLAG_PLAIN if name.contains(ICON_NAME_MARKER) => EntryKind::Icon,
            FLAG_ENCRYPTED if key.is_valid() => EntryKind::EncryptedMetadata,
            _ => EntryKind::Ignore,
        })
    }
}

impl fmt::Display for TrpEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TrpEntry(\"{}\", offset={:#x}, length={}, flag={})",
            String::from_utf8_lossy(self.name_bytes()),
            self.offset,
            self.length,
            self.flag,
        )
    }
}
