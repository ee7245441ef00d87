//! TRP writer.
//!
//! Lays out a header, the entry table and 16-byte aligned payloads, encrypts
//! ESFM documents with the supplied [`EsfmCipher`], and fills in the header
//! digest.
//!
//! # Example
//!
//! ```ignore
//! use hdk_trophy::{NpCommId, TrophyCipher, TrpWriter};
//!
//! let trp = TrpWriter::new()
//!     .add_icon("TROP000.PNG", png_bytes)
//!     .add_encrypted("TROP.ESFM", iv, trophy_xml)
//!     .to_vec(&NpCommId::from_id("NPWR00001_00"), &TrophyCipher::new(trophy_key))?;
//! ```

use std::io::{Cursor, Write};

use binrw::BinWrite;
use sha1_smol::Sha1;

use super::structs::*;
use crate::crypto::{BLOCK_SIZE, EsfmCipher};
use crate::error::TrophyError;
use crate::npbind::NpCommId;

/// Payload of a queued entry.
#[derive(Debug, Clone)]
enum Body {
    Plain(Vec<u8>),
    Encrypted { iv: [u8; 16], plaintext: Vec<u8> },
}

#[derive(Debug, Clone)]
struct WriterItem {
    name: String,
    flag: u32,
    body: Body,
}

/// Builder for constructing a TRP container.
#[derive(Debug, Clone)]
pub struct TrpWriter {
    version: u32,
    dev_flag: u32,
    key_index: u32,
    items: Vec<WriterItem>,
}

impl Default for TrpWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TrpWriter {
    /// Create an empty retail container, version 1.
    pub const fn new() -> Self {
        Self {
            version: 1,
            dev_flag: 0,
            key_index: 0,
            items: Vec::new(),
        }
    }

    pub const fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Mark the container as a development build.
    pub const fn dev(mut self, dev: bool) -> Self {
        self.dev_flag = dev as u32;
        self
    }

    pub const fn key_index(mut self, key_index: u32) -> Self {
        self.key_index = key_index;
        self
    }

    // -- Entry addition -----------------------------------------------------

    /// Add a plain image (flag 0).
    pub fn add_icon(self, name: &str, data: Vec<u8>) -> Self {
        self.add_raw(name, FLAG_PLAIN, data)
    }

    /// Add an entry with an arbitrary flag; the payload is stored as-is.
    pub fn add_raw(mut self, name: &str, flag: u32, data: Vec<u8>) -> Self {
        self.items.push(WriterItem {
            name: name.to_string(),
            flag,
            body: Body::Plain(data),
        });
        self
    }

    /// Add a document that is encrypted on write (flag 3).
    ///
    /// The plaintext is zero-padded to the AES block size before encryption.
    pub fn add_encrypted(mut self, name: &str, iv: [u8; 16], plaintext: Vec<u8>) -> Self {
        self.items.push(WriterItem {
            name: name.to_string(),
            flag: FLAG_ENCRYPTED,
            body: Body::Encrypted { iv, plaintext },
        });
        self
    }

    // -- Writing ------------------------------------------------------------

    /// Build the container in memory.
    ///
    /// `key` and `cipher` are only used for encrypted entries.
    pub fn to_vec<C: EsfmCipher>(self, key: &NpCommId, cipher: &C) -> Result<Vec<u8>, TrophyError> {
        for item in &self.items {
            if item.name.len() >= TRP_NAME_LEN {
                return Err(TrophyError::EntryNameTooLong(item.name.clone()));
            }
        }

        // Resolve payload bytes first so the layout knows their sizes.
        let mut payloads = Vec::with_capacity(self.items.len());
        for item in &self.items {
            let bytes = match &item.body {
                Body::Plain(data) => data.clone(),
                Body::Encrypted { iv, plaintext } => {
                    let mut padded = plaintext.clone();
                    padded.resize(plaintext.len().next_multiple_of(BLOCK_SIZE), 0);
                    let ciphertext = cipher.encrypt(key, iv, &padded)?;

                    let mut out = Vec::with_capacity(ESFM_IV_LEN + ciphertext.len());
                    out.extend_from_slice(iv);
                    out.extend_from_slice(&ciphertext);
                    out
                }
            };
            payloads.push(bytes);
        }

        // Layout: [header][entry table][payloads, 16-byte aligned]
        let table_end = TRP_HEADER_SIZE + self.items.len() * TRP_ENTRY_SIZE;
        let mut offsets = Vec::with_capacity(payloads.len());
        let mut current = table_end.next_multiple_of(BLOCK_SIZE);
        for payload in &payloads {
            offsets.push(current as u64);
            current = (current + payload.len()).next_multiple_of(BLOCK_SIZE);
        }
        let file_size = current;

        let header = TrpHeader {
            magic: TRP_MAGIC,
            version: self.version,
            file_size: file_size as u64,
            entry_count: self.items.len() as u32,
            entry_size: TRP_ENTRY_SIZE as u32,
            dev_flag: self.dev_flag,
            digest: [0u8; 20],
            key_index: self.key_index,
            padding: [0u8; 44],
        };

        let mut c = Cursor::new(vec![0u8; file_size]);
        header.write_be(&mut c)?;

        for (i, item) in self.items.iter().enumerate() {
            let mut name = [0u8; TRP_NAME_LEN];
            name[..item.name.len()].copy_from_slice(item.name.as_bytes());

            let entry = TrpEntry {
                name,
                offset: offsets[i],
                length: payloads[i].len() as u64,
                flag: item.flag,
                padding: [0u8; 12],
            };
            c.set_position((TRP_HEADER_SIZE + i * TRP_ENTRY_SIZE) as u64);
            entry.write_be(&mut c)?;
        }

        for (offset, payload) in offsets.iter().zip(&payloads) {
            c.set_position(*offset);
            c.write_all(payload)?;
        }

        let mut buf = c.into_inner();
        let digest = Sha1::from(&buf).digest().bytes();
        buf[TRP_DIGEST_OFFSET..TRP_DIGEST_OFFSET + 20].copy_from_slice(&digest);

        Ok(buf)
    }

    /// Write the complete container to `writer`, returning its size.
    pub fn write<W: Write, C: EsfmCipher>(
        self,
        mut writer: W,
        key: &NpCommId,
        cipher: &C,
    ) -> Result<u64, TrophyError> {
        let buf = self.to_vec(key, cipher)?;
        writer.write_all(&buf)?;
        Ok(buf.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::crypto::TrophyCipher;
    use crate::trp::TrpArchive;

    const TEST_TROPHY_KEY: [u8; 16] = [0x42; 16];

    #[test]
    fn written_container_reads_back() {
        let key = NpCommId::from_id("NPWR00001_00");
        let cipher = TrophyCipher::new(TEST_TROPHY_KEY);
        let buf = TrpWriter::new()
            .add_icon("TROP000.PNG", vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00])
            .add_encrypted("TROP.ESFM", [0x24; 16], b"<trophyconf/>".to_vec())
            .to_vec(&key, &cipher)
            .unwrap();

        let mut trp = TrpArchive::open(Cursor::new(buf)).unwrap();
        assert_eq!(trp.header().file_size, trp.file_size());
        assert!(trp.verify_digest().unwrap());

        let entries = trp.read_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].offset % 16, 0);
        assert_eq!(entries[1].offset % 16, 0);

        let icon = trp.read_payload(0, &entries[0]).unwrap();
        assert_eq!(icon, [0xFF, 0xD8, 0xFF, 0xE0, 0x00]);

        // IV + one padded block.
        let esfm = trp.read_payload(1, &entries[1]).unwrap();
        assert_eq!(esfm.len(), 32);
        assert_eq!(&esfm[..16], &[0x24; 16]);

        let mut iv = [0u8; 16];
        iv.copy_from_slice(&esfm[..16]);
        let plain = cipher.decrypt(&key, &iv, &esfm[16..]).unwrap();
        assert_eq!(&plain[..13], b"<trophyconf/>");
        assert!(plain[13..].iter().all(|&b| b == 0));
    }

    #[test]
    fn tampering_breaks_digest() {
        let key = NpCommId::default();
        let cipher = TrophyCipher::new(TEST_TROPHY_KEY);
        let mut buf = TrpWriter::new()
            .dev(true)
            .add_icon("TROP001.PNG", vec![1, 2, 3])
            .to_vec(&key, &cipher)
            .unwrap();
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;

        let mut trp = TrpArchive::open(Cursor::new(buf)).unwrap();
        assert!(trp.header().is_dev());
        assert!(!trp.verify_digest().unwrap());
    }

    #[test]
    fn header_fields_and_streamed_write() {
        let key = NpCommId::default();
        let cipher = TrophyCipher::new(TEST_TROPHY_KEY);
        let writer = TrpWriter::new()
            .version(3)
            .key_index(1)
            .add_icon("TROP002.PNG", vec![9; 20]);
        let expected = writer.clone().to_vec(&key, &cipher).unwrap();

        let mut out = Vec::new();
        let written = writer.write(&mut out, &key, &cipher).unwrap();
        assert_eq!(written, out.len() as u64);
        assert_eq!(out, expected);

        let trp = TrpArchive::open(Cursor::new(out)).unwrap();
        assert_eq!(trp.header().version, 3);
        assert_eq!(trp.header().key_index, 1);
        assert!(!trp.header().is_dev());
        assert_eq!(trp.into_inner().into_inner(), expected);
    }

    #[test]
    fn rejects_long_names() {
        let err = TrpWriter::new()
            .add_icon(&"A".repeat(TRP_NAME_LEN), Vec::new())
            .to_vec(&NpCommId::default(), &TrophyCipher::new(TEST_TROPHY_KEY))
            .unwrap_err();
        assert!(matches!(err, TrophyError::EntryNameTooLong(_)));
    }
}
