//! Payload extraction: icon copies and ESFM decryption.

use std::fs;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use crate::crypto::EsfmCipher;
use crate::error::TrophyError;
use crate::npbind::NpCommId;
use crate::trp::structs::{ESFM_IV_LEN, ESFM_NAME_MARKER, TrpEntry, XML_NAME_MARKER};
use crate::trp::TrpArchive;

/// Truncate `buf` right after its last `>`.
///
/// A buffer without `>` is left as it is.
pub fn remove_padding(buf: &mut Vec<u8>) {
    if let Some(pos) = buf.iter().rposition(|&b| b == b'>') {
        buf.truncate(pos + 1);
    }
}

/// Output name of a decrypted document: the first `ESFM` becomes `XML`.
pub fn xml_file_name(name: &str) -> String {
    name.replacen(ESFM_NAME_MARKER, XML_NAME_MARKER, 1)
}

/// Reject names that would not stay inside the output directory.
pub fn check_entry_name(name: &str) -> Result<&str, TrophyError> {
    let unsafe_name = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || Path::new(name).is_absolute();
    if unsafe_name {
        return Err(TrophyError::UnsafeEntryName(name.to_string()));
    }
    Ok(name)
}

/// Copy a plain entry verbatim to `icons_dir/<name>`.
pub fn extract_icon<R: Read + Seek>(
    archive: &mut TrpArchive<R>,
    index: usize,
    entry: &TrpEntry,
    icons_dir: &Path,
) -> Result<PathBuf, TrophyError> {
    let name = check_entry_name(entry.name_str()?)?;
    let data = archive.read_payload(index, entry)?;

    let path = icons_dir.join(name);
    fs::write(&path, &data)?;

    #[cfg(feature = "logging")]
    {
        tracing::trace!(path = %path.display(), len = data.len(), "wrote trophy icon");
    }

    Ok(path)
}

/// Split an ESFM payload into IV and ciphertext, decrypt it and strip the
/// trailing padding.
pub fn decrypt_esfm<R: Read + Seek, C: EsfmCipher>(
    archive: &mut TrpArchive<R>,
    index: usize,
    entry: &TrpEntry,
    key: &NpCommId,
    cipher: &C,
) -> Result<Vec<u8>, TrophyError> {
    let ciphertext_len = entry
        .length
        .checked_sub(ESFM_IV_LEN as u64)
        .ok_or(TrophyError::EntryOutOfBounds { index })?;

    let raw_iv = archive.read_range(index, entry.offset, ESFM_IV_LEN as u64)?;
    let mut iv = [0u8; ESFM_IV_LEN];
    iv.copy_from_slice(&raw_iv);

    let ciphertext_off = entry
        .offset
        .checked_add(ESFM_IV_LEN as u64)
        .ok_or(TrophyError::EntryOutOfBounds { index })?;
    let ciphertext = archive.read_range(index, ciphertext_off, ciphertext_len)?;

    let mut document = cipher.decrypt(key, &iv, &ciphertext)?;
    remove_padding(&mut document);
    Ok(document)
}

/// Decrypt an ESFM entry to `xml_dir/<name with ESFM replaced by XML>`.
pub fn extract_metadata<R: Read + Seek, C: EsfmCipher>(
    archive: &mut TrpArchive<R>,
    index: usize,
    entry: &TrpEntry,
    key: &NpCommId,
    cipher: &C,
    xml_dir: &Path,
) -> Result<PathBuf, TrophyError> {
    let xml_name = xml_file_name(check_entry_name(entry.name_str()?)?);
    let document = decrypt_esfm(archive, index, entry, key, cipher)?;

    let path = xml_dir.join(xml_name);
    fs::write(&path, &document)?;

    #[cfg(feature = "logging")]
    {
        tracing::trace!(path = %path.display(), len = document.len(), "wrote trophy document");
    }

    Ok(path)
}
