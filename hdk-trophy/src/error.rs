//! Error types for trophy package operations

use std::io;

use thiserror::Error;

/// Main error type for TRP reading, writing and extraction
#[derive(Debug, Error)]
pub enum TrophyError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to enumerate trophy directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("invalid TRP magic {0:#010x} (expected 0xDCA24D00)")]
    InvalidMagic(u32),

    #[error("TRP file too small for header")]
    FileTooSmall,

    #[error("invalid TRP header: {0}")]
    InvalidHeader(String),

    #[error("entry record size {0:#x} is smaller than a TRP entry")]
    InvalidEntrySize(u32),

    #[error("entry table exceeds file size")]
    EntryTableOverflow,

    #[error("entry index {0} out of range")]
    EntryIndex(usize),

    #[error("payload of entry {index} is out of bounds")]
    EntryOutOfBounds { index: usize },

    #[error("entry name \"{0}\" is not valid UTF-8")]
    InvalidEntryName(String),

    #[error("entry name \"{0}\" is not a plain file name")]
    UnsafeEntryName(String),

    #[error("entry name \"{0}\" exceeds 31 bytes")]
    EntryNameTooLong(String),

    #[error("TRP digest does not match file contents")]
    DigestMismatch,

    #[error("cryptographic operation failed: {0}")]
    Crypto(#[from] CryptoError),
}

impl From<binrw::Error> for TrophyError {
    fn from(e: binrw::Error) -> Self {
        match e {
            binrw::Error::Io(io) => TrophyError::Io(io),
            other => TrophyError::InvalidHeader(other.to_string()),
        }
    }
}

/// Cryptographic operation errors
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("AES operation failed: {0}")]
    AesError(String),
    #[error("input length {0} is not a multiple of the AES block size")]
    UnalignedInput(usize),
}
