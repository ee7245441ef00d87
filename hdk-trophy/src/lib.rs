//! Trophy package (TRP) handling
//!
//! This crate reads, writes and extracts `PlayStation` trophy packages: the
//! per-title containers that bundle trophy icons with the encrypted trophy
//! configuration documents (ESFM).
//!
//! Extraction of a title directory goes through [`TrophyExtractor`]; the
//! lower-level pieces ([`TrpArchive`], [`resolve_np_comm_id`],
//! [`payload`]) are public for tools that need finer control.

pub mod crypto;
pub mod error;
pub mod extractor;
pub mod npbind;
pub mod options;
pub mod payload;
pub mod trp;

// Re-export main types for convenience
pub use crypto::{EsfmCipher, TrophyCipher};
pub use error::{CryptoError, TrophyError};
pub use extractor::{
    ContainerReport, DirLister, ExtractOutcome, ExtractSummary, FsLister, ListedEntry,
    SortedLister, TrophyExtractor,
};
pub use npbind::{NpCommId, read_np_comm_id, resolve_np_comm_id};
pub use options::{ExtractOptions, ExtractOptionsBuilder};
pub use trp::{EntryKind, TrpArchive, TrpEntry, TrpHeader, TrpWriter};
