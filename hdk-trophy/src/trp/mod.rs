//! Trophy package (TRP) file format.
//!
//! A TRP bundles a title's trophy icons (plain PNGs) with its trophy
//! configuration documents, which are stored encrypted (ESFM).

pub mod reader;
pub mod structs;
pub mod writer;

pub use reader::{Entries, TrpArchive};
pub use structs::{
    ESFM_IV_LEN, EntryKind, FLAG_ENCRYPTED, FLAG_PLAIN, TRP_ENTRY_SIZE, TRP_HEADER_SIZE, TRP_MAGIC,
    TrpEntry, TrpHeader,
};
pub use writer::TrpWriter;
