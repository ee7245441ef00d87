//! Per-title trophy extraction.
//!
//! [`TrophyExtractor::extract`] walks `<title>/sce_sys/trophy/`, resolves
//! each container's key token from `<title>/sce_sys/npbind.dat` and writes
//! icons and decrypted documents below the configured output root.
//!
//! # Positional keys
//!
//! The binding file does not name the containers it describes. Record `n`
//! belongs to the `n`-th entry of the trophy directory, counting every
//! entry the directory yields (not just regular files). The order is
//! therefore part of the input: it comes from a [`DirLister`]. [`FsLister`]
//! keeps the order the operating system reports, which is the order
//! binding files are produced against; [`SortedLister`] sorts by file name
//! for reproducible runs.

use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::crypto::EsfmCipher;
use crate::error::TrophyError;
use crate::npbind::{NpCommId, resolve_np_comm_id};
use crate::options::{ExtractOptions, NPBIND_PATH, TROPHY_DIR};
use crate::payload::{extract_icon, extract_metadata};
use crate::trp::{EntryKind, TrpArchive};

// ---------------------------------------------------------------------------
// Directory listing
// ---------------------------------------------------------------------------

/// One entry of the trophy directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEntry {
    pub path: PathBuf,
    /// Whether the entry is (or links to) a regular file.
    pub is_file: bool,
}

impl ListedEntry {
    pub fn new(path: impl Into<PathBuf>, is_file: bool) -> Self {
        Self {
            path: path.into(),
            is_file,
        }
    }
}

/// Source of the trophy directory's entries, in positional-index order.
pub trait DirLister {
    fn list(&self, dir: &Path) -> Result<Vec<ListedEntry>, TrophyError>;
}

impl<L: DirLister + ?Sized> DirLister for &L {
    fn list(&self, dir: &Path) -> Result<Vec<ListedEntry>, TrophyError> {
        (**self).list(dir)
    }
}

/// Lists entries in the order the filesystem reports them.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLister;

/// Lists entries sorted by file name.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortedLister;

fn walk(walker: WalkDir) -> Result<Vec<ListedEntry>, TrophyError> {
    let mut out = Vec::new();
    for entry in walker.min_depth(1).max_depth(1) {
        let entry = entry?;
        out.push(ListedEntry {
            is_file: entry.path().is_file(),
            path: entry.into_path(),
        });
    }
    Ok(out)
}

impl DirLister for FsLister {
    fn list(&self, dir: &Path) -> Result<Vec<ListedEntry>, TrophyError> {
        walk(WalkDir::new(dir))
    }
}

impl DirLister for SortedLister {
    fn list(&self, dir: &Path) -> Result<Vec<ListedEntry>, TrophyError> {
        walk(WalkDir::new(dir).sort_by_file_name())
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What was written for one container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerReport {
    /// Source TRP file.
    pub source: PathBuf,
    /// Key token used for the container (zero when none was bound).
    pub np_comm_id: NpCommId,
    /// `<output_root>/<title>/<files_dir>/<stem>`
    pub output_dir: PathBuf,
    pub icons: Vec<PathBuf>,
    pub documents: Vec<PathBuf>,
    /// Encrypted entries skipped for lack of a valid key token.
    pub skipped_encrypted: usize,
}

/// Summary of a whole title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub title: String,
    pub containers: Vec<ContainerReport>,
}

impl ExtractSummary {
    pub fn icon_count(&self) -> usize {
        self.containers.iter().map(|c| c.icons.len()).sum()
    }

    pub fn document_count(&self) -> usize {
        self.containers.iter().map(|c| c.documents.len()).sum()
    }

    pub fn skipped_count(&self) -> usize {
        self.containers.iter().map(|c| c.skipped_encrypted).sum()
    }
}

/// Result of a successful [`TrophyExtractor::extract`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// The title has no trophy directory.
    NothingToExtract,
    Extracted(ExtractSummary),
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Drives key resolution, container parsing and payload extraction for a
/// title.
///
/// ```ignore
/// let extractor = TrophyExtractor::new(
///     ExtractOptions::new(metadata_dir),
///     TrophyCipher::new(trophy_key),
/// );
///
/// match extractor.extract(Path::new("/games/CUSA00001"))? {
///     ExtractOutcome::NothingToExtract => {}
///     ExtractOutcome::Extracted(summary) => println!("{} icons", summary.icon_count()),
/// }
/// ```
#[derive(Debug)]
pub struct TrophyExtractor<C: EsfmCipher, L: DirLister = FsLister> {
    options: ExtractOptions,
    cipher: C,
    lister: L,
}

impl<C: EsfmCipher> TrophyExtractor<C, FsLister> {
    pub fn new(options: ExtractOptions, cipher: C) -> Self {
        Self {
            options,
            cipher,
            lister: FsLister,
        }
    }
}

impl<C: EsfmCipher, L: DirLister> TrophyExtractor<C, L> {
    /// Replace the directory lister that defines positional indices.
    pub fn with_lister<L2: DirLister>(self, lister: L2) -> TrophyExtractor<C, L2> {
        TrophyExtractor {
            options: self.options,
            cipher: self.cipher,
            lister,
        }
    }

    pub const fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extract every container of the title at `title_dir`.
    ///
    /// Any container that fails to open, carries a bad magic, or hits an
    /// I/O error fails the whole title; containers already processed keep
    /// their output.
    pub fn extract(&self, title_dir: &Path) -> Result<ExtractOutcome, TrophyError> {
        let trophy_dir = title_dir.join(TROPHY_DIR);
        if !trophy_dir.is_dir() {
            #[cfg(feature = "logging")]
            {
                tracing::debug!(path = %trophy_dir.display(), "no trophy directory");
            }
            return Ok(ExtractOutcome::NothingToExtract);
        }

        let title = title_name(title_dir)?;
        let binding_path = title_dir.join(NPBIND_PATH);
        let listed = self.lister.list(&trophy_dir)?;

        let mut summary = ExtractSummary {
            title,
            containers: Vec::new(),
        };

        for (index, item) in listed.iter().enumerate() {
            if !item.is_file {
                continue;
            }

            let key = resolve_np_comm_id(&binding_path, index);
            let report = self.extract_file(&item.path, &summary.title, key)?;
            summary.containers.push(report);
        }

        #[cfg(feature = "logging")]
        {
            tracing::info!(
                title = %summary.title,
                containers = summary.containers.len(),
                icons = summary.icon_count(),
                documents = summary.document_count(),
                skipped = summary.skipped_count(),
                "extracted trophy data"
            );
        }

        Ok(ExtractOutcome::Extracted(summary))
    }

    /// Extract a single TRP file with an explicit key token.
    pub fn extract_file(
        &self,
        path: &Path,
        title: &str,
        key: NpCommId,
    ) -> Result<ContainerReport, TrophyError> {
        #[cfg(feature = "logging")]
        {
            tracing::debug!(path = %path.display(), np_comm_id = %key, "opening trophy container");
        }

        let mut archive = TrpArchive::open_path(path).inspect_err(|_e| {
            #[cfg(feature = "logging")]
            {
                tracing::error!(path = %path.display(), "rejected trophy container: {}", _e);
            }
        })?;

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "container has no name"))?;
        let output_dir = self.options.container_dir(title, &stem);

        let mut report = self.extract_archive(&mut archive, &output_dir, key)?;
        report.source = path.to_path_buf();
        Ok(report)
    }

    /// Extract an already opened container into `output_dir`.
    pub fn extract_archive<R: Read + Seek>(
        &self,
        archive: &mut TrpArchive<R>,
        output_dir: &Path,
        key: NpCommId,
    ) -> Result<ContainerReport, TrophyError> {
        if self.options.verify_digest && !archive.verify_digest()? {
            return Err(TrophyError::DigestMismatch);
        }

        let icons_dir = self.options.icons_path(output_dir);
        let xml_dir = self.options.xml_path(output_dir);
        std::fs::create_dir_all(&icons_dir)?;
        std::fs::create_dir_all(&xml_dir)?;

        let mut report = ContainerReport {
            np_comm_id: key,
            output_dir: output_dir.to_path_buf(),
            ..ContainerReport::default()
        };

        for index in 0..archive.entry_count() {
            let entry = archive.read_entry(index)?;

            match entry.classify(&key)? {
                EntryKind::Icon => {
                    let path = extract_icon(archive, index, &entry, &icons_dir)?;
                    report.icons.push(path);
                }
                EntryKind::EncryptedMetadata => {
                    let path =
                        extract_metadata(archive, index, &entry, &key, &self.cipher, &xml_dir)?;
                    report.documents.push(path);
                }
                EntryKind::Ignore if entry.is_encrypted() => report.skipped_encrypted += 1,
                EntryKind::Ignore => {}
            }
        }

        #[cfg(feature = "logging")]
        {
            if report.skipped_encrypted > 0 {
                tracing::debug!(
                    skipped = report.skipped_encrypted,
                    "no valid NP communication ID, encrypted entries skipped"
                );
            }
        }

        Ok(report)
    }
}

/// Final path component of the title directory, resolving `.`/`..` if
/// needed.
fn title_name(title_dir: &Path) -> Result<String, TrophyError> {
    let name = match title_dir.file_name() {
        Some(name) => name.to_os_string(),
        None => title_dir
            .canonicalize()?
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "title directory has no name"))?,
    };
    Ok(name.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<ListedEntry>);

    impl DirLister for Fixed {
        fn list(&self, _dir: &Path) -> Result<Vec<ListedEntry>, TrophyError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn sorted_lister_orders_by_name_and_flags_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("TROPHY01.TRP"), b"").unwrap();
        std::fs::write(dir.path().join("TROPHY00.TRP"), b"").unwrap();
        std::fs::create_dir(dir.path().join("SUB")).unwrap();

        let listed = SortedLister.list(dir.path()).unwrap();
        let names: Vec<_> = listed
            .iter()
            .map(|e| e.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["SUB", "TROPHY00.TRP", "TROPHY01.TRP"]);
        assert!(!listed[0].is_file);
        assert!(listed[1].is_file);
    }

    #[test]
    fn fs_lister_sees_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("A.TRP"), b"").unwrap();
        std::fs::create_dir(dir.path().join("B")).unwrap();

        let listed = FsLister.list(dir.path()).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed.iter().filter(|e| e.is_file).count(), 1);
    }

    #[test]
    fn borrowed_lister_delegates() {
        fn first<L: DirLister>(lister: L) -> ListedEntry {
            lister.list(Path::new("unused")).unwrap().remove(0)
        }

        let fixed = Fixed(vec![ListedEntry::new("X.TRP", true)]);
        assert_eq!(first(&fixed), ListedEntry::new("X.TRP", true));
    }

    #[test]
    fn lister_swap_keeps_options() {
        struct Plain;
        impl EsfmCipher for Plain {
            fn decrypt(
                &self,
                _key: &NpCommId,
                _iv: &[u8; 16],
                data: &[u8],
            ) -> Result<Vec<u8>, crate::CryptoError> {
                Ok(data.to_vec())
            }

            fn encrypt(
                &self,
                _key: &NpCommId,
                _iv: &[u8; 16],
                data: &[u8],
            ) -> Result<Vec<u8>, crate::CryptoError> {
                Ok(data.to_vec())
            }
        }

        let mut options = ExtractOptions::new("/tmp/out");
        options.verify_digest = true;
        let extractor = TrophyExtractor::new(options, Plain).with_lister(SortedLister);

        assert_eq!(extractor.options().output_root, PathBuf::from("/tmp/out"));
        assert!(extractor.options().verify_digest);
    }

    #[test]
    fn title_name_uses_last_component() {
        assert_eq!(title_name(Path::new("/games/CUSA00001")).unwrap(), "CUSA00001");
        assert_eq!(title_name(Path::new("/games/CUSA00001/")).unwrap(), "CUSA00001");
    }

    #[test]
    fn summary_counts_across_containers() {
        let summary = ExtractSummary {
            title: "CUSA00001".to_string(),
            containers: vec![
                ContainerReport {
                    icons: vec![PathBuf::from("a"), PathBuf::from("b")],
                    skipped_encrypted: 1,
                    ..ContainerReport::default()
                },
                ContainerReport {
                    icons: vec![PathBuf::from("c")],
                    documents: vec![PathBuf::from("d")],
                    ..ContainerReport::default()
                },
            ],
        };
        assert_eq!(summary.icon_count(), 3);
        assert_eq!(summary.document_count(), 1);
        assert_eq!(summary.skipped_count(), 1);
    }
}
