//! Options for trophy extraction.
//!
//! ```ignore
//! let options = ExtractOptionsBuilder::default()
//!     .output_root("/home/user/.local/share/emu/metadata")
//!     .verify_digest(true)
//!     .build()?;
//! ```

use std::path::{Path, PathBuf};

use derive_builder::Builder;

/// Binding file, relative to the title directory.
pub const NPBIND_PATH: &str = "sce_sys/npbind.dat";

/// Directory holding the title's TRP files, relative to the title directory.
pub const TROPHY_DIR: &str = "sce_sys/trophy";

/// Where and how extracted trophy data is written.
///
/// Output for a container `<stem>.trp` of title `<title>` lands in
/// `<output_root>/<title>/<files_dir>/<stem>/{<icons_dir>,<xml_dir>}`.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct ExtractOptions {
    /// Root of the per-title output trees
    pub output_root: PathBuf,
    /// Per-title directory grouping all containers
    #[builder(default = "\"TrophyFiles\".to_string()")]
    pub files_dir: String,
    /// Directory receiving plain icons
    #[builder(default = "\"Icons\".to_string()")]
    pub icons_dir: String,
    /// Directory receiving decrypted documents
    #[builder(default = "\"Xml\".to_string()")]
    pub xml_dir: String,
    /// Reject containers whose header digest does not match their contents
    #[builder(default = "false")]
    pub verify_digest: bool,
}

impl ExtractOptions {
    /// Options with default directory names under `output_root`.
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            files_dir: "TrophyFiles".to_string(),
            icons_dir: "Icons".to_string(),
            xml_dir: "Xml".to_string(),
            verify_digest: false,
        }
    }

    /// Output directory of one container.
    pub fn container_dir(&self, title: &str, stem: &str) -> PathBuf {
        self.output_root
            .join(title)
            .join(&self.files_dir)
            .join(stem)
    }

    pub fn icons_path(&self, container_dir: &Path) -> PathBuf {
        container_dir.join(&self.icons_dir)
    }

    pub fn xml_path(&self, container_dir: &Path) -> PathBuf {
        container_dir.join(&self.xml_dir)
    }
}
