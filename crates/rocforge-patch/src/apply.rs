//! Filesystem binding for the mapping-file patcher.
//!
//! The target file belongs to an externally-installed package, so the edit
//! is scoped: content is read whole, rewritten in memory, and replaced via a
//! sibling temporary file and an atomic rename. A crash mid-write leaves the
//! original table intact.

use crate::rewrite::{MappingState, RewriteOutcome, insert_after_anchor, mapping_state};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Package whose translation table is patched.
pub const DEFAULT_PACKAGE: &str = "torch";

/// Subdirectory of the installed package that holds the hipify tooling.
pub const HIPIFY_SUBDIR: &str = "utils/hipify";

/// Generated conversion-mapping table inside the hipify directory.
pub const MAPPING_FILE: &str = "cuda_to_hip_mappings.py";

/// Existing CUB mapping entry used as the insertion point.
pub const CUB_ANCHOR_LINE: &str =
    r#"("cub::BlockReduce", ("hipcub::BlockReduce", CONV_SPECIAL_FUNC, API_RUNTIME)),"#;

/// CUB mapping entry required by the MoE extension's kernels.
pub const CUB_ENTRY_LINE: &str =
    r#"("cub::WarpReduce", ("hipcub::WarpReduce", CONV_SPECIAL_FUNC, API_RUNTIME)),"#;

/// Failures from resolving or patching the mapping file.
///
/// Each kind carries a stable process exit code so the enclosing build can
/// tell which precondition failed.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("package `{0}` is not installed")]
    PackageNotFound(String),

    #[error("hipify directory unavailable: {}", .0.display())]
    DirectoryUnavailable(PathBuf),

    #[error("mapping file missing: {}", .0.display())]
    FileMissing(PathBuf),

    #[error("anchor line not found in {}", .0.display())]
    AnchorNotFound(PathBuf),

    #[error("{path}: {message}")]
    Io { path: String, message: String },
}

impl PatchError {
    /// Stable exit code for this failure kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::PackageNotFound(_) => 2,
            Self::DirectoryUnavailable(_) => 3,
            Self::FileMissing(_) => 4,
            Self::AnchorNotFound(_) => 5,
            Self::Io { .. } => 1,
        }
    }

    fn io(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Location of an installed package's hipify tooling.
#[derive(Debug, Clone)]
pub struct PatchSite {
    install_dir: PathBuf,
    package: String,
}

impl PatchSite {
    pub fn new(install_dir: impl Into<PathBuf>, package: impl Into<String>) -> Self {
        Self {
            install_dir: install_dir.into(),
            package: package.into(),
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// `<install-dir>/<package>/utils/hipify`.
    pub fn hipify_dir(&self) -> PathBuf {
        self.install_dir.join(&self.package).join(HIPIFY_SUBDIR)
    }

    /// Full path to the conversion-mapping table.
    pub fn mapping_file(&self) -> PathBuf {
        self.hipify_dir().join(MAPPING_FILE)
    }
}

/// What `MappingPatch::apply` did to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatchOutcome {
    Patched,
    AlreadyPatched,
}

impl PatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patched => "patched",
            Self::AlreadyPatched => "already-patched",
        }
    }
}

/// Result of a successful `MappingPatch::apply`.
#[derive(Debug, Clone)]
pub struct PatchReport {
    pub outcome: PatchOutcome,
    pub mapping_file: PathBuf,
    pub content_digest: String,
}

/// Result of a read-only `MappingPatch::state`.
#[derive(Debug, Clone)]
pub struct StateReport {
    pub state: MappingState,
    pub mapping_file: PathBuf,
    pub content_digest: String,
}

/// One anchored insertion into a conversion-mapping table.
#[derive(Debug, Clone)]
pub struct MappingPatch {
    anchor: String,
    entry: String,
}

impl Default for MappingPatch {
    fn default() -> Self {
        Self::new(CUB_ANCHOR_LINE, CUB_ENTRY_LINE)
    }
}

impl MappingPatch {
    pub fn new(anchor: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            anchor: anchor.into(),
            entry: entry.into(),
        }
    }

    /// Apply the patch at `site`, rewriting the mapping file in place.
    ///
    /// A file that already carries the entry line is left untouched and
    /// reported as `AlreadyPatched`; re-running against a patched install is
    /// success, not a duplicate insertion.
    pub fn apply(&self, site: &PatchSite) -> Result<PatchReport, PatchError> {
        let file = checked_mapping_file(site)?;
        let content = read_mapping(&file)?;
        match insert_after_anchor(&content, &self.anchor, &self.entry) {
            RewriteOutcome::AlreadyPresent => Ok(PatchReport {
                outcome: PatchOutcome::AlreadyPatched,
                content_digest: content_digest(&content),
                mapping_file: file,
            }),
            RewriteOutcome::AnchorMissing => Err(PatchError::AnchorNotFound(file)),
            RewriteOutcome::Inserted { content } => {
                write_atomic(&file, &content)?;
                Ok(PatchReport {
                    outcome: PatchOutcome::Patched,
                    content_digest: content_digest(&content),
                    mapping_file: file,
                })
            }
        }
    }

    /// Inspect the patch state at `site` without writing.
    pub fn state(&self, site: &PatchSite) -> Result<StateReport, PatchError> {
        let file = checked_mapping_file(site)?;
        let content = read_mapping(&file)?;
        Ok(StateReport {
            state: mapping_state(&content, &self.anchor, &self.entry),
            content_digest: content_digest(&content),
            mapping_file: file,
        })
    }
}

/// Sha256 digest of mapping-file content.
pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

fn checked_mapping_file(site: &PatchSite) -> Result<PathBuf, PatchError> {
    let dir = site.hipify_dir();
    if !dir.is_dir() {
        return Err(PatchError::DirectoryUnavailable(dir));
    }
    let file = site.mapping_file();
    if !file.is_file() {
        return Err(PatchError::FileMissing(file));
    }
    Ok(file)
}

fn read_mapping(path: &Path) -> Result<String, PatchError> {
    fs::read_to_string(path).map_err(|e| PatchError::io(path, e))
}

fn write_atomic(path: &Path, content: &str) -> Result<(), PatchError> {
    let tmp_path = tmp_write_path(path);
    let write_result = (|| -> Result<(), PatchError> {
        let mut file = File::create(&tmp_path).map_err(|e| PatchError::io(&tmp_path, e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| PatchError::io(&tmp_path, e))?;
        file.sync_all().map_err(|e| PatchError::io(&tmp_path, e))?;
        Ok(())
    })();

    if let Err(error) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(PatchError::io(path, e));
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        let dir = File::open(parent).map_err(|e| PatchError::io(parent, e))?;
        dir.sync_all().map_err(|e| PatchError::io(parent, e))?;
    }

    Ok(())
}

fn tmp_write_path(path: &Path) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut tmp: OsString = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}.{}", std::process::id(), unique));
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TempSite {
        root: PathBuf,
        site: PatchSite,
    }

    impl TempSite {
        fn new(prefix: &str) -> Self {
            let unique = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock should be after unix epoch")
                .as_nanos();
            let root = std::env::temp_dir().join(format!(
                "rocforge-patch-{prefix}-{}-{unique}",
                std::process::id()
            ));
            fs::create_dir_all(&root).expect("temp root should be created");
            let site = PatchSite::new(&root, DEFAULT_PACKAGE);
            Self { root, site }
        }

        fn with_mapping_file(prefix: &str, content: &str) -> Self {
            let temp = Self::new(prefix);
            fs::create_dir_all(temp.site.hipify_dir()).expect("hipify dir should be created");
            fs::write(temp.site.mapping_file(), content).expect("mapping file should be written");
            temp
        }

        fn mapping_content(&self) -> String {
            fs::read_to_string(self.site.mapping_file()).expect("mapping file should be readable")
        }
    }

    impl Drop for TempSite {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.root);
        }
    }

    fn table_fixture() -> String {
        format!(
            "CUDA_SPECIAL_MAP = collections.OrderedDict(\n    [\n        {CUB_ANCHOR_LINE}\n        (\"cub::Sum\", (\"hipcub::Sum\", CONV_SPECIAL_FUNC, API_RUNTIME)),\n    ]\n)\n"
        )
    }

    #[test]
    fn apply_inserts_entry_after_anchor() {
        let temp = TempSite::with_mapping_file("insert", &table_fixture());
        let report = MappingPatch::default()
            .apply(&temp.site)
            .expect("patch should apply");

        assert_eq!(report.outcome, PatchOutcome::Patched);
        let content = temp.mapping_content();
        let lines: Vec<&str> = content.lines().collect();
        let anchor_at = lines
            .iter()
            .position(|line| line.trim() == CUB_ANCHOR_LINE)
            .expect("anchor should survive the patch");
        assert_eq!(lines[anchor_at + 1].trim(), CUB_ENTRY_LINE);
        // Entry inherits the table's eight-space indentation.
        assert!(lines[anchor_at + 1].starts_with("        ("));
    }

    #[test]
    fn apply_twice_is_idempotent() {
        let temp = TempSite::with_mapping_file("idempotent", &table_fixture());
        let patch = MappingPatch::default();

        let first = patch.apply(&temp.site).expect("first apply should succeed");
        let after_first = temp.mapping_content();
        let second = patch.apply(&temp.site).expect("second apply should succeed");

        assert_eq!(first.outcome, PatchOutcome::Patched);
        assert_eq!(second.outcome, PatchOutcome::AlreadyPatched);
        assert_eq!(temp.mapping_content(), after_first);
        assert_eq!(second.content_digest, first.content_digest);
    }

    #[test]
    fn missing_hipify_dir_is_directory_unavailable() {
        let temp = TempSite::new("no-dir");
        let err = MappingPatch::default()
            .apply(&temp.site)
            .expect_err("apply should fail without the hipify dir");
        assert!(matches!(err, PatchError::DirectoryUnavailable(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn missing_mapping_file_writes_nothing() {
        let temp = TempSite::new("no-file");
        fs::create_dir_all(temp.site.hipify_dir()).expect("hipify dir should be created");

        let err = MappingPatch::default()
            .apply(&temp.site)
            .expect_err("apply should fail without the mapping file");
        assert!(matches!(err, PatchError::FileMissing(_)));
        assert_eq!(err.exit_code(), 4);

        let leftovers: Vec<_> = fs::read_dir(temp.site.hipify_dir())
            .expect("hipify dir should be listable")
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn missing_anchor_leaves_file_unmodified() {
        let content = "TABLE = [\n    (\"other\", (\"entry\",)),\n]\n";
        let temp = TempSite::with_mapping_file("no-anchor", content);

        let err = MappingPatch::default()
            .apply(&temp.site)
            .expect_err("apply should fail without the anchor");
        assert!(matches!(err, PatchError::AnchorNotFound(_)));
        assert_eq!(err.exit_code(), 5);
        assert_eq!(temp.mapping_content(), content);
    }

    #[test]
    fn state_tracks_the_patch_lifecycle() {
        let temp = TempSite::with_mapping_file("state", &table_fixture());
        let patch = MappingPatch::default();

        let before = patch.state(&temp.site).expect("state should read");
        assert_eq!(before.state, MappingState::Unpatched);

        patch.apply(&temp.site).expect("patch should apply");

        let after = patch.state(&temp.site).expect("state should read");
        assert_eq!(after.state, MappingState::Patched);
        assert_eq!(after.content_digest, content_digest(&temp.mapping_content()));
    }

    #[test]
    fn error_kinds_map_to_distinct_exit_codes() {
        let codes = [
            PatchError::PackageNotFound("torch".to_string()).exit_code(),
            PatchError::DirectoryUnavailable(PathBuf::from("d")).exit_code(),
            PatchError::FileMissing(PathBuf::from("f")).exit_code(),
            PatchError::AnchorNotFound(PathBuf::from("f")).exit_code(),
        ];
        let mut deduped = codes.to_vec();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), codes.len());
        assert!(codes.iter().all(|code| *code != 0));
    }

    #[test]
    fn atomic_replace_leaves_no_temp_files() {
        let temp = TempSite::with_mapping_file("atomic", &table_fixture());
        MappingPatch::default()
            .apply(&temp.site)
            .expect("patch should apply");

        let stray: Vec<String> = fs::read_dir(temp.site.hipify_dir())
            .expect("hipify dir should be listable")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name != MAPPING_FILE)
            .collect();
        assert!(stray.is_empty(), "unexpected leftovers: {stray:?}");
    }
}
