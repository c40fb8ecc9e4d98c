//! # rocforge-patch
//!
//! The mapping-file patcher: one idempotent, anchored insertion into an
//! installed framework's generated CUDA→HIP conversion table.
//!
//! The crate separates the pure rewrite from the filesystem binding:
//!
//! ```text
//! cuda_to_hip_mappings.py (on disk)
//!     →  read  →  insert_after_anchor  →  atomic rename
//! ```
//!
//! Path discovery (which install directory holds the package) belongs to the
//! pip adapter; this crate only consumes the resolved location.

pub mod apply;
pub mod rewrite;

pub use apply::{
    CUB_ANCHOR_LINE, CUB_ENTRY_LINE, DEFAULT_PACKAGE, HIPIFY_SUBDIR, MAPPING_FILE, MappingPatch,
    PatchError, PatchOutcome, PatchReport, PatchSite, StateReport, content_digest,
};
pub use rewrite::{MappingState, RewriteOutcome, insert_after_anchor, mapping_state};
