//! Update planning
//!
//! This module provides:
//! - Target version resolution with the `next` -> `latest` fallback
//! - Batch expansion through package groups and peers
//! - The major version guard for first-party packages
//! - Peer dependency validation with range extension rules
//! - The status report shown when nothing is requested

mod batch;
mod compat;
mod expand;
mod guard;
mod peer;
mod resolver;
mod status;

pub use batch::{installed_version, resolve_batch, Batch, BatchEntry};
pub use compat::{major_compat_guarantee, RangeExtension, RangeRules};
pub use expand::{group_additions, peer_additions};
pub use guard::{MajorVersionGuard, DEFAULT_FIRST_PARTY_PATTERN};
pub use peer::{
    MissingPeer, PeerConflict, PeerDependencyValidator, PeerDirection, PeerReport,
    DEFAULT_PEER_IGNORE,
};
pub use resolver::{pick_manifest, PickError, ResolvedTarget, VersionResolver};
pub use status::{collect_status, StatusLine, StatusReport};
