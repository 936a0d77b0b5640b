//! Domain records persisted by the store.

pub mod digest;
pub mod directory;
pub mod entry;
pub mod report;

pub use digest::{DigestState, FileDigests, Md5Digest, Sha256Digest};
pub use directory::Directory;
pub use entry::{Entry, EntryKind, GameFormat};
pub use report::{Report, ReportReason, ReportStatus};
