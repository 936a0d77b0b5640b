//! Asynchronous MD5/SHA-256 computation for registered files.

pub mod digest;
pub mod scheduler;
pub mod worker;

pub use digest::{compute_digests, MIN_CHUNK_SIZE};
pub use scheduler::{HashScheduler, SweepTrigger};
pub use worker::{HashStatus, HashWorker, SweepStats, CLAIM_LEASE};
