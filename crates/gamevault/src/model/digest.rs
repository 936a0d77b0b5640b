//! Digest state of an entry.
//!
//! Each file entry moves through `Unclaimed -> Claimed -> Hashed`. A claim
//! carries the time it was taken so a sweep that died mid-file can be
//! recognised and re-adopted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HashError;

fn is_lower_hex(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// A 32 character lowercase hex MD5 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Md5Digest(String);

impl Md5Digest {
    pub const HEX_LEN: usize = 32;

    pub fn parse(value: &str) -> Result<Self, HashError> {
        let lowered = value.to_ascii_lowercase();
        if is_lower_hex(&lowered, Self::HEX_LEN) {
            Ok(Self(lowered))
        } else {
            Err(HashError::InvalidDigest {
                algorithm: "md5",
                value: value.to_string(),
            })
        }
    }

    pub(crate) fn from_bytes(bytes: &[u8; 16]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A 64 character lowercase hex SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sha256Digest(String);

impl Sha256Digest {
    pub const HEX_LEN: usize = 64;

    pub fn parse(value: &str) -> Result<Self, HashError> {
        let lowered = value.to_ascii_lowercase();
        if is_lower_hex(&lowered, Self::HEX_LEN) {
            Ok(Self(lowered))
        } else {
            Err(HashError::InvalidDigest {
                algorithm: "sha256",
                value: value.to_string(),
            })
        }
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! digest_conversions {
    ($ty:ident) => {
        impl TryFrom<String> for $ty {
            type Error = HashError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

digest_conversions!(Md5Digest);
digest_conversions!(Sha256Digest);

/// Both digests of a file, computed in a single read pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDigests {
    pub md5: Md5Digest,
    pub sha256: Sha256Digest,
}

/// Where an entry is in the hashing lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum DigestState {
    /// No digest yet and nobody working on it.
    Unclaimed,
    /// A worker has taken the entry and is computing digests.
    Claimed { since: DateTime<Utc> },
    /// Both digests are known.
    Hashed {
        md5: Md5Digest,
        sha256: Sha256Digest,
    },
}

impl DigestState {
    /// Column value stored in `entries.digest_state`.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            DigestState::Unclaimed => "unclaimed",
            DigestState::Claimed { .. } => "claimed",
            DigestState::Hashed { .. } => "hashed",
        }
    }

    pub fn is_hashed(&self) -> bool {
        matches!(self, DigestState::Hashed { .. })
    }

    pub fn is_claimed(&self) -> bool {
        matches!(self, DigestState::Claimed { .. })
    }

    /// How long the current claim has been held, if any.
    pub fn claim_age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        match self {
            DigestState::Claimed { since } => Some(now - *since),
            _ => None,
        }
    }

    pub fn digests(&self) -> Option<FileDigests> {
        match self {
            DigestState::Hashed { md5, sha256 } => Some(FileDigests {
                md5: md5.clone(),
                sha256: sha256.clone(),
            }),
            _ => None,
        }
    }
}

impl From<FileDigests> for DigestState {
    fn from(d: FileDigests) -> Self {
        DigestState::Hashed {
            md5: d.md5,
            sha256: d.sha256,
        }
    }
}
