use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IntegrityError;

/// Why a user believes an entry is broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportReason {
    CorruptFile,
    ChecksumMismatch,
    Incomplete,
    WrongContent,
    Other,
}

impl ReportReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportReason::CorruptFile => "corrupt_file",
            ReportReason::ChecksumMismatch => "checksum_mismatch",
            ReportReason::Incomplete => "incomplete",
            ReportReason::WrongContent => "wrong_content",
            ReportReason::Other => "other",
        }
    }
}

impl std::str::FromStr for ReportReason {
    type Err = IntegrityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "corrupt_file" => Ok(ReportReason::CorruptFile),
            "checksum_mismatch" => Ok(ReportReason::ChecksumMismatch),
            "incomplete" => Ok(ReportReason::Incomplete),
            "wrong_content" => Ok(ReportReason::WrongContent),
            "other" => Ok(ReportReason::Other),
            other => Err(IntegrityError::InvalidReason(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Open,
    Resolved,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Open => "open",
            ReportStatus::Resolved => "resolved",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(ReportStatus::Open),
            "resolved" => Some(ReportStatus::Resolved),
            _ => None,
        }
    }
}

/// A user's claim that an entry is broken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub entry_id: String,
    /// Entry name at the time of the report.
    pub entry_name: String,
    pub reporter_id: String,
    pub reporter_name: String,
    pub reason: ReportReason,
    pub description: String,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_parse() {
        assert_eq!(
            "corrupt_file".parse::<ReportReason>().unwrap(),
            ReportReason::CorruptFile
        );
        assert_eq!(" other ".parse::<ReportReason>().unwrap(), ReportReason::Other);
        assert!(matches!(
            "broken".parse::<ReportReason>(),
            Err(IntegrityError::InvalidReason(_))
        ));
    }
}
