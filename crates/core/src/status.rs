//! Commit availability status vocabulary.

use serde::{Deserialize, Serialize};

/// Last-known remote availability of a commit.
///
/// Absence of a cache row is equivalent to `Available`; the poller only
/// writes rows for commits the remote reports as taken, plus the
/// reconciliation rows that flip them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStatus {
    Available,
    AlreadyReserved,
    InDistribution,
    Unavailable,
    TooEasy,
    PaidOut,
    PendingAdminApproval,
    Failed,
    Error,
}

impl CommitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::AlreadyReserved => "already_reserved",
            Self::InDistribution => "in_distribution",
            Self::Unavailable => "unavailable",
            Self::TooEasy => "too_easy",
            Self::PaidOut => "paid_out",
            Self::PendingAdminApproval => "pending_admin_approval",
            Self::Failed => "failed",
            Self::Error => "error",
        }
    }

    /// Map the remote service's status vocabulary onto the internal enum.
    ///
    /// The remote says `reserved` where we store `already_reserved`;
    /// anything unrecognized is treated as plain `unavailable`.
    pub fn from_remote(raw: &str) -> Self {
        match raw.trim() {
            "reserved" | "already_reserved" => Self::AlreadyReserved,
            "in_distribution" => Self::InDistribution,
            "too_easy" => Self::TooEasy,
            "paid_out" => Self::PaidOut,
            "pending_admin_approval" => Self::PendingAdminApproval,
            "failed" => Self::Failed,
            "error" => Self::Error,
            _ => Self::Unavailable,
        }
    }

    /// Parse a stored database value. Unknown values fall back to `Error`
    /// rather than panicking on old rows.
    pub fn from_db(raw: &str) -> Self {
        match raw {
            "available" => Self::Available,
            "already_reserved" => Self::AlreadyReserved,
            "in_distribution" => Self::InDistribution,
            "unavailable" => Self::Unavailable,
            "too_easy" => Self::TooEasy,
            "paid_out" => Self::PaidOut,
            "pending_admin_approval" => Self::PendingAdminApproval,
            "failed" => Self::Failed,
            _ => Self::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_vocabulary_maps_reserved_to_already_reserved() {
        assert_eq!(
            CommitStatus::from_remote("reserved"),
            CommitStatus::AlreadyReserved
        );
        assert_eq!(
            CommitStatus::from_remote(" paid_out "),
            CommitStatus::PaidOut
        );
    }

    #[test]
    fn unknown_remote_status_defaults_to_unavailable() {
        assert_eq!(
            CommitStatus::from_remote("banana"),
            CommitStatus::Unavailable
        );
        assert_eq!(CommitStatus::from_remote(""), CommitStatus::Unavailable);
    }

    #[test]
    fn db_roundtrip_is_stable() {
        for status in [
            CommitStatus::Available,
            CommitStatus::AlreadyReserved,
            CommitStatus::InDistribution,
            CommitStatus::Unavailable,
            CommitStatus::TooEasy,
            CommitStatus::PaidOut,
            CommitStatus::PendingAdminApproval,
            CommitStatus::Failed,
            CommitStatus::Error,
        ] {
            assert_eq!(CommitStatus::from_db(status.as_str()), status);
        }
    }
}
