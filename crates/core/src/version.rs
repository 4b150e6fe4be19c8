//! Optimistic concurrency primitives.
//!
//! Every mutable row in the ledger store (sequence counter, journal entry,
//! account, collaborator document) carries a version. A transaction remembers
//! the version it observed and the store rejects the commit if the row moved
//! on in the meantime.

use crate::error::{DomainError, DomainResult};

/// Optimistic concurrency expectation for a stored row.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking.
    Any,
    /// The row must not exist yet (version 0).
    Absent,
    /// Require the row to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    /// Expectation derived from a version observed during a read (0 = absent).
    pub fn observed(version: u64) -> Self {
        if version == 0 { Self::Absent } else { Self::Exact(version) }
    }

    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Absent => actual == 0,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

/// A stored value paired with its row version (starts at 1, +1 per write).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

impl<T> Versioned<T> {
    pub fn initial(value: T) -> Self {
        Self { value, version: 1 }
    }

    /// Replace the value and bump the version.
    pub fn replace(&mut self, value: T) {
        self.value = value;
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observed_zero_means_absent() {
        assert_eq!(ExpectedVersion::observed(0), ExpectedVersion::Absent);
        assert!(ExpectedVersion::observed(0).matches(0));
        assert!(!ExpectedVersion::observed(0).matches(1));
    }

    #[test]
    fn exact_version_mismatch_is_a_conflict() {
        let err = ExpectedVersion::Exact(3).check(4).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert!(ExpectedVersion::Any.check(42).is_ok());
    }

    #[test]
    fn replace_bumps_version() {
        let mut row = Versioned::initial(10u64);
        row.replace(11);
        assert_eq!(row.version, 2);
        assert_eq!(row.value, 11);
    }
}
