// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core identifier and value types for keygate.
//!
//! Identifiers are opaque strings. Fresh identifiers are time-ordered UUIDv7
//! values so that records created later sort after earlier ones.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

// =============================================================================
// Identifiers
// =============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from an existing value.
            #[inline]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generates a new time-ordered identifier.
            pub fn generate() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            /// Returns the identifier as a string slice.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier and returns the inner string.
            #[inline]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a user record.
    ///
    /// ```
    /// use keygate_core::types::UserId;
    ///
    /// let id = UserId::new("u-001");
    /// assert_eq!(id.as_str(), "u-001");
    /// ```
    UserId
);

string_id!(
    /// Identifier of a role record.
    RoleId
);

string_id!(
    /// Identifier of a permission record.
    PermissionId
);

string_id!(
    /// Identifier of a role-permission mapping row.
    RolePermissionId
);

// =============================================================================
// Permission Codes
// =============================================================================

/// The atomic unit of authorization, e.g. `"course:write"`.
///
/// Codes are compared verbatim apart from surrounding whitespace, which is
/// trimmed on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionCode(String);

impl PermissionCode {
    /// Creates a permission code.
    pub fn new(code: impl Into<String>) -> Self {
        let code = code.into();
        let trimmed = code.trim();
        if trimmed.len() == code.len() {
            Self(code)
        } else {
            Self(trimmed.to_string())
        }
    }

    /// Returns the code as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the code is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the resource part of a `resource:action` code.
    pub fn resource(&self) -> &str {
        self.0.split_once(':').map(|(r, _)| r).unwrap_or(&self.0)
    }
}

impl fmt::Display for PermissionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PermissionCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PermissionCode {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

// =============================================================================
// PermissionSet
// =============================================================================

/// A deduplicated set of permission codes.
///
/// Iteration order is lexicographic, so two sets holding the same codes
/// serialize identically regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet {
    codes: BTreeSet<PermissionCode>,
}

impl PermissionSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a code. Returns `false` if it was already present.
    pub fn insert(&mut self, code: impl Into<PermissionCode>) -> bool {
        self.codes.insert(code.into())
    }

    /// Removes a code. Returns `false` if it was not present.
    pub fn remove(&mut self, code: &PermissionCode) -> bool {
        self.codes.remove(code)
    }

    /// Checks membership by string.
    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(&PermissionCode::new(code))
    }

    /// Checks membership of every code.
    pub fn contains_all<'a>(&self, codes: impl IntoIterator<Item = &'a str>) -> bool {
        codes.into_iter().all(|c| self.contains(c))
    }

    /// Checks membership of at least one code.
    pub fn contains_any<'a>(&self, codes: impl IntoIterator<Item = &'a str>) -> bool {
        codes.into_iter().any(|c| self.contains(c))
    }

    /// Returns the union of two sets.
    pub fn union(&self, other: &PermissionSet) -> PermissionSet {
        Self {
            codes: self.codes.union(&other.codes).cloned().collect(),
        }
    }

    /// Merges another set into this one.
    pub fn extend(&mut self, other: &PermissionSet) {
        self.codes.extend(other.codes.iter().cloned());
    }

    /// Iterates over the codes in order.
    pub fn iter(&self) -> impl Iterator<Item = &PermissionCode> {
        self.codes.iter()
    }

    /// Returns the number of codes.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Returns `true` if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Returns the codes as plain strings.
    pub fn to_strings(&self) -> Vec<String> {
        self.codes.iter().map(|c| c.as_str().to_string()).collect()
    }
}

impl<C: Into<PermissionCode>> FromIterator<C> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        Self {
            codes: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl IntoIterator for PermissionSet {
    type Item = PermissionCode;
    type IntoIter = std::collections::btree_set::IntoIter<PermissionCode>;

    fn into_iter(self) -> Self::IntoIter {
        self.codes.into_iter()
    }
}

impl<'a> IntoIterator for &'a PermissionSet {
    type Item = &'a PermissionCode;
    type IntoIter = std::collections::btree_set::Iter<'a, PermissionCode>;

    fn into_iter(self) -> Self::IntoIter {
        self.codes.iter()
    }
}

// =============================================================================
// Approval Status
// =============================================================================

/// Approval state of an account.
///
/// Roles that are not auto-approved start as `Pending` and may not
/// authenticate until an administrator approves them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    /// Waiting for an administrator.
    Pending,
    /// Allowed to authenticate.
    #[default]
    Approved,
    /// Refused by an administrator.
    Rejected,
}

impl ApprovalStatus {
    /// Returns the status as a static string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Returns `true` if the account may authenticate.
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================
